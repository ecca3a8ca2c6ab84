//! Retrieval, clearing and port binding payloads.

use super::expectation::HttpResponse;
use super::request::HttpRequest;
use serde::{Deserialize, Serialize};

/// Separator between entries of the plain-text log retrieval.
pub const LOG_SEPARATOR: &str = "\n------------------------------------\n";

/// What `clear` removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearType {
    #[default]
    All,
    Log,
    Expectations,
}

impl ClearType {
    pub fn as_query(&self) -> &'static str {
        match self {
            ClearType::All => "all",
            ClearType::Log => "log",
            ClearType::Expectations => "expectations",
        }
    }
}

/// What `retrieve` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieveType {
    Requests,
    RequestResponses,
    RecordedExpectations,
    ActiveExpectations,
    Logs,
}

impl RetrieveType {
    pub fn as_query(&self) -> &'static str {
        match self {
            RetrieveType::Requests => "REQUESTS",
            RetrieveType::RequestResponses => "REQUEST_RESPONSES",
            RetrieveType::RecordedExpectations => "RECORDED_EXPECTATIONS",
            RetrieveType::ActiveExpectations => "ACTIVE_EXPECTATIONS",
            RetrieveType::Logs => "LOGS",
        }
    }
}

impl std::str::FromStr for RetrieveType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "requests" => Ok(RetrieveType::Requests),
            "request_responses" => Ok(RetrieveType::RequestResponses),
            "recorded_expectations" => Ok(RetrieveType::RecordedExpectations),
            "active_expectations" => Ok(RetrieveType::ActiveExpectations),
            "logs" => Ok(RetrieveType::Logs),
            other => Err(format!("unknown retrieve type: {}", other)),
        }
    }
}

/// Serialization format requested from `retrieve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Java,
    LogEntries,
}

impl Format {
    pub fn as_query(&self) -> &'static str {
        match self {
            Format::Json => "JSON",
            Format::Java => "JAVA",
            Format::LogEntries => "LOG_ENTRIES",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "json" => Ok(Format::Json),
            "java" => Ok(Format::Java),
            "log_entries" => Ok(Format::LogEntries),
            other => Err(format!("unknown format: {}", other)),
        }
    }
}

/// Ports to bind (request) or bound (response).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    #[serde(default)]
    pub ports: Vec<u16>,
}

/// A recorded request with the response that was returned for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEventRequestAndResponse {
    pub http_request: HttpRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response: Option<HttpResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
