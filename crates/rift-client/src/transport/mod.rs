//! Outbound control-plane requests and the transport that carries them.

mod http;

pub use http::HttpTransport;

use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::Method;
use std::fmt;
use std::time::Duration;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const AUTHORIZATION: &str = "Authorization";
pub const HOST: &str = "Host";
pub const APPLICATION_JSON_UTF_8: &str = "application/json; charset=utf-8";

/// Host and (resolved) port of the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteAddress {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Request body with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub content: String,
    pub content_type: Option<String>,
}

impl Body {
    pub fn json(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: Some(APPLICATION_JSON_UTF_8.to_string()),
        }
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_type: None,
        }
    }
}

/// A single request to the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Body>,
    /// Use TLS; `None` means plain HTTP
    pub secure: Option<bool>,
}

impl ControlRequest {
    /// Control-plane operations are all `PUT`s.
    pub fn put(path: impl Into<String>) -> Self {
        Self {
            method: Method::PUT,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            secure: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    /// Replace any existing value of `name` (case-insensitive).
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_header(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_secure(&self) -> bool {
        self.secure.unwrap_or(false)
    }
}

/// Response received from the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ControlResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Carries control-plane requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` to `address`, failing if no response arrives in `timeout`.
    async fn send(
        &self,
        address: &RemoteAddress,
        request: &ControlRequest,
        timeout: Duration,
    ) -> Result<ControlResponse, TransportError>;

    /// Release connections; later sends fail with [`TransportError::ShutDown`].
    fn shutdown(&self);

    fn is_shutting_down(&self) -> bool;
}
