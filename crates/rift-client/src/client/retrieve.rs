//! Clearing and retrieving recorded state.

use super::{json_or_empty, MockServerClient};
use crate::error::Result;
use crate::model::{
    ClearType, Expectation, ExpectationId, Format, HttpRequest, LogEventRequestAndResponse,
    RequestDefinition, RetrieveType, LOG_SEPARATOR,
};
use crate::path::Operation;
use crate::transport::Body;
use serde::de::DeserializeOwned;

impl MockServerClient {
    /// Clear expectations and/or recorded requests matching `matcher`
    /// (everything when `None`).
    pub async fn clear(
        &self,
        matcher: Option<RequestDefinition>,
        clear_type: Option<ClearType>,
    ) -> Result<()> {
        self.clear_with_body(json_or_empty(matcher.as_ref())?, clear_type)
            .await
    }

    /// Clear the expectation with `id` and/or the requests it matched.
    pub async fn clear_expectation(
        &self,
        id: impl Into<ExpectationId>,
        clear_type: Option<ClearType>,
    ) -> Result<()> {
        let id = id.into();
        self.clear_with_body(json_or_empty(Some(&id))?, clear_type)
            .await
    }

    async fn clear_with_body(
        &self,
        body: Body,
        clear_type: Option<ClearType>,
    ) -> Result<()> {
        let mut request = self.request(Operation::Clear).with_body(body);
        if let Some(clear_type) = clear_type {
            request = request.with_query("type", clear_type.as_query());
        }
        self.call(request).await?;
        Ok(())
    }

    pub async fn retrieve_recorded_requests(
        &self,
        matcher: Option<RequestDefinition>,
    ) -> Result<Vec<HttpRequest>> {
        let body = self
            .retrieve(matcher, RetrieveType::Requests, Some(Format::Json))
            .await?;
        parse_list(&body)
    }

    pub async fn retrieve_recorded_requests_as(
        &self,
        matcher: Option<RequestDefinition>,
        format: Format,
    ) -> Result<String> {
        self.retrieve(matcher, RetrieveType::Requests, Some(format))
            .await
    }

    pub async fn retrieve_recorded_requests_and_responses(
        &self,
        matcher: Option<RequestDefinition>,
    ) -> Result<Vec<LogEventRequestAndResponse>> {
        let body = self
            .retrieve(matcher, RetrieveType::RequestResponses, Some(Format::Json))
            .await?;
        parse_list(&body)
    }

    pub async fn retrieve_recorded_requests_and_responses_as(
        &self,
        matcher: Option<RequestDefinition>,
        format: Format,
    ) -> Result<String> {
        self.retrieve(matcher, RetrieveType::RequestResponses, Some(format))
            .await
    }

    /// Expectations recorded while proxying.
    pub async fn retrieve_recorded_expectations(
        &self,
        matcher: Option<RequestDefinition>,
    ) -> Result<Vec<Expectation>> {
        let body = self
            .retrieve(matcher, RetrieveType::RecordedExpectations, Some(Format::Json))
            .await?;
        parse_list(&body)
    }

    pub async fn retrieve_recorded_expectations_as(
        &self,
        matcher: Option<RequestDefinition>,
        format: Format,
    ) -> Result<String> {
        self.retrieve(matcher, RetrieveType::RecordedExpectations, Some(format))
            .await
    }

    pub async fn retrieve_active_expectations(
        &self,
        matcher: Option<RequestDefinition>,
    ) -> Result<Vec<Expectation>> {
        let body = self
            .retrieve(matcher, RetrieveType::ActiveExpectations, Some(Format::Json))
            .await?;
        parse_list(&body)
    }

    pub async fn retrieve_active_expectations_as(
        &self,
        matcher: Option<RequestDefinition>,
        format: Format,
    ) -> Result<String> {
        self.retrieve(matcher, RetrieveType::ActiveExpectations, Some(format))
            .await
    }

    /// The server log for requests matching `matcher`, as one string.
    pub async fn retrieve_log_messages(&self, matcher: Option<RequestDefinition>) -> Result<String> {
        self.retrieve(matcher, RetrieveType::Logs, None).await
    }

    /// The server log split into individual messages.
    pub async fn retrieve_log_messages_array(
        &self,
        matcher: Option<RequestDefinition>,
    ) -> Result<Vec<String>> {
        let log = self.retrieve_log_messages(matcher).await?;
        Ok(log
            .split(LOG_SEPARATOR)
            .filter(|message| !message.is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Raw retrieve call; `type` (and `format` when given) go in the query.
    pub async fn retrieve(
        &self,
        matcher: Option<RequestDefinition>,
        kind: RetrieveType,
        format: Option<Format>,
    ) -> Result<String> {
        let mut request = self
            .request(Operation::Retrieve)
            .with_query("type", kind.as_query());
        if let Some(format) = format {
            request = request.with_query("format", format.as_query());
        }
        let request = request.with_body(json_or_empty(matcher.as_ref())?);
        Ok(self.call(request).await?.body)
    }
}

/// Blank and `[]` bodies are empty lists.
fn parse_list<T: DeserializeOwned>(body: &str) -> Result<Vec<T>> {
    let body = body.trim();
    if body.is_empty() || body == "[]" {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(body)?)
}
