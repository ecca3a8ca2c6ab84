//! Verification payloads.

use super::expectation::ExpectationId;
use super::request::{HttpRequest, RequestDefinition};
use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};

/// Expected number of occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationTimes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_most: Option<u32>,
}

impl VerificationTimes {
    pub fn never() -> Self {
        Self::exactly(0)
    }

    pub fn once() -> Self {
        Self::exactly(1)
    }

    pub fn exactly(count: u32) -> Self {
        Self {
            at_least: Some(count),
            at_most: Some(count),
        }
    }

    pub fn at_least(count: u32) -> Self {
        Self {
            at_least: Some(count),
            at_most: None,
        }
    }

    pub fn at_most(count: u32) -> Self {
        Self {
            at_least: None,
            at_most: Some(count),
        }
    }

    pub fn between(at_least: u32, at_most: u32) -> Self {
        Self {
            at_least: Some(at_least),
            at_most: Some(at_most),
        }
    }
}

/// Assert that a matcher (or expectation) was hit a number of times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_request: Option<RequestDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expectation_id: Option<ExpectationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<VerificationTimes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_number_of_request_to_return_in_verification_failure: Option<u32>,
}

impl Verification {
    pub fn request(request: impl Into<RequestDefinition>) -> Self {
        Self {
            http_request: Some(request.into()),
            ..Default::default()
        }
    }

    pub fn expectation(id: impl Into<ExpectationId>) -> Self {
        Self {
            expectation_id: Some(id.into()),
            ..Default::default()
        }
    }

    /// Zero requests of any kind.
    pub fn zero_interactions() -> Self {
        Self::request(HttpRequest::default()).with_times(VerificationTimes::never())
    }

    #[must_use]
    pub fn with_times(mut self, times: VerificationTimes) -> Self {
        self.times = Some(times);
        self
    }

    /// Cap the number of offending requests the server reports back.
    #[must_use]
    pub fn with_max_reported_requests(mut self, max: u32) -> Self {
        self.maximum_number_of_request_to_return_in_verification_failure = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.http_request, &self.expectation_id) {
            (None, None) => {
                return Err(ClientError::InvalidArgument(
                    "verification requires a non null request definition or expectation id"
                        .to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(ClientError::InvalidArgument(
                    "verification accepts either a request definition or an expectation id, not both"
                        .to_string(),
                ))
            }
            _ => {}
        }
        if self.times.is_none() {
            return Err(ClientError::InvalidArgument(
                "verification requires a non null verification times".to_string(),
            ));
        }
        Ok(())
    }
}

/// Assert that requests (or expectations) were hit in the given order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSequence {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_requests: Vec<RequestDefinition>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expectation_ids: Vec<ExpectationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_number_of_request_to_return_in_verification_failure: Option<u32>,
}

impl VerificationSequence {
    pub fn requests<I, R>(requests: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RequestDefinition>,
    {
        Self {
            http_requests: requests.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn expectations<I, E>(ids: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<ExpectationId>,
    {
        Self {
            expectation_ids: ids.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_reported_requests(mut self, max: u32) -> Self {
        self.maximum_number_of_request_to_return_in_verification_failure = Some(max);
        self
    }

    pub fn validate(&self) -> Result<()> {
        match (self.http_requests.is_empty(), self.expectation_ids.is_empty()) {
            (true, true) => Err(ClientError::InvalidArgument(
                "verify sequence requires a non empty list of request definitions or expectation ids"
                    .to_string(),
            )),
            (false, false) => Err(ClientError::InvalidArgument(
                "verify sequence accepts either request definitions or expectation ids, not both"
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}
