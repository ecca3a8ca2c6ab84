//! Verification of recorded traffic.

use super::{json_or_empty, MockServerClient};
use crate::error::{ClientError, Result};
use crate::model::{
    ExpectationId, RequestDefinition, Verification, VerificationSequence, VerificationTimes,
};
use crate::path::Operation;
use crate::transport::ControlResponse;

impl MockServerClient {
    /// Check a single verification against the recorded requests.
    ///
    /// An empty reply means it held; anything else is returned as
    /// [`ClientError::Assertion`] carrying the server's explanation.
    pub async fn verify(&self, verification: Verification) -> Result<()> {
        verification.validate()?;
        let body = json_or_empty(Some(&verification))?;
        let result = self
            .call(self.request(Operation::Verify).with_body(body))
            .await;
        assertion_outcome(result)
    }

    /// Check that requests (or expectations) were hit in order.
    pub async fn verify_sequence(&self, sequence: VerificationSequence) -> Result<()> {
        sequence.validate()?;
        let body = json_or_empty(Some(&sequence))?;
        let result = self
            .call(self.request(Operation::VerifySequence).with_body(body))
            .await;
        assertion_outcome(result)
    }

    pub async fn verify_request(
        &self,
        matcher: impl Into<RequestDefinition>,
        times: VerificationTimes,
    ) -> Result<()> {
        self.verify(Verification::request(matcher).with_times(times))
            .await
    }

    pub async fn verify_expectation(
        &self,
        id: impl Into<ExpectationId>,
        times: VerificationTimes,
    ) -> Result<()> {
        self.verify(Verification::expectation(id).with_times(times))
            .await
    }

    pub async fn verify_requests_in_order<I, R>(&self, matchers: I) -> Result<()>
    where
        I: IntoIterator<Item = R>,
        R: Into<RequestDefinition>,
    {
        self.verify_sequence(VerificationSequence::requests(matchers))
            .await
    }

    pub async fn verify_expectations_in_order<I, E>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = E>,
        E: Into<ExpectationId>,
    {
        self.verify_sequence(VerificationSequence::expectations(ids))
            .await
    }

    /// No request of any kind was received.
    pub async fn verify_zero_interactions(&self) -> Result<()> {
        self.verify(Verification::zero_interactions()).await
    }
}

/// Authentication failures pass through; everything else becomes an assertion.
fn assertion_outcome(result: Result<ControlResponse>) -> Result<()> {
    match result {
        Ok(response) if response.body.is_empty() => Ok(()),
        Ok(response) => Err(ClientError::Assertion(response.body)),
        Err(e @ ClientError::Authentication(_)) => Err(e),
        Err(e) => Err(ClientError::Assertion(e.to_string())),
    }
}
