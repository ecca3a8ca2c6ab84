//! Expectation registration.

use super::MockServerClient;
use crate::error::{ClientError, Result};
use crate::model::{
    Expectation, HttpError, HttpForward, HttpResponse, OpenApiExpectation, RequestDefinition,
    TimeToLive, Times,
};
use crate::path::Operation;
use crate::transport::Body;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The server answers with either a single expectation or an array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    Many(Vec<Expectation>),
    One(Box<Expectation>),
}

impl MockServerClient {
    /// Create or update expectations; returns them as stored by the server.
    pub async fn upsert(&self, expectations: &[Expectation]) -> Result<Vec<Expectation>> {
        let payload = match request_payload(expectations)? {
            Some(payload) => payload,
            None => return Ok(Vec::new()),
        };
        self.submit(Operation::Expectation, payload).await
    }

    /// Create expectations from OpenAPI specifications.
    pub async fn upsert_openapi(
        &self,
        expectations: &[OpenApiExpectation],
    ) -> Result<Vec<Expectation>> {
        let payload = match request_payload(expectations)? {
            Some(payload) => payload,
            None => return Ok(Vec::new()),
        };
        self.submit(Operation::OpenApi, payload).await
    }

    /// Start an expectation for `matcher`; finish it with
    /// [`respond`](ExpectationBuilder::respond),
    /// [`forward`](ExpectationBuilder::forward) or
    /// [`error`](ExpectationBuilder::error).
    pub fn when(&self, matcher: impl Into<RequestDefinition>) -> ExpectationBuilder {
        ExpectationBuilder {
            client: self.clone(),
            expectation: Expectation::new(matcher),
        }
    }

    async fn submit(&self, operation: Operation, payload: String) -> Result<Vec<Expectation>> {
        let response = self
            .call(self.request(operation).with_body(Body::json(payload.clone())))
            .await?;
        if response.status != 201 {
            return Err(ClientError::Client(format!(
                "error:{} while submitted expectation(s):{}",
                response.body, payload
            )));
        }
        parse_expectations(&response.body)
    }
}

/// A lone definition is sent as an object, several as an array.
fn request_payload<T: Serialize>(definitions: &[T]) -> Result<Option<String>> {
    match definitions {
        [] => Ok(None),
        [single] => Ok(Some(serde_json::to_string(single)?)),
        many => Ok(Some(serde_json::to_string(many)?)),
    }
}

fn parse_expectations(body: &str) -> Result<Vec<Expectation>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(match serde_json::from_str::<OneOrMany>(body)? {
        OneOrMany::Many(expectations) => expectations,
        OneOrMany::One(expectation) => vec![*expectation],
    })
}

/// An expectation under construction, bound to the client that will register it.
#[derive(Debug)]
pub struct ExpectationBuilder {
    client: MockServerClient,
    expectation: Expectation,
}

impl ExpectationBuilder {
    #[must_use]
    pub fn times(mut self, times: Times) -> Self {
        self.expectation.times = Some(times);
        self
    }

    #[must_use]
    pub fn time_to_live(mut self, time_to_live: TimeToLive) -> Self {
        self.expectation.time_to_live = Some(time_to_live);
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.expectation.priority = Some(priority);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.expectation.id = Some(id.into());
        self
    }

    pub async fn respond(self, response: HttpResponse) -> Result<Vec<Expectation>> {
        let Self { client, expectation } = self;
        register(&client, expectation.respond(response)).await
    }

    pub async fn forward(self, forward: HttpForward) -> Result<Vec<Expectation>> {
        let Self { client, expectation } = self;
        register(&client, expectation.forward(forward)).await
    }

    pub async fn error(self, error: HttpError) -> Result<Vec<Expectation>> {
        let Self { client, expectation } = self;
        register(&client, expectation.error(error)).await
    }
}

async fn register(client: &MockServerClient, expectation: Expectation) -> Result<Vec<Expectation>> {
    let port = client.port().await?;
    client.events().bus_for(port);
    debug!("Registering expectation on port {}", port);
    client.upsert(std::slice::from_ref(&expectation)).await
}
