//! Lifecycle queries, port binding and reset.

use super::{json_or_empty, MockServerClient};
use crate::error::Result;
use crate::events::EventType;
use crate::model::PortBinding;
use crate::path::Operation;
use crate::poller::{DEFAULT_ATTEMPTS, DEFAULT_INTERVAL};
use std::time::Duration;
use tracing::{debug, trace};

impl MockServerClient {
    /// True once the server answers a status probe with 200.
    ///
    /// Connection failures count as "not yet"; any other failure, such as a
    /// rejected token or a version mismatch, is returned.
    pub async fn is_running(&self) -> Result<bool> {
        self.is_running_with(DEFAULT_ATTEMPTS, DEFAULT_INTERVAL).await
    }

    pub async fn is_running_with(&self, attempts: u32, interval: Duration) -> Result<bool> {
        let client = self;
        self.poller(attempts, interval)
            .poll(move || async move { client.status_ok(true).await })
            .await
    }

    /// Like [`is_running`](Self::is_running) but probes without suppressing
    /// transport errors.
    pub async fn has_started(&self) -> Result<bool> {
        self.has_started_with(DEFAULT_ATTEMPTS, DEFAULT_INTERVAL).await
    }

    pub async fn has_started_with(&self, attempts: u32, interval: Duration) -> Result<bool> {
        let client = self;
        self.poller(attempts, interval)
            .poll(move || async move { client.status_ok(false).await })
            .await
    }

    /// True once the server is unreachable or answers a status probe with
    /// something other than 200.
    ///
    /// Returns false if the server still answers after every attempt.
    pub async fn has_stopped(&self) -> Result<bool> {
        self.has_stopped_with(DEFAULT_ATTEMPTS, DEFAULT_INTERVAL).await
    }

    pub async fn has_stopped_with(&self, attempts: u32, interval: Duration) -> Result<bool> {
        let client = self;
        self.poller(attempts, interval)
            .poll(move || async move { client.status_ok(true).await.map(|ok| !ok) })
            .await
    }

    async fn status_ok(&self, ignore_transport_errors: bool) -> Result<bool> {
        match self
            .send(self.request(Operation::Status), ignore_transport_errors)
            .await
        {
            Ok(Some(response)) => Ok(response.status == 200),
            Ok(None) => Ok(false),
            Err(e) if e.is_unreachable() => {
                trace!("Status probe failed: {}", e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Ask the server to listen on additional `ports`; returns the bound ports.
    pub async fn bind(&self, ports: &[u16]) -> Result<Vec<u16>> {
        let binding = PortBinding {
            ports: ports.to_vec(),
        };
        let response = self
            .call(
                self.request(Operation::Bind)
                    .with_body(json_or_empty(Some(&binding))?),
            )
            .await?;
        if response.body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let bound: PortBinding = serde_json::from_str(&response.body)?;
        debug!("Bound ports {:?}", bound.ports);
        Ok(bound.ports)
    }

    /// Clear all expectations and recorded traffic.
    ///
    /// Local RESET listeners run before the request is sent.
    pub async fn reset(&self) -> Result<()> {
        let port = self.port().await?;
        if let Some(bus) = self.inner.events.get(port) {
            bus.publish(EventType::Reset);
        }
        self.call(self.request(Operation::Reset)).await?;
        Ok(())
    }
}
