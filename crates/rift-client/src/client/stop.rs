//! Idempotent asynchronous shutdown.

use super::MockServerClient;
use crate::error::ClientError;
use crate::events::EventType;
use crate::path::Operation;
use crate::poller::{STOP_CONFIRM_ATTEMPTS, STOP_CONFIRM_INTERVAL};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::IntoFuture;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn, Instrument};

/// How long [`MockServerClient::stop`] waits for the teardown.
const STOP_WAIT: Duration = Duration::from_secs(10);

/// Completion of a stop; every caller of `stop_async` gets one for the same
/// teardown.
///
/// Await it (or call [`wait`](Self::wait)) to get the stopped client back.
#[derive(Debug, Clone)]
pub struct StopHandle {
    client: MockServerClient,
    completed: watch::Receiver<bool>,
}

impl StopHandle {
    pub fn is_done(&self) -> bool {
        *self.completed.borrow()
    }

    pub async fn wait(mut self) -> MockServerClient {
        // The sender lives in the client we hold, so the channel cannot close.
        let _ = self.completed.wait_for(|done| *done).await;
        self.client
    }
}

impl IntoFuture for StopHandle {
    type Output = MockServerClient;
    type IntoFuture = BoxFuture<'static, MockServerClient>;

    fn into_future(self) -> Self::IntoFuture {
        self.wait().boxed()
    }
}

impl MockServerClient {
    /// Start stopping the server and release the transport.
    ///
    /// Only the first call does any work; later calls return a handle to the
    /// same completion. Must be called within a tokio runtime.
    pub fn stop_async(&self) -> StopHandle {
        let session = &self.inner.session;
        let first = session
            .stop_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();

        if first {
            let announced = match self.known_port() {
                Some(port) => {
                    self.announce_stop(port);
                    true
                }
                None => false,
            };
            let client = self.clone();
            tokio::spawn(
                async move {
                    client.tear_down(announced).await;
                    client.inner.session.completed.send_replace(true);
                    info!("Client for {} stopped", client.host());
                }
                .in_current_span(),
            );
        }

        StopHandle {
            client: self.clone(),
            completed: session.completed.subscribe(),
        }
    }

    /// Stop and wait up to ten seconds for the teardown. Never fails.
    pub async fn stop(&self) {
        if tokio::time::timeout(STOP_WAIT, self.stop_async())
            .await
            .is_err()
        {
            debug!(
                "Stop of {} did not complete within {}s",
                self.host(),
                STOP_WAIT.as_secs()
            );
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.session.completed.borrow()
    }

    fn announce_stop(&self, port: u16) {
        self.inner.events.publish(port, EventType::Stop);
        self.inner.events.remove(port);
    }

    async fn tear_down(&self, announced: bool) {
        if !announced {
            match self.port().await {
                Ok(port) => self.announce_stop(port),
                Err(e) => warn!("Failed to resolve port while stopping: {}", e),
            }
        }

        match self.send(self.request(Operation::Stop), false).await {
            Ok(_) => {}
            Err(ClientError::ClientClosed) => trace!("Stop request found the client closed"),
            Err(e) => warn!("Failed to send stop request to {}: {}", self.host(), e),
        }

        match self
            .has_stopped_with(STOP_CONFIRM_ATTEMPTS, STOP_CONFIRM_INTERVAL)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!("Server at {} still answering after stop", self.host()),
            Err(e) => warn!("Failed to confirm stop of {}: {}", self.host(), e),
        }

        let transport = self.transport();
        if !transport.is_shutting_down() {
            transport.shutdown();
        }
    }
}
