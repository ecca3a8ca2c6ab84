//! The control-plane client.
//!
//! [`MockServerClient`] is cheap to clone; clones share one session, one
//! transport and one stop handle.

mod expectations;
mod lifecycle;
mod retrieve;
mod stop;
mod verify;

#[cfg(test)]
mod tests;

pub use expectations::ExpectationBuilder;
pub use stop::StopHandle;

use crate::config::{ClientConfig, ProxyConfig};
use crate::dispatch::{Dispatcher, RequestTemplate, TokenSupplier};
use crate::error::{ClientError, Result};
use crate::events::EventBusRegistry;
use crate::path::{control_path, Operation};
use crate::poller::{LifecyclePoller, Sleep, TokioSleep};
use crate::transport::{Body, ControlRequest, ControlResponse, HttpTransport, RemoteAddress, Transport};
use crate::version::PROTOCOL_VERSION;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;

/// Where the control-plane port comes from.
enum PortSource {
    Fixed(u16),
    /// Resolved once from a future (e.g. a server still binding its port)
    Pending {
        future: Shared<BoxFuture<'static, u16>>,
        resolved: OnceLock<u16>,
    },
}

/// Stop bookkeeping shared by every clone of a client.
struct Session {
    stop_started: AtomicBool,
    completed: watch::Sender<bool>,
}

struct Inner {
    host: String,
    port: PortSource,
    context_path: String,
    config: ClientConfig,
    dispatcher: Dispatcher,
    events: EventBusRegistry,
    sleeper: Arc<dyn Sleep>,
    session: Session,
}

/// Client for a remote mock server's control plane.
#[derive(Clone)]
pub struct MockServerClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for MockServerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockServerClient")
            .field("host", &self.inner.host)
            .field("port", &self.known_port())
            .field("context_path", &self.inner.context_path)
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

impl MockServerClient {
    /// Client for `host:port` with default settings.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::builder().host(host).port(port).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    pub fn context_path(&self) -> &str {
        &self.inner.context_path
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn is_secure(&self) -> bool {
        self.inner.dispatcher.is_secure()
    }

    /// Registry holding the local event bus of this client's port.
    pub fn events(&self) -> &EventBusRegistry {
        &self.inner.events
    }

    /// The control-plane port, waiting for a pending port if necessary.
    ///
    /// A pending port is awaited at most `max_future_timeout_ms` and cached
    /// once resolved.
    pub async fn port(&self) -> Result<u16> {
        match &self.inner.port {
            PortSource::Fixed(port) => Ok(*port),
            PortSource::Pending { future, resolved } => {
                if let Some(port) = resolved.get() {
                    return Ok(*port);
                }
                let timeout = self.inner.config.future_timeout();
                let port = tokio::time::timeout(timeout, future.clone())
                    .await
                    .map_err(|_| {
                        ClientError::PortResolution(format!(
                            "port not available after {}ms",
                            timeout.as_millis()
                        ))
                    })?;
                Ok(*resolved.get_or_init(|| port))
            }
        }
    }

    /// The port if it is already known, without waiting.
    fn known_port(&self) -> Option<u16> {
        match &self.inner.port {
            PortSource::Fixed(port) => Some(*port),
            PortSource::Pending { resolved, .. } => resolved.get().copied(),
        }
    }

    async fn address(&self) -> Result<RemoteAddress> {
        Ok(RemoteAddress {
            host: self.inner.host.clone(),
            port: self.port().await?,
        })
    }

    fn path(&self, operation: Operation) -> String {
        control_path(&self.inner.context_path, operation)
    }

    fn request(&self, operation: Operation) -> ControlRequest {
        ControlRequest::put(self.path(operation))
    }

    fn poller(&self, attempts: u32, interval: Duration) -> LifecyclePoller {
        LifecyclePoller::new(attempts, interval, Arc::clone(&self.inner.sleeper))
    }

    fn transport(&self) -> &Arc<dyn Transport> {
        self.inner.dispatcher.transport()
    }

    async fn send(
        &self,
        request: ControlRequest,
        ignore_transport_errors: bool,
    ) -> Result<Option<ControlResponse>> {
        let address = self.address().await?;
        self.inner
            .dispatcher
            .dispatch(&address, request, ignore_transport_errors)
            .await
    }

    /// Send with transport errors propagated.
    async fn call(&self, request: ControlRequest) -> Result<ControlResponse> {
        self.send(request, false)
            .await?
            .ok_or_else(|| ClientError::Client("no response received".to_string()))
    }
}

/// Body carrying `payload` as JSON, or an empty body when there is nothing to send.
fn json_or_empty<T: serde::Serialize>(payload: Option<&T>) -> Result<Body> {
    match payload {
        Some(payload) => Ok(Body::json(serde_json::to_string(payload)?)),
        None => Ok(Body::text("")),
    }
}

/// Builds a [`MockServerClient`].
#[derive(Default)]
pub struct ClientBuilder {
    host: Option<String>,
    port: Option<PortSource>,
    context_path: String,
    config: ClientConfig,
    secure: Option<bool>,
    request_override: Option<RequestTemplate>,
    token_supplier: Option<Arc<dyn TokenSupplier>>,
    transport: Option<Arc<dyn Transport>>,
    sleeper: Option<Arc<dyn Sleep>>,
    events: Option<EventBusRegistry>,
    client_version: Option<String>,
}

impl ClientBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(PortSource::Fixed(port));
        self
    }

    /// Use a port that becomes known later.
    #[must_use]
    pub fn port_future<F>(mut self, port: F) -> Self
    where
        F: Future<Output = u16> + Send + 'static,
    {
        self.port = Some(PortSource::Pending {
            future: port.boxed().shared(),
            resolved: OnceLock::new(),
        });
        self
    }

    #[must_use]
    pub fn context_path(mut self, context_path: impl Into<String>) -> Self {
        self.context_path = context_path.into();
        self
    }

    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Force every control-plane request to use (or not use) TLS.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Defaults merged into every request.
    #[must_use]
    pub fn request_override(mut self, template: RequestTemplate) -> Self {
        self.request_override = Some(template);
        self
    }

    #[must_use]
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self
    }

    /// Send a fixed bearer token with every request.
    #[must_use]
    pub fn control_plane_jwt(self, jwt: impl Into<String>) -> Self {
        let jwt = jwt.into();
        self.control_plane_jwt_supplier(move || jwt.clone())
    }

    /// Ask `supplier` for a bearer token on every request.
    #[must_use]
    pub fn control_plane_jwt_supplier<S>(mut self, supplier: S) -> Self
    where
        S: TokenSupplier + 'static,
    {
        self.token_supplier = Some(Arc::new(supplier));
        self
    }

    /// Replace the default reqwest transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Share local event buses with other clients.
    #[must_use]
    pub fn event_registry(mut self, events: EventBusRegistry) -> Self {
        self.events = Some(events);
        self
    }

    /// Protocol version announced by this client; defaults to [`PROTOCOL_VERSION`].
    #[must_use]
    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = Some(version.into());
        self
    }

    pub fn build(self) -> Result<MockServerClient> {
        let host = self
            .host
            .filter(|host| !host.trim().is_empty())
            .ok_or_else(|| ClientError::InvalidArgument("host can not be null or empty".to_string()))?;
        let port = self
            .port
            .ok_or_else(|| ClientError::InvalidArgument("port must be set".to_string()))?;
        self.config
            .validate()
            .map_err(|e| ClientError::InvalidArgument(e.to_string()))?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(self.config.clone())),
        };
        let (completed, stopped) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            transport,
            self.client_version
                .unwrap_or_else(|| PROTOCOL_VERSION.to_string()),
            self.config.socket_timeout(),
            stopped,
        )
        .with_secure(self.secure)
        .with_request_override(self.request_override)
        .with_token_supplier(self.token_supplier);

        Ok(MockServerClient {
            inner: Arc::new(Inner {
                host,
                port,
                context_path: self.context_path,
                config: self.config,
                dispatcher,
                events: self.events.unwrap_or_default(),
                sleeper: self.sleeper.unwrap_or_else(|| Arc::new(TokioSleep)),
                session: Session {
                    stop_started: AtomicBool::new(false),
                    completed,
                },
            }),
        })
    }
}
