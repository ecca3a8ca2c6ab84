//! Request dispatch and response contract enforcement.
//!
//! Every control-plane call goes through [`Dispatcher::dispatch`], which
//! decorates the outbound request (content type, TLS flag, defaults, bearer
//! token, `Host`), sends it and maps the response onto the error taxonomy.

use crate::error::{ClientError, Result, TransportError};
use crate::transport::{
    Body, ControlRequest, ControlResponse, RemoteAddress, Transport, AUTHORIZATION, CONTENT_TYPE,
    HOST,
};
use crate::version::{matches_major_minor, VERSION_HEADER};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Transport messages that mean the underlying machinery was torn down.
const SHUTDOWN_MARKERS: &[&str] = &[
    "executor not accepting a task",
    "loop shut down",
    "runtime is shutting down",
    "being shutdown",
];

/// Supplies the bearer token for control-plane authorisation.
pub trait TokenSupplier: Send + Sync {
    fn token(&self) -> String;
}

impl<F> TokenSupplier for F
where
    F: Fn() -> String + Send + Sync,
{
    fn token(&self) -> String {
        self()
    }
}

/// Defaults merged into every request that does not set them itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestTemplate {
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    pub secure: Option<bool>,
}

impl RequestTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Fill the gaps of `request`; values already on the request win.
    pub fn apply_to(&self, request: &mut ControlRequest) {
        for (name, value) in &self.headers {
            if !request.contains_header(name) {
                request.headers.push((name.clone(), value.clone()));
            }
        }
        for (name, value) in &self.query {
            if request.query_value(name).is_none() {
                request.query.push((name.clone(), value.clone()));
            }
        }
        if request.body.is_none() {
            request.body = self.body.clone();
        }
        if request.secure.is_none() {
            request.secure = self.secure;
        }
    }
}

/// Sends control-plane requests for one client session.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    secure: Option<bool>,
    request_override: Option<RequestTemplate>,
    token_supplier: Option<Arc<dyn TokenSupplier>>,
    client_version: String,
    socket_timeout: Duration,
    stopped: watch::Receiver<bool>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("secure", &self.secure)
            .field("request_override", &self.request_override)
            .field("token_supplier", &self.token_supplier.is_some())
            .field("client_version", &self.client_version)
            .field("socket_timeout", &self.socket_timeout)
            .finish()
    }
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        client_version: impl Into<String>,
        socket_timeout: Duration,
        stopped: watch::Receiver<bool>,
    ) -> Self {
        Self {
            transport,
            secure: None,
            request_override: None,
            token_supplier: None,
            client_version: client_version.into(),
            socket_timeout,
            stopped,
        }
    }

    #[must_use]
    pub fn with_secure(mut self, secure: Option<bool>) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_request_override(mut self, template: Option<RequestTemplate>) -> Self {
        self.request_override = template;
        self
    }

    #[must_use]
    pub fn with_token_supplier(mut self, supplier: Option<Arc<dyn TokenSupplier>>) -> Self {
        self.token_supplier = supplier;
        self
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_secure(&self) -> bool {
        self.secure.unwrap_or(false)
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Send `request` and enforce the response contract.
    ///
    /// With `ignore_transport_errors`, a connection failure yields `Ok(None)`
    /// instead of an error.
    pub async fn dispatch(
        &self,
        address: &RemoteAddress,
        mut request: ControlRequest,
        ignore_transport_errors: bool,
    ) -> Result<Option<ControlResponse>> {
        if self.is_stopped() {
            return Err(ClientError::ClientClosed);
        }

        self.prepare(address, &mut request)?;
        trace!("{} {} to {}", request.method, request.path, address);

        let response = match self
            .transport
            .send(address, &request, self.socket_timeout)
            .await
        {
            Ok(response) => response,
            Err(TransportError::Connection(message)) if ignore_transport_errors => {
                debug!("Ignoring connection failure to {}: {}", address, message);
                return Ok(None);
            }
            Err(error) => return Err(normalize_transport_error(error)),
        };

        self.check_contract(response).map(Some)
    }

    fn prepare(&self, address: &RemoteAddress, request: &mut ControlRequest) -> Result<()> {
        if !request.contains_header(CONTENT_TYPE) {
            let content_type = request
                .body
                .as_ref()
                .and_then(|body| body.content_type.clone())
                .filter(|ct| !ct.trim().is_empty());
            if let Some(content_type) = content_type {
                request.headers.push((CONTENT_TYPE.to_string(), content_type));
            }
        }

        if let Some(secure) = self.secure {
            request.secure = Some(secure);
        }

        if let Some(template) = &self.request_override {
            template.apply_to(request);
        }

        if let Some(supplier) = &self.token_supplier {
            let token = supplier.token();
            if token.trim().is_empty() {
                return Err(ClientError::InvalidCredential(token));
            }
            request.set_header(AUTHORIZATION, format!("Bearer {}", token));
        }

        request.set_header(HOST, address.to_string());
        Ok(())
    }

    fn check_contract(&self, response: ControlResponse) -> Result<ControlResponse> {
        match response.status {
            400 => Err(ClientError::Validation(response.body)),
            401 => Err(ClientError::Authentication(response.body)),
            _ => {
                let server_version = response.header(VERSION_HEADER);
                if !matches_major_minor(&self.client_version, server_version) {
                    return Err(ClientError::VersionMismatch {
                        client: self.client_version.clone(),
                        server: server_version.unwrap_or_default().to_string(),
                    });
                }
                Ok(response)
            }
        }
    }
}

fn normalize_transport_error(error: TransportError) -> ClientError {
    match error {
        TransportError::ShutDown => ClientError::ClientClosed,
        TransportError::Other(message)
            if SHUTDOWN_MARKERS.iter().any(|marker| message.contains(marker)) =>
        {
            ClientError::ClientClosed
        }
        other => ClientError::Transport(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use crate::transport::APPLICATION_JSON_UTF_8;

    fn address() -> RemoteAddress {
        RemoteAddress {
            host: "localhost".to_string(),
            port: 1080,
        }
    }

    fn dispatcher(transport: &Arc<ScriptedTransport>) -> (Dispatcher, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        let dispatcher = Dispatcher::new(
            transport.clone(),
            "5.4.0",
            Duration::from_secs(1),
            rx,
        );
        (dispatcher, tx)
    }

    #[tokio::test]
    async fn test_attaches_content_type_and_host() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, _tx) = dispatcher(&transport);

        let request = ControlRequest::put("/mockserver/clear").with_body(Body::json("{}"));
        dispatcher.dispatch(&address(), request, false).await.unwrap();

        let sent = transport.last().unwrap();
        assert_eq!(sent.header(CONTENT_TYPE), Some(APPLICATION_JSON_UTF_8));
        assert_eq!(sent.header(HOST), Some("localhost:1080"));
        assert_eq!(sent.headers.last().unwrap().0, HOST);
    }

    #[tokio::test]
    async fn test_explicit_content_type_is_kept() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, _tx) = dispatcher(&transport);

        let request = ControlRequest::put("/mockserver/bind")
            .with_header("content-type", "text/plain")
            .with_body(Body::json("{}"));
        dispatcher.dispatch(&address(), request, false).await.unwrap();

        let sent = transport.last().unwrap();
        assert_eq!(sent.header(CONTENT_TYPE), Some("text/plain"));
        assert_eq!(
            sent.headers
                .iter()
                .filter(|(n, _)| n.eq_ignore_ascii_case(CONTENT_TYPE))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_secure_override_forces_tls() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, _tx) = dispatcher(&transport);
        let dispatcher = dispatcher.with_secure(Some(true));

        dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/status"), false)
            .await
            .unwrap();
        assert!(transport.last().unwrap().is_secure());
    }

    #[tokio::test]
    async fn test_request_override_fills_gaps_only() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, _tx) = dispatcher(&transport);
        let dispatcher = dispatcher.with_request_override(Some(
            RequestTemplate::new()
                .with_header("X-Tenant", "blue")
                .with_header("Content-Type", "text/plain")
                .with_query("type", "log")
                .with_secure(true),
        ));

        let request = ControlRequest::put("/mockserver/clear")
            .with_query("type", "expectations")
            .with_body(Body::json("{}"));
        dispatcher.dispatch(&address(), request, false).await.unwrap();

        let sent = transport.last().unwrap();
        assert_eq!(sent.header("x-tenant"), Some("blue"));
        assert_eq!(sent.header(CONTENT_TYPE), Some(APPLICATION_JSON_UTF_8));
        assert_eq!(sent.query, vec![("type".to_string(), "expectations".to_string())]);
        assert!(sent.is_secure());
    }

    #[tokio::test]
    async fn test_bearer_token_attached() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, _tx) = dispatcher(&transport);
        let supplier: Arc<dyn TokenSupplier> = Arc::new(|| "abc.def.ghi".to_string());
        let dispatcher = dispatcher.with_token_supplier(Some(supplier));

        dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/reset"), false)
            .await
            .unwrap();
        assert_eq!(
            transport.last().unwrap().header(AUTHORIZATION),
            Some("Bearer abc.def.ghi")
        );
    }

    #[tokio::test]
    async fn test_blank_token_fails_before_sending() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, _tx) = dispatcher(&transport);
        let supplier: Arc<dyn TokenSupplier> = Arc::new(|| "  ".to_string());
        let dispatcher = dispatcher.with_token_supplier(Some(supplier));

        let result = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/reset"), false)
            .await;
        assert!(matches!(result, Err(ClientError::InvalidCredential(_))));
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport
            .push(Ok(ControlResponse::new(400).with_body("incorrect request format")))
            .push(Ok(ControlResponse::new(401).with_body("bad jwt")));
        let (dispatcher, _tx) = dispatcher(&transport);

        let first = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/expectation"), false)
            .await;
        match first {
            Err(ClientError::Validation(message)) => assert_eq!(message, "incorrect request format"),
            other => panic!("expected validation failure, got {:?}", other),
        }

        let second = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/expectation"), false)
            .await;
        match second {
            Err(ClientError::Authentication(message)) => assert_eq!(message, "bad jwt"),
            other => panic!("expected authentication failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_version_mismatch_names_both_versions() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport.push(Ok(ControlResponse::new(200).with_header("version", "5.3.0")));
        let (dispatcher, _tx) = dispatcher(&transport);

        let result = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/status"), false)
            .await;
        match result {
            Err(ClientError::VersionMismatch { client, server }) => {
                assert_eq!(client, "5.4.0");
                assert_eq!(server, "5.3.0");
            }
            other => panic!("expected version mismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_matching_version_passes() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport.push(Ok(ControlResponse::new(201).with_header("Version", "5.4.3")));
        let (dispatcher, _tx) = dispatcher(&transport);

        let response = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/expectation"), false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.status, 201);
    }

    #[tokio::test]
    async fn test_connection_failure_ignored_on_request() {
        let transport = Arc::new(ScriptedTransport::with_fallback(|_| {
            Err(TransportError::Connection("refused".to_string()))
        }));
        let (dispatcher, _tx) = dispatcher(&transport);

        let ignored = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/status"), true)
            .await
            .unwrap();
        assert!(ignored.is_none());

        let propagated = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/status"), false)
            .await;
        assert!(matches!(
            propagated,
            Err(ClientError::Transport(TransportError::Connection(_)))
        ));
    }

    #[tokio::test]
    async fn test_timeouts_are_not_ignored() {
        let transport = Arc::new(ScriptedTransport::with_fallback(|_| {
            Err(TransportError::Timeout(1000))
        }));
        let (dispatcher, _tx) = dispatcher(&transport);

        let result = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/status"), true)
            .await;
        assert!(matches!(
            result,
            Err(ClientError::Transport(TransportError::Timeout(1000)))
        ));
    }

    #[tokio::test]
    async fn test_shutdown_conditions_normalize_to_client_closed() {
        let transport = Arc::new(ScriptedTransport::ok());
        transport
            .push(Err(TransportError::ShutDown))
            .push(Err(TransportError::Other(
                "event executor not accepting a task".to_string(),
            )))
            .push(Err(TransportError::Other("event loop shut down".to_string())));
        let (dispatcher, _tx) = dispatcher(&transport);

        for _ in 0..3 {
            let result = dispatcher
                .dispatch(&address(), ControlRequest::put("/mockserver/status"), false)
                .await;
            assert!(matches!(result, Err(ClientError::ClientClosed)));
        }
    }

    #[tokio::test]
    async fn test_stopped_session_fails_fast() {
        let transport = Arc::new(ScriptedTransport::ok());
        let (dispatcher, tx) = dispatcher(&transport);
        tx.send_replace(true);

        let result = dispatcher
            .dispatch(&address(), ControlRequest::put("/mockserver/status"), true)
            .await;
        assert!(matches!(result, Err(ClientError::ClientClosed)));
        assert!(transport.sent().is_empty());
    }
}
