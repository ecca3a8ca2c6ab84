//! reqwest-backed transport.

use super::{ControlRequest, ControlResponse, RemoteAddress, Transport};
use crate::config::{ClientConfig, ControlPlaneTlsConfig, ProxyConfig};
use crate::error::TransportError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;

/// HTTP(S) transport; the underlying connection pool is built on first use.
pub struct HttpTransport {
    config: ClientConfig,
    client: Mutex<Option<reqwest::Client>>,
    shut_down: AtomicBool,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .field("shut_down", &self.shut_down.load(Ordering::SeqCst))
            .finish()
    }
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    fn client(&self) -> Result<reqwest::Client, TransportError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(TransportError::ShutDown);
        }
        let mut client = self.client.lock();
        if let Some(existing) = client.as_ref() {
            return Ok(existing.clone());
        }
        let built = build_client(&self.config)?;
        debug!("Built control-plane HTTP client");
        *client = Some(built.clone());
        Ok(built)
    }
}

fn build_client(config: &ClientConfig) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder();

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(build_proxy(proxy)?);
    }

    if let Some(tls) = &config.control_plane_tls {
        if tls.mutual_auth_required {
            builder = with_mutual_tls(builder, tls)?;
        }
    }

    builder
        .build()
        .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {}", e)))
}

fn build_proxy(proxy: &ProxyConfig) -> Result<reqwest::Proxy, TransportError> {
    let mut built = reqwest::Proxy::all(&proxy.url)
        .map_err(|e| TransportError::Other(format!("invalid proxy url {}: {}", proxy.url, e)))?;
    if let Some(username) = &proxy.username {
        built = built.basic_auth(username, proxy.password.as_deref().unwrap_or(""));
    }
    Ok(built)
}

fn with_mutual_tls(
    builder: reqwest::ClientBuilder,
    tls: &ControlPlaneTlsConfig,
) -> Result<reqwest::ClientBuilder, TransportError> {
    tls.validate()
        .map_err(|e| TransportError::Other(e.to_string()))?;

    let read = |path: &str| {
        std::fs::read(path).map_err(|e| TransportError::Other(format!("failed to read {}: {}", path, e)))
    };

    // Identity::from_pem wants the certificate chain and the key in one buffer
    let mut identity_pem = read(&tls.certificate_path)?;
    identity_pem.push(b'\n');
    identity_pem.extend(read(&tls.private_key_path)?);
    let identity = reqwest::Identity::from_pem(&identity_pem)
        .map_err(|e| TransportError::Other(format!("invalid client identity: {}", e)))?;

    let ca = reqwest::Certificate::from_pem(&read(&tls.ca_chain_path)?)
        .map_err(|e| TransportError::Other(format!("invalid CA chain: {}", e)))?;

    Ok(builder.identity(identity).add_root_certificate(ca))
}

fn map_error(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout.as_millis() as u64)
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        address: &RemoteAddress,
        request: &ControlRequest,
        timeout: Duration,
    ) -> Result<ControlResponse, TransportError> {
        let client = self.client()?;
        let scheme = if request.is_secure() { "https" } else { "http" };
        let url = format!("{}://{}{}", scheme, address, request.path);

        let mut builder = client.request(request.method.clone(), &url).timeout(timeout);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.content.clone());
        }

        let response = builder.send().await.map_err(|e| map_error(e, timeout))?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(|e| map_error(e, timeout))?;

        Ok(ControlResponse {
            status,
            headers,
            body,
        })
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.client.lock().take();
        debug!("Control-plane HTTP client shut down");
    }

    fn is_shutting_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
