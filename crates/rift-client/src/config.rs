//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration shared by every request a client makes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Per-call transport timeout
    #[serde(default = "default_max_socket_timeout_ms")]
    pub max_socket_timeout_ms: u64,
    /// Upper bound for resolving a port that is not known yet
    #[serde(default = "default_max_future_timeout_ms")]
    pub max_future_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_tls: Option<ControlPlaneTlsConfig>,
    /// Forward proxy for control-plane traffic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxyConfig>,
}

fn default_max_socket_timeout_ms() -> u64 {
    20_000
}

fn default_max_future_timeout_ms() -> u64 {
    90_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_socket_timeout_ms: default_max_socket_timeout_ms(),
            max_future_timeout_ms: default_max_future_timeout_ms(),
            control_plane_tls: None,
            proxy: None,
        }
    }
}

/// Mutual TLS material for the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlPlaneTlsConfig {
    #[serde(default)]
    pub mutual_auth_required: bool,
    /// PEM private key presented to the server
    #[serde(default)]
    pub private_key_path: String,
    /// PEM certificate chain presented to the server
    #[serde(default)]
    pub certificate_path: String,
    /// PEM CA chain used to trust the server
    #[serde(default)]
    pub ca_chain_path: String,
}

/// HTTP(S) proxy used to reach the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl ClientConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_socket_timeout_ms == 0 {
            anyhow::bail!("'maxSocketTimeoutMs' must be greater than zero");
        }

        if let Some(tls) = &self.control_plane_tls {
            tls.validate()?;
        }

        if let Some(proxy) = &self.proxy {
            if proxy.url.trim().is_empty() {
                anyhow::bail!("proxy 'url' can not be empty");
            }
        }

        Ok(())
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.max_socket_timeout_ms)
    }

    pub fn future_timeout(&self) -> Duration {
        Duration::from_millis(self.max_future_timeout_ms)
    }
}

impl ControlPlaneTlsConfig {
    /// Mutual authentication needs a key, a certificate and a CA chain.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.mutual_auth_required
            && (self.private_key_path.trim().is_empty()
                || self.certificate_path.trim().is_empty()
                || self.ca_chain_path.trim().is_empty())
        {
            anyhow::bail!(
                "when 'mutualAuthRequired' is enabled 'privateKeyPath', 'certificatePath' and 'caChainPath' must all be specified,\n\tfound privateKeyPath: \"{}\"\n\tand certificatePath: \"{}\"\n\tand caChainPath: \"{}\"",
                self.private_key_path,
                self.certificate_path,
                self.ca_chain_path
            );
        }
        Ok(())
    }
}
