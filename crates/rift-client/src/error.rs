//! Error types for the control-plane client.

use thiserror::Error;

/// Failures reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The remote endpoint could not be reached (refused, reset, DNS, ...).
    #[error("connection failed: {0}")]
    Connection(String),
    /// The request did not complete within the per-call timeout.
    #[error("request timed out after {0}ms")]
    Timeout(u64),
    /// The transport was shut down and no longer accepts requests.
    #[error("transport has been shut down")]
    ShutDown,
    /// Any other transport failure.
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur when talking to the control plane.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The client was stopped (or its transport torn down); create a new client.
    #[error("client has already been stopped, please create a new client instance")]
    ClientClosed,

    /// The server rejected the request as malformed (HTTP 400).
    #[error("{0}")]
    Validation(String),

    /// The server rejected the control-plane credentials (HTTP 401).
    #[error("{0}")]
    Authentication(String),

    /// Client and server disagree on the major.minor protocol version.
    #[error(
        "client version \"{client}\" major and minor versions do not match server version \"{server}\""
    )]
    VersionMismatch { client: String, server: String },

    /// A local precondition failed; nothing was sent.
    #[error("{0}")]
    InvalidArgument(String),

    /// The control-plane token supplier returned an unusable token.
    #[error("control plane token supplier returned invalid token \"{0}\"")]
    InvalidCredential(String),

    /// A verification did not hold; carries the server's diagnostic text.
    #[error("{0}")]
    Assertion(String),

    /// The server answered in an unexpected way.
    #[error("{0}")]
    Client(String),

    /// The port of a lazily bound endpoint could not be resolved.
    #[error("failed to resolve port: {0}")]
    PortResolution(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to (de)serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ClientError {
    /// True when the failure means the remote endpoint is not reachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            ClientError::ClientClosed | ClientError::Transport(TransportError::Connection(_))
        )
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
