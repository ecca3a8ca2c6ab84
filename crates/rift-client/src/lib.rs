//! Rift Client - control-plane client for MockServer-compatible mock services
//!
//! This crate talks to the `/mockserver/*` control plane of a running mock
//! service over HTTP.
//!
//! # Features
//!
//! - **Expectations**: Register expectations (or OpenAPI-generated ones) and
//!   read back what the server stored
//! - **Verification**: Assert that requests, or expectation hits, happened a
//!   number of times or in a given order
//! - **Retrieval**: Fetch recorded requests, request/response pairs, recorded
//!   or active expectations and the server log
//! - **Lifecycle**: Poll until the server is running or stopped, bind extra
//!   ports, reset, and stop the server exactly once
//! - **Local events**: In-process listeners are told about `Stop` and `Reset`
//!
//! # Example
//!
//! ```no_run
//! use rift_client::model::{HttpRequest, HttpResponse, VerificationTimes};
//! use rift_client::MockServerClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = MockServerClient::new("localhost", 1080)?;
//!
//!     client
//!         .when(HttpRequest::new().with_method("GET").with_path("/health"))
//!         .respond(HttpResponse::new(200).with_body("ok"))
//!         .await?;
//!
//!     client
//!         .verify_request(HttpRequest::new().with_path("/health"), VerificationTimes::at_least(1))
//!         .await?;
//!
//!     client.stop().await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod model;
pub mod path;
pub mod poller;
pub mod transport;
pub mod version;

pub use client::{ClientBuilder, ExpectationBuilder, MockServerClient, StopHandle};
pub use config::ClientConfig;
pub use dispatch::{RequestTemplate, TokenSupplier};
pub use error::{ClientError, Result, TransportError};
pub use events::{EventBus, EventBusRegistry, EventType};
pub use transport::{HttpTransport, Transport};
