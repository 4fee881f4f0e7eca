//! # sf-transport
//!
//! Transport layer for the Salesforce asynchronous Bulk API.
//!
//! The job/batch engine talks to the service through the [`Transport`]
//! trait: a `post` and a `get` that take an instance-relative path and
//! return the raw [`Response`]. This crate provides the trait and a
//! reqwest-based implementation with:
//! - Endpoint resolution through a [`SessionInfo`](busbar_sf_session::SessionInfo)
//! - Automatic retry with exponential backoff and jitter
//! - `Retry-After` handling for rate-limited responses
//! - Compression support (gzip, deflate)
//! - Connection pooling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   AsyncBulkClient                           │
//! │  - Job/batch lifecycle, codecs, polling                     │
//! │  - Adds X-SFDC-Session and content-type headers             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │  dyn Transport
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    HttpTransport                            │
//! │  - Resolves instance URL from the session                   │
//! │  - Raw HTTP with retry, compression                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Non-success responses are not errors at this layer. Once retries are
//! exhausted the final response is handed back as `Ok` so the caller can
//! read the service's error document.

mod config;
mod error;
mod http;
mod response;
mod retry;
mod security;
mod transport;

pub use config::{TransportConfig, TransportConfigBuilder};
pub use error::{Error, ErrorKind, Result};
pub use http::HttpTransport;
pub use response::Response;
pub use retry::{is_retryable_status, BackoffStrategy, RetryConfig, RetryPolicy};
pub use security::sanitize_error_message;
pub use transport::{Headers, Transport};

/// User-Agent string for the transport
pub const USER_AGENT: &str = concat!("busbar-sf-async/", env!("CARGO_PKG_VERSION"));
