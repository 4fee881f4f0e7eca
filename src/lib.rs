//! # busbar-sf-async
//!
//! Salesforce asynchronous Bulk API client for Rust.
//!
//! Loads and extracts records through jobs and batches on
//! `/services/async/{version}`, with chunking, CSV/XML codecs, polling and
//! per-record result correlation.
//!
//! ## Security
//!
//! - Session ids are redacted in Debug output
//! - Tracing skips credential parameters
//! - Error messages taken from service responses are sanitized
//!
//! ## Crates
//!
//! - **busbar-sf-session** - Session provider interface and SOAP username/password login
//! - **busbar-sf-transport** - HTTP transport with retry, compression and connection pooling
//! - **busbar-sf-async-bulk** - Job/batch lifecycle engine
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use busbar_sf_async::{AsyncBulkClient, BulkConfig, LoginOptions, Record, SoapSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Arc::new(SoapSession::new(
//!         LoginOptions::new("user@example.com", "password").with_security_token("token"),
//!     ));
//!     session.connect().await?;
//!
//!     let client = AsyncBulkClient::connect(session.clone(), BulkConfig::default())?;
//!     let outcome = client
//!         .insert("Account", vec![Record::new().with("Name", "Acme")])
//!         .await?;
//!     println!("job {} successful: {}", outcome.job.id(), outcome.is_successful());
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

// Re-export all crates for convenient access
pub use busbar_sf_async_bulk as bulk;
pub use busbar_sf_session as session;
pub use busbar_sf_transport as transport;

// Re-export commonly used types at the top level
pub use busbar_sf_async_bulk::{
    AsyncBulkClient, BulkConfig, BulkOptions, Job, JobRequest, Operation, Record,
};
pub use busbar_sf_session::{LoginOptions, SessionInfo, SoapSession, StaticSession};
pub use busbar_sf_transport::{HttpTransport, TransportConfig};
