//! # sf-session
//!
//! Session providers for the Salesforce asynchronous Bulk API.
//!
//! The job/batch engine never authenticates by itself. It asks a
//! [`SessionInfo`] whether a session is active and which instance host and
//! session token to use, and refuses to issue requests otherwise.
//!
//! ## Security
//!
//! - Session tokens and passwords are redacted in Debug output
//! - Tracing spans skip credential parameters
//!
//! ## Providers
//!
//! - [`StaticSession`] - A session obtained elsewhere (SF CLI, OAuth, tests)
//! - [`SoapSession`] - Partner SOAP `login`/`logout` with username and password
//!
//! ## Example
//!
//! ```rust,ignore
//! use busbar_sf_session::{LoginOptions, SessionInfo, SoapSession};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), busbar_sf_session::Error> {
//!     let options = LoginOptions::new("user@example.com", "password")
//!         .with_security_token("token");
//!     let session = SoapSession::new(options);
//!
//!     session.connect().await?;
//!     assert!(session.is_active());
//!     session.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

mod error;
mod session;
mod soap;
mod xml;

pub use error::{Error, ErrorKind, Result};
pub use session::{SessionInfo, StaticSession};
pub use soap::{LoginOptions, LoginResult, SoapSession};

/// Default Salesforce API version.
pub const DEFAULT_API_VERSION: &str = "62.0";

/// Default Salesforce login URL for production.
pub const PRODUCTION_LOGIN_URL: &str = "https://login.salesforce.com";

/// Default Salesforce login URL for sandbox.
pub const SANDBOX_LOGIN_URL: &str = "https://test.salesforce.com";
