//! Error types for sf-session.
//!
//! Error messages are designed to avoid exposing passwords and session ids.

/// Result type alias for sf-session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sf-session operations.
#[derive(Debug, thiserror::Error)]
#[error("{kind}")]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional source error.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Create a new error with the given kind.
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }

    /// Create a new error with the given kind and source.
    pub fn with_source(
        kind: ErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the server rejected the login itself.
    pub fn is_login_rejected(&self) -> bool {
        matches!(self.kind, ErrorKind::LoginFailed { .. })
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// SOAP fault returned by the login endpoint.
    #[error("Login failed: {fault_code} - {message}")]
    LoginFailed { fault_code: String, message: String },

    /// `connect` called while a session is already active.
    #[error("Already connected")]
    AlreadyConnected,

    /// `disconnect` called without an active session.
    #[error("Not connected")]
    NotConnected,

    /// Invalid credentials configuration.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Response could not be understood.
    #[error("Invalid login response: {0}")]
    InvalidResponse(String),

    /// HTTP error during login or logout.
    #[error("HTTP error: {0}")]
    Http(String),

    /// IO error while reading options.
    #[error("IO error: {0}")]
    Io(String),

    /// JSON error while reading options.
    #[error("JSON error: {0}")]
    Json(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::with_source(ErrorKind::Http(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Io(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Json(err.to_string()), err)
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::with_source(
            ErrorKind::InvalidResponse(format!("Invalid server URL: {}", err)),
            err,
        )
    }
}
