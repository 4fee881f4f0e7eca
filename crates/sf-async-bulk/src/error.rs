//! Error types for sf-async-bulk.

use std::time::Duration;

use crate::job::JobSnapshot;

/// Result type alias for sf-async-bulk operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for sf-async-bulk operations.
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

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation(message.into()))
    }

    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput(message.into()))
    }

    pub(crate) fn state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State(message.into()))
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedPayload(message.into()))
    }

    /// Returns true if polling gave up at the deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind, ErrorKind::Timeout { .. })
    }

    /// Returns true if polling was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind, ErrorKind::Cancelled)
    }

    /// Returns true if the service answered with a non-success status.
    pub fn is_remote(&self) -> bool {
        matches!(self.kind, ErrorKind::RemoteService { .. })
    }

    /// Last observed job state, for timeouts.
    pub fn snapshot(&self) -> Option<&JobSnapshot> {
        match &self.kind {
            ErrorKind::Timeout { snapshot, .. } => Some(snapshot),
            _ => None,
        }
    }
}

/// The kind of error that occurred.
#[derive(Debug, thiserror::Error)]
pub enum ErrorKind {
    /// Job parameters rejected before any request was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Records or chunk sizes that cannot be submitted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation not allowed in the job's current state.
    #[error("Invalid state: {0}")]
    State(String),

    /// The session provider reports no active session.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Non-success response from the service.
    #[error("Remote service error ({status}): {message}")]
    RemoteService {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Payload that could not be parsed.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Decoded outcomes do not line up with the submitted records.
    #[error("Correlation error: submitted {expected} records, service returned {actual} results")]
    Correlation { expected: usize, actual: usize },

    /// Job did not finish before the deadline.
    #[error("Timeout: job {} not finished after {waited:?}", .snapshot.job_id())]
    Timeout {
        waited: Duration,
        snapshot: Box<JobSnapshot>,
    },

    /// Polling was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// No response could be obtained from the service.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Error reading options.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<busbar_sf_transport::Error> for Error {
    fn from(err: busbar_sf_transport::Error) -> Self {
        let kind = match err.kind {
            busbar_sf_transport::ErrorKind::NotConnected => ErrorKind::NotAuthenticated,
            _ => ErrorKind::Transport(err.to_string()),
        };
        Error::with_source(kind, err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::with_source(ErrorKind::MalformedPayload(err.to_string()), err)
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Error::with_source(ErrorKind::MalformedPayload(err.to_string()), err)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::with_source(ErrorKind::MalformedPayload(err.to_string()), err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::with_source(ErrorKind::Config(err.to_string()), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::with_source(ErrorKind::Config(err.to_string()), err)
    }
}
