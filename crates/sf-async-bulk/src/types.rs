//! Enumerations and the record type used across the engine.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::warn;

use crate::error::Error;

// =============================================================================
// Operation / concurrency / content type
// =============================================================================

/// Job operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Operation {
    Insert,
    Update,
    Upsert,
    Delete,
    Query,
}

impl Operation {
    /// Wire name used in the job descriptor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Upsert => "upsert",
            Operation::Delete => "delete",
            Operation::Query => "query",
        }
    }

    /// Returns true for the query operation.
    pub fn is_query(&self) -> bool {
        matches!(self, Operation::Query)
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "insert" => Ok(Operation::Insert),
            "update" => Ok(Operation::Update),
            "upsert" => Ok(Operation::Upsert),
            "delete" => Ok(Operation::Delete),
            "query" => Ok(Operation::Query),
            other => Err(Error::validation(format!("Invalid operation: {}", other))),
        }
    }
}

/// Server-side batch concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ConcurrencyMode {
    Parallel,
    Serial,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::Parallel => "Parallel",
            ConcurrencyMode::Serial => "Serial",
        }
    }
}

impl FromStr for ConcurrencyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(ConcurrencyMode::Parallel),
            "serial" => Ok(ConcurrencyMode::Serial),
            other => Err(Error::validation(format!(
                "Invalid concurrency mode: {}",
                other
            ))),
        }
    }
}

/// Record encoding of batches and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum ContentType {
    #[default]
    Csv,
    Xml,
}

impl ContentType {
    /// Wire name used in the job descriptor.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Csv => "CSV",
            ContentType::Xml => "XML",
        }
    }

    /// HTTP Content-Type for batch bodies.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ContentType::Csv => "text/csv; charset=UTF-8",
            ContentType::Xml => "application/xml; charset=UTF-8",
        }
    }

    /// Parse a content type reported by the service.
    ///
    /// Unknown names are a payload problem, not a caller mistake.
    pub fn from_wire(s: &str) -> crate::Result<Self> {
        Self::parse(s).ok_or_else(|| Error::malformed(format!("Unrecognized content type: {}", s)))
    }

    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ContentType::Csv),
            "xml" => Some(ContentType::Xml),
            _ => None,
        }
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| Error::validation(format!("Invalid content type: {}", s)))
    }
}

// =============================================================================
// States
// =============================================================================

/// Job state. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum JobState {
    Open,
    Closed,
    Completed,
    Failed,
    Aborted,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Open => "Open",
            JobState::Closed => "Closed",
            JobState::Completed => "Completed",
            JobState::Failed => "Failed",
            JobState::Aborted => "Aborted",
        }
    }

    /// Completed, Failed and Aborted accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Aborted
        )
    }

    /// Whether `next` is reachable from `self` (staying put is allowed).
    pub fn can_advance_to(&self, next: JobState) -> bool {
        if *self == next {
            return true;
        }
        match self {
            JobState::Open => true,
            JobState::Closed => next.is_terminal(),
            _ => false,
        }
    }

    /// Adopt `observed` if it is a forward move, otherwise keep `self`.
    pub(crate) fn advance(self, observed: JobState, job_id: &str) -> JobState {
        if self.can_advance_to(observed) {
            observed
        } else {
            warn!(
                job_id,
                current = self.as_str(),
                observed = observed.as_str(),
                "Ignoring backward job state transition"
            );
            self
        }
    }
}

/// Batch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum BatchState {
    Queued,
    InProgress,
    Completed,
    Failed,
    NotProcessed,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchState::Queued => "Queued",
            BatchState::InProgress => "InProgress",
            BatchState::Completed => "Completed",
            BatchState::Failed => "Failed",
            BatchState::NotProcessed => "NotProcessed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            BatchState::Queued => 0,
            BatchState::InProgress => 1,
            BatchState::Completed | BatchState::Failed | BatchState::NotProcessed => 2,
        }
    }

    pub(crate) fn advance(self, observed: BatchState, batch_id: &str) -> BatchState {
        if self == observed || self.rank() < observed.rank() {
            observed
        } else {
            warn!(
                batch_id,
                current = self.as_str(),
                observed = observed.as_str(),
                "Ignoring backward batch state transition"
            );
            self
        }
    }
}

macro_rules! impl_wire_enum {
    ($ty:ident, $what:literal, [$($variant:ident),+]) => {
        impl $ty {
            fn from_name(s: &str) -> Option<Self> {
                let s = s.trim();
                $(
                    if s.eq_ignore_ascii_case(stringify!($variant)) {
                        return Some($ty::$variant);
                    }
                )+
                None
            }
        }

        impl FromStr for $ty {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_name(s)
                    .ok_or_else(|| Error::malformed(format!(concat!("Unrecognized ", $what, ": {}"), s)))
            }
        }
    };
}

impl_wire_enum!(JobState, "job state", [Open, Closed, Completed, Failed, Aborted]);
impl_wire_enum!(BatchState, "batch state", [Queued, InProgress, Completed, Failed, NotProcessed]);

macro_rules! impl_string_conversions {
    ($($ty:ident),+) => {
        $(
            impl TryFrom<String> for $ty {
                type Error = Error;

                fn try_from(value: String) -> Result<Self, Self::Error> {
                    value.parse()
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

impl_string_conversions!(Operation, ConcurrencyMode, JobState, BatchState);

impl TryFrom<String> for ContentType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ContentType::from_wire(&value)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Record
// =============================================================================

/// One record as ordered `(field, value)` pairs.
///
/// Field order is insertion order; the CSV codec derives its header from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`set`](Record::set).
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field, keeping its position if it already exists.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(entry) => entry.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (field, value) in iter {
            record.set(field, value);
        }
        record
    }
}

impl<K: Into<String>, V: Into<String>, const N: usize> From<[(K, V); N]> for Record {
    fn from(pairs: [(K, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_operation_parse_is_case_insensitive() {
        assert_eq!("INSERT".parse::<Operation>().unwrap(), Operation::Insert);
        assert_eq!(" upsert ".parse::<Operation>().unwrap(), Operation::Upsert);
        let err = "merge".parse::<Operation>().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Validation(_)));
    }

    #[test]
    fn test_content_type_user_vs_wire_errors() {
        assert_eq!("csv".parse::<ContentType>().unwrap(), ContentType::Csv);
        assert!(matches!(
            "json".parse::<ContentType>().unwrap_err().kind,
            ErrorKind::Validation(_)
        ));
        assert!(matches!(
            ContentType::from_wire("ZIP_CSV").unwrap_err().kind,
            ErrorKind::MalformedPayload(_)
        ));
    }

    #[test]
    fn test_state_names_normalize() {
        assert_eq!("inprogress".parse::<BatchState>().unwrap(), BatchState::InProgress);
        assert_eq!("NOTPROCESSED".parse::<BatchState>().unwrap(), BatchState::NotProcessed);
        assert_eq!("closed".parse::<JobState>().unwrap(), JobState::Closed);
        assert!("Pending".parse::<JobState>().is_err());
    }

    #[test]
    fn test_job_state_moves_forward_only() {
        assert!(JobState::Open.can_advance_to(JobState::Closed));
        assert!(JobState::Open.can_advance_to(JobState::Aborted));
        assert!(JobState::Closed.can_advance_to(JobState::Aborted));
        assert!(JobState::Closed.can_advance_to(JobState::Completed));
        assert!(!JobState::Closed.can_advance_to(JobState::Open));
        assert!(!JobState::Aborted.can_advance_to(JobState::Closed));
        assert!(!JobState::Failed.can_advance_to(JobState::Completed));

        assert_eq!(JobState::Closed.advance(JobState::Open, "750x"), JobState::Closed);
        assert_eq!(JobState::Closed.advance(JobState::Failed, "750x"), JobState::Failed);
    }

    #[test]
    fn test_batch_state_moves_forward_only() {
        assert_eq!(
            BatchState::Queued.advance(BatchState::InProgress, "751x"),
            BatchState::InProgress
        );
        assert_eq!(
            BatchState::Completed.advance(BatchState::Queued, "751x"),
            BatchState::Completed
        );
    }

    #[test]
    fn test_record_keeps_insertion_order() {
        let mut record = Record::new().with("Name", "Acme").with("Phone", "555");
        record.set("Name", "Acme Corp");
        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["Name", "Phone"]);
        assert_eq!(record.get("Name"), Some("Acme Corp"));
        assert_eq!(record.get("Missing"), None);

        let from_array = Record::from([("Id", "001"), ("Name", "X")]);
        assert_eq!(from_array.len(), 2);
    }
}
