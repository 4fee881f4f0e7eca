//! Per-record outcomes of ingest batches.

use crate::filter::{Collection, FilterEntry, Filterable, ResultFilter};
use crate::types::Record;

/// Outcome of one submitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResultRecord {
    /// Record id; present when the service assigned or matched one.
    pub id: Option<String>,
    pub success: bool,
    /// Meaningful only when `success` is true.
    pub created: bool,
    /// Error text; present only when `success` is false.
    pub error: Option<String>,
    /// The submitted record at the same position, when known.
    pub input: Option<Record>,
}

impl BatchResultRecord {
    pub fn is_error(&self) -> bool {
        !self.success
    }

    pub fn is_created(&self) -> bool {
        self.success && self.created
    }

    pub fn is_successful(&self) -> bool {
        self.success
    }

    /// Successful without creating a new record.
    pub fn is_updated(&self) -> bool {
        self.success && !self.created
    }
}

static RESULT_FILTERS: &[FilterEntry<BatchResultRecord, ResultFilter>] = &[
    FilterEntry {
        filter: ResultFilter::Error,
        name: "error",
        predicate: BatchResultRecord::is_error,
    },
    FilterEntry {
        filter: ResultFilter::Created,
        name: "created",
        predicate: BatchResultRecord::is_created,
    },
    FilterEntry {
        filter: ResultFilter::Successful,
        name: "successful",
        predicate: BatchResultRecord::is_successful,
    },
    FilterEntry {
        filter: ResultFilter::Updated,
        name: "updated",
        predicate: BatchResultRecord::is_updated,
    },
];

impl Filterable for BatchResultRecord {
    type Filter = ResultFilter;

    fn filters() -> &'static [FilterEntry<Self, ResultFilter>] {
        RESULT_FILTERS
    }
}

/// Ordered result records of a batch or job.
pub type ResultCollection = Collection<BatchResultRecord>;

impl ResultCollection {
    /// True if any record failed.
    pub fn any_failures(&self) -> bool {
        self.iter().any(BatchResultRecord::is_error)
    }
}
