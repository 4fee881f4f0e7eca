//! # busbar-sf-async-bulk
//!
//! Job and batch lifecycle engine for the Salesforce asynchronous Bulk API
//! (`/services/async/{version}`).
//!
//! ## Features
//!
//! - **Jobs** - Create, close, abort, refresh and rediscover jobs for
//!   insert, update, upsert, delete and query
//! - **Batching** - Records are chunked (10,000 per batch at most) and
//!   submitted in order
//! - **CSV and XML** - Batch bodies and results in either content type
//! - **Result Correlation** - Each result is paired with the record that
//!   produced it; count mismatches are errors
//! - **Polling** - Deadline-bounded, cancellable wait for completion
//! - **Filters** - Order-preserving selection of jobs, batches and results
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use busbar_sf_async_bulk::{AsyncBulkClient, BulkConfig, JobRequest, Operation, Record, ResultFilter};
//! use busbar_sf_session::StaticSession;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), busbar_sf_async_bulk::Error> {
//!     let session = Arc::new(StaticSession::new("na1.salesforce.com", "00D..."));
//!     let client = AsyncBulkClient::connect(session, BulkConfig::default())?;
//!
//!     let mut job = client
//!         .create_job(JobRequest::new(Operation::Upsert, "Contact").with_external_id_field("Email__c"))
//!         .await?;
//!     job.add_batches(vec![Record::new().with("Email__c", "a@example.com")], None).await?;
//!     job.close().await?;
//!     job.poll_until_finished(None).await?;
//!
//!     let results = job.get_results().await?;
//!     for failed in results.select(ResultFilter::Error) {
//!         println!("{:?}: {:?}", failed.input, failed.error);
//!     }
//!     Ok(())
//! }
//! ```

mod batch;
mod chunk;
mod client;
mod codec;
mod config;
mod correlate;
mod envelope;
mod error;
mod filter;
mod job;
mod poll;
mod result;
mod types;
mod xml;

#[cfg(test)]
mod testing;

pub use batch::{Batch, BatchCollection, BatchRequest};
pub use chunk::{chunk, MAX_BATCH_SIZE};
pub use client::{AsyncBulkClient, OperationResult};
pub use codec::{decode, decode_as, decode_records, encode, parse_boolean, HeaderPolicy, RawOutcome};
pub use config::{
    BulkConfig, BulkConfigBuilder, BulkOptions, DEFAULT_API_VERSION, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_MAX_WAIT, DEFAULT_POLL_INTERVAL,
};
pub use correlate::correlate;
pub use envelope::{BatchInfo, JobInfo};
pub use error::{Error, ErrorKind, Result};
pub use filter::{BatchFilter, Collection, FilterEntry, Filterable, JobFilter, ResultFilter};
pub use job::{Job, JobCollection, JobRequest, JobSnapshot};
pub use poll::Poller;
pub use result::{BatchResultRecord, ResultCollection};
pub use types::{BatchState, ConcurrencyMode, ContentType, JobState, Operation, Record};

pub use tokio_util::sync::CancellationToken;
