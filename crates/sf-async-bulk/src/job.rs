//! Jobs: creation, batch submission, state transitions and results.

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::batch::{Batch, BatchCollection, BatchRequest};
use crate::chunk::{chunk, MAX_BATCH_SIZE};
use crate::client::{AsyncBulkClient, XML_CONTENT_TYPE};
use crate::envelope::{parse_batch_info_list, state_document, BatchInfo, JobDescriptor, JobInfo};
use crate::error::{Error, Result};
use crate::filter::{Collection, FilterEntry, Filterable, JobFilter};
use crate::poll::Poller;
use crate::result::ResultCollection;
use crate::types::{ConcurrencyMode, ContentType, JobState, Operation, Record};

// =============================================================================
// Job request
// =============================================================================

/// Parameters for creating a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    operation: Operation,
    object: String,
    external_id_field: Option<String>,
    concurrency_mode: Option<ConcurrencyMode>,
    content_type: ContentType,
    assignment_rule_id: Option<String>,
}

impl JobRequest {
    /// A CSV job of `operation` against `object`.
    pub fn new(operation: Operation, object: impl Into<String>) -> Self {
        Self {
            operation,
            object: object.into(),
            external_id_field: None,
            concurrency_mode: None,
            content_type: ContentType::default(),
            assignment_rule_id: None,
        }
    }

    /// Field used to match records; required for upsert.
    pub fn with_external_id_field(mut self, field: impl Into<String>) -> Self {
        self.external_id_field = Some(field.into());
        self
    }

    pub fn with_concurrency_mode(mut self, mode: ConcurrencyMode) -> Self {
        self.concurrency_mode = Some(mode);
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Assignment rule applied to created Cases and Leads.
    pub fn with_assignment_rule_id(mut self, rule_id: impl Into<String>) -> Self {
        self.assignment_rule_id = Some(rule_id.into());
        self
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Check the parameters without contacting the service.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_object_name(&self.object) {
            return Err(Error::validation(format!(
                "invalid object name {:?}",
                self.object
            )));
        }

        match (self.operation, self.external_id_field.as_deref()) {
            (Operation::Upsert, None) => {
                Err(Error::validation("upsert requires an external id field"))
            }
            (Operation::Upsert, Some(field)) if !is_valid_object_name(field) => Err(
                Error::validation(format!("invalid external id field {field:?}")),
            ),
            (Operation::Upsert, Some(_)) | (_, None) => Ok(()),
            (operation, Some(_)) => Err(Error::validation(format!(
                "external id field is only allowed for upsert, not {operation}"
            ))),
        }
    }

    fn descriptor(&self) -> JobDescriptor<'_> {
        JobDescriptor {
            operation: self.operation,
            object: &self.object,
            external_id_field_name: self.external_id_field.as_deref(),
            concurrency_mode: self.concurrency_mode,
            content_type: self.content_type,
            assignment_rule_id: self.assignment_rule_id.as_deref(),
        }
    }
}

/// API names: a letter followed by letters, digits and underscores.
fn is_valid_object_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// =============================================================================
// Job
// =============================================================================

/// Last observed state of a job and its batches.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub job: JobInfo,
    pub batches: Vec<BatchInfo>,
}

impl JobSnapshot {
    pub fn job_id(&self) -> &str {
        self.job.id.as_deref().unwrap_or("?")
    }
}

/// A bulk job and the batches submitted to it.
#[derive(Debug)]
pub struct Job {
    client: AsyncBulkClient,
    info: JobInfo,
    batches: BatchCollection,
}

impl Job {
    /// Create a job on the service.
    ///
    /// Returns `Validation` before any request for bad parameters.
    #[instrument(skip(client, request), fields(object = %request.object, operation = %request.operation))]
    pub async fn create(client: &AsyncBulkClient, request: JobRequest) -> Result<Self> {
        request.validate()?;

        let body = client
            .post("job", request.descriptor().to_xml()?, XML_CONTENT_TYPE)
            .await?;
        let mut info = JobInfo::parse(&body)?;
        if info.id.is_none() {
            return Err(Error::malformed("jobInfo without an id"));
        }
        info.state.get_or_insert(JobState::Open);
        info.operation.get_or_insert(request.operation);
        info.content_type.get_or_insert(request.content_type);
        info.object.get_or_insert(request.object);

        let job = Self::from_info(client, info);
        info!(job_id = job.id(), "Job created");
        Ok(job)
    }

    /// Load job `job_id` and its batches.
    #[instrument(skip(client))]
    pub async fn find(client: &AsyncBulkClient, job_id: &str) -> Result<Self> {
        let body = client.get(&format!("job/{job_id}")).await?;
        let mut job = Self::from_info(client, JobInfo::parse(&body)?);
        job.info.id.get_or_insert_with(|| job_id.to_string());
        job.refresh_batches().await?;
        Ok(job)
    }

    pub(crate) fn from_info(client: &AsyncBulkClient, info: JobInfo) -> Self {
        Self {
            client: client.clone(),
            info,
            batches: BatchCollection::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> &str {
        self.info.id.as_deref().unwrap_or_default()
    }

    pub fn info(&self) -> &JobInfo {
        &self.info
    }

    pub fn state(&self) -> Option<JobState> {
        self.info.state
    }

    pub fn operation(&self) -> Option<Operation> {
        self.info.operation
    }

    pub fn object(&self) -> Option<&str> {
        self.info.object.as_deref()
    }

    pub fn content_type(&self) -> ContentType {
        self.info.content_type.unwrap_or_default()
    }

    pub fn batches(&self) -> &BatchCollection {
        &self.batches
    }

    pub fn client(&self) -> &AsyncBulkClient {
        &self.client
    }

    /// Current job and batch status.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job: self.info.clone(),
            batches: self.batches.iter().map(|b| b.info().clone()).collect(),
        }
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    pub fn is_query(&self) -> bool {
        self.info.operation.is_some_and(|op| op.is_query())
    }

    pub fn is_open(&self) -> bool {
        self.info.state == Some(JobState::Open)
    }

    pub fn is_closed(&self) -> bool {
        self.info.state == Some(JobState::Closed)
    }

    pub fn is_completed(&self) -> bool {
        self.info.state == Some(JobState::Completed)
    }

    pub fn is_aborted(&self) -> bool {
        self.info.state == Some(JobState::Aborted)
    }

    pub fn is_failed(&self) -> bool {
        self.info.state == Some(JobState::Failed)
    }

    /// No batch is queued or in progress.
    pub fn batches_finished(&self) -> bool {
        self.info.number_batches_queued == 0 && self.info.number_batches_in_progress == 0
    }

    pub fn is_finished(&self) -> bool {
        self.is_failed()
            || self.is_aborted()
            || self.is_completed()
            || (self.is_closed() && self.batches_finished())
    }

    /// Finished without failed batches or records.
    pub fn is_successful(&self) -> bool {
        self.is_finished()
            && (self.is_closed() || self.is_completed())
            && self.info.number_batches_failed == 0
            && self.info.number_records_failed == 0
    }

    pub fn can_create_batches(&self) -> bool {
        self.is_open()
    }

    /// Case-insensitive state comparison.
    pub fn is_state(&self, name: &str) -> bool {
        self.info
            .state
            .is_some_and(|state| state.as_str().eq_ignore_ascii_case(name))
    }

    fn state_name(&self) -> &'static str {
        self.info.state.map_or("unknown", |s| s.as_str())
    }

    // =========================================================================
    // Batches
    // =========================================================================

    /// Split `records` into batches of at most `max_batch_size` (default from
    /// config) and submit them in order. Returns the number of batches added.
    #[instrument(skip(self, records), fields(job_id = self.id(), records = records.len()))]
    pub async fn add_batches(
        &mut self,
        records: Vec<Record>,
        max_batch_size: Option<usize>,
    ) -> Result<usize> {
        if !self.can_create_batches() {
            return Err(Error::state(format!(
                "job {} is {}; batches can only be added to an open job",
                self.id(),
                self.state_name()
            )));
        }
        if self.is_query() {
            return Err(Error::invalid_input(
                "query jobs take a query batch; use add_query",
            ));
        }
        if records.is_empty() {
            return Err(Error::invalid_input("No records to submit"));
        }

        let size = max_batch_size.unwrap_or(self.client.config().batch_size);
        if size > MAX_BATCH_SIZE {
            return Err(Error::invalid_input(format!(
                "batch size {size} exceeds the limit of {MAX_BATCH_SIZE}"
            )));
        }

        let chunks = chunk(records, size)?;
        let count = chunks.len();
        let job_id = self.id().to_string();
        let content_type = self.content_type();
        for records in chunks {
            let ordinal = self.batches.len();
            let batch =
                Batch::submit_records(&self.client, &job_id, ordinal, content_type, records).await?;
            self.batches.push(batch);
        }
        Ok(count)
    }

    /// Submit `soql` as the batch of a query job.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn add_query(&mut self, soql: &str) -> Result<&Batch> {
        if !self.can_create_batches() {
            return Err(Error::state(format!(
                "job {} is {}; batches can only be added to an open job",
                self.id(),
                self.state_name()
            )));
        }
        if !self.is_query() {
            return Err(Error::invalid_input(format!(
                "job {} is not a query job",
                self.id()
            )));
        }
        if soql.trim().is_empty() {
            return Err(Error::invalid_input("Query text is empty"));
        }

        let job_id = self.id().to_string();
        let ordinal = self.batches.len();
        let batch =
            Batch::submit_query(&self.client, &job_id, ordinal, self.content_type(), soql).await?;
        self.batches.push(batch);
        Ok(&self.batches[ordinal])
    }

    /// Load batch `batch_id` of this job.
    pub async fn find_batch(&self, batch_id: &str) -> Result<Batch> {
        let ordinal = self
            .batches
            .iter()
            .position(|b| b.id() == batch_id)
            .unwrap_or(self.batches.len());
        Batch::find(
            &self.client,
            self.id(),
            batch_id,
            ordinal,
            self.content_type(),
            self.is_query(),
        )
        .await
    }

    /// Replace the batch list with the service's, in the service's order.
    ///
    /// Batches already known locally keep their input records.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn refresh_batches(&mut self) -> Result<()> {
        let body = self.client.get(&format!("job/{}/batch", self.id())).await?;
        let infos = parse_batch_info_list(&body)?;

        let mut known = std::mem::take(&mut self.batches).into_vec();
        let content_type = self.content_type();
        let query = self.is_query();
        for (ordinal, info) in infos.into_iter().enumerate() {
            let batch = match known.iter().position(|b| b.id() == info.id) {
                Some(index) => {
                    let mut batch = known.swap_remove(index);
                    batch.update(info);
                    batch
                }
                None => Batch::from_info(&self.client, info, ordinal, content_type, query),
            };
            self.batches.push(batch);
        }
        debug!(batches = self.batches.len(), "Batches refreshed");
        Ok(())
    }

    /// Refresh every batch that has not finished, concurrently.
    pub async fn refresh_unfinished_batches(&mut self) -> Result<()> {
        let limit = self.client.config().max_concurrent_requests.max(1);
        stream::iter(self.batches.iter_mut().filter(|b| !b.is_finished()))
            .map(Ok)
            .try_for_each_concurrent(limit, |batch| batch.refresh())
            .await
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Re-read job attributes. Batch detail is not touched.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn refresh(&mut self) -> Result<()> {
        let body = self.client.get(&format!("job/{}", self.id())).await?;
        self.update(JobInfo::parse(&body)?);
        debug!(
            state = self.state_name(),
            queued = self.info.number_batches_queued,
            in_progress = self.info.number_batches_in_progress,
            "Job refreshed"
        );
        Ok(())
    }

    /// Close the job; no more batches may be added. Only from Open.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn close(&mut self) -> Result<()> {
        if !self.is_open() {
            return Err(Error::state(format!(
                "job {} is {}; only an open job can be closed",
                self.id(),
                self.state_name()
            )));
        }
        self.transition(JobState::Closed).await?;
        info!(job_id = self.id(), state = self.state_name(), "Job closed");
        Ok(())
    }

    /// Abort the job. Allowed from any non-terminal state.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn abort(&mut self) -> Result<()> {
        if self.info.state.is_some_and(|s| s.is_terminal()) {
            return Err(Error::state(format!(
                "job {} is already {}",
                self.id(),
                self.state_name()
            )));
        }
        self.transition(JobState::Aborted).await?;
        info!(job_id = self.id(), state = self.state_name(), "Job aborted");
        Ok(())
    }

    async fn transition(&mut self, state: JobState) -> Result<()> {
        let body = self
            .client
            .post(
                &format!("job/{}", self.id()),
                state_document(state)?,
                XML_CONTENT_TYPE,
            )
            .await?;
        self.update(JobInfo::parse(&body)?);
        Ok(())
    }

    /// Adopt `observed`, keeping the current state on a backward move and
    /// keeping identity fields the document omits.
    fn update(&mut self, mut observed: JobInfo) {
        let job_id = self.id().to_string();
        observed.state = match (self.info.state, observed.state) {
            (Some(current), Some(next)) => Some(current.advance(next, &job_id)),
            (current, next) => next.or(current),
        };
        if observed.id.is_none() {
            observed.id = self.info.id.take();
        }
        if observed.operation.is_none() {
            observed.operation = self.info.operation;
        }
        if observed.object.is_none() {
            observed.object = self.info.object.take();
        }
        if observed.content_type.is_none() {
            observed.content_type = self.info.content_type;
        }
        self.info = observed;
    }

    /// Poll until finished using the client's interval and deadline.
    pub async fn poll_until_finished(&mut self, cancel: Option<&CancellationToken>) -> Result<()> {
        Poller::from_config(self.client.config())
            .poll_until_finished(self, cancel)
            .await
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Results of every batch, flattened in batch order.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn get_results(&mut self) -> Result<ResultCollection> {
        if self.is_query() {
            return Err(Error::state(format!(
                "job {} is a query job; use get_query_rows",
                self.id()
            )));
        }
        let limit = self.client.config().max_concurrent_requests.max(1);
        stream::iter(self.batches.iter_mut())
            .map(Ok)
            .try_for_each_concurrent(limit, |batch| async move {
                batch.results().await.map(|_| ())
            })
            .await?;

        let results: ResultCollection = self
            .batches
            .iter()
            .filter_map(Batch::cached_results)
            .flat_map(|results| results.iter().cloned())
            .collect();
        info!(results = results.len(), "Job results collected");
        Ok(results)
    }

    /// Rows of every query batch, in batch order.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn get_query_rows(&mut self) -> Result<Vec<Record>> {
        let limit = self.client.config().max_concurrent_requests.max(1);
        stream::iter(self.batches.iter_mut().filter(|b| b.is_query()))
            .map(Ok)
            .try_for_each_concurrent(limit, |batch| async move {
                batch.query_rows().await.map(|_| ())
            })
            .await?;

        Ok(self
            .batches
            .iter()
            .filter_map(Batch::cached_rows)
            .flat_map(|rows| rows.iter().cloned())
            .collect())
    }

    /// Submitted payload of every batch, re-read from the server in batch
    /// order.
    #[instrument(skip(self), fields(job_id = self.id()))]
    pub async fn get_requests(&self) -> Result<Vec<BatchRequest>> {
        let limit = self.client.config().max_concurrent_requests.max(1);
        stream::iter(self.batches.iter())
            .map(|batch| batch.fetch_request())
            .buffered(limit)
            .try_collect()
            .await
    }
}

static JOB_FILTERS: &[FilterEntry<Job, JobFilter>] = &[
    FilterEntry {
        filter: JobFilter::BatchesFinished,
        name: "batches_finished",
        predicate: Job::batches_finished,
    },
    FilterEntry {
        filter: JobFilter::Finished,
        name: "finished",
        predicate: Job::is_finished,
    },
    FilterEntry {
        filter: JobFilter::Failed,
        name: "failed",
        predicate: Job::is_failed,
    },
    FilterEntry {
        filter: JobFilter::Aborted,
        name: "aborted",
        predicate: Job::is_aborted,
    },
    FilterEntry {
        filter: JobFilter::Closed,
        name: "closed",
        predicate: Job::is_closed,
    },
    FilterEntry {
        filter: JobFilter::Open,
        name: "open",
        predicate: Job::is_open,
    },
    FilterEntry {
        filter: JobFilter::CanCreateBatches,
        name: "can_create_batches",
        predicate: Job::can_create_batches,
    },
    FilterEntry {
        filter: JobFilter::Successful,
        name: "successful",
        predicate: Job::is_successful,
    },
];

impl Filterable for Job {
    type Filter = JobFilter;

    fn filters() -> &'static [FilterEntry<Self, JobFilter>] {
        JOB_FILTERS
    }
}

/// A set of jobs handled together.
pub type JobCollection = Collection<Job>;

impl JobCollection {
    pub async fn refresh_all(&mut self) -> Result<()> {
        for job in self.iter_mut() {
            job.refresh().await?;
        }
        Ok(())
    }

    /// Close every open job.
    pub async fn close_all(&mut self) -> Result<()> {
        for job in self.iter_mut().filter(|job| job.is_open()) {
            job.close().await?;
        }
        Ok(())
    }

    /// Abort every job not yet in a terminal state.
    pub async fn abort_all(&mut self) -> Result<()> {
        for job in self
            .iter_mut()
            .filter(|job| !job.state().is_some_and(|s| s.is_terminal()))
        {
            job.abort().await?;
        }
        Ok(())
    }

    /// Results of each job, in collection order.
    pub async fn get_results(&mut self) -> Result<Vec<ResultCollection>> {
        let mut all = Vec::with_capacity(self.len());
        for job in self.iter_mut() {
            all.push(job.get_results().await?);
        }
        Ok(all)
    }

    /// Batch payloads of each job, in collection order.
    pub async fn get_requests(&self) -> Result<Vec<Vec<BatchRequest>>> {
        let mut all = Vec::with_capacity(self.len());
        for job in self.iter() {
            all.push(job.get_requests().await?);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::BulkConfig;
    use crate::envelope::fixtures;
    use crate::error::ErrorKind;
    use crate::testing::{client_for, client_with_config, path, ScriptedTransport};
    use crate::types::BatchState;

    fn job(transport: Arc<ScriptedTransport>, xml: &str) -> Job {
        Job::from_info(&client_for(transport), JobInfo::parse(xml).unwrap())
    }

    fn accounts(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| Record::new().with("Name", format!("Account {i}")))
            .collect()
    }

    #[test]
    fn test_validation_rules() {
        let cases = [
            (JobRequest::new(Operation::Upsert, "Account"), false),
            (
                JobRequest::new(Operation::Upsert, "Account").with_external_id_field("Ext_Id__c"),
                true,
            ),
            (
                JobRequest::new(Operation::Insert, "Account").with_external_id_field("Ext_Id__c"),
                false,
            ),
            (
                JobRequest::new(Operation::Query, "Account").with_external_id_field("Id"),
                false,
            ),
            (JobRequest::new(Operation::Insert, ""), false),
            (JobRequest::new(Operation::Insert, "Account; DROP"), false),
            (JobRequest::new(Operation::Delete, "ns__Widget__c"), true),
        ];
        for (request, valid) in cases {
            assert_eq!(request.validate().is_ok(), valid, "{request:?}");
        }
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_request_before_network() {
        let transport = Arc::new(ScriptedTransport::new());
        let client = client_for(transport.clone());

        let err = Job::create(&client, JobRequest::new(Operation::Upsert, "Account"))
            .await
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Validation(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_posts_descriptor() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job"), fixtures::job_info("750x", "Open", 0, 0));
        let client = client_for(transport.clone());

        let request = JobRequest::new(Operation::Upsert, "Contact")
            .with_external_id_field("Email__c")
            .with_concurrency_mode(ConcurrencyMode::Serial);
        let job = Job::create(&client, request).await.unwrap();

        assert_eq!(job.id(), "750x");
        assert!(job.is_open());
        let call = &transport.calls()[0];
        assert_eq!(call.header("Content-Type"), Some("application/xml; charset=UTF-8"));
        let body = call.body.as_deref().unwrap();
        assert!(body.contains("<operation>upsert</operation>"));
        assert!(body.contains("<externalIdFieldName>Email__c</externalIdFieldName>"));
        assert!(body.contains("<concurrencyMode>Serial</concurrencyMode>"));
    }

    #[test]
    fn test_finished_when_closed_and_no_pending_batches() {
        let transport = Arc::new(ScriptedTransport::new());

        let done = job(transport.clone(), &fixtures::job_info("750x", "Closed", 0, 0));
        assert!(done.is_finished());
        assert!(done.batches_finished());
        assert!(done.is_successful());

        let running = job(transport.clone(), &fixtures::job_info("750x", "Closed", 0, 1));
        assert!(!running.is_finished());

        let open = job(transport.clone(), &fixtures::job_info("750x", "Open", 0, 0));
        assert!(!open.is_finished());
        assert!(open.can_create_batches());

        let aborted = job(transport.clone(), &fixtures::job_info("750x", "Aborted", 1, 0));
        assert!(aborted.is_finished());
        assert!(!aborted.is_successful());

        let failed_records = job(
            transport,
            &fixtures::job_info_with("750x", "insert", "CSV", "Closed", 0, 0, 0, 2),
        );
        assert!(failed_records.is_finished());
        assert!(!failed_records.is_successful());
        assert!(failed_records.is_state("closed"));
    }

    #[tokio::test]
    async fn test_add_batches_requires_open_job() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut job = job(transport.clone(), &fixtures::job_info("750x", "Closed", 0, 0));

        let err = job.add_batches(accounts(3), None).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::State(_)));
        assert!(transport.calls().is_empty());
        assert!(job.batches().is_empty());
    }

    #[tokio::test]
    async fn test_add_batches_rejects_empty_and_oversized() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut job = job(transport.clone(), &fixtures::job_info("750x", "Open", 0, 0));

        let err = job.add_batches(Vec::new(), None).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidInput(_)));
        let err = job.add_batches(accounts(1), Some(10_001)).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidInput(_)));
        let err = job.add_batches(accounts(1), Some(0)).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidInput(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_add_batches_submits_chunks_in_order() {
        let transport = Arc::new(ScriptedTransport::new());
        for id in ["751a", "751b", "751c"] {
            transport.on(
                "POST",
                &path("job/750x/batch"),
                fixtures::batch_info(id, "750x", "Queued", 0, 0),
            );
        }
        let mut job = job(transport.clone(), &fixtures::job_info("750x", "Open", 0, 0));

        let added = job.add_batches(accounts(25), Some(10)).await.unwrap();
        assert_eq!(added, 3);

        let ids: Vec<&str> = job.batches().iter().map(Batch::id).collect();
        assert_eq!(ids, vec!["751a", "751b", "751c"]);
        let sizes: Vec<usize> = job
            .batches()
            .iter()
            .map(|b| b.input().map_or(0, <[Record]>::len))
            .collect();
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(job.batches()[2].ordinal(), 2);

        let first_body = transport.calls()[0].body.clone().unwrap();
        assert!(first_body.starts_with("Name"));
        assert!(first_body.contains("Account 0"));
        assert!(!first_body.contains("Account 10"));
    }

    #[tokio::test]
    async fn test_close_only_from_open() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750x"), fixtures::job_info("750x", "Closed", 1, 0));
        let mut job = job(transport.clone(), &fixtures::job_info("750x", "Open", 0, 0));

        job.close().await.unwrap();
        assert!(job.is_closed());
        let body = transport.calls()[0].body.clone().unwrap();
        assert!(body.contains("<state>Closed</state>"));

        let err = job.close().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::State(_)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_abort_rejected_in_terminal_state() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut job = job(transport.clone(), &fixtures::job_info("750x", "Completed", 0, 0));

        let err = job.abort().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::State(_)));
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_abort_from_closed() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750x"), fixtures::job_info("750x", "Aborted", 0, 0));
        let mut job = job(transport, &fixtures::job_info("750x", "Closed", 1, 0));

        job.abort().await.unwrap();
        assert!(job.is_aborted());
        assert!(job.is_finished());
    }

    #[tokio::test]
    async fn test_refresh_of_terminal_job_is_stable() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("GET", &path("job/750x"), fixtures::job_info("750x", "Completed", 0, 0));
        transport.on("GET", &path("job/750x"), fixtures::job_info("750x", "Open", 0, 0));
        let mut job = job(transport, &fixtures::job_info("750x", "Completed", 0, 0));

        job.refresh().await.unwrap();
        assert_eq!(job.state(), Some(JobState::Completed));
        job.refresh().await.unwrap();
        assert_eq!(job.state(), Some(JobState::Completed));
        assert!(job.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_results_flattens_in_batch_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750x/batch"), fixtures::batch_info("751a", "750x", "Queued", 0, 0));
        transport.on("POST", &path("job/750x/batch"), fixtures::batch_info("751b", "750x", "Queued", 0, 0));
        transport.on(
            "GET",
            &path("job/750x/batch/751a/result"),
            "Id,Success,Created,Error\n001a,true,true,\n001b,true,false,\n",
        );
        transport.on(
            "GET",
            &path("job/750x/batch/751b/result"),
            "Id,Success,Created,Error\n,false,false,DUPLICATE_VALUE\n",
        );
        transport.delay(
            "GET",
            &path("job/750x/batch/751a/result"),
            std::time::Duration::from_millis(50),
        );
        let config = BulkConfig::builder().with_max_concurrent_requests(2).build();
        let client = client_with_config(transport.clone(), config);
        let mut job = Job::from_info(
            &client,
            JobInfo::parse(&fixtures::job_info("750x", "Open", 0, 0)).unwrap(),
        );
        let records = accounts(3);
        job.add_batches(records.clone(), Some(2)).await.unwrap();

        let results = job.get_results().await.unwrap();
        assert_eq!(results.len(), 3);
        let ids: Vec<Option<&str>> = results.iter().map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec![Some("001a"), Some("001b"), None]);
        assert_eq!(results[2].input.as_ref(), Some(&records[2]));
        assert_eq!(results.count(crate::ResultFilter::Created), 1);
        assert_eq!(results.count(crate::ResultFilter::Updated), 1);
        assert_eq!(results.count(crate::ResultFilter::Error), 1);

        // The second batch's results arrived first.
        let fetched: Vec<String> = transport
            .completed()
            .into_iter()
            .filter(|p| p.ends_with("/result"))
            .collect();
        assert_eq!(
            fetched,
            vec![path("job/750x/batch/751b/result"), path("job/750x/batch/751a/result")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_requests_in_batch_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750x/batch"), fixtures::batch_info("751a", "750x", "Queued", 0, 0));
        transport.on("POST", &path("job/750x/batch"), fixtures::batch_info("751b", "750x", "Queued", 0, 0));
        transport.on("GET", &path("job/750x/batch/751a/request"), "Name\nAccount 0\nAccount 1\n");
        transport.on("GET", &path("job/750x/batch/751b/request"), "Name\nAccount 2\n");
        transport.delay(
            "GET",
            &path("job/750x/batch/751a/request"),
            std::time::Duration::from_millis(50),
        );
        let config = BulkConfig::builder().with_max_concurrent_requests(2).build();
        let client = client_with_config(transport.clone(), config);
        let mut job = Job::from_info(
            &client,
            JobInfo::parse(&fixtures::job_info("750x", "Open", 0, 0)).unwrap(),
        );
        job.add_batches(accounts(3), Some(2)).await.unwrap();

        let requests = job.get_requests().await.unwrap();
        assert_eq!(
            requests,
            vec![
                BatchRequest::Records(accounts(2)),
                BatchRequest::Records(vec![Record::new().with("Name", "Account 2")]),
            ]
        );
        assert_eq!(
            transport.completed().last(),
            Some(&path("job/750x/batch/751a/request"))
        );

        let jobs = JobCollection::from(vec![job]);
        let all = jobs.get_requests().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_batches_keeps_known_input() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750x/batch"), fixtures::batch_info("751a", "750x", "Queued", 0, 0));
        transport.on(
            "GET",
            &path("job/750x/batch"),
            fixtures::batch_info_list(&[("751z", "750x", "Completed"), ("751a", "750x", "InProgress")]),
        );
        let mut job = job(transport, &fixtures::job_info("750x", "Open", 0, 0));
        job.add_batches(accounts(2), None).await.unwrap();

        job.refresh_batches().await.unwrap();
        let batches = job.batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].id(), "751z");
        assert!(batches[0].input().is_none());
        assert_eq!(batches[1].id(), "751a");
        assert_eq!(batches[1].input().map(<[Record]>::len), Some(2));
        assert_eq!(batches[1].state(), Some(BatchState::InProgress));
    }

    #[tokio::test]
    async fn test_find_loads_job_and_batches() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("GET", &path("job/750x"), fixtures::job_info("750x", "Closed", 0, 1));
        transport.on(
            "GET",
            &path("job/750x/batch"),
            fixtures::batch_info_list(&[("751a", "750x", "InProgress")]),
        );
        let client = client_for(transport);

        let job = Job::find(&client, "750x").await.unwrap();
        assert!(job.is_closed());
        assert_eq!(job.batches().len(), 1);
        assert_eq!(job.snapshot().batches[0].id, "751a");
    }

    #[tokio::test]
    async fn test_query_job_flow_guards() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750q/batch"), fixtures::batch_info("751q", "750q", "Queued", 0, 0));
        let mut job = job(
            transport.clone(),
            &fixtures::job_info_with("750q", "query", "CSV", "Open", 0, 0, 0, 0),
        );

        let err = job.add_batches(accounts(1), None).await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidInput(_)));

        let batch = job.add_query("SELECT Id FROM Account").await.unwrap();
        assert!(batch.is_query());
        assert_eq!(transport.calls()[0].body.as_deref(), Some("SELECT Id FROM Account"));

        let err = job.get_results().await.unwrap_err();
        assert!(matches!(err.kind, ErrorKind::State(_)));
    }

    #[tokio::test]
    async fn test_job_collection() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("POST", &path("job/750a"), fixtures::job_info("750a", "Closed", 0, 0));
        let mut jobs: JobCollection = vec![
            job(transport.clone(), &fixtures::job_info("750a", "Open", 0, 0)),
            job(transport.clone(), &fixtures::job_info("750b", "Completed", 0, 0)),
        ]
        .into();
        assert_eq!(jobs.count(JobFilter::Open), 1);

        jobs.close_all().await.unwrap();
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(jobs.count(JobFilter::Finished), 2);
        assert_eq!(jobs.select(JobFilter::Successful).len(), 2);
    }
}
