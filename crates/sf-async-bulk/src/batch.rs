//! Batches: one submitted chunk of records, or one query.

use tracing::{debug, info, instrument};

use crate::client::AsyncBulkClient;
use crate::codec;
use crate::correlate::correlate;
use crate::envelope::{parse_result_list, BatchInfo};
use crate::error::{Error, Result};
use crate::filter::{BatchFilter, Collection, FilterEntry, Filterable};
use crate::result::ResultCollection;
use crate::types::{BatchState, ContentType, Record};

/// Payload of a batch as stored by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRequest {
    Records(Vec<Record>),
    Query(String),
}

/// A batch of a job.
///
/// Batches submitted through [`Job::add_batches`](crate::Job::add_batches)
/// keep their input records so results can be paired with them. Batches
/// rediscovered from the service have no input.
#[derive(Debug)]
pub struct Batch {
    client: AsyncBulkClient,
    info: BatchInfo,
    ordinal: usize,
    content_type: ContentType,
    query: bool,
    input: Option<Vec<Record>>,
    soql: Option<String>,
    results: Option<ResultCollection>,
    rows: Option<Vec<Record>>,
}

impl Batch {
    /// Submit `records` as a new batch of `job_id`.
    pub(crate) async fn submit_records(
        client: &AsyncBulkClient,
        job_id: &str,
        ordinal: usize,
        content_type: ContentType,
        records: Vec<Record>,
    ) -> Result<Self> {
        let payload = codec::encode(&records, content_type, client.config().header_policy)?;
        let body = client
            .post(&format!("job/{job_id}/batch"), payload, content_type.mime_type())
            .await?;
        let info = BatchInfo::parse(&body)?;
        info!(job_id, batch_id = %info.id, ordinal, records = records.len(), "Batch submitted");

        let mut batch = Self::from_info(client, info, ordinal, content_type, false);
        batch.input = Some(records);
        Ok(batch)
    }

    /// Submit `soql` as a query batch of `job_id`.
    pub(crate) async fn submit_query(
        client: &AsyncBulkClient,
        job_id: &str,
        ordinal: usize,
        content_type: ContentType,
        soql: &str,
    ) -> Result<Self> {
        let body = client
            .post(
                &format!("job/{job_id}/batch"),
                soql.to_string(),
                content_type.mime_type(),
            )
            .await?;
        let info = BatchInfo::parse(&body)?;
        info!(job_id, batch_id = %info.id, "Query batch submitted");

        let mut batch = Self::from_info(client, info, ordinal, content_type, true);
        batch.soql = Some(soql.to_string());
        Ok(batch)
    }

    /// Load batch `batch_id` of `job_id`.
    pub(crate) async fn find(
        client: &AsyncBulkClient,
        job_id: &str,
        batch_id: &str,
        ordinal: usize,
        content_type: ContentType,
        query: bool,
    ) -> Result<Self> {
        let body = client.get(&format!("job/{job_id}/batch/{batch_id}")).await?;
        let info = BatchInfo::parse(&body)?;
        Ok(Self::from_info(client, info, ordinal, content_type, query))
    }

    pub(crate) fn from_info(
        client: &AsyncBulkClient,
        info: BatchInfo,
        ordinal: usize,
        content_type: ContentType,
        query: bool,
    ) -> Self {
        Self {
            client: client.clone(),
            info,
            ordinal,
            content_type,
            query,
            input: None,
            soql: None,
            results: None,
            rows: None,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn job_id(&self) -> &str {
        &self.info.job_id
    }

    /// Position within the job, in submission order.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    pub fn info(&self) -> &BatchInfo {
        &self.info
    }

    pub fn state(&self) -> Option<BatchState> {
        self.info.state
    }

    pub fn state_message(&self) -> Option<&str> {
        self.info.state_message.as_deref()
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Records submitted in this batch, if it was created by this client.
    pub fn input(&self) -> Option<&[Record]> {
        self.input.as_deref()
    }

    /// Query text, if this batch was submitted by this client.
    pub fn soql(&self) -> Option<&str> {
        self.soql.as_deref()
    }

    pub fn records_processed(&self) -> u64 {
        self.info.number_records_processed
    }

    pub fn records_failed(&self) -> u64 {
        self.info.number_records_failed
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    pub fn is_query(&self) -> bool {
        self.query
    }

    pub fn is_queued(&self) -> bool {
        self.info.state == Some(BatchState::Queued)
    }

    pub fn is_in_progress(&self) -> bool {
        self.info.state == Some(BatchState::InProgress)
    }

    pub fn is_completed(&self) -> bool {
        self.info.state == Some(BatchState::Completed)
    }

    pub fn is_failed(&self) -> bool {
        self.info.state == Some(BatchState::Failed)
    }

    pub fn is_not_processed(&self) -> bool {
        self.info.state == Some(BatchState::NotProcessed)
    }

    /// Completed or Failed.
    pub fn is_finished(&self) -> bool {
        self.is_completed() || self.is_failed()
    }

    /// Failed, or any record failed.
    pub fn has_errors(&self) -> bool {
        self.is_failed() || self.info.number_records_failed > 0
    }

    pub fn is_successful(&self) -> bool {
        self.is_completed() && !self.has_errors()
    }

    /// Case-insensitive state comparison.
    pub fn is_state(&self, name: &str) -> bool {
        self.info
            .state
            .is_some_and(|state| state.as_str().eq_ignore_ascii_case(name))
    }

    // =========================================================================
    // Service calls
    // =========================================================================

    fn path(&self, suffix: &str) -> String {
        format!("job/{}/batch/{}{}", self.info.job_id, self.info.id, suffix)
    }

    /// Re-read this batch's status.
    #[instrument(skip(self), fields(batch_id = %self.info.id))]
    pub async fn refresh(&mut self) -> Result<()> {
        let body = self.client.get(&self.path("")).await?;
        let observed = BatchInfo::parse(&body)?;
        self.update(observed);
        debug!(state = ?self.info.state, "Batch refreshed");
        Ok(())
    }

    /// Adopt `observed`, keeping the current state on a backward move.
    pub(crate) fn update(&mut self, observed: BatchInfo) {
        let state = match (self.info.state, observed.state) {
            (Some(current), Some(next)) => Some(current.advance(next, &self.info.id)),
            (current, next) => next.or(current),
        };
        self.info = BatchInfo { state, ..observed };
    }

    /// Per-record results, fetched once and cached.
    pub async fn results(&mut self) -> Result<&ResultCollection> {
        if self.query {
            return Err(Error::state(format!(
                "batch {} is a query batch; use query_rows",
                self.info.id
            )));
        }
        let results = match self.results.take() {
            Some(results) => results,
            None => self.fetch_results().await?,
        };
        Ok(self.results.insert(results))
    }

    #[instrument(skip(self), fields(batch_id = %self.info.id))]
    async fn fetch_results(&self) -> Result<ResultCollection> {
        let body = self.client.get(&self.path("/result")).await?;
        let outcomes = codec::decode(&body, self.content_type)?;
        let results = correlate(self.input.as_deref(), outcomes)?;
        debug!(results = results.len(), "Batch results fetched");
        Ok(results.into())
    }

    pub(crate) fn cached_results(&self) -> Option<&ResultCollection> {
        self.results.as_ref()
    }

    pub(crate) fn cached_rows(&self) -> Option<&[Record]> {
        self.rows.as_deref()
    }

    /// Rows of a query batch, fetched once and cached.
    pub async fn query_rows(&mut self) -> Result<&[Record]> {
        if !self.query {
            return Err(Error::state(format!(
                "batch {} is not a query batch; use results",
                self.info.id
            )));
        }
        let rows = match self.rows.take() {
            Some(rows) => rows,
            None => self.fetch_rows().await?,
        };
        Ok(self.rows.insert(rows))
    }

    #[instrument(skip(self), fields(batch_id = %self.info.id))]
    async fn fetch_rows(&self) -> Result<Vec<Record>> {
        let list = self.client.get(&self.path("/result")).await?;
        let mut rows = Vec::new();
        for result_id in parse_result_list(&list)? {
            let body = self
                .client
                .get(&self.path(&format!("/result/{result_id}")))
                .await?;
            rows.extend(codec::decode_records(&body, self.content_type)?);
        }
        debug!(rows = rows.len(), "Query rows fetched");
        Ok(rows)
    }

    /// Re-read the payload the service stored for this batch.
    #[instrument(skip(self), fields(batch_id = %self.info.id))]
    pub async fn fetch_request(&self) -> Result<BatchRequest> {
        let body = self.client.get(&self.path("/request")).await?;
        if self.query {
            return Ok(BatchRequest::Query(body.trim().to_string()));
        }
        Ok(BatchRequest::Records(codec::decode_records(
            &body,
            self.content_type,
        )?))
    }
}

static BATCH_FILTERS: &[FilterEntry<Batch, BatchFilter>] = &[
    FilterEntry {
        filter: BatchFilter::InProgress,
        name: "in_progress",
        predicate: Batch::is_in_progress,
    },
    FilterEntry {
        filter: BatchFilter::Queued,
        name: "queued",
        predicate: Batch::is_queued,
    },
    FilterEntry {
        filter: BatchFilter::Completed,
        name: "completed",
        predicate: Batch::is_completed,
    },
    FilterEntry {
        filter: BatchFilter::Failed,
        name: "failed",
        predicate: Batch::is_failed,
    },
    FilterEntry {
        filter: BatchFilter::NotProcessed,
        name: "not_processed",
        predicate: Batch::is_not_processed,
    },
    FilterEntry {
        filter: BatchFilter::Finished,
        name: "finished",
        predicate: Batch::is_finished,
    },
    FilterEntry {
        filter: BatchFilter::Successful,
        name: "successful",
        predicate: Batch::is_successful,
    },
];

impl Filterable for Batch {
    type Filter = BatchFilter;

    fn filters() -> &'static [FilterEntry<Self, BatchFilter>] {
        BATCH_FILTERS
    }
}

/// Ordered batches of a job.
pub type BatchCollection = Collection<Batch>;

impl BatchCollection {
    pub async fn refresh_all(&mut self) -> Result<()> {
        for batch in self.iter_mut() {
            batch.refresh().await?;
        }
        Ok(())
    }

    /// Submitted payload of each batch, in collection order.
    pub async fn get_requests(&self) -> Result<Vec<BatchRequest>> {
        let mut requests = Vec::with_capacity(self.len());
        for batch in self.iter() {
            requests.push(batch.fetch_request().await?);
        }
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::envelope::fixtures;
    use crate::error::ErrorKind;
    use crate::testing::{client_for, path, ScriptedTransport};

    fn batch(transport: Arc<ScriptedTransport>, state: &str, failed: u64) -> Batch {
        let client = client_for(transport);
        let info = BatchInfo::parse(&fixtures::batch_info("751x", "750x", state, 2, failed)).unwrap();
        Batch::from_info(&client, info, 0, ContentType::Csv, false)
    }

    #[test]
    fn test_predicates() {
        let transport = Arc::new(ScriptedTransport::new());

        let completed = batch(transport.clone(), "Completed", 0);
        assert!(completed.is_finished());
        assert!(completed.is_successful());
        assert!(!completed.has_errors());
        assert!(completed.is_state("COMPLETED"));

        let partial = batch(transport.clone(), "Completed", 1);
        assert!(partial.has_errors());
        assert!(!partial.is_successful());

        let failed = batch(transport.clone(), "Failed", 0);
        assert!(failed.is_finished());
        assert!(failed.has_errors());

        let pending = batch(transport.clone(), "NotProcessed", 0);
        assert!(pending.is_not_processed());
        assert!(!pending.is_finished());

        let queued = batch(transport, "Queued", 0);
        assert!(queued.is_queued());
        assert!(!queued.is_in_progress());
    }

    #[test]
    fn test_batch_filters() {
        let transport = Arc::new(ScriptedTransport::new());
        let batches: BatchCollection = vec![
            batch(transport.clone(), "Completed", 0),
            batch(transport.clone(), "InProgress", 0),
            batch(transport.clone(), "Failed", 0),
            batch(transport, "Completed", 3),
        ]
        .into();

        assert_eq!(batches.count(BatchFilter::Finished), 3);
        assert_eq!(batches.count(BatchFilter::Successful), 1);
        assert_eq!(batches.count(BatchFilter::InProgress), 1);
        assert_eq!(batches.select_named("failed").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_ignores_backward_state() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            "GET",
            &path("job/750x/batch/751x"),
            fixtures::batch_info("751x", "750x", "InProgress", 0, 0),
        );
        let mut batch = batch(transport, "Completed", 0);

        batch.refresh().await.unwrap();
        assert_eq!(batch.state(), Some(BatchState::Completed));
    }

    #[tokio::test]
    async fn test_results_are_correlated_and_cached() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            "POST",
            &path("job/750x/batch"),
            fixtures::batch_info("751x", "750x", "Queued", 0, 0),
        );
        transport.on(
            "GET",
            &path("job/750x/batch/751x/result"),
            "\"Id\",\"Success\",\"Created\",\"Error\"\n\
             \"0015000000abc\",\"true\",\"true\",\"\"\n\
             \"\",\"false\",\"false\",\"REQUIRED_FIELD_MISSING:Required fields are missing: [Name]:Name --\"\n",
        );
        let client = client_for(transport.clone());
        let records = vec![
            Record::new().with("Name", "Acme"),
            Record::new().with("Phone", "555"),
        ];

        let mut batch = Batch::submit_records(&client, "750x", 0, ContentType::Csv, records.clone())
            .await
            .unwrap();
        let post = &transport.calls()[0];
        assert_eq!(post.header("Content-Type"), Some("text/csv; charset=UTF-8"));

        let results = batch.results().await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_created());
        assert_eq!(results[0].input.as_ref(), Some(&records[0]));
        assert!(results[1].is_error());
        assert!(results[1].error.as_deref().unwrap().starts_with("REQUIRED_FIELD_MISSING"));

        batch.results().await.unwrap();
        assert_eq!(transport.count("GET", &path("job/750x/batch/751x/result")), 1);
    }

    #[tokio::test]
    async fn test_result_count_mismatch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            "POST",
            &path("job/750x/batch"),
            fixtures::batch_info("751x", "750x", "Queued", 0, 0),
        );
        transport.on(
            "GET",
            &path("job/750x/batch/751x/result"),
            "Id,Success,Created,Error\n0015000000abc,true,true,\n",
        );
        let client = client_for(transport);
        let records = vec![Record::new().with("Name", "A"), Record::new().with("Name", "B")];

        let mut batch = Batch::submit_records(&client, "750x", 0, ContentType::Csv, records)
            .await
            .unwrap();
        let err = batch.results().await.unwrap_err();
        assert!(matches!(
            err.kind,
            ErrorKind::Correlation {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_query_rows_follow_result_list() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            "GET",
            &path("job/750q/batch/751q/result"),
            r#"<result-list xmlns="http://www.force.com/2009/06/asyncapi/dataload"><result>752a</result><result>752b</result></result-list>"#,
        );
        transport.on("GET", &path("job/750q/batch/751q/result/752a"), "Id,Name\n001a,Acme\n");
        transport.on("GET", &path("job/750q/batch/751q/result/752b"), "Id,Name\n001b,Globex\n");
        let client = client_for(transport);
        let info = BatchInfo::parse(&fixtures::batch_info("751q", "750q", "Completed", 2, 0)).unwrap();
        let mut batch = Batch::from_info(&client, info, 0, ContentType::Csv, true);

        assert!(batch.results().await.is_err());
        let rows = batch.query_rows().await.unwrap();
        let names: Vec<&str> = rows.iter().filter_map(|r| r.get("Name")).collect();
        assert_eq!(names, vec!["Acme", "Globex"]);
    }

    #[tokio::test]
    async fn test_fetch_request() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on("GET", &path("job/750x/batch/751x/request"), "Name,Phone\nAcme,555\n");
        let batch = batch(transport, "Completed", 0);

        let request = batch.fetch_request().await.unwrap();
        assert_eq!(
            request,
            BatchRequest::Records(vec![Record::new().with("Name", "Acme").with("Phone", "555")])
        );
    }

    #[tokio::test]
    async fn test_collection_refresh_and_requests() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.on(
            "GET",
            &path("job/750x/batch/751a"),
            fixtures::batch_info("751a", "750x", "Completed", 1, 0),
        );
        transport.on(
            "GET",
            &path("job/750x/batch/751b"),
            fixtures::batch_info("751b", "750x", "Failed", 0, 0),
        );
        transport.on("GET", &path("job/750x/batch/751a/request"), "Name\nAcme\n");
        transport.on("GET", &path("job/750x/batch/751b/request"), "Name\nGlobex\n");
        let client = client_for(transport);
        let mut batches: BatchCollection = ["751a", "751b"]
            .iter()
            .enumerate()
            .map(|(ordinal, id)| {
                let info = BatchInfo::parse(&fixtures::batch_info(id, "750x", "Queued", 0, 0)).unwrap();
                Batch::from_info(&client, info, ordinal, ContentType::Csv, false)
            })
            .collect();

        batches.refresh_all().await.unwrap();
        assert_eq!(batches.count(BatchFilter::Completed), 1);
        assert_eq!(batches.count(BatchFilter::Failed), 1);

        let requests = batches.get_requests().await.unwrap();
        assert_eq!(
            requests,
            vec![
                BatchRequest::Records(vec![Record::new().with("Name", "Acme")]),
                BatchRequest::Records(vec![Record::new().with("Name", "Globex")]),
            ]
        );
    }
}
