//! Asynchronous Bulk API client.
//!
//! Owns the transport and session seams and exposes the one-call
//! insert/update/upsert/delete/query flows built on [`Job`].

use std::fmt;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use busbar_sf_session::SessionInfo;
use busbar_sf_transport::{
    sanitize_error_message, HttpTransport, Response, Transport, TransportConfig,
};

use crate::config::BulkConfig;
use crate::envelope::error_details;
use crate::error::{Error, ErrorKind, Result};
use crate::job::{Job, JobRequest};
use crate::result::ResultCollection;
use crate::types::{Operation, Record};

/// Content type of job and batch status documents.
pub(crate) const XML_CONTENT_TYPE: &str = "application/xml; charset=UTF-8";

/// Salesforce asynchronous Bulk API client.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use busbar_sf_async_bulk::{AsyncBulkClient, BulkConfig, Record};
/// use busbar_sf_session::StaticSession;
///
/// let session = Arc::new(StaticSession::new("na1.salesforce.com", "00D..."));
/// let client = AsyncBulkClient::connect(session, BulkConfig::default())?;
///
/// let records = vec![Record::new().with("Name", "Acme")];
/// let outcome = client.insert("Account", records).await?;
/// println!("{} created", outcome.results.iter().filter(|r| r.is_created()).count());
/// ```
#[derive(Clone)]
pub struct AsyncBulkClient {
    transport: Arc<dyn Transport>,
    session: Arc<dyn SessionInfo>,
    config: BulkConfig,
}

impl AsyncBulkClient {
    /// Create a client over an existing transport.
    pub fn new(
        transport: Arc<dyn Transport>,
        session: Arc<dyn SessionInfo>,
        config: BulkConfig,
    ) -> Self {
        Self {
            transport,
            session,
            config,
        }
    }

    /// Create a client with an HTTP transport using default settings.
    pub fn connect(session: Arc<dyn SessionInfo>, config: BulkConfig) -> Result<Self> {
        Self::connect_with(session, config, TransportConfig::default())
    }

    /// Create a client with an HTTP transport using `transport_config`.
    pub fn connect_with(
        session: Arc<dyn SessionInfo>,
        config: BulkConfig,
        transport_config: TransportConfig,
    ) -> Result<Self> {
        let transport = HttpTransport::new(session.clone(), transport_config)?;
        Ok(Self::new(Arc::new(transport), session, config))
    }

    /// Engine configuration.
    pub fn config(&self) -> &BulkConfig {
        &self.config
    }

    // =========================================================================
    // Jobs
    // =========================================================================

    /// Create a job. Parameters are validated before any request is sent.
    pub async fn create_job(&self, request: JobRequest) -> Result<Job> {
        Job::create(self, request).await
    }

    /// Look up an existing job by id, with its batches.
    pub async fn find_job(&self, job_id: &str) -> Result<Job> {
        Job::find(self, job_id).await
    }

    // =========================================================================
    // One-call flows
    // =========================================================================

    /// Insert records into `object` and wait for the results.
    pub async fn insert(&self, object: &str, records: Vec<Record>) -> Result<OperationResult> {
        self.perform(JobRequest::new(Operation::Insert, object), records)
            .await
    }

    /// Update records of `object` by `Id` and wait for the results.
    pub async fn update(&self, object: &str, records: Vec<Record>) -> Result<OperationResult> {
        self.perform(JobRequest::new(Operation::Update, object), records)
            .await
    }

    /// Upsert records of `object` matched on `external_id_field`.
    pub async fn upsert(
        &self,
        object: &str,
        external_id_field: &str,
        records: Vec<Record>,
    ) -> Result<OperationResult> {
        let request =
            JobRequest::new(Operation::Upsert, object).with_external_id_field(external_id_field);
        self.perform(request, records).await
    }

    /// Delete records of `object` by `Id`.
    pub async fn delete(&self, object: &str, records: Vec<Record>) -> Result<OperationResult> {
        self.perform(JobRequest::new(Operation::Delete, object), records)
            .await
    }

    /// Run a SOQL query against `object` and return its rows.
    #[instrument(skip(self))]
    pub async fn query(&self, object: &str, soql: &str) -> Result<Vec<Record>> {
        let mut job = self
            .create_job(JobRequest::new(Operation::Query, object))
            .await?;
        if let Err(err) = job.add_query(soql).await {
            self.abandon(&mut job).await;
            return Err(err);
        }
        job.close().await?;
        job.poll_until_finished(None).await?;
        job.get_query_rows().await
    }

    /// Create a job for `request`, submit `records` in batches, close the
    /// job and wait for it to finish.
    #[instrument(skip(self, request, records), fields(object = %request.object(), operation = %request.operation(), records = records.len()))]
    pub async fn perform(&self, request: JobRequest, records: Vec<Record>) -> Result<OperationResult> {
        if records.is_empty() {
            return Err(Error::invalid_input("No records to submit"));
        }

        let mut job = self.create_job(request).await?;
        if let Err(err) = job.add_batches(records, None).await {
            self.abandon(&mut job).await;
            return Err(err);
        }
        job.close().await?;
        job.poll_until_finished(None).await?;
        let results = job.get_results().await?;
        Ok(OperationResult { job, results })
    }

    async fn abandon(&self, job: &mut Job) {
        if let Err(err) = job.abort().await {
            warn!(job_id = job.id(), error = %err, "Failed to abort job after submission error");
        }
    }

    // =========================================================================
    // Requests
    // =========================================================================

    fn path(&self, suffix: &str) -> String {
        format!("/services/async/{}/{}", self.config.api_version, suffix)
    }

    fn headers(&self, content_type: Option<&str>) -> Result<Vec<(String, String)>> {
        if !self.session.is_active() {
            return Err(Error::new(ErrorKind::NotAuthenticated));
        }
        let token = self
            .session
            .session_token()
            .ok_or_else(|| Error::new(ErrorKind::NotAuthenticated))?;

        let mut headers = vec![("X-SFDC-Session".to_string(), token)];
        if let Some(content_type) = content_type {
            headers.push(("Content-Type".to_string(), content_type.to_string()));
        }
        Ok(headers)
    }

    /// POST to `/services/async/{version}/{suffix}` and return the body.
    pub(crate) async fn post(&self, suffix: &str, body: String, content_type: &str) -> Result<String> {
        let headers = self.headers(Some(content_type))?;
        let path = self.path(suffix);
        debug!(path = %path, bytes = body.len(), "POST");
        let response = self.transport.post(&path, body, &headers).await?;
        check_response(response)
    }

    /// GET `/services/async/{version}/{suffix}` and return the body.
    pub(crate) async fn get(&self, suffix: &str) -> Result<String> {
        let headers = self.headers(None)?;
        let path = self.path(suffix);
        debug!(path = %path, "GET");
        let response = self.transport.get(&path, &headers).await?;
        check_response(response)
    }
}

impl fmt::Debug for AsyncBulkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncBulkClient")
            .field("instance", &self.session.instance_host())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn check_response(response: Response) -> Result<String> {
    if response.is_success() {
        return Ok(response.body);
    }

    let (code, message) = error_details(&response.body);
    let message = message.unwrap_or_else(|| response.body.clone());
    Err(Error::new(ErrorKind::RemoteService {
        status: response.status,
        code,
        message: sanitize_error_message(&message),
    }))
}

/// Finished job together with its flattened per-record results.
#[derive(Debug)]
pub struct OperationResult {
    pub job: Job,
    pub results: ResultCollection,
}

impl OperationResult {
    /// True if the job finished without failed batches or records.
    pub fn is_successful(&self) -> bool {
        self.job.is_successful() && !self.results.any_failures()
    }
}
