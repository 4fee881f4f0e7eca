//! Waiting for a job to finish.

use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::BulkConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::job::Job;

/// Deadline used when `max_wait` cannot be represented as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Repeatedly refreshes a job until it finishes or the deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    max_wait: Duration,
}

enum Step<T> {
    Done(T),
    Deadline,
    Cancelled,
}

impl Poller {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    pub fn from_config(config: &BulkConfig) -> Self {
        Self::new(config.poll_interval, config.max_wait)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    /// Refresh `job` and its unfinished batches until the job is finished.
    ///
    /// Fails with `Timeout` (carrying the last snapshot) once `max_wait` has
    /// elapsed, and with `Cancelled` as soon as `cancel` fires, even while a
    /// refresh is in flight. Request errors end polling immediately.
    #[instrument(skip(self, job, cancel), fields(job_id = job.id()))]
    pub async fn poll_until_finished(
        &self,
        job: &mut Job,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let start = Instant::now();
        let deadline = start
            .checked_add(self.max_wait)
            .unwrap_or(start + FAR_FUTURE);

        loop {
            let step = {
                let refresh = async {
                    job.refresh().await?;
                    job.refresh_unfinished_batches().await
                };
                tokio::select! {
                    biased;
                    _ = cancelled(cancel) => Step::Cancelled,
                    result = refresh => Step::Done(result),
                    _ = sleep_until(deadline) => Step::Deadline,
                }
            };

            match step {
                Step::Cancelled => return Err(self.cancelled(job)),
                Step::Deadline => return Err(self.timed_out(job, start)),
                Step::Done(result) => result?,
            }

            if job.is_finished() {
                info!(
                    state = ?job.state(),
                    elapsed = ?start.elapsed(),
                    "Job finished"
                );
                return Ok(());
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(job, start));
            }

            let delay = self.interval.min(remaining);
            debug!(?delay, state = ?job.state(), "Job not finished, waiting");
            let step = tokio::select! {
                biased;
                _ = cancelled(cancel) => Step::Cancelled,
                _ = sleep(delay) => Step::Done(()),
            };
            if let Step::Cancelled = step {
                return Err(self.cancelled(job));
            }
        }
    }

    fn timed_out(&self, job: &Job, start: Instant) -> Error {
        let waited = start.elapsed();
        warn!(job_id = job.id(), ?waited, "Timed out waiting for job");
        Error::new(ErrorKind::Timeout {
            waited,
            snapshot: Box::new(job.snapshot()),
        })
    }

    fn cancelled(&self, job: &Job) -> Error {
        info!(job_id = job.id(), "Polling cancelled");
        Error::new(ErrorKind::Cancelled)
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
