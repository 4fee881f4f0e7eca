//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::chunk::MAX_BATCH_SIZE;
use crate::codec::HeaderPolicy;
use crate::error::Result;

/// Default API version for `/services/async/{version}`.
pub const DEFAULT_API_VERSION: &str = busbar_sf_session::DEFAULT_API_VERSION;

/// Default polling interval for job status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default maximum wait time for job completion.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(3600);

/// Default bound on concurrent batch refreshes and result downloads.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// Configuration for [`AsyncBulkClient`](crate::AsyncBulkClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkConfig {
    /// API version.
    pub api_version: String,
    /// Records per batch when the caller does not choose.
    pub batch_size: usize,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Deadline for a job to finish once polling starts.
    pub max_wait: Duration,
    /// CSV header handling for records with differing keys.
    pub header_policy: HeaderPolicy,
    /// Maximum in-flight batch requests per job.
    pub max_concurrent_requests: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            batch_size: MAX_BATCH_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            header_policy: HeaderPolicy::default(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }
}

impl BulkConfig {
    /// Create a new config builder.
    pub fn builder() -> BulkConfigBuilder {
        BulkConfigBuilder::default()
    }
}

/// Builder for BulkConfig.
#[derive(Debug, Default)]
pub struct BulkConfigBuilder {
    config: BulkConfig,
}

impl BulkConfigBuilder {
    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.config.api_version = version.into();
        self
    }

    /// Set the default batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the polling interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the maximum wait.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.config.max_wait = max_wait;
        self
    }

    /// Set the CSV header policy.
    pub fn with_header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.config.header_policy = policy;
        self
    }

    /// Set the concurrency bound (at least 1).
    pub fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.config.max_concurrent_requests = max.max(1);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> BulkConfig {
        self.config
    }
}

/// Optional engine settings as read from an options file.
///
/// ```json
/// { "version": "62.0", "batch_size": 5000, "timeout": 2, "header_policy": "widen" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BulkOptions {
    #[serde(alias = "version")]
    pub api_version: Option<String>,
    pub batch_size: Option<usize>,
    /// Poll interval in seconds.
    #[serde(alias = "timeout")]
    pub poll_interval_secs: Option<u64>,
    pub max_wait_secs: Option<u64>,
    pub header_policy: Option<HeaderPolicy>,
    pub max_concurrent_requests: Option<usize>,
}

impl BulkOptions {
    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Apply these options on top of the defaults.
    pub fn into_config(self) -> BulkConfig {
        let mut builder = BulkConfig::builder();
        if let Some(version) = self.api_version {
            builder = builder.with_api_version(version);
        }
        if let Some(size) = self.batch_size {
            builder = builder.with_batch_size(size);
        }
        if let Some(secs) = self.poll_interval_secs {
            builder = builder.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = self.max_wait_secs {
            builder = builder.with_max_wait(Duration::from_secs(secs));
        }
        if let Some(policy) = self.header_policy {
            builder = builder.with_header_policy(policy);
        }
        if let Some(max) = self.max_concurrent_requests {
            builder = builder.with_max_concurrent_requests(max);
        }
        builder.build()
    }
}
