//! reqwest-backed transport with retry and compression.

use std::sync::Arc;

use busbar_sf_session::SessionInfo;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, info, instrument, warn};

use crate::config::TransportConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::response::Response;
use crate::retry::{is_retryable_status, RetryPolicy};
use crate::transport::{Headers, Transport};

/// HTTP transport that resolves paths against the session's instance.
#[derive(Clone)]
pub struct HttpTransport {
    inner: reqwest::Client,
    config: TransportConfig,
    session: Arc<dyn SessionInfo>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .field("instance_url", &self.session.instance_url())
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    /// Create a transport for the given session.
    pub fn new(session: Arc<dyn SessionInfo>, config: TransportConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.accept_compressed)
            .deflate(config.accept_compressed)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        Ok(Self {
            inner,
            config,
            session,
        })
    }

    /// Create a transport with default configuration.
    pub fn with_default_config(session: Arc<dyn SessionInfo>) -> Result<Self> {
        Self::new(session, TransportConfig::default())
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<String> {
        let base = self
            .session
            .instance_url()
            .filter(|_| self.session.is_active())
            .ok_or_else(|| Error::new(ErrorKind::NotConnected))?;
        let url = format!("{}{}", base.trim_end_matches('/'), path);
        url::Url::parse(&url)?;
        Ok(url)
    }

    #[instrument(skip(self, body, headers))]
    async fn execute(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<String>,
        headers: &Headers,
    ) -> Result<Response> {
        let url = self.url(path)?;
        let mut retry_policy = self.config.retry.clone().map(RetryPolicy::new);

        loop {
            let result = self
                .execute_once(method.clone(), &url, body.clone(), headers)
                .await;

            let retry_after = match &result {
                Ok(response) if is_retryable_status(response.status) => response.retry_after(),
                Err(err) if err.is_retryable() => None,
                _ => return result,
            };

            let Some(delay) = retry_policy
                .as_mut()
                .and_then(|policy| policy.next_delay(retry_after))
            else {
                return result;
            };

            warn!(
                attempt = retry_policy.as_ref().map(|p| p.attempt()).unwrap_or_default(),
                delay_ms = delay.as_millis() as u64,
                outcome = %describe(&result),
                "Request failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn execute_once(
        &self,
        method: reqwest::Method,
        url: &str,
        body: Option<String>,
        headers: &Headers,
    ) -> Result<Response> {
        let mut request = self.inner.request(method.clone(), url);

        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if self.config.accept_compressed {
            request = request.header("Accept-Encoding", "gzip, deflate");
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        if self.config.enable_tracing {
            debug!(%method, %url, "Sending request");
        }

        let response = request.send().await?;
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        if self.config.enable_tracing {
            if (200..300).contains(&status) {
                debug!(status, content_length = body.len(), "Response received");
            } else {
                info!(status, content_length = body.len(), "Non-success response");
            }
        }

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

fn describe(result: &Result<Response>) -> String {
    match result {
        Ok(response) => format!("HTTP {}", response.status),
        Err(err) => err.to_string(),
    }
}

impl Transport for HttpTransport {
    fn post<'a>(
        &'a self,
        path: &'a str,
        body: String,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<Response>> {
        self.execute(reqwest::Method::POST, path, Some(body), headers)
            .boxed()
    }

    fn get<'a>(&'a self, path: &'a str, headers: &'a Headers) -> BoxFuture<'a, Result<Response>> {
        self.execute(reqwest::Method::GET, path, None, headers)
            .boxed()
    }
}
