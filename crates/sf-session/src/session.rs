//! The `SessionInfo` provider interface and a static implementation.
//!
//! All session types implement custom Debug to redact the session token.

use std::sync::Arc;

/// Provider of the current Salesforce session.
///
/// Implementations must be cheap to query: the bulk engine checks
/// [`is_active`](SessionInfo::is_active) before every request.
pub trait SessionInfo: Send + Sync {
    /// Returns true while a session is established.
    fn is_active(&self) -> bool;

    /// Instance host for API calls, e.g. `na9.salesforce.com`.
    fn instance_host(&self) -> Option<String>;

    /// Session id sent as `X-SFDC-Session`.
    fn session_token(&self) -> Option<String>;

    /// Scheme and authority used to reach the instance.
    ///
    /// Defaults to `https://{instance_host}`.
    fn instance_url(&self) -> Option<String> {
        self.instance_host().map(|host| format!("https://{}", host))
    }
}

impl<T: SessionInfo + ?Sized> SessionInfo for Arc<T> {
    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn instance_host(&self) -> Option<String> {
        (**self).instance_host()
    }

    fn session_token(&self) -> Option<String> {
        (**self).session_token()
    }

    fn instance_url(&self) -> Option<String> {
        (**self).instance_url()
    }
}

/// A session established outside this crate.
///
/// Accepts either a bare host (`na9.salesforce.com`) or a full origin
/// (`https://acme.my.salesforce.com`, `http://127.0.0.1:8080`).
#[derive(Clone)]
pub struct StaticSession {
    host: String,
    url: String,
    token: String,
}

impl std::fmt::Debug for StaticSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticSession")
            .field("host", &self.host)
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl StaticSession {
    /// Create a session from an instance host or URL and a session token.
    pub fn new(instance: impl Into<String>, token: impl Into<String>) -> Self {
        let instance = instance.into().trim_end_matches('/').to_string();

        let (host, url) = match url::Url::parse(&instance) {
            Ok(parsed) if parsed.has_host() => {
                let host = match (parsed.host_str(), parsed.port()) {
                    (Some(host), Some(port)) => format!("{}:{}", host, port),
                    (Some(host), None) => host.to_string(),
                    (None, _) => instance.clone(),
                };
                (host, parsed.origin().ascii_serialization())
            }
            _ => (instance.clone(), format!("https://{}", instance)),
        };

        Self {
            host,
            url,
            token: token.into(),
        }
    }
}

impl SessionInfo for StaticSession {
    fn is_active(&self) -> bool {
        !self.host.is_empty() && !self.token.is_empty()
    }

    fn instance_host(&self) -> Option<String> {
        Some(self.host.clone())
    }

    fn session_token(&self) -> Option<String> {
        Some(self.token.clone())
    }

    fn instance_url(&self) -> Option<String> {
        Some(self.url.clone())
    }
}
