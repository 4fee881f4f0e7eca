//! Partner SOAP login and logout.
//!
//! The asynchronous Bulk API accepts the session id returned by the partner
//! SOAP `login` call. Sensitive fields are redacted in Debug output and
//! skipped in tracing spans.

use std::path::Path;
use std::sync::RwLock;

use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::error::{Error, ErrorKind, Result};
use crate::session::SessionInfo;
use crate::xml::{element_text, escape};
use crate::{DEFAULT_API_VERSION, PRODUCTION_LOGIN_URL};

/// Username/password login options.
///
/// Every field is optional in serialized form so the same structure can be
/// read from a partial JSON options file and merged with defaults.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoginOptions {
    /// Salesforce username.
    #[serde(default)]
    pub username: String,
    /// Salesforce password (without the security token).
    #[serde(default)]
    password: String,
    /// Security token appended to the password.
    #[serde(default, alias = "token")]
    security_token: String,
    /// Login endpoint origin.
    #[serde(default = "default_login_url", alias = "login_host")]
    pub login_url: String,
    /// API version used for the SOAP endpoint.
    #[serde(default = "default_api_version", alias = "version")]
    pub api_version: String,
}

fn default_login_url() -> String {
    PRODUCTION_LOGIN_URL.to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

impl std::fmt::Debug for LoginOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginOptions")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("security_token", &"[REDACTED]")
            .field("login_url", &self.login_url)
            .field("api_version", &self.api_version)
            .finish()
    }
}

impl LoginOptions {
    /// Create login options for a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            security_token: String::new(),
            login_url: default_login_url(),
            api_version: default_api_version(),
        }
    }

    /// Read options from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Set the security token.
    pub fn with_security_token(mut self, token: impl Into<String>) -> Self {
        self.security_token = token.into();
        self
    }

    /// Set the login URL (e.g. [`SANDBOX_LOGIN_URL`](crate::SANDBOX_LOGIN_URL)).
    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.login_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the API version.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    fn soap_url(&self, origin: &str) -> String {
        format!(
            "{}/services/Soap/u/{}",
            origin.trim_end_matches('/'),
            self.api_version
        )
    }

    fn validate(&self) -> Result<()> {
        if self.username.is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "username is required".to_string(),
            )));
        }
        if self.password.is_empty() {
            return Err(Error::new(ErrorKind::InvalidCredentials(
                "password is required".to_string(),
            )));
        }
        Ok(())
    }
}

/// Fields of a successful login response.
#[derive(Clone)]
pub struct LoginResult {
    /// Session id.
    session_id: String,
    /// Partner API endpoint for this session.
    pub server_url: String,
    /// Origin of the instance (`https://na9.salesforce.com`).
    pub instance_url: String,
    /// Host of the instance (`na9.salesforce.com`).
    pub instance_host: String,
}

impl std::fmt::Debug for LoginResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResult")
            .field("session_id", &"[REDACTED]")
            .field("server_url", &self.server_url)
            .field("instance_url", &self.instance_url)
            .field("instance_host", &self.instance_host)
            .finish()
    }
}

impl LoginResult {
    /// Session id (for internal use by transports).
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn parse(body: &str) -> Result<Self> {
        let session_id = element_text(body, "sessionId").ok_or_else(|| {
            Error::new(ErrorKind::InvalidResponse("Missing sessionId".to_string()))
        })?;
        let server_url = element_text(body, "serverUrl").ok_or_else(|| {
            Error::new(ErrorKind::InvalidResponse("Missing serverUrl".to_string()))
        })?;

        let parsed = url::Url::parse(&server_url)?;
        let host = parsed.host_str().ok_or_else(|| {
            Error::new(ErrorKind::InvalidResponse(
                "serverUrl has no host".to_string(),
            ))
        })?;
        let instance_host = match parsed.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            session_id,
            instance_url: parsed.origin().ascii_serialization(),
            instance_host,
            server_url,
        })
    }
}

/// Session established through the partner SOAP API.
///
/// Implements [`SessionInfo`]; the session becomes inactive after
/// [`disconnect`](SoapSession::disconnect).
pub struct SoapSession {
    options: LoginOptions,
    http_client: reqwest::Client,
    state: RwLock<Option<LoginResult>>,
}

impl std::fmt::Debug for SoapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapSession")
            .field("options", &self.options)
            .field("connected", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl SoapSession {
    /// Create a disconnected session for the given options.
    pub fn new(options: LoginOptions) -> Self {
        Self {
            options,
            http_client: reqwest::Client::new(),
            state: RwLock::new(None),
        }
    }

    /// Get the login options.
    pub fn options(&self) -> &LoginOptions {
        &self.options
    }

    /// Log in and store the session.
    #[instrument(skip(self), fields(username = %self.options.username))]
    pub async fn connect(&self) -> Result<LoginResult> {
        if self.is_active() {
            return Err(Error::new(ErrorKind::AlreadyConnected));
        }
        self.options.validate()?;

        let password = format!("{}{}", self.options.password, self.options.security_token);
        let envelope = format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema""#,
                r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#,
                r#" xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<env:Body><n1:login xmlns:n1="urn:partner.soap.sforce.com">"#,
                "<n1:username>{}</n1:username>",
                "<n1:password>{}</n1:password>",
                "</n1:login></env:Body></env:Envelope>"
            ),
            escape(&self.options.username),
            escape(&password)
        );

        let body = self
            .soap_call(&self.options.soap_url(&self.options.login_url), "login", envelope)
            .await?;
        let result = LoginResult::parse(&body)?;

        info!(instance_host = %result.instance_host, "Logged in");

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = Some(result.clone());
        Ok(result)
    }

    /// Log out and forget the session.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<()> {
        let current = self.current().ok_or_else(|| Error::new(ErrorKind::NotConnected))?;

        let envelope = format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema""#,
                r#" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance""#,
                r#" xmlns:env="http://schemas.xmlsoap.org/soap/envelope/">"#,
                r#"<env:Header><n1:SessionHeader xmlns:n1="urn:partner.soap.sforce.com">"#,
                "<n1:sessionId>{}</n1:sessionId></n1:SessionHeader></env:Header>",
                r#"<env:Body><n1:logout xmlns:n1="urn:partner.soap.sforce.com" /></env:Body>"#,
                "</env:Envelope>"
            ),
            escape(current.session_id())
        );

        let result = self
            .soap_call(&self.options.soap_url(&current.instance_url), "logout", envelope)
            .await;

        // The local session is dropped even when the server call fails.
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        *state = None;
        drop(state);

        result.map(|_| {
            info!("Logged out");
        })
    }

    fn current(&self) -> Option<LoginResult> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn soap_call(&self, url: &str, action: &str, envelope: String) -> Result<String> {
        debug!(url = %url, action, "Sending SOAP request");

        let response = self
            .http_client
            .post(url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", action)
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if let Some(message) = element_text(&body, "faultstring") {
            let fault_code = element_text(&body, "faultcode")
                .map(|code| code.rsplit(':').next().unwrap_or(&code).to_string())
                .unwrap_or_else(|| "UNKNOWN".to_string());
            return Err(Error::new(ErrorKind::LoginFailed {
                fault_code,
                message,
            }));
        }

        if !status.is_success() {
            return Err(Error::new(ErrorKind::Http(format!(
                "{} returned status {}",
                action,
                status.as_u16()
            ))));
        }

        Ok(body)
    }
}

impl SessionInfo for SoapSession {
    fn is_active(&self) -> bool {
        self.state
            .read()
            .map(|state| state.is_some())
            .unwrap_or(false)
    }

    fn instance_host(&self) -> Option<String> {
        self.current().map(|s| s.instance_host)
    }

    fn session_token(&self) -> Option<String> {
        self.current().map(|s| s.session_id)
    }

    fn instance_url(&self) -> Option<String> {
        self.current().map(|s| s.instance_url)
    }
}
