//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;

use busbar_sf_session::StaticSession;
use busbar_sf_transport::{Headers, Response, Result, Transport};

use crate::client::AsyncBulkClient;
use crate::config::BulkConfig;
use crate::envelope::fixtures;

/// A request seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub method: &'static str,
    pub path: String,
    pub body: Option<String>,
    pub headers: Vec<(String, String)>,
}

impl Call {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct Route {
    method: &'static str,
    path: String,
    responses: VecDeque<Response>,
    delay: Duration,
}

/// Answers requests from per-route response queues.
///
/// Each route replays its queued responses in order and keeps repeating the
/// last one. Unscripted routes answer 404. A route can be delayed to make
/// concurrent requests finish out of order; `completed` records the order in
/// which responses were handed back.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<Vec<Route>>,
    calls: Mutex<Vec<Call>>,
    completed: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a 200 response with `body`.
    pub fn on(&self, method: &'static str, path: &str, body: impl Into<String>) {
        self.on_response(method, path, Response::new(200, body));
    }

    /// Queue `response` for `method path`.
    pub fn on_response(&self, method: &'static str, path: &str, response: Response) {
        let mut routes = self.routes.lock().unwrap();
        match routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            Some(route) => route.responses.push_back(response),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                responses: VecDeque::from([response]),
                delay: Duration::ZERO,
            }),
        }
    }

    /// Hold every response on an already scripted route for `delay`.
    pub fn delay(&self, method: &'static str, path: &str, delay: Duration) {
        let mut routes = self.routes.lock().unwrap();
        if let Some(route) = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path)
        {
            route.delay = delay;
        }
    }

    /// Paths in the order their responses were delivered.
    pub fn completed(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    fn respond(
        &self,
        method: &'static str,
        path: &str,
        body: Option<String>,
        headers: &Headers,
    ) -> (Response, Duration) {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            body,
            headers: headers.to_vec(),
        });

        let mut routes = self.routes.lock().unwrap();
        let route = routes
            .iter_mut()
            .find(|r| r.method == method && r.path == path);
        match route {
            Some(route) if route.responses.len() > 1 => {
                (route.responses.pop_front().unwrap(), route.delay)
            }
            Some(route) => (route.responses[0].clone(), route.delay),
            None => (
                Response::new(
                    404,
                    fixtures::error_document("NotFound", &format!("No route for {method} {path}")),
                ),
                Duration::ZERO,
            ),
        }
    }

    async fn deliver(&self, path: &str, response: Response, delay: Duration) -> Result<Response> {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.completed.lock().unwrap().push(path.to_string());
        Ok(response)
    }
}

impl Transport for ScriptedTransport {
    fn post<'a>(
        &'a self,
        path: &'a str,
        body: String,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<Response>> {
        let (response, delay) = self.respond("POST", path, Some(body), headers);
        Box::pin(self.deliver(path, response, delay))
    }

    fn get<'a>(&'a self, path: &'a str, headers: &'a Headers) -> BoxFuture<'a, Result<Response>> {
        let (response, delay) = self.respond("GET", path, None, headers);
        Box::pin(self.deliver(path, response, delay))
    }
}

/// Client over `transport` with an active test session.
pub(crate) fn client_for(transport: Arc<ScriptedTransport>) -> AsyncBulkClient {
    client_with_config(transport, BulkConfig::default())
}

pub(crate) fn client_with_config(transport: Arc<ScriptedTransport>, config: BulkConfig) -> AsyncBulkClient {
    let session = Arc::new(StaticSession::new("na1.salesforce.com", "00Dtest!token"));
    AsyncBulkClient::new(transport, session, config)
}

/// `/services/async/62.0/{suffix}`
pub(crate) fn path(suffix: &str) -> String {
    format!("/services/async/62.0/{suffix}")
}
