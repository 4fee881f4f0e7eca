//! The transport seam between the bulk engine and the network.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::Result;
use crate::response::Response;

/// Request headers as (name, value) pairs.
pub type Headers = [(String, String)];

/// Sends requests to instance-relative paths such as
/// `/services/async/62.0/job`.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status, and `Err` only when no response was obtained.
pub trait Transport: Send + Sync {
    /// POST `body` to `path`.
    fn post<'a>(
        &'a self,
        path: &'a str,
        body: String,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<Response>>;

    /// GET `path`.
    fn get<'a>(&'a self, path: &'a str, headers: &'a Headers) -> BoxFuture<'a, Result<Response>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn post<'a>(
        &'a self,
        path: &'a str,
        body: String,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<Response>> {
        (**self).post(path, body, headers)
    }

    fn get<'a>(&'a self, path: &'a str, headers: &'a Headers) -> BoxFuture<'a, Result<Response>> {
        (**self).get(path, headers)
    }
}
