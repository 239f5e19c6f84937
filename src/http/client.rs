//! Pooled upstream HTTP client.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper_util::client::legacy::{connect::HttpConnector, Client, Error as ClientError};
use hyper_util::rt::TokioExecutor;

/// HTTP/1.1 client shared by the host proxy and fragment fetches.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);

        Self {
            inner: Client::builder(TokioExecutor::new()).build(connector),
        }
    }

    /// Send a request; the response body streams from the upstream.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<Body>, ClientError> {
        let response = self.inner.request(request).await?;
        Ok(response.map(Body::new))
    }
}
