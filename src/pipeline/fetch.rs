//! Fragment upstream fetching.
//!
//! # Design Decisions
//! - One attempt per request, no retries
//! - Timeouts, transport errors and unreadable bodies share the fallback path

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};

use crate::http::client::UpstreamClient;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("fragment fetch timed out after {0:?}")]
    Timeout(Duration),
    #[error("fragment upstream request failed: {0}")]
    Upstream(#[source] BoxError),
    #[error("fragment body could not be read: {0}")]
    Body(#[source] BoxError),
    #[error("invalid fragment target `{0}`")]
    InvalidTarget(String),
    #[error("fragment fetch was cancelled")]
    Cancelled,
}

/// Sends requests to fragment upstreams.
#[async_trait]
pub trait FragmentFetcher: Send + Sync + 'static {
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, FetchError>;
}

#[async_trait]
impl FragmentFetcher for UpstreamClient {
    async fn fetch(&self, request: Request<Body>) -> Result<Response<Body>, FetchError> {
        self.send(request)
            .await
            .map_err(|e| FetchError::Upstream(Box::new(e)))
    }
}
