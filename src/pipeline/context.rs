//! Per-request composition state.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use tokio::task::JoinHandle;

use super::fetch::{FetchError, FragmentFetcher};
use super::request::FragmentRequest;
use crate::compose::{ComposeOptions, SettledFragment};
use crate::routing::{FetchFailure, FragmentConfig};

/// Working set of one document composition.
///
/// The fragment fetch starts the moment the context is created and runs
/// while the shell is rendered. One timeout bounds the whole fetch, head
/// and body; its result is only looked at in [`settle`](Self::settle).
/// Dropping the context aborts a fetch that is still in flight.
pub struct CompositionContext {
    pub fragment: Arc<FragmentConfig>,
    pub request: FragmentRequest,
    pending: JoinHandle<Result<SettledFragment, FetchFailure>>,
}

impl CompositionContext {
    pub fn start(
        fragment: Arc<FragmentConfig>,
        request: FragmentRequest,
        fetcher: Arc<dyn FragmentFetcher>,
        timeout: Duration,
        options: ComposeOptions,
    ) -> Self {
        let outbound = request.to_request(Body::empty());
        let pending = tokio::spawn(async move {
            let fetch = fetch_fragment(fetcher, outbound, &options);
            match tokio::time::timeout(timeout, fetch).await {
                Ok(result) => result,
                Err(_) => Err(FetchFailure::Error(FetchError::Timeout(timeout))),
            }
        });

        Self {
            fragment,
            request,
            pending,
        }
    }

    /// Wait for the fetch. Non-2xx responses and unreadable bodies count
    /// as failures.
    pub async fn settle(&mut self) -> Result<SettledFragment, FetchFailure> {
        match (&mut self.pending).await {
            Ok(result) => result,
            Err(join) if join.is_cancelled() => Err(FetchFailure::Error(FetchError::Cancelled)),
            Err(join) => Err(FetchFailure::Error(FetchError::Upstream(Box::new(join)))),
        }
    }
}

impl Drop for CompositionContext {
    fn drop(&mut self) {
        self.pending.abort();
    }
}

async fn fetch_fragment(
    fetcher: Arc<dyn FragmentFetcher>,
    request: Request<Body>,
    options: &ComposeOptions,
) -> Result<SettledFragment, FetchFailure> {
    let response = fetcher.fetch(request).await.map_err(FetchFailure::Error)?;
    if !response.status().is_success() {
        return Err(FetchFailure::Status(response));
    }

    SettledFragment::read(response, options)
        .await
        .map_err(|e| FetchFailure::Error(FetchError::Body(Box::new(e))))
}
