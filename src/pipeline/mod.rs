//! Composition pipeline subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (from either stream model)
//!     → classify.rs (sec-fetch-dest → RequestClass)
//!     → request.rs (outbound FragmentRequest)
//!     → context.rs (fragment fetch started, not awaited)
//!     → next.rs (legacy shell, dispatched once)
//!     → handler.rs (gate, settle, fallback)
//!     → compose (streaming merge)
//!     → Response
//! ```
//!
//! # Design Decisions
//! - The pipeline only speaks `Request<Body>` / `Response<Body>`; each
//!   stream model adapts itself to that shape
//! - `Next` is consumed on call, so the shell is rendered at most once
//! - Fetch failures never surface as gateway errors on the document branch

pub mod classify;
pub mod context;
pub mod fallback;
pub mod fetch;
pub mod handler;
pub mod middleware;
pub mod next;
pub mod request;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, Uri};

pub use classify::{RequestClass, CLASSIFICATION_HEADER};
pub use context::CompositionContext;
pub use fallback::default_fallback;
pub use fetch::{FetchError, FragmentFetcher};
pub use handler::{CompositionPipeline, PipelineOptions};
pub use next::{BoxNext, Next};
pub use request::{FragmentRequest, FRAGMENT_MODE_HEADER};

/// A request handler that may delegate to the legacy host.
#[async_trait]
pub trait Pipeline: Send + Sync + 'static {
    /// Whether `handle` would do anything beyond calling `next`.
    ///
    /// Adapters use this to skip response capture for pass-through traffic.
    fn intercepts(&self, _uri: &Uri, _headers: &HeaderMap) -> bool {
        true
    }

    async fn handle(&self, request: Request<Body>, next: BoxNext) -> Response<Body>;
}
