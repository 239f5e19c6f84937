//! The "next" collaborator that renders the legacy shell.

use std::future::Future;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;

/// Produces the legacy host's response for a request.
///
/// `call` consumes the boxed value, so a pipeline can dispatch to the real
/// handler at most once per request.
pub trait Next: Send + 'static {
    fn call(self: Box<Self>, request: Request<Body>) -> BoxFuture<'static, Response<Body>>;
}

pub type BoxNext = Box<dyn Next>;

impl<F, Fut> Next for F
where
    F: FnOnce(Request<Body>) -> Fut + Send + 'static,
    Fut: Future<Output = Response<Body>> + Send + 'static,
{
    fn call(self: Box<Self>, request: Request<Body>) -> BoxFuture<'static, Response<Body>> {
        Box::pin((*self)(request))
    }
}
