//! Stream-model mount point: the pipeline as an axum middleware.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next as AxumNext;
use axum::response::Response;

use super::Pipeline;

/// Run the pipeline in front of whatever the router would have served.
///
/// Mount with `axum::middleware::from_fn_with_state(pipeline, compose_layer)`.
pub async fn compose_layer(
    State(pipeline): State<Arc<dyn Pipeline>>,
    request: Request,
    next: AxumNext,
) -> Response<Body> {
    pipeline
        .handle(request, Box::new(move |request: Request| next.run(request)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::BoxNext;
    use async_trait::async_trait;
    use axum::http::{HeaderValue, StatusCode};
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    struct Stamp;

    #[async_trait]
    impl Pipeline for Stamp {
        async fn handle(&self, request: Request, next: BoxNext) -> Response<Body> {
            let mut response = next.call(request).await;
            response
                .headers_mut()
                .insert("x-stamped", HeaderValue::from_static("yes"));
            response
        }
    }

    #[tokio::test]
    async fn test_layer_wraps_router() {
        let pipeline: Arc<dyn Pipeline> = Arc::new(Stamp);
        let app = Router::new()
            .route("/", get(|| async { "shell" }))
            .layer(axum::middleware::from_fn_with_state(pipeline, compose_layer));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-stamped"], "yes");
    }
}
