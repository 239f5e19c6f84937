//! Stream-model HTTP server.
//!
//! # Responsibilities
//! - Create Axum Router with the host proxy as fallback
//! - Mount the composition pipeline as middleware
//! - Wire up middleware (tracing, timeout, request ID)
//! - Serve with graceful shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::proxy::{proxy_handler, HostProxy};
use crate::config::schema::TimeoutConfig;
use crate::pipeline::{middleware::compose_layer, Pipeline};

/// HTTP server for the stream model.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(pipeline: Arc<dyn Pipeline>, proxy: HostProxy, timeouts: &TimeoutConfig) -> Self {
        Self {
            router: Self::build_router(pipeline, proxy, timeouts),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        pipeline: Arc<dyn Pipeline>,
        proxy: HostProxy,
        timeouts: &TimeoutConfig,
    ) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(proxy)
            .layer(axum::middleware::from_fn_with_state(pipeline, compose_layer))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(timeouts.request_secs))),
            )
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Stream-model server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Stream-model server stopped");
        Ok(())
    }
}
