//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry, clients and pipeline from a validated config
//! - Mount the pipeline on the configured stream model
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - One `UpstreamClient` pool serves both the host proxy and fragment fetches

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::adapter::{SocketAdapter, SocketServer};
use crate::config::schema::{GatewayConfig, StreamModel};
use crate::http::{GatewayServer, HostProxy, InvalidUpstream, UpstreamClient};
use crate::net::{Listener, ListenerError};
use crate::pipeline::{CompositionPipeline, PipelineOptions};
use crate::routing::{FragmentRegistry, RegistryError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("fragment registry: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Upstream(#[from] InvalidUpstream),
    #[error(transparent)]
    Listener(#[from] ListenerError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    pipeline: Arc<CompositionPipeline>,
    proxy: HostProxy,
}

impl Gateway {
    pub fn from_config(config: GatewayConfig) -> Result<Self, StartupError> {
        let client = UpstreamClient::new(Duration::from_secs(config.timeouts.connect_secs));
        let registry = FragmentRegistry::from_entries(&config.fragments)?;
        let proxy = HostProxy::new(client.clone(), &config.host.upstream)?;

        tracing::info!(
            fragments = registry.len(),
            host = %config.host.upstream,
            environment = ?config.gateway.environment,
            stream_model = ?config.listener.stream_model,
            "Gateway configured"
        );

        let pipeline = Arc::new(CompositionPipeline::new(
            Arc::new(registry),
            Arc::new(client),
            PipelineOptions::from_config(&config.gateway),
        ));

        Ok(Self {
            config,
            pipeline,
            proxy,
        })
    }

    pub fn pipeline(&self) -> &Arc<CompositionPipeline> {
        &self.pipeline
    }

    /// Serve on `listener` with the configured stream model until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: Listener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), StartupError> {
        match self.config.listener.stream_model {
            StreamModel::Stream => {
                let server = GatewayServer::new(self.pipeline, self.proxy, &self.config.timeouts);
                server.run(listener.into_inner(), shutdown).await?;
            }
            StreamModel::Socket => {
                let buffer = self.config.gateway.stream_buffer_chunks;
                let adapter = SocketAdapter::new(self.pipeline, Arc::new(self.proxy), buffer);
                SocketServer::new(Arc::new(adapter), buffer)
                    .run(listener, shutdown)
                    .await?;
            }
        }
        Ok(())
    }
}
