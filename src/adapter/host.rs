//! Socket-model host: runs a [`SocketHandler`] on raw HTTP/1.1 connections.

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use futures_util::StreamExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;

use super::bridge::dispatch_captured;
use super::socket::{SocketHandler, SocketRequest};
use crate::net::{Listener, ListenerError};

/// How long in-flight connections get to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct SocketServer {
    handler: Arc<dyn SocketHandler>,
    buffer: usize,
}

impl SocketServer {
    pub fn new(handler: Arc<dyn SocketHandler>, buffer: usize) -> Self {
        Self { handler, buffer }
    }

    /// Accept connections until `shutdown` resolves, then drain.
    pub async fn run(
        self,
        listener: Listener,
        shutdown: impl Future<Output = ()> + Send,
    ) -> Result<(), ListenerError> {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            "Socket-model server starting"
        );
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer_addr, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let handler = Arc::clone(&self.handler);
            let buffer = self.buffer;
            tokio::spawn(async move {
                let _permit = permit;
                let service = service_fn(move |request: Request<Incoming>| {
                    let handler = Arc::clone(&handler);
                    async move {
                        let response =
                            dispatch_captured(handler, socket_request(request), buffer).await;
                        Ok::<_, Infallible>(response)
                    }
                });

                if let Err(e) = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await
                {
                    tracing::debug!(
                        peer_addr = %peer_addr,
                        error = %e,
                        "Connection closed with error"
                    );
                }
            });
        }

        tracing::info!("Socket-model server draining connections");
        if tokio::time::timeout(DRAIN_TIMEOUT, listener.drain()).await.is_err() {
            tracing::warn!(timeout = ?DRAIN_TIMEOUT, "Drain timed out, dropping open connections");
        }
        tracing::info!("Socket-model server stopped");
        Ok(())
    }
}

fn socket_request(request: Request<Incoming>) -> SocketRequest {
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());
    let body = Body::new(body)
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other))
        .boxed();

    SocketRequest {
        method: parts.method,
        target,
        version: parts.version,
        headers: parts.headers,
        encrypted: false,
        body: Some(body),
    }
}
