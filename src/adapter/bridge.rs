//! Mounting a [`Pipeline`] on the socket model.
//!
//! # Data Flow
//! ```text
//! SocketRequest + real writer
//!     → pipeline.intercepts()? ──no──▶ next handler, real writer, untouched
//!     → convert::into_request
//!     → pipeline.handle(request, SocketNext)
//!           SocketNext: next handler ▶ CaptureWriter ▶ Response (once)
//!     → convert::write_response ▶ real writer
//! ```

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;

use super::capture::{capture, CaptureError};
use super::convert::{into_request, into_socket_request, request_uri, write_response};
use super::socket::{ResponseWriter, SocketHandler, SocketRequest};
use crate::pipeline::{BoxNext, Pipeline};

/// Runs a pipeline in front of a socket-model handler.
pub struct SocketAdapter {
    pipeline: Arc<dyn Pipeline>,
    next: Arc<dyn SocketHandler>,
    buffer: usize,
}

impl SocketAdapter {
    pub fn new(pipeline: Arc<dyn Pipeline>, next: Arc<dyn SocketHandler>, buffer: usize) -> Self {
        Self {
            pipeline,
            next,
            buffer,
        }
    }

    /// A `Next` that runs the socket handler once against a capture writer.
    fn socket_next(&self, encrypted: bool) -> BoxNext {
        let handler = Arc::clone(&self.next);
        let buffer = self.buffer;

        Box::new(move |request: Request<Body>| async move {
            dispatch_captured(handler, into_socket_request(request, encrypted), buffer).await
        })
    }
}

/// Run `handler` with a capture writer and return what it wrote.
///
/// The handler keeps running in its own task while the caller consumes the
/// body. A handler that never writes a head yields `502 Bad Gateway`.
pub async fn dispatch_captured(
    handler: Arc<dyn SocketHandler>,
    request: SocketRequest,
    buffer: usize,
) -> Response<Body> {
    let (writer, captured) = capture(buffer);

    tokio::spawn(async move {
        if let Err(e) = handler.handle(request, Box::new(writer)).await {
            tracing::warn!(error = %e, "Socket handler failed");
        }
    });

    match captured.await {
        Ok(response) => response,
        Err(CaptureError::Aborted) => {
            tracing::warn!("Socket handler ended without writing a response");
            (StatusCode::BAD_GATEWAY, "Upstream handler produced no response").into_response()
        }
    }
}

#[async_trait]
impl SocketHandler for SocketAdapter {
    async fn handle(
        &self,
        request: SocketRequest,
        mut response: Box<dyn ResponseWriter>,
    ) -> io::Result<()> {
        let intercepts = request_uri(&request)
            .map(|uri: Uri| self.pipeline.intercepts(&uri, &request.headers))
            .unwrap_or(false);
        if !intercepts {
            return self.next.handle(request, response).await;
        }

        let encrypted = request.encrypted;
        let request = match into_request(request) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(error = %e, "Rejecting unparseable request");
                let rejected = (StatusCode::BAD_REQUEST, e.to_string()).into_response();
                return write_response(rejected, response.as_mut()).await;
            }
        };

        let result = self.pipeline.handle(request, self.socket_next(encrypted)).await;
        write_response(result, response.as_mut()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::capture::capture;
    use axum::http::{HeaderMap, HeaderValue, Method};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Shell {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SocketHandler for Shell {
        async fn handle(
            &self,
            request: SocketRequest,
            mut response: Box<dyn ResponseWriter>,
        ) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            response
                .headers_mut()
                .insert("content-type", HeaderValue::from_static("text/plain"));
            response.write_head(StatusCode::OK);
            response
                .write(Bytes::from(format!("shell for {}", request.target)))
                .await?;
            response.end().await;
            Ok(())
        }
    }

    struct Silent;

    #[async_trait]
    impl SocketHandler for Silent {
        async fn handle(
            &self,
            _request: SocketRequest,
            _response: Box<dyn ResponseWriter>,
        ) -> io::Result<()> {
            Ok(())
        }
    }

    /// Intercepts `/wrapped`, uppercases whatever `next` returns.
    struct Upper;

    #[async_trait]
    impl Pipeline for Upper {
        fn intercepts(&self, uri: &Uri, _headers: &HeaderMap) -> bool {
            uri.path() == "/wrapped"
        }

        async fn handle(&self, request: Request<Body>, next: BoxNext) -> Response<Body> {
            let response = next.call(request).await;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
            let upper = String::from_utf8_lossy(&bytes).to_uppercase();
            Response::from_parts(parts, Body::from(upper))
        }
    }

    async fn run(adapter: &SocketAdapter, target: &str) -> Response<Body> {
        let mut request = SocketRequest::new(Method::GET, target);
        request
            .headers
            .insert("host", HeaderValue::from_static("gateway.test"));
        let (writer, captured) = capture(8);
        adapter.handle(request, Box::new(writer)).await.unwrap();
        captured.await.unwrap()
    }

    async fn text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_intercepted_request_dispatches_next_once() {
        let shell = Arc::new(Shell {
            calls: AtomicUsize::new(0),
        });
        let adapter = SocketAdapter::new(Arc::new(Upper), shell.clone(), 8);

        let response = run(&adapter, "/wrapped").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/plain");
        assert_eq!(text(response).await, "SHELL FOR /WRAPPED");
        assert_eq!(shell.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_passthrough_uses_real_writer() {
        let shell = Arc::new(Shell {
            calls: AtomicUsize::new(0),
        });
        let adapter = SocketAdapter::new(Arc::new(Upper), shell.clone(), 8);

        let response = run(&adapter, "/other").await;
        assert_eq!(text(response).await, "shell for /other");
        assert_eq!(shell.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_silent_next_becomes_bad_gateway() {
        let adapter = SocketAdapter::new(Arc::new(Upper), Arc::new(Silent), 8);
        let response = run(&adapter, "/wrapped").await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
