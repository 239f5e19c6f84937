//! The callback/socket I/O model.
//!
//! A handler receives the raw request head and an imperative writer, and
//! pushes status, headers and chunks into it as it goes.

use std::fmt;
use std::io;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode, Version};
use bytes::Bytes;
use futures_util::stream::BoxStream;

/// Request body as a lazily polled chunk stream.
pub type BodyStream = BoxStream<'static, io::Result<Bytes>>;

/// Request as seen by a socket-model handler.
pub struct SocketRequest {
    pub method: Method,
    /// Request-target exactly as received (usually origin-form, `/path?query`).
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
    /// Whether the connection this arrived on is TLS.
    pub encrypted: bool,
    /// `None` when the request carries no body.
    pub body: Option<BodyStream>,
}

impl SocketRequest {
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            encrypted: false,
            body: None,
        }
    }
}

impl fmt::Debug for SocketRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketRequest")
            .field("method", &self.method)
            .field("target", &self.target)
            .field("version", &self.version)
            .field("headers", &self.headers)
            .field("encrypted", &self.encrypted)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Imperative response sink.
///
/// `write` or `end` before `write_head` implies `write_head(200)`. Header
/// changes after the head is flushed have no effect.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Headers that will be sent with the head.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn headers_sent(&self) -> bool;

    fn write_head(&mut self, status: StatusCode);

    /// Send one body chunk. Fails once the reader has gone away.
    async fn write(&mut self, chunk: Bytes) -> io::Result<()>;

    async fn end(&mut self);

    /// Abort the response; the reader observes `error`.
    fn destroy(&mut self, error: io::Error);
}

#[async_trait]
pub trait SocketHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        request: SocketRequest,
        response: Box<dyn ResponseWriter>,
    ) -> io::Result<()>;
}
