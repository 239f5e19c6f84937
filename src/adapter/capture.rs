//! Response capture for socket-model handlers.
//!
//! # State Machine
//! ```text
//! Pending ──write_head / write / end──▶ Streaming ──end──▶ Ended
//!    │                                      │
//!    └──────────────destroy─────────────────┴──────────▶ Destroyed
//! ```
//!
//! The head is delivered through [`CapturedResponse`] the moment it is
//! flushed; body chunks flow through a bounded channel, so a handler that
//! writes faster than the consumer reads is suspended in `write`.

use std::future::Future;
use std::io;
use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Response, StatusCode};
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use super::socket::ResponseWriter;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("response writer dropped before the head was written")]
    Aborted,
}

enum Frame {
    Data(Bytes),
    End,
    Abort(io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Streaming,
    Ended,
    Destroyed,
}

/// A [`ResponseWriter`] that turns what is written into a `Response<Body>`.
pub struct CaptureWriter {
    state: State,
    headers: HeaderMap,
    head_tx: Option<oneshot::Sender<Response<Body>>>,
    body_tx: Option<mpsc::Sender<Frame>>,
    body_rx: Option<mpsc::Receiver<Frame>>,
}

/// Resolves to the captured response once its head is written.
pub struct CapturedResponse {
    receiver: oneshot::Receiver<Response<Body>>,
}

/// Create a capture writer and the future of its response.
///
/// `buffer` bounds the number of body chunks in flight.
pub fn capture(buffer: usize) -> (CaptureWriter, CapturedResponse) {
    let (head_tx, receiver) = oneshot::channel();
    let (body_tx, body_rx) = mpsc::channel(buffer.max(1));

    let writer = CaptureWriter {
        state: State::Pending,
        headers: HeaderMap::new(),
        head_tx: Some(head_tx),
        body_tx: Some(body_tx),
        body_rx: Some(body_rx),
    };
    (writer, CapturedResponse { receiver })
}

impl Future for CapturedResponse {
    type Output = Result<Response<Body>, CaptureError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.map_err(|_| CaptureError::Aborted))
    }
}

fn frame_body(rx: mpsc::Receiver<Frame>) -> Body {
    let stream = futures_util::stream::unfold(Some(rx), |rx| async move {
        let Some(mut rx) = rx else {
            return None;
        };
        match rx.recv().await {
            Some(Frame::Data(chunk)) => Some((Ok(chunk), Some(rx))),
            Some(Frame::End) => None,
            Some(Frame::Abort(error)) => Some((Err(error), None)),
            None => Some((
                Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "response writer dropped before end",
                )),
                None,
            )),
        }
    });
    Body::from_stream(stream)
}

impl CaptureWriter {
    fn finished(&self, operation: &str) -> bool {
        if matches!(self.state, State::Ended | State::Destroyed) {
            tracing::warn!(operation, state = ?self.state, "Ignoring write on a finished response");
            return true;
        }
        false
    }
}

#[async_trait]
impl ResponseWriter for CaptureWriter {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn headers_sent(&self) -> bool {
        self.state != State::Pending
    }

    fn write_head(&mut self, status: StatusCode) {
        if self.state != State::Pending {
            tracing::warn!(status = %status, "Ignoring duplicate write_head");
            return;
        }
        self.state = State::Streaming;

        let Some(body_rx) = self.body_rx.take() else {
            return;
        };
        let mut response = Response::new(frame_body(body_rx));
        *response.status_mut() = status;
        *response.headers_mut() = mem::take(&mut self.headers);

        if let Some(head_tx) = self.head_tx.take() {
            let _ = head_tx.send(response);
        }
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        if self.state == State::Pending {
            self.write_head(StatusCode::OK);
        }
        if self.finished("write") {
            return Ok(());
        }

        match &self.body_tx {
            Some(tx) => tx
                .send(Frame::Data(chunk))
                .await
                .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response reader closed")),
            None => Ok(()),
        }
    }

    async fn end(&mut self) {
        if self.state == State::Pending {
            self.write_head(StatusCode::OK);
        }
        if self.finished("end") {
            return;
        }
        self.state = State::Ended;

        if let Some(tx) = self.body_tx.take() {
            let _ = tx.send(Frame::End).await;
        }
    }

    fn destroy(&mut self, error: io::Error) {
        if self.finished("destroy") {
            return;
        }
        self.state = State::Destroyed;
        self.head_tx = None;

        if let Some(tx) = self.body_tx.take() {
            let _ = tx.try_send(Frame::Abort(error));
        }
    }
}
