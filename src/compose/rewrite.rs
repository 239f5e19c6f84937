//! Bridge between async bodies and the streaming markup rewriter.
//!
//! # Data Flow
//! ```text
//! Body ──▶ driver task: HtmlRewriter::write ──▶ sink (pending chunks)
//!                         │ flush after every write
//!                         ▼
//!          Body::from_stream ◀── mpsc(output)
//! ```
//!
//! # Design Decisions
//! - One ordinary task per stream; the `Send` rewriter runs on the async
//!   workers and never parks a thread
//! - Input is only read once the previous output chunk was accepted, so a
//!   slow client stops the upstream read
//! - Dropping the output body stops the driver and releases the input

use std::io;

use axum::body::Body;
use bytes::Bytes;
use futures_util::StreamExt;
use lol_html::send::{HtmlRewriter, Settings};
use tokio::sync::mpsc;

type Output = mpsc::Sender<io::Result<Bytes>>;

/// Stream `input` through an `HtmlRewriter` built from `settings`.
///
/// Output chunks are emitted as soon as the rewriter produces them.
pub fn rewrite_body<F>(input: Body, settings: F, buffer: usize) -> Body
where
    F: FnOnce() -> Settings<'static, 'static> + Send + 'static,
{
    let (output_tx, output_rx) = mpsc::channel::<io::Result<Bytes>>(buffer.max(1));

    tokio::spawn(async move {
        let (sink_tx, mut pending) = mpsc::unbounded_channel::<Bytes>();
        let mut rewriter = HtmlRewriter::new(settings(), move |chunk: &[u8]| {
            if !chunk.is_empty() {
                let _ = sink_tx.send(Bytes::copy_from_slice(chunk));
            }
        });

        let mut input = input.into_data_stream();
        loop {
            let item = tokio::select! {
                _ = output_tx.closed() => {
                    tracing::debug!("Rewritten body dropped by consumer, stopping rewriter");
                    return;
                }
                item = input.next() => item,
            };

            let result = match item {
                Some(Ok(chunk)) => rewriter.write(&chunk).map_err(io::Error::other),
                Some(Err(e)) => Err(io::Error::other(e)),
                None => break,
            };
            if !flush(&mut pending, &output_tx).await {
                return;
            }
            if let Err(e) = result {
                tracing::warn!(error = %e, "Markup rewrite failed mid-stream");
                let _ = output_tx.send(Err(e)).await;
                return;
            }
        }

        let ended = rewriter.end();
        if !flush(&mut pending, &output_tx).await {
            return;
        }
        if let Err(e) = ended {
            tracing::warn!(error = %e, "Markup rewrite failed at end of stream");
            let _ = output_tx.send(Err(io::Error::other(e))).await;
        }
    });

    let stream = futures_util::stream::unfold(output_rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    });
    Body::from_stream(stream)
}

/// Forward everything the rewriter produced so far. `false` once the
/// consumer is gone.
async fn flush(pending: &mut mpsc::UnboundedReceiver<Bytes>, output: &Output) -> bool {
    while let Ok(chunk) = pending.try_recv() {
        if output.send(Ok(chunk)).await.is_err() {
            return false;
        }
    }
    true
}
