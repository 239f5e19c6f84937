//! Streaming HTML composition subsystem.
//!
//! # Data Flow
//! ```text
//! fragment response
//!     → reframe.rs (scripts marked inert, streamed)
//!     → embed.rs SettledFragment (read to text, bounded by size)
//!
//! shell response
//!     → embed.rs (streamed; <head> gets styles, <body> gets the fragment)
//!     → headers.rs (whitelisted fragment headers)
//!     → composed response
//! ```
//!
//! # Design Decisions
//! - The shell body is never buffered
//! - Every rewrite runs as an ordinary task, so composition only ever
//!   waits on I/O
//! - Shell status and headers are kept, minus `content-length`

pub mod embed;
pub mod headers;
pub mod markup;
pub mod reframe;
pub mod rewrite;

use std::sync::Arc;

use axum::body::Body;
use axum::http::Response;

pub use embed::{embed_fragment_into_host, SettledFragment};
pub use headers::attach_forwarded_headers;
pub use reframe::prepare_fragment_for_reframing;

use crate::routing::FragmentConfig;

#[derive(Debug, Clone)]
pub struct ComposeOptions {
    /// CSS appended inside `<head>`.
    pub pre_piercing_styles: Arc<str>,
    /// Largest fragment body embedded into a shell.
    pub max_fragment_bytes: usize,
    /// Chunks buffered between each stage.
    pub stream_buffer: usize,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            pre_piercing_styles: Arc::from(""),
            max_fragment_bytes: 8 * 1024 * 1024,
            stream_buffer: 16,
        }
    }
}

/// Merge a settled fragment into a shell.
pub fn compose(
    shell: Response<Body>,
    fragment_payload: &SettledFragment,
    fragment: &FragmentConfig,
    options: &ComposeOptions,
) -> Response<Body> {
    let mut composed =
        embed_fragment_into_host(shell, fragment, &fragment_payload.markup, options);
    attach_forwarded_headers(&mut composed, &fragment_payload.headers, fragment);
    composed
}
