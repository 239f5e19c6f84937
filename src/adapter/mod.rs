//! Stream-model adapter subsystem.
//!
//! The pipeline is written once against `Request<Body>`/`Response<Body>`.
//! The stream model (axum/tower) runs it directly as middleware; the
//! callback/socket model runs it through this adapter.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → host.rs (hyper http1, one CaptureWriter per request)
//!     → bridge.rs SocketAdapter (intercept or pass through)
//!     → convert.rs (SocketRequest ⇄ Request, Response → writer)
//!     → capture.rs (writer calls → streaming Response)
//! ```
//!
//! # Design Decisions
//! - Nothing is buffered: captured bodies are bounded channels
//! - The next handler is dispatched exactly once per request
//! - Pass-through requests never touch the capture path

pub mod bridge;
pub mod capture;
pub mod convert;
pub mod host;
pub mod socket;

pub use bridge::{dispatch_captured, SocketAdapter};
pub use capture::{capture, CaptureError, CaptureWriter, CapturedResponse};
pub use convert::{into_request, into_socket_request, request_uri, write_response, ConvertError};
pub use host::SocketServer;
pub use socket::{BodyStream, ResponseWriter, SocketHandler, SocketRequest};
