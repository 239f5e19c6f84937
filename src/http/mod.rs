//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout)
//!     → [composition pipeline middleware]
//!     → proxy.rs (legacy host, via client.rs)
//!     → Send to client
//! ```

pub mod client;
pub mod proxy;
pub mod request;
pub mod server;

pub use client::UpstreamClient;
pub use proxy::{HostProxy, InvalidUpstream};
pub use request::X_REQUEST_ID;
pub use server::GatewayServer;
