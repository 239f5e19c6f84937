//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → Hand off to the socket-model host (adapter::host)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - The permit lives as long as the connection task

pub mod listener;

pub use listener::{ConnectionPermit, Listener, ListenerError};
