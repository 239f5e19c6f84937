//! Fragment routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     FragmentEntry[] (config file) or FragmentConfig (code)
//!     → fragment.rs (validated FragmentConfig)
//!     → matcher.rs (compile route patterns)
//!     → router.rs (FragmentRegistry, frozen behind Arc)
//!
//! Per request:
//!     URL / request
//!     → router.rs (ordered scan)
//!     → Return: matched FragmentConfig or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same input always matches same fragment
//! - First match wins (registration order)

pub mod fragment;
pub mod matcher;
pub mod router;

pub use fragment::{
    FallbackResponse, FetchFailure, FragmentConfig, RegistryError, SsrFetchErrorHandler,
    StaticFallback,
};
pub use matcher::{PatternError, RouteMatch, RoutePattern};
pub use router::{FragmentRegistry, Routable, RouteTarget};
