//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → FragmentRegistry + PipelineOptions built once at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the registry never changes at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CompositionConfig, Environment, FragmentEntry, GatewayConfig, HostConfig, ListenerConfig,
    LogFormat, ObservabilityConfig, StaticFallbackConfig, StreamModel, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
