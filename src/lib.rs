//! Edge composition gateway library.

pub mod adapter;
pub mod compose;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod routing;

pub use config::schema::GatewayConfig;
pub use lifecycle::{Gateway, Shutdown};
pub use pipeline::{CompositionPipeline, Pipeline};
pub use routing::{FragmentConfig, FragmentRegistry};
