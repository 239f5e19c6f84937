//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the composition gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, stream model).
    pub listener: ListenerConfig,

    /// Legacy host that renders the shell.
    pub host: HostConfig,

    /// Composition behavior.
    pub gateway: CompositionConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Fragments, registered in file order.
    pub fragments: Vec<FragmentEntry>,
}

/// Which streaming I/O model the gateway is mounted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamModel {
    /// Request/Response values with streaming bodies (axum/tower).
    #[default]
    Stream,
    /// Callback/socket handlers writing into a response writer.
    Socket,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Streaming model the pipeline is mounted on.
    pub stream_model: StreamModel,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            stream_model: StreamModel::Stream,
        }
    }
}

/// Legacy host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Base URL of the legacy host (e.g., "http://127.0.0.1:3000").
    pub upstream: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            upstream: "http://127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
}

/// Composition settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositionConfig {
    /// Development mode leaks upstream URLs into error markup and forces
    /// `development_accept_encoding` on fragment requests.
    pub environment: Environment,

    /// CSS appended inside `<head>` of composed documents.
    pub pre_piercing_styles: String,

    /// Bound on the document-branch fragment fetch, in milliseconds.
    pub fragment_timeout_ms: u64,

    /// Encoding forced on fragment requests in development mode.
    pub development_accept_encoding: String,

    /// Largest fragment body embedded into a shell.
    pub max_fragment_bytes: usize,

    /// Chunks buffered between a stream producer and its consumer.
    pub stream_buffer_chunks: usize,
}

impl Default for CompositionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            pre_piercing_styles: String::new(),
            fragment_timeout_ms: 5_000,
            development_accept_encoding: "gzip".to_string(),
            max_fragment_bytes: 8 * 1024 * 1024, // 8MB
            stream_buffer_chunks: 16,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time until response head) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One fragment as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FragmentEntry {
    /// Unique fragment identifier.
    pub fragment_id: String,

    /// Route patterns, evaluated in order.
    pub route_patterns: Vec<String>,

    /// Base URL of the fragment upstream.
    pub endpoint: String,

    /// Classes applied to the wrapper element.
    #[serde(default)]
    pub pre_piercing_class_names: Vec<String>,

    /// Fragment response headers copied onto composed responses.
    #[serde(default)]
    pub forward_fragment_headers: Vec<String>,

    /// Extra headers sent with every fragment request.
    #[serde(default)]
    pub additional_headers: BTreeMap<String, String>,

    /// Fixed fallback used when the SSR fetch fails.
    #[serde(default)]
    pub on_ssr_fetch_error: Option<StaticFallbackConfig>,
}

/// Static fallback response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticFallbackConfig {
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    pub body: String,

    #[serde(default = "default_fallback_content_type")]
    pub content_type: String,

    /// Replace the whole reply instead of embedding the body.
    #[serde(default)]
    pub override_response: bool,
}

fn default_fallback_status() -> u16 {
    200
}

fn default_fallback_content_type() -> String {
    "text/html".to_string()
}
