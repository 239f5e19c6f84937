//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, buffers > 0)
//! - Check URLs, header names and route patterns before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Duplicate fragment ids are left to the registry (warn and ignore)

use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, StatusCode};

use crate::config::schema::{FragmentEntry, GatewayConfig};
use crate::routing::matcher::{PatternError, RoutePattern};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    BindAddress(String),
    #[error("listener.max_connections must be greater than zero")]
    MaxConnections,
    #[error("{field} `{value}` must be an absolute http:// URL")]
    Url { field: String, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("gateway.development_accept_encoding is not a valid header value")]
    DevelopmentEncoding,
    #[error("fragments[{0}].fragment_id must not be empty")]
    EmptyFragmentId(usize),
    #[error("fragment `{0}` has no route patterns")]
    NoRoutes(String),
    #[error("fragment `{fragment}`: {source}")]
    Pattern { fragment: String, source: PatternError },
    #[error("fragment `{fragment}`: invalid header name `{name}`")]
    HeaderName { fragment: String, name: String },
    #[error("fragment `{fragment}`: invalid value for header `{name}`")]
    HeaderValue { fragment: String, name: String },
    #[error("fragment `{fragment}`: invalid fallback status {status}")]
    FallbackStatus { fragment: String, status: u16 },
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::MaxConnections);
    }

    check_http_url("host.upstream", &config.host.upstream, &mut errors);

    if config.gateway.fragment_timeout_ms == 0 {
        errors.push(ValidationError::Zero("gateway.fragment_timeout_ms"));
    }
    if config.gateway.stream_buffer_chunks == 0 {
        errors.push(ValidationError::Zero("gateway.stream_buffer_chunks"));
    }
    if config.gateway.max_fragment_bytes == 0 {
        errors.push(ValidationError::Zero("gateway.max_fragment_bytes"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if HeaderValue::from_str(&config.gateway.development_accept_encoding).is_err() {
        errors.push(ValidationError::DevelopmentEncoding);
    }

    for (index, fragment) in config.fragments.iter().enumerate() {
        validate_fragment(index, fragment, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_fragment(index: usize, fragment: &FragmentEntry, errors: &mut Vec<ValidationError>) {
    let id = if fragment.fragment_id.is_empty() {
        errors.push(ValidationError::EmptyFragmentId(index));
        format!("#{index}")
    } else {
        fragment.fragment_id.clone()
    };

    check_http_url(&format!("fragment `{id}` endpoint"), &fragment.endpoint, errors);

    if fragment.route_patterns.is_empty() {
        errors.push(ValidationError::NoRoutes(id.clone()));
    }
    for pattern in &fragment.route_patterns {
        if let Err(source) = RoutePattern::parse(pattern) {
            errors.push(ValidationError::Pattern {
                fragment: id.clone(),
                source,
            });
        }
    }

    let header_names = fragment
        .forward_fragment_headers
        .iter()
        .chain(fragment.additional_headers.keys());
    for name in header_names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName {
                fragment: id.clone(),
                name: name.clone(),
            });
        }
    }
    for (name, value) in &fragment.additional_headers {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::HeaderValue {
                fragment: id.clone(),
                name: name.clone(),
            });
        }
    }

    if let Some(fallback) = &fragment.on_ssr_fetch_error {
        if StatusCode::from_u16(fallback.status).is_err() {
            errors.push(ValidationError::FallbackStatus {
                fragment: id.clone(),
                status: fallback.status,
            });
        }
        if HeaderValue::from_str(&fallback.content_type).is_err() {
            errors.push(ValidationError::HeaderValue {
                fragment: id,
                name: "content-type".to_string(),
            });
        }
    }
}

fn check_http_url(field: &str, value: &str, errors: &mut Vec<ValidationError>) {
    let valid = url::Url::parse(value)
        .map(|url| url.scheme() == "http" && url.host().is_some())
        .unwrap_or(false);

    if !valid {
        errors.push(ValidationError::Url {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}
