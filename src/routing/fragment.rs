//! Fragment configuration and the SSR fetch fallback contract.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};

use crate::config::schema::{FragmentEntry, StaticFallbackConfig};
use crate::pipeline::fetch::FetchError;
use crate::pipeline::request::FragmentRequest;

/// Why the SSR fetch of a fragment did not produce usable markup.
#[derive(Debug)]
pub enum FetchFailure {
    /// The upstream answered with a non-2xx status.
    Status(Response<Body>),
    /// No usable markup arrived (network error, timeout, unreadable body, cancellation).
    Error(FetchError),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchFailure::Status(response) => {
                write!(f, "fragment upstream responded with {}", response.status())
            }
            FetchFailure::Error(error) => write!(f, "{}", error),
        }
    }
}

/// Substitute produced when a fragment fetch fails.
#[derive(Debug)]
pub struct FallbackResponse {
    /// The substitute response.
    pub response: Response<Body>,
    /// `true`: `response` replaces the whole reply and the shell is discarded.
    /// `false`: only its body is embedded as the fragment markup.
    pub override_response: bool,
}

impl FallbackResponse {
    /// A fallback embedded in place of the fragment.
    pub fn embed(response: Response<Body>) -> Self {
        Self {
            response,
            override_response: false,
        }
    }

    /// A fallback that becomes the entire reply.
    pub fn replace(response: Response<Body>) -> Self {
        Self {
            response,
            override_response: true,
        }
    }
}

/// Produces a fallback when a fragment's SSR fetch fails.
#[async_trait]
pub trait SsrFetchErrorHandler: Send + Sync {
    async fn on_error(&self, request: &FragmentRequest, failure: FetchFailure) -> FallbackResponse;
}

#[async_trait]
impl<F> SsrFetchErrorHandler for F
where
    F: Fn(&FragmentRequest, FetchFailure) -> FallbackResponse + Send + Sync,
{
    async fn on_error(&self, request: &FragmentRequest, failure: FetchFailure) -> FallbackResponse {
        (self)(request, failure)
    }
}

/// Fixed fallback loaded from configuration.
#[derive(Debug, Clone)]
pub struct StaticFallback {
    status: StatusCode,
    content_type: HeaderValue,
    body: String,
    override_response: bool,
}

impl StaticFallback {
    pub fn from_config(config: &StaticFallbackConfig) -> Result<Self, RegistryError> {
        let status = StatusCode::from_u16(config.status)
            .map_err(|_| RegistryError::InvalidStatus(config.status))?;
        let content_type = HeaderValue::from_str(&config.content_type)
            .map_err(|_| RegistryError::InvalidHeaderValue("content-type".to_string()))?;

        Ok(Self {
            status,
            content_type,
            body: config.body.clone(),
            override_response: config.override_response,
        })
    }
}

#[async_trait]
impl SsrFetchErrorHandler for StaticFallback {
    async fn on_error(&self, request: &FragmentRequest, failure: FetchFailure) -> FallbackResponse {
        tracing::debug!(
            url = %request.uri,
            failure = %failure,
            "Serving configured fragment fallback"
        );

        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, self.content_type.clone());

        FallbackResponse {
            response,
            override_response: self.override_response,
        }
    }
}

/// Error building a fragment from configuration.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error(transparent)]
    Pattern(#[from] super::matcher::PatternError),
    #[error("invalid header name `{0}`")]
    InvalidHeaderName(String),
    #[error("invalid value for header `{0}`")]
    InvalidHeaderValue(String),
    #[error("invalid fallback status {0}")]
    InvalidStatus(u16),
}

/// Configuration of one independently deployed fragment.
///
/// Immutable once registered; the registry hands it out behind an `Arc`.
#[derive(Clone)]
pub struct FragmentConfig {
    pub fragment_id: String,
    pub route_patterns: Vec<String>,
    /// Base URL of the fragment upstream, without trailing slash.
    pub endpoint: String,
    pub pre_piercing_class_names: Vec<String>,
    pub forward_fragment_headers: Vec<HeaderName>,
    /// Extra headers merged into every outbound fragment request.
    pub additional_headers: HeaderMap,
    pub on_ssr_fetch_error: Option<Arc<dyn SsrFetchErrorHandler>>,
}

impl FragmentConfig {
    pub fn new(
        fragment_id: impl Into<String>,
        endpoint: impl Into<String>,
        route_patterns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            fragment_id: fragment_id.into(),
            route_patterns: route_patterns.into_iter().map(Into::into).collect(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            pre_piercing_class_names: Vec::new(),
            forward_fragment_headers: Vec::new(),
            additional_headers: HeaderMap::new(),
            on_ssr_fetch_error: None,
        }
    }

    pub fn with_class_names(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.pre_piercing_class_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_forwarded_headers(mut self, names: impl IntoIterator<Item = HeaderName>) -> Self {
        self.forward_fragment_headers = names.into_iter().collect();
        self
    }

    pub fn with_additional_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.additional_headers.insert(name, value);
        self
    }

    pub fn with_fallback(mut self, handler: impl SsrFetchErrorHandler + 'static) -> Self {
        self.on_ssr_fetch_error = Some(Arc::new(handler));
        self
    }

    /// Build from a config file entry.
    pub fn from_entry(entry: &FragmentEntry) -> Result<Self, RegistryError> {
        let forward = entry
            .forward_fragment_headers
            .iter()
            .map(|name| {
                HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| RegistryError::InvalidHeaderName(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = Self::new(&entry.fragment_id, &entry.endpoint, &entry.route_patterns)
            .with_class_names(&entry.pre_piercing_class_names)
            .with_forwarded_headers(forward);

        for (name, value) in &entry.additional_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| RegistryError::InvalidHeaderName(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| RegistryError::InvalidHeaderValue(name.to_string()))?;
            config.additional_headers.insert(name, value);
        }

        if let Some(fallback) = &entry.on_ssr_fetch_error {
            config = config.with_fallback(StaticFallback::from_config(fallback)?);
        }

        Ok(config)
    }
}

impl fmt::Debug for FragmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentConfig")
            .field("fragment_id", &self.fragment_id)
            .field("route_patterns", &self.route_patterns)
            .field("endpoint", &self.endpoint)
            .field("pre_piercing_class_names", &self.pre_piercing_class_names)
            .field("forward_fragment_headers", &self.forward_fragment_headers)
            .field("additional_headers", &self.additional_headers)
            .field("on_ssr_fetch_error", &self.on_ssr_fetch_error.is_some())
            .finish()
    }
}
