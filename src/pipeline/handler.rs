//! The composition pipeline.
//!
//! # State Machine (per request)
//! ```text
//! match registry ──no──▶ next() ──▶ response unchanged
//!      │yes
//!      ├─ iframe-probe ──▶ static stub (no fetch, no next)
//!      ├─ fragment-asset ─▶ fetch fragment upstream ──▶ verbatim
//!      └─ document ──▶ start fragment fetch (not awaited)
//!                      ──▶ next() for the shell
//!                      ──▶ shell 2xx + text/html? ──no──▶ shell unchanged
//!                      ──▶ settle fetch (head + body, one timeout)
//!                            ──fail──▶ fallback ──override──▶ fallback verbatim
//!                      ──▶ compose(shell, fragment) ──▶ forwarded headers
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode, Uri};
use axum::response::IntoResponse;

use super::classify::RequestClass;
use super::context::CompositionContext;
use super::fallback::default_fallback;
use super::fetch::FragmentFetcher;
use super::next::BoxNext;
use super::request::FragmentRequest;
use super::Pipeline;
use crate::compose::{self, markup, ComposeOptions, SettledFragment};
use crate::config::schema::{CompositionConfig, Environment};
use crate::observability::metrics;
use crate::routing::{FragmentConfig, FragmentRegistry};

/// Runtime knobs of the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub development: bool,
    /// Bound on the document-branch fragment fetch.
    pub fragment_timeout: Duration,
    pub development_accept_encoding: HeaderValue,
    pub compose: ComposeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            development: false,
            fragment_timeout: Duration::from_secs(5),
            development_accept_encoding: HeaderValue::from_static("gzip"),
            compose: ComposeOptions::default(),
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &CompositionConfig) -> Self {
        let fragment_timeout = Duration::from_millis(config.fragment_timeout_ms);
        let development_accept_encoding =
            HeaderValue::from_str(&config.development_accept_encoding)
                .unwrap_or_else(|_| HeaderValue::from_static("gzip"));

        Self {
            development: config.environment == Environment::Development,
            fragment_timeout,
            development_accept_encoding,
            compose: ComposeOptions {
                pre_piercing_styles: Arc::from(config.pre_piercing_styles.as_str()),
                max_fragment_bytes: config.max_fragment_bytes,
                stream_buffer: config.stream_buffer_chunks,
            },
        }
    }
}

/// Routes matched requests to the iframe, asset or document branch.
pub struct CompositionPipeline {
    registry: Arc<FragmentRegistry>,
    fetcher: Arc<dyn FragmentFetcher>,
    options: PipelineOptions,
}

impl CompositionPipeline {
    pub fn new(
        registry: Arc<FragmentRegistry>,
        fetcher: Arc<dyn FragmentFetcher>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            registry,
            fetcher,
            options,
        }
    }

    pub fn registry(&self) -> &FragmentRegistry {
        &self.registry
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    async fn handle_fragment_asset(
        &self,
        fragment: Arc<FragmentConfig>,
        request: Request<Body>,
    ) -> Response<Body> {
        let (parts, body) = request.into_parts();
        let class = RequestClass::FragmentAsset;
        let outbound = match FragmentRequest::build(&parts, &fragment, class, &self.options) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::warn!(
                    fragment_id = %fragment.fragment_id,
                    error = %e,
                    "Cannot build fragment request"
                );
                return bad_gateway();
            }
        };

        match self.fetcher.fetch(outbound.to_request(body)).await {
            Ok(response) => {
                metrics::record_fragment_fetch(&fragment.fragment_id, "ok");
                response
            }
            Err(e) => {
                tracing::warn!(
                    fragment_id = %fragment.fragment_id,
                    url = %outbound.uri,
                    error = %e,
                    "Fragment asset request failed"
                );
                metrics::record_fragment_fetch(&fragment.fragment_id, "error");
                bad_gateway()
            }
        }
    }

    async fn handle_document(
        &self,
        fragment: Arc<FragmentConfig>,
        request: Request<Body>,
        next: BoxNext,
    ) -> Response<Body> {
        let (mut parts, body) = request.into_parts();

        let class = RequestClass::Document;
        let outbound = match FragmentRequest::build(&parts, &fragment, class, &self.options) {
            Ok(outbound) => outbound,
            Err(e) => {
                tracing::warn!(
                    fragment_id = %fragment.fragment_id,
                    error = %e,
                    "Cannot build fragment request, serving shell alone"
                );
                return next.call(Request::from_parts(parts, body)).await;
            }
        };

        // Both legs run concurrently; the fragment result is only used once
        // the shell is known to be composable.
        let mut context = CompositionContext::start(
            fragment,
            outbound,
            Arc::clone(&self.fetcher),
            self.options.fragment_timeout,
            self.options.compose.clone(),
        );

        parts
            .headers
            .insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        let shell = next.call(Request::from_parts(parts, body)).await;

        if !is_composable_shell(shell.status(), shell.headers()) {
            tracing::debug!(
                fragment_id = %context.fragment.fragment_id,
                status = %shell.status(),
                "Shell is not composable HTML, returning it unchanged"
            );
            return shell;
        }

        let settled = match context.settle().await {
            Ok(settled) => {
                metrics::record_fragment_fetch(&context.fragment.fragment_id, "ok");
                settled
            }
            Err(failure) => {
                tracing::warn!(
                    fragment_id = %context.fragment.fragment_id,
                    url = %context.request.uri,
                    failure = %failure,
                    "Fragment fetch failed, using fallback"
                );
                metrics::record_fragment_fetch(&context.fragment.fragment_id, "fallback");

                let fallback = match &context.fragment.on_ssr_fetch_error {
                    Some(handler) => handler.on_error(&context.request, failure).await,
                    None => default_fallback(&context.request, &failure, self.options.development),
                };
                // An override is the whole reply; the shell is discarded.
                if fallback.override_response {
                    return fallback.response;
                }
                self.settle_fallback(&context.fragment, fallback.response).await
            }
        };

        compose::compose(shell, &settled, &context.fragment, &self.options.compose)
    }

    /// Read an embedded fallback the same way a fetched fragment is read.
    async fn settle_fallback(
        &self,
        fragment: &FragmentConfig,
        response: Response<Body>,
    ) -> SettledFragment {
        let headers = response.headers().clone();
        match SettledFragment::read(response, &self.options.compose).await {
            Ok(settled) => settled,
            Err(e) => {
                tracing::warn!(
                    fragment_id = %fragment.fragment_id,
                    error = %e,
                    "Fallback body could not be read, embedding an empty fragment"
                );
                SettledFragment::new(headers, "")
            }
        }
    }
}

#[async_trait]
impl Pipeline for CompositionPipeline {
    fn intercepts(&self, uri: &Uri, _headers: &HeaderMap) -> bool {
        self.registry.match_request_to_fragment(uri).is_some()
    }

    async fn handle(&self, request: Request<Body>, next: BoxNext) -> Response<Body> {
        let start = Instant::now();

        let Some(fragment) = self.registry.match_request_to_fragment(&request) else {
            let response = next.call(request).await;
            metrics::record_request("passthrough", response.status().as_u16(), start);
            return response;
        };

        let class = RequestClass::from_headers(request.headers());
        tracing::debug!(
            fragment_id = %fragment.fragment_id,
            class = %class,
            path = %request.uri().path(),
            "Request matched fragment"
        );

        let response = match class {
            RequestClass::IframeProbe => iframe_stub(),
            RequestClass::FragmentAsset => self.handle_fragment_asset(fragment, request).await,
            RequestClass::Document => self.handle_document(fragment, request, next).await,
        };

        metrics::record_request(class.as_str(), response.status().as_u16(), start);
        response
    }
}

/// Blank same-origin page the browser runtime loads into its iframe.
pub fn iframe_stub() -> Response<Body> {
    let mut response = Response::new(Body::from(markup::IFRAME_STUB));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
    response
}

fn bad_gateway() -> Response<Body> {
    (StatusCode::BAD_GATEWAY, "Fragment upstream request failed").into_response()
}

/// Only successful, uncompressed HTML shells are decorated.
pub fn is_composable_shell(status: StatusCode, headers: &HeaderMap) -> bool {
    let is_html = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("text/html"))
        .unwrap_or(false);
    let is_identity = headers
        .get(header::CONTENT_ENCODING)
        .map(|v| v.as_bytes().eq_ignore_ascii_case(b"identity"))
        .unwrap_or(true);

    status.is_success() && is_html && is_identity
}
