//! Outbound fragment request construction.
//!
//! # Responsibilities
//! - Rewrite the destination to `{endpoint}{path}{query}`
//! - Tag the request as embedded so the fragment can tell it from a real navigation
//! - Vary caches on the classification header
//! - Force a readable encoding (identity for documents, configured value in development)

use axum::body::Body;
use axum::http::{header, request, HeaderMap, HeaderName, HeaderValue, Method, Request, Uri};

use super::classify::RequestClass;
use super::fetch::FetchError;
use super::handler::PipelineOptions;
use crate::routing::FragmentConfig;

/// Marks gateway-initiated requests to a fragment upstream.
pub const FRAGMENT_MODE_HEADER: HeaderName = HeaderName::from_static("x-fragment-mode");

/// Caches must key on the classification header, so a soft-navigation fetch
/// and a document fetch of the same path never collide.
const VARY_ON_CLASSIFICATION: &str = "sec-fetch-dest";

const HOP_BY_HOP: [HeaderName; 6] = [
    header::CONNECTION,
    header::HOST,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
];

/// Request head sent to a fragment upstream.
///
/// Cloneable so the fallback handler can inspect what was attempted.
#[derive(Debug, Clone)]
pub struct FragmentRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl FragmentRequest {
    pub fn build(
        parts: &request::Parts,
        fragment: &FragmentConfig,
        class: RequestClass,
        options: &PipelineOptions,
    ) -> Result<Self, FetchError> {
        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let target = format!("{}{}", fragment.endpoint, path_and_query);
        let uri: Uri = target
            .parse()
            .map_err(|_| FetchError::InvalidTarget(target.clone()))?;

        let mut headers = parts.headers.clone();
        for name in &HOP_BY_HOP {
            headers.remove(name);
        }
        for (name, value) in &fragment.additional_headers {
            headers.insert(name.clone(), value.clone());
        }

        headers.insert(FRAGMENT_MODE_HEADER, HeaderValue::from_static("embedded"));
        headers.insert(header::VARY, HeaderValue::from_static(VARY_ON_CLASSIFICATION));
        if options.development {
            headers.insert(header::ACCEPT_ENCODING, options.development_accept_encoding.clone());
        }

        let method = if class == RequestClass::Document {
            // The markup is rewritten in flight, so it must arrive uncompressed
            // and the document fetch never carries a body.
            headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
            headers.remove(header::CONTENT_LENGTH);
            headers.remove(header::TRANSFER_ENCODING);
            Method::GET
        } else {
            parts.method.clone()
        };

        Ok(Self {
            method,
            uri,
            headers,
        })
    }

    /// Materialize the request with a body.
    pub fn to_request(&self, body: Body) -> Request<Body> {
        let mut request = Request::new(body);
        *request.method_mut() = self.method.clone();
        *request.uri_mut() = self.uri.clone();
        *request.headers_mut() = self.headers.clone();
        request
    }

    #[cfg(test)]
    pub(crate) fn for_test(url: &str) -> Self {
        Self {
            method: Method::GET,
            uri: url.parse().unwrap(),
            headers: HeaderMap::new(),
        }
    }
}
