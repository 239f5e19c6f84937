//! Request ID handling.
//!
//! IDs are assigned by tower-http's `SetRequestIdLayer` as early as possible
//! and echoed on the response, so every span and log line of a request can
//! be correlated.

use axum::http::{HeaderName, Request};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The request ID assigned to `request`, if any.
pub fn request_id<B>(request: &Request<B>) -> Option<&str> {
    request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
}
