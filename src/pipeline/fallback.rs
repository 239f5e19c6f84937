//! Built-in fallback used when a fragment has no `on_ssr_fetch_error`.

use axum::body::Body;
use axum::http::{header, HeaderValue, Response};

use super::request::FragmentRequest;
use crate::compose::markup::escape;
use crate::routing::{FallbackResponse, FetchFailure};

const PRODUCTION_MARKUP: &str = "<p>There was a problem fulfilling your request.</p>";

/// Small inline error fragment, embedded in place of the real one.
///
/// The upstream URL only appears in development mode.
pub fn default_fallback(
    request: &FragmentRequest,
    failure: &FetchFailure,
    development: bool,
) -> FallbackResponse {
    let markup = if development {
        format!(
            "<p>Failed to fetch fragment from <code>{}</code>: {}</p>",
            escape(&request.uri.to_string()),
            escape(&failure.to_string()),
        )
    } else {
        PRODUCTION_MARKUP.to_string()
    };

    let mut response = Response::new(Body::from(markup));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html;charset=UTF-8"),
    );
    FallbackResponse::embed(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::fetch::FetchError;
    use std::time::Duration;

    async fn body_of(fallback: FallbackResponse) -> String {
        let bytes = axum::body::to_bytes(fallback.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_production_hides_upstream() {
        let request = FragmentRequest::for_test("http://internal.fragment:4000/foo");
        let failure = FetchFailure::Error(FetchError::Timeout(Duration::from_secs(5)));

        let fallback = default_fallback(&request, &failure, false);
        assert!(!fallback.override_response);

        let body = body_of(fallback).await;
        assert_eq!(body, PRODUCTION_MARKUP);
        assert!(!body.contains("internal.fragment"));
    }

    #[tokio::test]
    async fn test_development_shows_upstream() {
        let request = FragmentRequest::for_test("http://internal.fragment:4000/foo?a=1&b=2");
        let failure = FetchFailure::Error(FetchError::Cancelled);

        let body = body_of(default_fallback(&request, &failure, true)).await;
        assert!(body.contains("<code>http://internal.fragment:4000/foo?a=1&amp;b=2</code>"));
        assert!(body.contains("cancelled"));
    }
}
