//! Request classification.
//!
//! A single header decides the branch a matched request takes. The value is
//! read once and never changes for the lifetime of the request.

use std::fmt;

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the classification signal.
pub const CLASSIFICATION_HEADER: HeaderName = HeaderName::from_static("sec-fetch-dest");

/// What a request routed to a fragment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
    /// The browser runtime loading a blank same-origin page into an iframe.
    IframeProbe,
    /// A full-page navigation that must be composed.
    Document,
    /// Anything else aimed at the fragment: scripts, images, soft navigations.
    FragmentAsset,
}

impl RequestClass {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(&CLASSIFICATION_HEADER).map(|v| v.as_bytes()) {
            Some(b"document") => RequestClass::Document,
            Some(b"iframe") => RequestClass::IframeProbe,
            _ => RequestClass::FragmentAsset,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::IframeProbe => "iframe-probe",
            RequestClass::Document => "document",
            RequestClass::FragmentAsset => "fragment-asset",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn classify(value: Option<&'static str>) -> RequestClass {
        let mut headers = HeaderMap::new();
        if let Some(v) = value {
            headers.insert(CLASSIFICATION_HEADER, HeaderValue::from_static(v));
        }
        RequestClass::from_headers(&headers)
    }

    #[test]
    fn test_classification() {
        assert_eq!(classify(Some("document")), RequestClass::Document);
        assert_eq!(classify(Some("iframe")), RequestClass::IframeProbe);
        assert_eq!(classify(Some("script")), RequestClass::FragmentAsset);
        assert_eq!(classify(Some("empty")), RequestClass::FragmentAsset);
        assert_eq!(classify(None), RequestClass::FragmentAsset);
    }
}
