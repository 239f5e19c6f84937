//! Fragment response header forwarding.

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, Response};

use crate::routing::FragmentConfig;

/// Copy whitelisted fragment headers onto the composed response.
///
/// A whitelisted header the fragment did not send is still set, with an
/// empty value. Nothing outside the whitelist is copied.
pub fn attach_forwarded_headers(
    response: &mut Response<Body>,
    fragment_headers: &HeaderMap,
    fragment: &FragmentConfig,
) {
    let headers = response.headers_mut();
    for name in &fragment.forward_fragment_headers {
        let mut values = fragment_headers.get_all(name).iter();
        match values.next() {
            Some(first) => {
                headers.insert(name.clone(), first.clone());
                for value in values {
                    headers.append(name.clone(), value.clone());
                }
            }
            None => {
                headers.insert(name.clone(), HeaderValue::from_static(""));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderName;

    #[test]
    fn test_forwarding_whitelist() {
        let fragment =
            FragmentConfig::new("foo", "http://foo.test", ["/foo"]).with_forwarded_headers([
                HeaderName::from_static("x-foo"),
                HeaderName::from_static("x-missing"),
                HeaderName::from_static("set-cookie"),
            ]);

        let mut fragment_headers = HeaderMap::new();
        fragment_headers.insert("x-foo", HeaderValue::from_static("bar"));
        fragment_headers.insert("x-secret", HeaderValue::from_static("nope"));
        fragment_headers.append("set-cookie", HeaderValue::from_static("a=1"));
        fragment_headers.append("set-cookie", HeaderValue::from_static("b=2"));

        let mut response = Response::new(Body::empty());
        response
            .headers_mut()
            .insert("x-foo", HeaderValue::from_static("shell"));
        attach_forwarded_headers(&mut response, &fragment_headers, &fragment);

        let headers = response.headers();
        assert_eq!(headers["x-foo"], "bar");
        assert_eq!(headers["x-missing"], "");
        assert_eq!(headers.get_all("set-cookie").iter().count(), 2);
        assert!(headers.get("x-secret").is_none());
    }
}
