//! Conversions between the socket model and `Request`/`Response` values.

use std::io;

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode, Uri};
use futures_util::StreamExt;

use super::socket::{ResponseWriter, SocketRequest};

const FORWARDED_PROTO: &str = "x-forwarded-proto";

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("invalid request target `{0}`")]
    InvalidTarget(String),
}

/// Absolute URL of a socket request.
///
/// Scheme comes from `x-forwarded-proto`, falling back to the connection's
/// TLS flag; authority comes from the `host` header.
pub fn request_uri(request: &SocketRequest) -> Result<Uri, ConvertError> {
    let invalid = || ConvertError::InvalidTarget(request.target.clone());

    if request.target.starts_with("http://") || request.target.starts_with("https://") {
        return request.target.parse().map_err(|_| invalid());
    }

    let forwarded = request
        .headers
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let scheme = match forwarded {
        Some(proto) => proto,
        None if request.encrypted => "https",
        None => "http",
    };
    let host = request
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    let target = if request.target.starts_with('/') {
        request.target.as_str()
    } else {
        "/"
    };

    format!("{scheme}://{host}{target}")
        .parse()
        .map_err(|_| invalid())
}

fn carries_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD)
}

/// Wrap a socket request into a `Request<Body>`.
///
/// The body stream is only attached for methods that carry one; it is
/// polled lazily by whoever reads the request body.
pub fn into_request(request: SocketRequest) -> Result<Request<Body>, ConvertError> {
    let uri = request_uri(&request)?;

    let body = match request.body {
        Some(stream) if carries_body(&request.method) => Body::from_stream(stream),
        _ => Body::empty(),
    };

    let mut out = Request::new(body);
    *out.method_mut() = request.method;
    *out.uri_mut() = uri;
    *out.version_mut() = request.version;
    *out.headers_mut() = request.headers;
    Ok(out)
}

/// Turn a `Request<Body>` back into what a socket handler expects.
pub fn into_socket_request(request: Request<Body>, encrypted: bool) -> SocketRequest {
    let (parts, body) = request.into_parts();
    let target = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    let body = carries_body(&parts.method).then(|| {
        body.into_data_stream()
            .map(|chunk| chunk.map_err(io::Error::other))
            .boxed()
    });

    SocketRequest {
        method: parts.method,
        target,
        version: parts.version,
        headers: parts.headers,
        encrypted,
        body,
    }
}

fn forbids_body(status: StatusCode) -> bool {
    status.is_informational()
        || status == StatusCode::NO_CONTENT
        || status == StatusCode::RESET_CONTENT
        || status == StatusCode::NOT_MODIFIED
}

/// Write a `Response<Body>` through a socket-model writer.
///
/// Headers are appended so repeated values survive. The body is piped chunk
/// by chunk; a body error destroys the writer.
pub async fn write_response(
    response: Response<Body>,
    writer: &mut dyn ResponseWriter,
) -> io::Result<()> {
    if writer.headers_sent() {
        tracing::warn!("Response head already sent, dropping pipeline response");
        return Ok(());
    }

    let (parts, body) = response.into_parts();
    let headers = writer.headers_mut();
    for (name, value) in parts.headers.iter() {
        headers.append(name.clone(), value.clone());
    }
    writer.write_head(parts.status);

    if forbids_body(parts.status) {
        writer.end().await;
        return Ok(());
    }

    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(error = %e, "Response body failed mid-stream");
                writer.destroy(io::Error::other(e.to_string()));
                return Err(io::Error::other(e));
            }
        };
        if chunk.is_empty() {
            continue;
        }
        if let Err(e) = writer.write(chunk).await {
            writer.destroy(io::Error::new(e.kind(), e.to_string()));
            return Err(e);
        }
    }

    writer.end().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::capture::capture;
    use axum::http::HeaderValue;
    use bytes::Bytes;

    fn request(
        method: Method,
        target: &str,
        headers: &[(&'static str, &'static str)],
    ) -> SocketRequest {
        let mut request = SocketRequest::new(method, target);
        for (name, value) in headers {
            request.headers.insert(*name, HeaderValue::from_static(value));
        }
        let body = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(
            b"payload",
        ))]);
        request.body = Some(body.boxed());
        request
    }

    #[test]
    fn test_uri_reconstruction() {
        let plain = request(Method::GET, "/foo?x=1", &[("host", "example.com")]);
        assert_eq!(request_uri(&plain).unwrap(), "http://example.com/foo?x=1");

        let forwarded = request(
            Method::GET,
            "/foo",
            &[("host", "example.com"), ("x-forwarded-proto", "https, http")],
        );
        assert_eq!(request_uri(&forwarded).unwrap(), "https://example.com/foo");

        let mut tls = request(Method::GET, "/", &[("host", "example.com:8443")]);
        tls.encrypted = true;
        assert_eq!(request_uri(&tls).unwrap(), "https://example.com:8443/");

        let no_host = request(Method::GET, "/bar", &[]);
        assert_eq!(request_uri(&no_host).unwrap(), "http://localhost/bar");
    }

    #[tokio::test]
    async fn test_body_only_for_methods_that_carry_one() {
        let get = into_request(request(Method::GET, "/", &[])).unwrap();
        let bytes = axum::body::to_bytes(get.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());

        let post = into_request(request(Method::POST, "/", &[])).unwrap();
        let bytes = axum::body::to_bytes(post.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"payload");
    }

    #[tokio::test]
    async fn test_write_response_appends_headers_and_streams_body() {
        let mut response = Response::new(Body::from("hello"));
        *response.status_mut() = StatusCode::ACCEPTED;
        response
            .headers_mut()
            .append("set-cookie", HeaderValue::from_static("a=1"));
        response
            .headers_mut()
            .append("set-cookie", HeaderValue::from_static("b=2"));

        let (mut writer, captured) = capture(4);
        writer
            .headers_mut()
            .insert("x-preset", HeaderValue::from_static("1"));
        write_response(response, &mut writer).await.unwrap();

        let captured = captured.await.unwrap();
        assert_eq!(captured.status(), StatusCode::ACCEPTED);
        assert_eq!(captured.headers()["x-preset"], "1");
        assert_eq!(captured.headers().get_all("set-cookie").iter().count(), 2);
        let bytes = axum::body::to_bytes(captured.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_bodiless_statuses_skip_body() {
        for status in [
            StatusCode::CONTINUE,
            StatusCode::NO_CONTENT,
            StatusCode::RESET_CONTENT,
            StatusCode::NOT_MODIFIED,
        ] {
            let mut response = Response::new(Body::from("ignored"));
            *response.status_mut() = status;

            let (mut writer, captured) = capture(4);
            write_response(response, &mut writer).await.unwrap();

            let captured = captured.await.unwrap();
            assert_eq!(captured.status(), status);
            let bytes = axum::body::to_bytes(captured.into_body(), usize::MAX)
                .await
                .unwrap();
            assert!(bytes.is_empty(), "{status} carried a body");
        }
    }
}
