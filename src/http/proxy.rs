//! Legacy host proxy: the production `next` for both stream models.

use std::io;
use std::time::Instant;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::State;
use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{header, HeaderName, Request, Response, StatusCode, Uri, Version};
use axum::response::IntoResponse;

use super::client::UpstreamClient;
use super::request::request_id;
use crate::adapter::{into_request, write_response, ResponseWriter, SocketHandler, SocketRequest};

const HOP_BY_HOP: [&str; 6] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

#[derive(Debug, thiserror::Error)]
#[error("invalid host upstream `{0}`")]
pub struct InvalidUpstream(String);

/// Forwards requests to the legacy host that renders shells.
#[derive(Clone)]
pub struct HostProxy {
    client: UpstreamClient,
    scheme: Scheme,
    authority: Authority,
}

impl HostProxy {
    pub fn new(client: UpstreamClient, upstream: &str) -> Result<Self, InvalidUpstream> {
        let invalid = || InvalidUpstream(upstream.to_string());
        let uri: Uri = upstream.parse().map_err(|_| invalid())?;
        let parts = uri.into_parts();

        Ok(Self {
            client,
            scheme: parts.scheme.ok_or_else(invalid)?,
            authority: parts.authority.ok_or_else(invalid)?,
        })
    }

    /// Forward a request, streaming both bodies.
    ///
    /// Transport failures become `502 Bad Gateway`.
    pub async fn forward(&self, request: Request<Body>) -> Response<Body> {
        let start = Instant::now();
        let request_id = request_id(&request).unwrap_or("unknown").to_string();
        let (mut parts, body) = request.into_parts();

        let mut uri_parts = parts.uri.clone().into_parts();
        uri_parts.scheme = Some(self.scheme.clone());
        uri_parts.authority = Some(self.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = match Uri::from_parts(uri_parts) {
            Ok(uri) => uri,
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Cannot rewrite request URI");
                return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
            }
        };
        parts.version = Version::HTTP_11;
        for name in HOP_BY_HOP {
            parts.headers.remove(HeaderName::from_static(name));
        }
        if let Some(host) = parts.headers.remove(header::HOST) {
            parts
                .headers
                .entry(HeaderName::from_static("x-forwarded-host"))
                .or_insert(host);
        }

        let method = parts.method.clone();
        let uri = parts.uri.clone();
        tracing::debug!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            "Forwarding to host"
        );

        match self.client.send(Request::from_parts(parts, body)).await {
            Ok(response) => {
                tracing::debug!(
                    request_id = %request_id,
                    status = %response.status(),
                    elapsed = ?start.elapsed(),
                    "Host responded"
                );
                response
            }
            Err(e) => {
                tracing::error!(
                    request_id = %request_id,
                    uri = %uri,
                    error = %e,
                    "Host upstream error"
                );
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
        }
    }
}

/// Stream-model fallback handler.
pub async fn proxy_handler(
    State(proxy): State<HostProxy>,
    request: Request<Body>,
) -> Response<Body> {
    proxy.forward(request).await
}

#[async_trait]
impl SocketHandler for HostProxy {
    async fn handle(
        &self,
        request: SocketRequest,
        mut response: Box<dyn ResponseWriter>,
    ) -> io::Result<()> {
        let upstream = match into_request(request) {
            Ok(request) => self.forward(request).await,
            Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        };
        write_response(upstream, response.as_mut()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_upstream_must_be_absolute() {
        let client = UpstreamClient::new(Duration::from_secs(1));
        assert!(HostProxy::new(client.clone(), "http://127.0.0.1:3000").is_ok());
        assert!(HostProxy::new(client.clone(), "/relative").is_err());
        assert!(HostProxy::new(client, "not a uri").is_err());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = HostProxy::new(
            UpstreamClient::new(Duration::from_secs(1)),
            &format!("http://{addr}"),
        )
        .unwrap();
        let response = proxy
            .forward(Request::builder().uri("/page").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
