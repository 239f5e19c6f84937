//! Shell rewriting: styles into `<head>`, fragment into `<body>`.
//!
//! # Design Decisions
//! - Fragment markup is settled to text before the shell is rewritten,
//!   because element content must be handed to the rewriter in one piece
//! - The shell itself is never buffered

use axum::body::Body;
use axum::http::{header, HeaderMap, Response};
use lol_html::html_content::ContentType;
use lol_html::element;
use lol_html::send::Settings;

use super::markup;
use super::reframe::prepare_fragment_for_reframing;
use super::rewrite::rewrite_body;
use super::ComposeOptions;
use crate::routing::FragmentConfig;

/// A fragment response whose body has been marked inert and read to text.
#[derive(Debug, Clone, Default)]
pub struct SettledFragment {
    /// Fragment response headers, the source for forwarded headers.
    pub headers: HeaderMap,
    pub markup: String,
}

impl SettledFragment {
    pub fn new(headers: HeaderMap, markup: impl Into<String>) -> Self {
        Self {
            headers,
            markup: markup.into(),
        }
    }

    /// Reframe `response` and read its body, up to `max_fragment_bytes`.
    pub async fn read(
        response: Response<Body>,
        options: &ComposeOptions,
    ) -> Result<Self, axum::Error> {
        let headers = response.headers().clone();
        let prepared = prepare_fragment_for_reframing(response, options);
        let bytes = axum::body::to_bytes(prepared.into_body(), options.max_fragment_bytes).await?;

        Ok(Self {
            headers,
            markup: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

/// Stream the shell, injecting pre-piercing styles and the wrapped fragment.
pub fn embed_fragment_into_host(
    shell: Response<Body>,
    fragment: &FragmentConfig,
    fragment_markup: &str,
    options: &ComposeOptions,
) -> Response<Body> {
    let (mut parts, body) = shell.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);

    let style = markup::style_block(&options.pre_piercing_styles);
    let host = markup::fragment_host(
        &fragment.fragment_id,
        &fragment.pre_piercing_class_names,
        fragment_markup,
    );

    let body = rewrite_body(
        body,
        move || {
            let mut host = Some(host);
            Settings {
                element_content_handlers: vec![
                    element!("head", move |el| {
                        if let Some(style) = &style {
                            el.append(style, ContentType::Html);
                        }
                        Ok(())
                    }),
                    element!("body", move |el| {
                        if let Some(host) = host.take() {
                            el.append(&host, ContentType::Html);
                        }
                        Ok(())
                    }),
                ],
                ..Settings::new_send()
            }
        },
        options.stream_buffer,
    );

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    fn fragment() -> FragmentConfig {
        FragmentConfig::new("foo", "http://foo.test", ["/foo/:_*"]).with_class_names(["foo"])
    }

    async fn text(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_styles_and_wrapper() {
        let options = ComposeOptions {
            pre_piercing_styles: Arc::from("fragment-host{display:block}"),
            ..ComposeOptions::default()
        };
        let mut shell = Response::new(Body::from(
            "<html><head><title>t</title></head><body><main>legacy</main></body></html>",
        ));
        shell
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from_static("72"));

        let composed = embed_fragment_into_host(shell, &fragment(), "<p>hi</p>", &options);
        assert!(composed.headers().get(header::CONTENT_LENGTH).is_none());
        assert_eq!(
            text(composed).await,
            "<html><head><title>t</title><style>fragment-host{display:block}</style></head>\
             <body><main>legacy</main><fragment-host class=\"foo\" fragment-id=\"foo\" data-piercing=\"true\">\
             <template shadowrootmode=\"open\"><p>hi</p></template></fragment-host></body></html>"
        );
    }

    #[tokio::test]
    async fn test_shell_without_body_is_passed_through() {
        let composed = embed_fragment_into_host(
            Response::new(Body::from("<p>bare</p>")),
            &fragment(),
            "<p>hi</p>",
            &ComposeOptions::default(),
        );
        assert_eq!(text(composed).await, "<p>bare</p>");
    }

    #[tokio::test]
    async fn test_read_respects_size_limit() {
        let options = ComposeOptions {
            max_fragment_bytes: 4,
            ..ComposeOptions::default()
        };
        let result =
            SettledFragment::read(Response::new(Body::from("<p>far too long</p>")), &options).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_read_keeps_headers_and_marks_scripts() {
        let mut response = Response::new(Body::from("<script>go()</script>"));
        response
            .headers_mut()
            .insert("x-foo", HeaderValue::from_static("1"));

        let settled = SettledFragment::read(response, &ComposeOptions::default())
            .await
            .unwrap();
        assert_eq!(settled.headers["x-foo"], "1");
        assert_eq!(settled.markup, r#"<script type="inert">go()</script>"#);
    }
}
