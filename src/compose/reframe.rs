//! Script neutralization for embedded fragment markup.

use axum::body::Body;
use axum::http::{header, Response};
use lol_html::element;
use lol_html::send::Settings;

use super::markup::{INERT_SCRIPT_TYPE, ORIGINAL_TYPE_ATTRIBUTE};
use super::rewrite::rewrite_body;
use super::ComposeOptions;

/// Mark every `<script>` in the fragment body inert.
///
/// The original `type`, if any, moves to `data-script-type` so the browser
/// runtime can restore it when it re-executes scripts inside the iframe.
pub fn prepare_fragment_for_reframing(
    fragment: Response<Body>,
    options: &ComposeOptions,
) -> Response<Body> {
    let (mut parts, body) = fragment.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);

    let body = rewrite_body(
        body,
        || Settings {
            element_content_handlers: vec![element!("script", |el| {
                if let Some(original) = el.get_attribute("type") {
                    el.set_attribute(ORIGINAL_TYPE_ATTRIBUTE, &original)?;
                }
                el.set_attribute("type", INERT_SCRIPT_TYPE)?;
                Ok(())
            })],
            ..Settings::new_send()
        },
        options.stream_buffer,
    );

    Response::from_parts(parts, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn reframe(html: &'static str) -> String {
        let response = prepare_fragment_for_reframing(
            Response::new(Body::from(html)),
            &ComposeOptions::default(),
        );
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_typed_script_keeps_original_type() {
        let html = reframe(r#"<script type="module" src="/app.js"></script>"#).await;
        assert_eq!(
            html,
            r#"<script type="inert" src="/app.js" data-script-type="module"></script>"#
        );
    }

    #[tokio::test]
    async fn test_untyped_script_only_gets_inert_type() {
        let html = reframe("<p>x</p><script>run()</script>").await;
        assert_eq!(html, r#"<p>x</p><script type="inert">run()</script>"#);
    }

    #[tokio::test]
    async fn test_markup_without_scripts_is_untouched() {
        let html = reframe("<p>foo fragment</p>").await;
        assert_eq!(html, "<p>foo fragment</p>");
    }
}
