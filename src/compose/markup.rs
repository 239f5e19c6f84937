//! Fixed markup emitted by the gateway.
//!
//! The browser runtime parses these strings, so the exact bytes matter.

/// Served to the runtime's hidden iframe.
pub const IFRAME_STUB: &str = "<!doctype html><title>";

/// Script type no browser executes.
pub const INERT_SCRIPT_TYPE: &str = "inert";

/// Side attribute holding a neutralized script's original type.
pub const ORIGINAL_TYPE_ATTRIBUTE: &str = "data-script-type";

/// Escape text for use in element content or a quoted attribute.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// `<style>` block appended to `<head>`; `None` when there is nothing to add.
pub fn style_block(styles: &str) -> Option<String> {
    if styles.trim().is_empty() {
        None
    } else {
        Some(format!("<style>{styles}</style>"))
    }
}

/// Wrap fragment markup in its host element and declarative shadow root.
pub fn fragment_host(fragment_id: &str, class_names: &[String], html: &str) -> String {
    format!(
        "<fragment-host class=\"{}\" fragment-id=\"{}\" data-piercing=\"true\"><template shadowrootmode=\"open\">{}</template></fragment-host>",
        escape(&class_names.join(" ")),
        escape(fragment_id),
        html,
    )
}
