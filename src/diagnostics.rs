//! Diagnostics renderer.
//!
//! Build-time failures must be observable in the rendered page, not
//! swallowed at the terminal: captured runtime errors and console output are
//! injected into a fixed-position overlay appended to `<body>`. The overlay
//! and its stylesheet are created lazily, at most once per document, checked
//! by the presence of the marker class.

use crate::dom::{PageDocument, PageNode};
use crate::runner::RuntimeError;

pub const OVERLAY_CLASS: &str = "tk-diagnostics";
pub const ERROR_CLASS: &str = "tk-error";
pub const LOG_CLASS: &str = "tk-log";

const OVERLAY_STYLE: &str = "\
.tk-diagnostics{position:fixed;bottom:0;left:0;right:0;max-height:45vh;overflow:auto;\
background:rgba(16,16,16,0.85);color:#ddd;font-family:monospace;font-size:12px;\
line-height:1.5;padding:8px 12px;z-index:99999}\
.tk-diagnostics .tk-error{color:#ff7b72;border-bottom:1px solid rgba(255,255,255,0.08);\
padding:2px 0;white-space:pre-wrap}\
.tk-diagnostics .tk-log{color:#9ecbff;border-bottom:1px solid rgba(255,255,255,0.08);\
padding:2px 0;white-space:pre-wrap}";

/// Ensure the overlay container and its style block exist, creating both at
/// most once per document.
fn ensure_overlay(document: &mut PageDocument) {
    if document.has_element_with_class(OVERLAY_CLASS) {
        return;
    }
    document.append_to(
        "head",
        PageNode::element("style", vec![], vec![PageNode::text(OVERLAY_STYLE)]),
    );
    document.append_to(
        "body",
        PageNode::element(
            "div",
            vec![("class".to_string(), OVERLAY_CLASS.to_string())],
            vec![],
        ),
    );
}

/// Multi-line stacks render legibly only if their whitespace survives HTML
/// collapsing, so the combined message+stack text is emitted as markup with
/// explicit breaks and non-breaking spaces.
fn format_with_stack(message: &str, stack: &str) -> String {
    let combined = format!("{}\n{}", message, stack);
    combined
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>")
        .replace('\t', "&nbsp;&nbsp;&nbsp;&nbsp;")
        .replace(' ', "&nbsp;")
}

fn diagnostic_div(class: &str, content: PageNode) -> PageNode {
    PageNode::element(
        "div",
        vec![("class".to_string(), class.to_string())],
        vec![content],
    )
}

/// Render captured errors into the overlay, in capture order. Rendering an
/// empty list creates nothing.
pub fn render_errors(errors: &[RuntimeError], document: &mut PageDocument) {
    if errors.is_empty() {
        return;
    }
    ensure_overlay(document);
    for error in errors {
        let content = match &error.stack {
            Some(stack) => PageNode::raw(format_with_stack(&error.message, stack)),
            None => PageNode::text(error.message.clone()),
        };
        document.append_to_class(OVERLAY_CLASS, diagnostic_div(ERROR_CLASS, content));
    }
}

/// Render captured console output into the overlay, in capture order. The
/// runner has already pretty-printed non-string arguments.
pub fn render_logs(logs: &[String], document: &mut PageDocument) {
    if logs.is_empty() {
        return;
    }
    ensure_overlay(document);
    for log in logs {
        document.append_to_class(
            OVERLAY_CLASS,
            diagnostic_div(LOG_CLASS, PageNode::text(log.clone())),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_doc() -> PageDocument {
        PageDocument::parse("<html><head></head><body></body></html>")
    }

    #[test]
    fn errors_become_visible_overlay_entries() {
        let mut doc = empty_doc();
        render_errors(&[RuntimeError::new("custom error")], &mut doc);
        assert!(doc.has_element_with_class(OVERLAY_CLASS));
        assert_eq!(doc.count_elements_with_class(ERROR_CLASS), 1);
        assert!(doc.text_of_class(ERROR_CLASS).contains("custom error"));
    }

    #[test]
    fn stack_traces_render_with_explicit_line_breaks() {
        let mut doc = empty_doc();
        let error = RuntimeError {
            message: "boom".to_string(),
            stack: Some("at first\n\tat second".to_string()),
        };
        render_errors(&[error], &mut doc);
        let html = doc.serialize();
        assert!(html.contains("boom<br>at&nbsp;first<br>&nbsp;&nbsp;&nbsp;&nbsp;at&nbsp;second"));
    }

    #[test]
    fn message_without_stack_is_used_unmodified() {
        let mut doc = empty_doc();
        render_errors(&[RuntimeError::new("plain message")], &mut doc);
        assert_eq!(doc.text_of_class(ERROR_CLASS), "plain message");
    }

    #[test]
    fn overlay_is_created_at_most_once() {
        let mut doc = empty_doc();
        render_errors(&[RuntimeError::new("one")], &mut doc);
        render_errors(&[RuntimeError::new("two")], &mut doc);
        render_logs(&["a log".to_string()], &mut doc);
        assert_eq!(doc.count_elements_with_class(OVERLAY_CLASS), 1);
        assert_eq!(doc.count_elements_with_class(ERROR_CLASS), 2);
        assert_eq!(doc.count_elements_with_class(LOG_CLASS), 1);
    }

    #[test]
    fn no_diagnostics_means_no_overlay() {
        let mut doc = empty_doc();
        render_errors(&[], &mut doc);
        render_logs(&[], &mut doc);
        assert!(!doc.has_element_with_class(OVERLAY_CLASS));
        assert!(!doc.serialize().contains("tk-diagnostics"));
    }

    #[test]
    fn entries_keep_capture_order() {
        let mut doc = empty_doc();
        render_errors(
            &[RuntimeError::new("first"), RuntimeError::new("second")],
            &mut doc,
        );
        let html = doc.serialize();
        let first = html.find("first").expect("first");
        let second = html.find("second").expect("second");
        assert!(first < second);
    }
}
