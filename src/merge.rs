//! Script merger.
//!
//! Pre-rendering tends to leave several inline `<script>` fragments behind.
//! This pass collects every inline script (document order), removes the
//! originals, and appends one consolidated script node to `<head>`, tagged
//! with the marker class. Scripts already carrying the marker are never
//! collected again, so a second pass over an already-merged document is a
//! strict no-op.

use crate::dom::{PageDocument, PageNode};

/// Class carried by the consolidated script node.
pub const MERGED_SCRIPT_CLASS: &str = "tk-merged-scripts";

/// Consolidate inline scripts into a single `<head>` script node.
///
/// Returns the serialized document (doctype included) after the merge, or
/// `None` when there was nothing to merge — in that case the document is
/// left untouched.
pub fn merge(document: &mut PageDocument) -> Option<String> {
    let collected = document.take_inline_scripts(Some(MERGED_SCRIPT_CLASS));
    let merged: String = collected.concat();

    if merged.is_empty() {
        return None;
    }

    let script = PageNode::element(
        "script",
        vec![("class".to_string(), MERGED_SCRIPT_CLASS.to_string())],
        vec![PageNode::text(merged)],
    );
    document.append_to("head", script);

    Some(document.serialize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_inline_scripts_into_head_in_document_order() {
        let mut doc = PageDocument::parse(
            "<head><script>one();</script></head>\
             <body><script>two();</script><script>three();</script></body>",
        );
        let html = merge(&mut doc).expect("merged");
        assert!(html.contains("one();two();three();"));
        assert_eq!(doc.count_elements_with_class(MERGED_SCRIPT_CLASS), 1);
        // Originals are gone: the only remaining script is the merged one.
        assert_eq!(doc.inline_script_texts().len(), 1);
    }

    #[test]
    fn merged_script_lands_last_in_head() {
        let mut doc = PageDocument::parse(
            "<head><title>t</title></head><body><script>go();</script></body>",
        );
        let html = merge(&mut doc).expect("merged");
        let head_end = html.find("</head>").expect("head");
        let script_at = html.find(MERGED_SCRIPT_CLASS).expect("script");
        assert!(script_at < head_end);
    }

    #[test]
    fn external_scripts_are_left_alone() {
        let mut doc = PageDocument::parse(
            "<body><script src=\"client.js\"></script><script>inline();</script></body>",
        );
        let html = merge(&mut doc).expect("merged");
        assert!(html.contains("src=\"client.js\""));
        assert!(!html.contains("inline();src"));
    }

    #[test]
    fn nothing_to_merge_leaves_the_document_untouched() {
        let mut doc = PageDocument::parse("<body><p>static</p></body>");
        let before = doc.serialize();
        assert!(merge(&mut doc).is_none());
        assert_eq!(doc.serialize(), before);
        assert_eq!(doc.count_elements_with_class(MERGED_SCRIPT_CLASS), 0);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let mut doc = PageDocument::parse("<body><script>once();</script></body>");
        merge(&mut doc).expect("first pass merges");
        let after_first = doc.serialize();

        assert!(merge(&mut doc).is_none());
        assert_eq!(doc.serialize(), after_first);
        assert_eq!(doc.count_elements_with_class(MERGED_SCRIPT_CLASS), 1);
    }
}
