//! Owned document tree for the emulated-DOM pipeline.
//!
//! Page HTML is parsed with html5ever into an owned `PageNode` tree that can
//! be serialized to JSON (for transport into the JS engine), mutated by the
//! merger and diagnostics passes, and finally written back out as HTML.
//! Each page build owns exactly one `PageDocument`; trees are never shared
//! across pages or across concurrent builds.

use html5ever::tendril::TendrilSink;
use html5ever::{local_name, namespace_url, ns, parse_document, parse_fragment, QualName};
use lazy_static::lazy_static;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

lazy_static! {
    /// Elements serialized without a closing tag.
    static ref VOID_ELEMENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        for tag in [
            "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
            "param", "source", "track", "wbr",
        ] {
            s.insert(tag);
        }
        s
    };

    /// Elements whose text children are emitted verbatim.
    static ref RAW_TEXT_ELEMENTS: HashSet<&'static str> = {
        let mut s = HashSet::new();
        s.insert("script");
        s.insert("style");
        s
    };
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PageNode {
    Doctype {
        name: String,
    },
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<PageNode>,
    },
    Text {
        value: String,
    },
    Comment {
        value: String,
    },
    /// Unparsed markup captured from `innerHTML` writes inside the emulated
    /// DOM. Resolved back into structured nodes via `resolve_raw_fragments`.
    Raw {
        html: String,
    },
}

impl PageNode {
    pub fn element(tag: &str, attrs: Vec<(String, String)>, children: Vec<PageNode>) -> Self {
        PageNode::Element {
            tag: tag.to_string(),
            attrs,
            children,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        PageNode::Text {
            value: value.into(),
        }
    }

    pub fn raw(html: impl Into<String>) -> Self {
        PageNode::Raw { html: html.into() }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            PageNode::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }
}

/// Look up an attribute by name in an ordered attribute list.
pub fn attr_value<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

/// Whitespace-separated class token check.
pub fn has_class(attrs: &[(String, String)], class: &str) -> bool {
    attr_value(attrs, "class")
        .map(|v| v.split_whitespace().any(|token| token == class))
        .unwrap_or(false)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageDocument {
    pub nodes: Vec<PageNode>,
}

impl PageDocument {
    /// Parse a full HTML document. html5ever synthesizes `<html>`, `<head>`
    /// and `<body>` when the source omits them, exactly like a browser.
    pub fn parse(html: &str) -> PageDocument {
        let dom = parse_document(RcDom::default(), Default::default()).one(html);
        let mut nodes = Vec::new();
        convert_children(&dom.document, &mut nodes);
        PageDocument { nodes }
    }

    /// Parse an HTML fragment (no document synthesis) into a node list.
    pub fn parse_fragment_nodes(html: &str) -> Vec<PageNode> {
        let context = QualName::new(None, ns!(html), local_name!("body"));
        let dom = parse_fragment(RcDom::default(), Default::default(), context, vec![]).one(html);

        // rcdom roots fragment children under a synthetic <html> element.
        let document_children = dom.document.children.borrow();
        for child in document_children.iter() {
            if let NodeData::Element { .. } = &child.data {
                let mut nodes = Vec::new();
                convert_children(child, &mut nodes);
                return nodes;
            }
        }
        let mut nodes = Vec::new();
        convert_children(&dom.document, &mut nodes);
        nodes
    }

    /// Serialize the document, doctype included.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            write_node(node, None, &mut out);
        }
        out
    }

    /// Inline `<script>` text contents in document order. Scripts carrying an
    /// external `src` attribute are not inline and are skipped.
    pub fn inline_script_texts(&self) -> Vec<String> {
        let mut scripts = Vec::new();
        collect_scripts(&self.nodes, &mut scripts);
        scripts
    }

    /// Remove inline scripts (no `src`) from the tree and return their text
    /// in document order. Scripts carrying `skip_class` are left in place.
    pub fn take_inline_scripts(&mut self, skip_class: Option<&str>) -> Vec<String> {
        let mut taken = Vec::new();
        take_scripts(&mut self.nodes, skip_class, &mut taken);
        taken
    }

    /// Remove every `<script>` element tagged with the given class.
    pub fn remove_scripts_with_class(&mut self, class: &str) {
        remove_scripts(&mut self.nodes, class);
    }

    /// Append a node as the last child of the first element with `tag`.
    /// Returns false when no such element exists.
    pub fn append_to(&mut self, tag: &str, node: PageNode) -> bool {
        if let Some(children) = element_children_mut(&mut self.nodes, &|t, _| t == tag) {
            children.push(node);
            return true;
        }
        false
    }

    /// Append a node into the first element carrying the given class.
    pub fn append_to_class(&mut self, class: &str, node: PageNode) -> bool {
        if let Some(children) = element_children_mut(&mut self.nodes, &|_, attrs| {
            has_class(attrs, class)
        }) {
            children.push(node);
            return true;
        }
        false
    }

    pub fn has_element_with_class(&self, class: &str) -> bool {
        count_elements(&self.nodes, &|_, attrs| has_class(attrs, class)) > 0
    }

    pub fn count_elements_with_class(&self, class: &str) -> usize {
        count_elements(&self.nodes, &|_, attrs| has_class(attrs, class))
    }

    /// Concatenated text content of every element carrying the class.
    pub fn text_of_class(&self, class: &str) -> String {
        let mut out = String::new();
        collect_text_of_class(&self.nodes, class, &mut out);
        out
    }

    /// Re-parse `Raw` fragments captured during emulation back into
    /// structured nodes, splicing them in place.
    pub fn resolve_raw_fragments(&mut self) {
        resolve_raw(&mut self.nodes);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RCDOM CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

fn convert_children(handle: &Handle, out: &mut Vec<PageNode>) {
    for child in handle.children.borrow().iter() {
        convert_node(child, out);
    }
}

fn convert_node(handle: &Handle, out: &mut Vec<PageNode>) {
    match &handle.data {
        NodeData::Document => convert_children(handle, out),
        NodeData::Doctype { name, .. } => out.push(PageNode::Doctype {
            name: name.to_string(),
        }),
        NodeData::Text { contents } => out.push(PageNode::Text {
            value: contents.borrow().to_string(),
        }),
        NodeData::Comment { contents } => out.push(PageNode::Comment {
            value: contents.to_string(),
        }),
        NodeData::Element { name, attrs, .. } => {
            let tag = name.local.to_string();
            let attrs = attrs
                .borrow()
                .iter()
                .map(|a| (a.name.local.to_string(), a.value.to_string()))
                .collect();
            let mut children = Vec::new();
            convert_children(handle, &mut children);
            out.push(PageNode::Element {
                tag,
                attrs,
                children,
            });
        }
        NodeData::ProcessingInstruction { .. } => {}
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

fn escape_text(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

fn write_node(node: &PageNode, parent_tag: Option<&str>, out: &mut String) {
    match node {
        PageNode::Doctype { name } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        PageNode::Text { value } => {
            let verbatim = parent_tag
                .map(|t| RAW_TEXT_ELEMENTS.contains(t))
                .unwrap_or(false);
            if verbatim {
                out.push_str(value);
            } else {
                out.push_str(&escape_text(value));
            }
        }
        PageNode::Comment { value } => {
            out.push_str("<!--");
            out.push_str(value);
            out.push_str("-->");
        }
        PageNode::Raw { html } => out.push_str(html),
        PageNode::Element {
            tag,
            attrs,
            children,
        } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&escape_attr(value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(tag.as_str()) {
                return;
            }
            for child in children {
                write_node(child, Some(tag), out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRAVERSAL HELPERS
// ═══════════════════════════════════════════════════════════════════════════════

fn is_inline_script(tag: &str, attrs: &[(String, String)]) -> bool {
    tag == "script" && attr_value(attrs, "src").is_none()
}

fn node_text(children: &[PageNode], out: &mut String) {
    for child in children {
        match child {
            PageNode::Text { value } => out.push_str(value),
            PageNode::Raw { html } => out.push_str(html),
            PageNode::Element { children, .. } => node_text(children, out),
            _ => {}
        }
    }
}

fn collect_scripts(nodes: &[PageNode], out: &mut Vec<String>) {
    for node in nodes {
        if let PageNode::Element {
            tag,
            attrs,
            children,
        } = node
        {
            if is_inline_script(tag, attrs) {
                let mut text = String::new();
                node_text(children, &mut text);
                out.push(text);
            } else {
                collect_scripts(children, out);
            }
        }
    }
}

fn take_scripts(nodes: &mut Vec<PageNode>, skip_class: Option<&str>, out: &mut Vec<String>) {
    let mut i = 0;
    while i < nodes.len() {
        let remove = match &nodes[i] {
            PageNode::Element { tag, attrs, .. } => {
                is_inline_script(tag, attrs)
                    && skip_class.map(|c| !has_class(attrs, c)).unwrap_or(true)
            }
            _ => false,
        };
        if remove {
            if let PageNode::Element { children, .. } = nodes.remove(i) {
                let mut text = String::new();
                node_text(&children, &mut text);
                out.push(text);
            }
            continue;
        }
        if let PageNode::Element { children, .. } = &mut nodes[i] {
            take_scripts(children, skip_class, out);
        }
        i += 1;
    }
}

fn remove_scripts(nodes: &mut Vec<PageNode>, class: &str) {
    let mut i = 0;
    while i < nodes.len() {
        let remove = match &nodes[i] {
            PageNode::Element { tag, attrs, .. } => tag == "script" && has_class(attrs, class),
            _ => false,
        };
        if remove {
            nodes.remove(i);
            continue;
        }
        if let PageNode::Element { children, .. } = &mut nodes[i] {
            remove_scripts(children, class);
        }
        i += 1;
    }
}

fn element_children_mut<'a>(
    nodes: &'a mut Vec<PageNode>,
    pred: &dyn Fn(&str, &[(String, String)]) -> bool,
) -> Option<&'a mut Vec<PageNode>> {
    for node in nodes.iter_mut() {
        if let PageNode::Element {
            tag,
            attrs,
            children,
        } = node
        {
            if pred(tag, attrs) {
                return Some(children);
            }
            if let Some(found) = element_children_mut(children, pred) {
                return Some(found);
            }
        }
    }
    None
}

fn count_elements(nodes: &[PageNode], pred: &dyn Fn(&str, &[(String, String)]) -> bool) -> usize {
    let mut count = 0;
    for node in nodes {
        if let PageNode::Element {
            tag,
            attrs,
            children,
        } = node
        {
            if pred(tag, attrs) {
                count += 1;
            }
            count += count_elements(children, pred);
        }
    }
    count
}

fn collect_text_of_class(nodes: &[PageNode], class: &str, out: &mut String) {
    for node in nodes {
        if let PageNode::Element {
            attrs, children, ..
        } = node
        {
            if has_class(attrs, class) {
                node_text(children, out);
            }
            collect_text_of_class(children, class, out);
        }
    }
}

fn resolve_raw(nodes: &mut Vec<PageNode>) {
    let mut i = 0;
    while i < nodes.len() {
        match &mut nodes[i] {
            PageNode::Raw { html } => {
                let fragment = PageDocument::parse_fragment_nodes(html);
                let len = fragment.len();
                nodes.splice(i..=i, fragment);
                i += len;
            }
            PageNode::Element { children, .. } => {
                resolve_raw(children);
                i += 1;
            }
            _ => i += 1,
        }
    }
}
