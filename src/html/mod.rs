//! Minimal mutable HTML tree for page augmentation.
//!
//! Parses with html5ever into a crate-owned arena and serializes back to
//! markup, so the rest of the crate only depends on the narrow API it needs:
//! find elements by tag, read/write attributes, read text, serialize.

mod node;
mod parser;
mod serialize;

pub use node::{Node, NodeData, NodeId};
pub use parser::parse_document;

use crate::error::CspError;

/// One parsed HTML page. Node 0 is the document root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    xhtml: bool,
}

impl Document {
    pub(crate) fn empty() -> Self {
        Self {
            nodes: vec![Node::new(NodeData::Document)],
            xhtml: false,
        }
    }

    pub fn parse(html: &str) -> Result<Self, CspError> {
        parse_document(html)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        0
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// XHTML serialization convention (self-closing void elements).
    /// Detected from an `xmlns` attribute on the root `html` element,
    /// overridable via [`Document::set_xhtml`].
    #[inline]
    pub fn is_xhtml(&self) -> bool {
        self.xhtml
    }

    #[inline]
    pub fn set_xhtml(&mut self, xhtml: bool) {
        self.xhtml = xhtml;
    }

    pub(crate) fn push_node(&mut self, data: NodeData, parent: NodeId) -> NodeId {
        let id = self.nodes.len();
        let mut node = Node::new(data);
        node.parent = Some(parent);
        self.nodes.push(node);
        self.nodes[parent].children.push(id);
        id
    }

    /// All elements with the given tag name, in document order.
    pub fn elements_by_tag(&self, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if self.nodes[id].tag_name() == Some(tag) {
                found.push(id);
            }
            // Reverse push keeps DFS in document order.
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        found
    }

    pub fn get_attribute(&self, id: NodeId, attr: &str) -> Option<&str> {
        self.nodes[id].attribute(attr)
    }

    pub fn set_attribute(&mut self, id: NodeId, attr: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &mut self.nodes[id].data {
            if let Some(existing) = attrs.iter_mut().find(|(name, _)| name == attr) {
                existing.1 = value.to_string();
            } else {
                attrs.push((attr.to_string(), value.to_string()));
            }
        }
    }

    /// Concatenated text of the node's descendants. For inline scripts and
    /// styles this is the exact inline body, unnormalized.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut text = String::new();
        self.collect_text(id, &mut text);
        text
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id].data {
            NodeData::Text(content) => out.push_str(content),
            _ => {
                for &child in &self.nodes[id].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// True when the node has a `<template>` ancestor. Template contents
    /// are inert until cloned, so they are not resource-loading surface.
    pub fn in_template(&self, id: NodeId) -> bool {
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            if self.nodes[parent].tag_name() == Some("template") {
                return true;
            }
            current = self.nodes[parent].parent;
        }
        false
    }

    pub fn head(&self) -> Option<NodeId> {
        self.elements_by_tag("head").into_iter().next()
    }

    pub fn create_element(&mut self, name: &str, attrs: Vec<(String, String)>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(NodeData::Element {
            name: name.to_string(),
            attrs,
        }));
        id
    }

    /// Inserts a detached node as the parent's first child.
    pub fn insert_first_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.insert(0, child);
    }

    pub fn serialize(&self) -> String {
        serialize::serialize(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_mutate_serialize() {
        let mut doc = Document::parse(
            "<html><head><title>t</title></head><body><script>console.log(1)</script></body></html>",
        )
        .unwrap();
        let scripts = doc.elements_by_tag("script");
        assert_eq!(scripts.len(), 1);
        assert_eq!(doc.text_content(scripts[0]), "console.log(1)");

        doc.set_attribute(scripts[0], "nonce", "abc");
        assert_eq!(doc.get_attribute(scripts[0], "nonce"), Some("abc"));
        assert!(doc.serialize().contains("<script nonce=\"abc\">console.log(1)</script>"));
    }

    #[test]
    fn elements_come_back_in_document_order() {
        let doc = Document::parse(
            "<html><head><script src=\"a.js\"></script></head><body><script src=\"b.js\"></script><script src=\"c.js\"></script></body></html>",
        )
        .unwrap();
        let srcs: Vec<_> = doc
            .elements_by_tag("script")
            .into_iter()
            .map(|id| doc.get_attribute(id, "src").unwrap().to_string())
            .collect();
        assert_eq!(srcs, ["a.js", "b.js", "c.js"]);
    }

    #[test]
    fn xmlns_root_switches_to_xhtml() {
        let doc = Document::parse(
            "<html xmlns=\"http://www.w3.org/1999/xhtml\"><head></head><body></body></html>",
        )
        .unwrap();
        assert!(doc.is_xhtml());
    }

    #[test]
    fn template_contents_round_trip() {
        let doc = Document::parse(
            "<html><head></head><body><template><div>inside</div></template></body></html>",
        )
        .unwrap();
        assert!(doc
            .serialize()
            .contains("<template><div>inside</div></template>"));
    }

    #[test]
    fn template_descendants_are_flagged() {
        let doc = Document::parse(
            "<html><head></head><body><template><script>t()</script></template><script>p()</script></body></html>",
        )
        .unwrap();
        let scripts = doc.elements_by_tag("script");
        assert_eq!(scripts.len(), 2);
        assert!(doc.in_template(scripts[0]));
        assert!(!doc.in_template(scripts[1]));
    }

    #[test]
    fn insert_first_child_prepends() {
        let mut doc = Document::parse(
            "<html><head><link rel=\"stylesheet\" href=\"a.css\"></head><body></body></html>",
        )
        .unwrap();
        let head = doc.head().unwrap();
        let meta = doc.create_element(
            "meta",
            vec![("http-equiv".to_string(), "Content-Security-Policy".to_string())],
        );
        doc.insert_first_child(head, meta);
        let serialized = doc.serialize();
        let meta_pos = serialized.find("<meta").unwrap();
        let link_pos = serialized.find("<link").unwrap();
        assert!(meta_pos < link_pos);
    }
}
