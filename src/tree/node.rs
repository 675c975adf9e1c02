//! Node representation.
//!
//! Uses NodeId (u32) for compact, cache-friendly node references. Attribute
//! values are type-normalized at set time and reachable under both the
//! authored and case-folded spellings of their name.

use indexmap::IndexMap;

use crate::norm;
use crate::value::Value;

/// Compact node handle (index into the tree arena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Kind of tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Synthetic root owning the top-level elements.
    Document,
    /// Element node.
    Element,
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub struct TreeNode {
    /// Kind of this node.
    pub kind: NodeKind,
    /// Tag name as authored.
    pub name: String,
    /// Case-folded tag name used for lookups.
    pub key: String,
    /// Normalized attribute values, keyed by both the authored and the
    /// case-folded attribute name.
    attrs: IndexMap<String, Value>,
    /// Authored attribute spellings with their raw text, in document order.
    /// Serialization reads from here so each attribute is emitted once.
    attr_sources: Vec<(String, String)>,
    /// Accumulated body text.
    pub body: String,
    /// Ordered children.
    pub children: Vec<NodeId>,
    /// Comments attached to this node; not navigable as children.
    pub comments: Vec<String>,
    /// Parent node (None for the document root and detached nodes).
    pub parent: Option<NodeId>,
    /// Depth in the tree; the document root sits at 0.
    pub depth: u16,
}

impl TreeNode {
    /// Create the synthetic document root.
    pub fn document() -> Self {
        TreeNode {
            kind: NodeKind::Document,
            name: String::new(),
            key: String::new(),
            attrs: IndexMap::new(),
            attr_sources: Vec::new(),
            body: String::new(),
            children: Vec::new(),
            comments: Vec::new(),
            parent: None,
            depth: 0,
        }
    }

    /// Create an element node.
    pub fn element(name: &str, depth: u16) -> Self {
        TreeNode {
            kind: NodeKind::Element,
            name: name.to_string(),
            key: norm::fold_key(name),
            attrs: IndexMap::new(),
            attr_sources: Vec::new(),
            body: String::new(),
            children: Vec::new(),
            comments: Vec::new(),
            parent: None,
            depth,
        }
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        self.kind == NodeKind::Element
    }

    #[inline]
    pub fn is_document(&self) -> bool {
        self.kind == NodeKind::Document
    }

    #[inline]
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    #[inline]
    pub fn has_attributes(&self) -> bool {
        !self.attr_sources.is_empty()
    }

    /// Set an attribute from its raw authored text. The value is classified
    /// once and stored under both the authored and folded names.
    pub fn set_attr(&mut self, name: &str, raw: &str) {
        let value = norm::classify(raw);
        match self.attr_sources.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = raw.to_string(),
            None => self.attr_sources.push((name.to_string(), raw.to_string())),
        }
        let folded = norm::fold_key(name);
        self.attrs.insert(name.to_string(), value.clone());
        if folded != name {
            self.attrs.insert(folded, value);
        }
    }

    /// Set an attribute to an already-typed value. The raw text recorded for
    /// serialization is the value's display form.
    pub fn set_attr_value(&mut self, name: &str, value: Value) {
        let raw = value.to_string();
        match self.attr_sources.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = raw,
            None => self.attr_sources.push((name.to_string(), raw)),
        }
        let folded = norm::fold_key(name);
        self.attrs.insert(name.to_string(), value.clone());
        if folded != name {
            self.attrs.insert(folded, value);
        }
    }

    /// Look up an attribute, authored spelling first, then case-folded.
    pub fn attr(&self, name: &str) -> Option<&Value> {
        self.attrs
            .get(name)
            .or_else(|| self.attrs.get(norm::fold_key(name).as_str()))
    }

    /// The full attribute map, both spellings included.
    pub fn attrs(&self) -> &IndexMap<String, Value> {
        &self.attrs
    }

    /// Authored attribute names with their raw text, in document order.
    pub fn attr_sources(&self) -> &[(String, String)] {
        &self.attr_sources
    }

    /// Append body text. Body accumulates across interleaved children.
    pub fn append_body(&mut self, text: &str) {
        self.body.push_str(text);
    }

    /// The node's normalized body value.
    pub fn value(&self) -> Value {
        norm::classify(self.body.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_node() {
        let doc = TreeNode::document();
        assert_eq!(doc.kind, NodeKind::Document);
        assert!(doc.parent.is_none());
        assert_eq!(doc.depth, 0);
    }

    #[test]
    fn element_folds_key() {
        let elem = TreeNode::element("SomeTag", 1);
        assert_eq!(elem.name, "SomeTag");
        assert_eq!(elem.key, "sometag");
        assert_eq!(elem.depth, 1);
    }

    #[test]
    fn attr_reachable_under_both_spellings() {
        let mut elem = TreeNode::element("a", 1);
        elem.set_attr("Data-ID", "42");
        assert_eq!(elem.attr("Data-ID"), Some(&Value::Number(42.0)));
        assert_eq!(elem.attr("data-id"), Some(&Value::Number(42.0)));
        assert_eq!(elem.attrs().len(), 2);
        // Serialization sees the attribute once.
        assert_eq!(elem.attr_sources().len(), 1);
    }

    #[test]
    fn attr_values_are_normalized() {
        let mut elem = TreeNode::element("a", 1);
        elem.set_attr("flag", "true");
        elem.set_attr("n", "-1.5");
        elem.set_attr("label", "hello");
        assert_eq!(elem.attr("flag"), Some(&Value::Bool(true)));
        assert_eq!(elem.attr("n"), Some(&Value::Number(-1.5)));
        assert_eq!(elem.attr("label"), Some(&Value::Str("hello".into())));
    }

    #[test]
    fn resetting_attr_keeps_order() {
        let mut elem = TreeNode::element("a", 1);
        elem.set_attr("x", "1");
        elem.set_attr("y", "2");
        elem.set_attr("x", "3");
        let names: Vec<&str> = elem.attr_sources().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["x", "y"]);
        assert_eq!(elem.attr("x"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn body_accumulates() {
        let mut elem = TreeNode::element("a", 1);
        elem.append_body("hello");
        elem.append_body(" world");
        assert_eq!(elem.body, "hello world");
        assert_eq!(elem.value(), Value::Str("hello world".into()));
    }

    #[test]
    fn body_value_classifies() {
        let mut elem = TreeNode::element("a", 1);
        elem.append_body(" 42 ");
        assert_eq!(elem.value(), Value::Number(42.0));
    }
}
