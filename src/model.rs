//! Live model views over tree nodes.
//!
//! A model view is synthesized per property step rather than materialized:
//! it answers data fields, attributes and child lookups against the current
//! state of the arena, so mutations between queries are always visible.
//!
//! Lookup precedence for `node.key` is data field, then attribute, then
//! first child whose name matches.

use indexmap::IndexMap;

use crate::norm;
use crate::tree::{serialize, JsonOptions, NodeId, Tree};
use crate::value::{Fragment, TextLeaf, Value};

/// A read-only view of one node, resolved lazily against the arena.
#[derive(Clone, Copy)]
pub struct ModelView<'a> {
    tree: &'a Tree,
    node: NodeId,
}

/// View a node through the model.
pub fn synthesize(tree: &Tree, node: NodeId) -> ModelView<'_> {
    ModelView { tree, node }
}

impl<'a> ModelView<'a> {
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Resolve one key against this node.
    pub fn get(&self, key: &str) -> Option<Value> {
        let node = self.tree.get(self.node)?;

        match key {
            "name" => return Some(Value::Str(node.name.clone())),
            "key" => return Some(Value::Str(node.key.clone())),
            "value" => return Some(node.value()),
            "text" => return Some(Value::Text(TextLeaf::new(node.body.trim()))),
            "body" => return Some(Value::Str(node.body.clone())),
            "root" => return Some(Value::Node(self.tree.root())),
            "match" => return Some(Value::Node(self.node)),
            "depth" => return Some(Value::Number(node.depth as f64)),
            "children" => {
                let items = self
                    .tree
                    .children(self.node)
                    .iter()
                    .map(|&id| Value::Node(id))
                    .collect();
                return Some(Value::Fragment(Fragment::new(items)));
            }
            "attributes" => {
                let mut map = IndexMap::new();
                for (name, _) in node.attr_sources() {
                    if let Some(value) = node.attr(name) {
                        map.insert(name.clone(), value.clone());
                    }
                }
                return Some(Value::Object(map));
            }
            _ => {}
        }

        if let Some(value) = node.attr(key) {
            return Some(value.clone());
        }

        self.child_named(key).map(Value::Node)
    }

    /// First child whose authored name or folded key matches.
    pub fn child_named(&self, key: &str) -> Option<NodeId> {
        let folded = norm::fold_key(key);
        for &child in self.tree.children(self.node) {
            let node = self.tree.get(child)?;
            if node.name == key || node.key == folded {
                return Some(child);
            }
        }
        None
    }

    /// Keys this node answers to: distinct child keys in document order,
    /// then authored attribute names, then the data fields that carry
    /// content here.
    pub fn keys(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        let node = match self.tree.get(self.node) {
            Some(n) => n,
            None => return out,
        };
        for &child in self.tree.children(self.node) {
            if let Some(c) = self.tree.get(child) {
                if !out.iter().any(|k| k == &c.key) {
                    out.push(c.key.clone());
                }
            }
        }
        for (name, _) in node.attr_sources() {
            if !out.iter().any(|k| k == name) {
                out.push(name.clone());
            }
        }
        if !node.name.is_empty() {
            out.push("name".to_string());
        }
        if !node.body.trim().is_empty() {
            out.push("value".to_string());
        }
        out
    }
}

/// Type name of a value, resolving node handles against the tree so the
/// document root reports as `document`.
pub fn type_name(tree: &Tree, value: &Value) -> &'static str {
    match value {
        Value::Node(id) => match tree.get(*id) {
            Some(node) if node.is_document() => "document",
            _ => "node",
        },
        other => other.base_type_name(),
    }
}

/// Display form with tree access: node handles render their trimmed body,
/// collections render their items recursively.
pub fn display_value(tree: &Tree, value: &Value) -> String {
    match value {
        Value::Node(id) => tree
            .get(*id)
            .map(|node| node.body.trim().to_string())
            .unwrap_or_default(),
        Value::Array(items) => display_items(tree, items),
        Value::Fragment(f) => display_items(tree, f.items()),
        other => other.to_string(),
    }
}

fn display_items(tree: &Tree, items: &[Value]) -> String {
    let mut out = String::from("[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&display_value(tree, item));
    }
    out.push(']');
    out
}

/// JSON form with tree access: node handles serialize structurally,
/// fragments become arrays.
pub fn to_json_value(tree: &Tree, value: &Value) -> serde_json::Value {
    match value {
        Value::Node(id) => serialize::to_json(tree, *id, &JsonOptions::default()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| to_json_value(tree, v)).collect())
        }
        Value::Fragment(f) => {
            serde_json::Value::Array(f.iter().map(|v| to_json_value(tree, v)).collect())
        }
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json_value(tree, v)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let item = tree.create_element("Item");
        tree.attach(tree.root(), item).unwrap();
        if let Some(node) = tree.get_mut(item) {
            node.set_attr("Count", "3");
            node.append_body(" 41 ");
        }
        let tag = tree.create_element("tag");
        tree.attach(item, tag).unwrap();
        (tree, item)
    }

    #[test]
    fn data_fields() {
        let (tree, item) = sample();
        let view = synthesize(&tree, item);
        assert_eq!(view.get("name"), Some(Value::Str("Item".into())));
        assert_eq!(view.get("key"), Some(Value::Str("item".into())));
        assert_eq!(view.get("value"), Some(Value::Number(41.0)));
        assert_eq!(view.get("text"), Some(Value::Text(TextLeaf::new("41"))));
        assert_eq!(view.get("body"), Some(Value::Str(" 41 ".into())));
        assert_eq!(view.get("depth"), Some(Value::Number(1.0)));
        assert_eq!(view.get("root"), Some(Value::Node(tree.root())));
        assert_eq!(view.get("match"), Some(Value::Node(item)));
    }

    #[test]
    fn children_field_is_always_a_fragment() {
        let (tree, item) = sample();
        let view = synthesize(&tree, item);
        match view.get("children") {
            Some(Value::Fragment(f)) => assert_eq!(f.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
        let leaf = view.child_named("tag").unwrap();
        match synthesize(&tree, leaf).get("children") {
            Some(Value::Fragment(f)) => assert!(f.is_empty()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn attribute_lookup_folds() {
        let (tree, item) = sample();
        let view = synthesize(&tree, item);
        assert_eq!(view.get("Count"), Some(Value::Number(3.0)));
        assert_eq!(view.get("count"), Some(Value::Number(3.0)));
    }

    #[test]
    fn attributes_object_uses_authored_names() {
        let (tree, item) = sample();
        let view = synthesize(&tree, item);
        match view.get("attributes") {
            Some(Value::Object(map)) => {
                assert_eq!(map.len(), 1);
                assert_eq!(map.get("Count"), Some(&Value::Number(3.0)));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn child_lookup_by_folded_key() {
        let (tree, item) = sample();
        let view = synthesize(&tree, item);
        assert!(view.get("tag").is_some());
        assert!(view.get("TAG").is_some());
        assert_eq!(view.get("missing"), None);
    }

    #[test]
    fn first_same_named_sibling_wins() {
        let mut tree = Tree::new();
        let list = tree.create_element("list");
        tree.attach(tree.root(), list).unwrap();
        let first = tree.create_element("entry");
        tree.attach(list, first).unwrap();
        let second = tree.create_element("entry");
        tree.attach(list, second).unwrap();
        if let Some(node) = tree.get_mut(first) {
            node.append_body("one");
        }
        if let Some(node) = tree.get_mut(second) {
            node.append_body("two");
        }
        let view = synthesize(&tree, list);
        assert_eq!(view.get("entry"), Some(Value::Node(first)));
        assert_eq!(view.child_named("entry"), Some(first));
        // the later sibling stays reachable positionally
        match view.get("children") {
            Some(Value::Fragment(f)) => assert_eq!(f.get(1), Some(&Value::Node(second))),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn keys_lists_children_attrs_and_fields() {
        let (tree, item) = sample();
        let keys = synthesize(&tree, item).keys();
        assert_eq!(keys, vec!["tag", "Count", "name", "value"]);
    }

    #[test]
    fn type_name_distinguishes_document() {
        let (tree, item) = sample();
        assert_eq!(type_name(&tree, &Value::Node(tree.root())), "document");
        assert_eq!(type_name(&tree, &Value::Node(item)), "node");
        assert_eq!(type_name(&tree, &Value::Number(1.0)), "number");
    }

    #[test]
    fn display_renders_node_bodies() {
        let (tree, item) = sample();
        assert_eq!(display_value(&tree, &Value::Node(item)), "41");
        let frag = Value::Fragment(Fragment::new(vec![
            Value::Node(item),
            Value::Number(2.0),
        ]));
        assert_eq!(display_value(&tree, &frag), "[41, 2]");
    }

    #[test]
    fn json_serializes_nodes_structurally() {
        let (tree, item) = sample();
        let json = to_json_value(&tree, &Value::Node(item));
        assert!(json.is_object());
    }
}
