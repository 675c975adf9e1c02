//! Markup and JSON rendering.
//!
//! Pure recursive renderers over the arena. Markup output is pretty-printed
//! with indentation keyed to node depth; nodes with neither body nor
//! children self-close. Both renderers can emit authored or case-folded
//! names and can drop attributes, children or body wholesale.

use serde::{Deserialize, Serialize};

use super::arena::Tree;
use super::node::{NodeId, NodeKind};
use crate::norm;

/// Options for markup rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupOptions {
    /// Emit attributes.
    pub attributes: bool,
    /// Emit children recursively.
    pub children: bool,
    /// Emit body text.
    pub body: bool,
    /// Emit comments.
    pub comments: bool,
    /// Use authored names and attribute spellings; false folds them.
    pub original_names: bool,
}

impl Default for MarkupOptions {
    fn default() -> Self {
        MarkupOptions {
            attributes: true,
            children: true,
            body: true,
            comments: true,
            original_names: true,
        }
    }
}

/// Options for JSON rendering.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    pub attributes: bool,
    pub children: bool,
    pub body: bool,
    /// Use authored names and attribute spellings; false folds them.
    pub original_names: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        JsonOptions {
            attributes: true,
            children: true,
            body: true,
            original_names: false,
        }
    }
}

/// Render a node (or the whole document) as markup.
pub fn serialize(tree: &Tree, id: NodeId, opts: &MarkupOptions) -> String {
    let mut out = String::new();
    render(tree, id, opts, &mut out);
    out
}

fn render(tree: &Tree, id: NodeId, opts: &MarkupOptions, out: &mut String) {
    let node = match tree.get(id) {
        Some(n) => n,
        None => return,
    };
    if node.kind == NodeKind::Document {
        let children = tree.children(id);
        for (i, &child) in children.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            render(tree, child, opts, out);
        }
        return;
    }

    let level = node.depth.saturating_sub(1) as usize;
    let indent = "  ".repeat(level);
    let child_indent = "  ".repeat(level + 1);
    let name: &str = if opts.original_names {
        &node.name
    } else {
        &node.key
    };

    out.push_str(&indent);
    out.push('<');
    out.push_str(name);
    if opts.attributes {
        for (attr_name, raw) in node.attr_sources() {
            out.push(' ');
            if opts.original_names {
                out.push_str(attr_name);
            } else {
                out.push_str(&norm::fold_key(attr_name));
            }
            out.push_str("=\"");
            escape_attr(raw, out);
            out.push('"');
        }
    }

    let body = if opts.body { node.body.trim() } else { "" };
    let children: &[NodeId] = if opts.children {
        tree.children(id)
    } else {
        &[]
    };
    let comments: &[String] = if opts.comments { &node.comments } else { &[] };

    if body.is_empty() && children.is_empty() && comments.is_empty() {
        out.push_str("/>");
        return;
    }
    if children.is_empty() && comments.is_empty() {
        out.push('>');
        escape_text(body, out);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
        return;
    }

    out.push_str(">\n");
    if !body.is_empty() {
        out.push_str(&child_indent);
        escape_text(body, out);
        out.push('\n');
    }
    for comment in comments {
        out.push_str(&child_indent);
        out.push_str("<!--");
        out.push_str(comment);
        out.push_str("-->\n");
    }
    for &child in children {
        render(tree, child, opts, out);
        out.push('\n');
    }
    out.push_str(&indent);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Render a node (or the whole document) as JSON.
pub fn to_json(tree: &Tree, id: NodeId, opts: &JsonOptions) -> serde_json::Value {
    let node = match tree.get(id) {
        Some(n) => n,
        None => return serde_json::Value::Null,
    };
    let mut map = serde_json::Map::new();
    if node.kind == NodeKind::Element {
        let name = if opts.original_names {
            node.name.clone()
        } else {
            node.key.clone()
        };
        map.insert("name".to_string(), serde_json::Value::String(name));
    }
    if opts.attributes && node.has_attributes() {
        let mut attrs = serde_json::Map::new();
        for (attr_name, _) in node.attr_sources() {
            let shown = if opts.original_names {
                attr_name.clone()
            } else {
                norm::fold_key(attr_name)
            };
            let value = node
                .attr(attr_name)
                .map(|v| v.to_json())
                .unwrap_or(serde_json::Value::Null);
            attrs.insert(shown, value);
        }
        map.insert("attributes".to_string(), serde_json::Value::Object(attrs));
    }
    if opts.body && !node.body.trim().is_empty() {
        map.insert(
            "body".to_string(),
            serde_json::Value::String(node.body.trim().to_string()),
        );
    }
    if opts.children && !tree.children(id).is_empty() {
        let children: Vec<serde_json::Value> = tree
            .children(id)
            .iter()
            .map(|&child| to_json(tree, child, opts))
            .collect();
        map.insert("children".to_string(), serde_json::Value::Array(children));
    }
    serde_json::Value::Object(map)
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (Tree, NodeId) {
        let mut tree = Tree::new();
        let root = tree.root();

        let a = tree.create_element("Wrapper");
        tree.attach(root, a).unwrap();
        if let Some(n) = tree.get_mut(a) {
            n.set_attr("Data-ID", "42");
        }

        let b = tree.create_element("item");
        tree.attach(a, b).unwrap();
        if let Some(n) = tree.get_mut(b) {
            n.append_body("hi");
        }

        let c = tree.create_element("empty");
        tree.attach(a, c).unwrap();

        (tree, a)
    }

    #[test]
    fn pretty_markup_with_self_close() {
        let (tree, a) = sample_tree();
        let out = serialize(&tree, a, &MarkupOptions::default());
        assert_eq!(
            out,
            "<Wrapper Data-ID=\"42\">\n  <item>hi</item>\n  <empty/>\n</Wrapper>"
        );
    }

    #[test]
    fn folded_names_on_request() {
        let (tree, a) = sample_tree();
        let opts = MarkupOptions {
            original_names: false,
            ..Default::default()
        };
        let out = serialize(&tree, a, &opts);
        assert!(out.starts_with("<wrapper data-id=\"42\">"));
        assert!(out.ends_with("</wrapper>"));
    }

    #[test]
    fn attributes_can_be_dropped() {
        let (tree, a) = sample_tree();
        let opts = MarkupOptions {
            attributes: false,
            children: false,
            ..Default::default()
        };
        assert_eq!(serialize(&tree, a, &opts), "<Wrapper/>");
    }

    #[test]
    fn comments_render_before_children() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.create_element("a");
        tree.attach(root, a).unwrap();
        if let Some(n) = tree.get_mut(a) {
            n.comments.push(" note ".to_string());
        }
        let b = tree.create_element("b");
        tree.attach(a, b).unwrap();
        let out = serialize(&tree, a, &MarkupOptions::default());
        assert_eq!(out, "<a>\n  <!-- note -->\n  <b/>\n</a>");
    }

    #[test]
    fn body_is_entity_escaped() {
        let mut tree = Tree::new();
        let root = tree.root();
        let a = tree.create_element("a");
        tree.attach(root, a).unwrap();
        if let Some(n) = tree.get_mut(a) {
            n.append_body("1 < 2 & 3 > 2");
            n.set_attr("q", "say \"hi\"");
        }
        let out = serialize(&tree, a, &MarkupOptions::default());
        assert_eq!(
            out,
            "<a q=\"say &quot;hi&quot;\">1 &lt; 2 &amp; 3 &gt; 2</a>"
        );
    }

    #[test]
    fn document_renders_children_only() {
        let (tree, _) = sample_tree();
        let out = serialize(&tree, tree.root(), &MarkupOptions::default());
        assert!(out.starts_with("<Wrapper"));
    }

    #[test]
    fn json_snapshot_keeps_typed_attrs() {
        let (tree, a) = sample_tree();
        let json = to_json(&tree, a, &JsonOptions::default());
        assert_eq!(json["name"], "wrapper");
        assert_eq!(json["attributes"]["data-id"], 42.0);
        assert_eq!(json["children"][0]["body"], "hi");
        assert_eq!(json["children"][1]["name"], "empty");
    }

    #[test]
    fn json_original_names() {
        let (tree, a) = sample_tree();
        let opts = JsonOptions {
            original_names: true,
            ..Default::default()
        };
        let json = to_json(&tree, a, &opts);
        assert_eq!(json["name"], "Wrapper");
        assert_eq!(json["attributes"]["Data-ID"], 42.0);
    }

    #[test]
    fn json_flags_drop_sections() {
        let (tree, a) = sample_tree();
        let opts = JsonOptions {
            attributes: false,
            children: false,
            body: false,
            original_names: false,
        };
        let json = to_json(&tree, a, &opts);
        assert_eq!(json, serde_json::json!({ "name": "wrapper" }));
    }
}
