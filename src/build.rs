//! Tree builder.
//!
//! Folds tokenizer events into a tree through a single stack of open nodes.
//! The stack head is always the document root; the tail is the node
//! currently accepting text, attributes and children. Unbalanced closers
//! are tolerated, CDATA content lands in a synthetic "cdata" child, and
//! comments ride on the open node without becoming children.

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::scan::ScanEvent;
use crate::tree::{NodeId, Tree, TreeNode};

/// Builder configuration.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildOptions {
    /// Keep whitespace-only text runs instead of dropping them.
    pub keep_whitespace: bool,
}

/// Event-driven tree builder.
pub struct TreeBuilder {
    tree: Tree,
    /// Open-node stack; index 0 is the document root.
    stack: Vec<NodeId>,
    options: BuildOptions,
    /// Settled on the first `End` or `Error` event.
    outcome: Option<Result<(), ParseError>>,
}

impl TreeBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self::with_tree(Tree::new(), options)
    }

    /// Build into a caller-supplied tree, so hooks registered on it observe
    /// the nodes connecting during the parse.
    pub fn with_tree(tree: Tree, options: BuildOptions) -> Self {
        let root = tree.root();
        TreeBuilder {
            tree,
            stack: vec![root],
            options,
            outcome: None,
        }
    }

    /// The node currently accepting content.
    fn tail(&self) -> NodeId {
        // The stack always holds at least the root.
        self.stack[self.stack.len() - 1]
    }

    /// Apply one tokenizer event.
    pub fn handle(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Open { name, attrs } => {
                let mut node = TreeNode::element(&name, 0);
                for (attr_name, raw) in &attrs {
                    node.set_attr(attr_name, raw);
                }
                self.push_child(node);
            }
            ScanEvent::Attribute { name, value } => {
                if self.stack.len() > 1 {
                    let tail = self.tail();
                    if let Some(node) = self.tree.get_mut(tail) {
                        node.set_attr(&name, &value);
                    }
                }
            }
            ScanEvent::Text(text) => {
                if !self.options.keep_whitespace && text.trim().is_empty() {
                    return;
                }
                let tail = self.tail();
                if let Some(node) = self.tree.get_mut(tail) {
                    node.append_body(&text);
                }
            }
            ScanEvent::Comment(data) => {
                let tail = self.tail();
                if let Some(node) = self.tree.get_mut(tail) {
                    node.comments.push(data);
                }
            }
            ScanEvent::CdataStart => {
                self.push_child(TreeNode::element("cdata", 0));
            }
            ScanEvent::CdataEnd => {
                self.pop();
            }
            ScanEvent::Close(name) => {
                if self.stack.len() == 1 {
                    log::debug!("ignoring close tag </{}> with no open element", name);
                } else {
                    self.pop();
                }
            }
            ScanEvent::Error(err) => {
                if self.outcome.is_none() {
                    self.outcome = Some(Err(err));
                }
            }
            ScanEvent::End => {
                if self.outcome.is_none() {
                    self.outcome = Some(Ok(()));
                }
            }
        }
    }

    fn push_child(&mut self, node: TreeNode) {
        let parent = self.tail();
        let id = self.tree.alloc(node);
        if let Err(err) = self.tree.attach(parent, id) {
            // Freshly allocated nodes always attach; surface it if not.
            log::debug!("builder attach failed: {}", err);
            return;
        }
        self.stack.push(id);
    }

    fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Ok on clean end, Err on the first tokenizer error, None while the
    /// stream is still open.
    pub fn outcome(&self) -> Option<&Result<(), ParseError>> {
        self.outcome.as_ref()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn into_tree(self) -> Tree {
        self.tree
    }
}
