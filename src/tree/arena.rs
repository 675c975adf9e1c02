//! Tree arena: allocation, structural mutation and traversal.
//!
//! All structural invariants are enforced here. A child belongs to at most
//! one parent, `parent.children` contains a node exactly when the node's
//! parent back-reference points there, and depths stay consistent with the
//! path to the root.

use std::sync::Arc;

use super::node::{NodeId, TreeNode};
use super::{TreeHooks, Walk};
use crate::error::AttachmentError;

/// Arena of nodes with a synthetic document root at index 0.
#[derive(Clone)]
pub struct Tree {
    nodes: Vec<TreeNode>,
    hooks: Option<Arc<dyn TreeHooks>>,
}

impl Default for Tree {
    fn default() -> Self {
        Tree::new()
    }
}

impl Tree {
    /// Create a tree holding only the document root.
    pub fn new() -> Self {
        Tree {
            nodes: vec![TreeNode::document()],
            hooks: None,
        }
    }

    /// Handle of the document root.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Get a node by handle.
    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.index())
    }

    /// Get a node mutably by handle.
    #[inline]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.nodes.get_mut(id.index())
    }

    /// Total number of nodes ever allocated, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Register mutation hooks. Hooks observe every subsequent connect and
    /// disconnect, including those made by the builder during parsing.
    pub fn set_hooks(&mut self, hooks: Arc<dyn TreeHooks>) {
        self.hooks = Some(hooks);
    }

    /// Allocate a detached element node.
    pub fn create_element(&mut self, name: &str) -> NodeId {
        self.alloc(TreeNode::element(name, 0))
    }

    pub(crate) fn alloc(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Children of a node, or an empty slice for unknown handles.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Append `child` under `parent`, detaching it from any current parent
    /// first. Appending a child already under `parent` is a no-op. Fails
    /// without mutating anything when a handle is stale, when parent and
    /// child are the same node, or when the append would create a cycle.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), AttachmentError> {
        if self.get(parent).is_none() {
            return Err(AttachmentError::NoSuchNode(parent));
        }
        if self.get(child).is_none() {
            return Err(AttachmentError::NoSuchNode(child));
        }
        if parent == child {
            return Err(AttachmentError::SelfAttach(child));
        }
        if self.nodes[child.index()].parent == Some(parent) {
            return Ok(());
        }
        // The new parent must not sit below the child.
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Err(AttachmentError::WouldCycle { parent, child });
            }
            cursor = self.nodes[id.index()].parent;
        }
        let hooks = self.hooks.clone();
        if let Some(old_parent) = self.nodes[child.index()].parent {
            self.unlink(old_parent, child);
            self.nodes[child.index()].parent = None;
            if let Some(h) = &hooks {
                h.disconnected(self, child);
            }
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        let depth = self.nodes[parent.index()].depth.saturating_add(1);
        self.refresh_depths(child, depth);
        if let Some(h) = &hooks {
            h.connected(self, child);
        }
        Ok(())
    }

    /// Remove `child` from `parent`. Fails without mutating anything when
    /// `parent` does not own `child`.
    pub fn detach(&mut self, parent: NodeId, child: NodeId) -> Result<(), AttachmentError> {
        if self.get(parent).is_none() {
            return Err(AttachmentError::NoSuchNode(parent));
        }
        if self.get(child).is_none() {
            return Err(AttachmentError::NoSuchNode(child));
        }
        if self.nodes[child.index()].parent != Some(parent) {
            return Err(AttachmentError::NotAChild { parent, child });
        }
        let hooks = self.hooks.clone();
        self.unlink(parent, child);
        self.nodes[child.index()].parent = None;
        if let Some(h) = &hooks {
            h.disconnected(self, child);
        }
        Ok(())
    }

    /// Copy a node. The copy is detached and shares no child-array identity
    /// with the source; a shallow copy has no children, a deep copy clones
    /// the whole subtree. Hooks do not fire for the internal links.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> Result<NodeId, AttachmentError> {
        let source = self
            .get(id)
            .cloned()
            .ok_or(AttachmentError::NoSuchNode(id))?;
        let mut copy = source.clone();
        copy.parent = None;
        copy.children = Vec::new();
        copy.depth = 0;
        let new_id = self.alloc(copy);
        if deep {
            for child in source.children {
                let child_copy = self.clone_node(child, true)?;
                self.link(new_id, child_copy);
            }
        }
        Ok(new_id)
    }

    /// Pre-order walk from `start`. A visitor returning [`Walk::Stop`] halts
    /// the entire walk immediately, not just the current subtree.
    pub fn traverse<F>(&self, start: NodeId, mut visitor: F) -> Walk
    where
        F: FnMut(&Tree, NodeId) -> Walk,
    {
        self.walk(start, &mut visitor)
    }

    fn walk<F>(&self, id: NodeId, visitor: &mut F) -> Walk
    where
        F: FnMut(&Tree, NodeId) -> Walk,
    {
        if visitor(self, id) == Walk::Stop {
            return Walk::Stop;
        }
        let count = self.children(id).len();
        for i in 0..count {
            let child = self.children(id)[i];
            if self.walk(child, visitor) == Walk::Stop {
                return Walk::Stop;
            }
        }
        Walk::Continue
    }

    /// Strict descendants of a node in pre-order.
    pub fn descendants(&self, id: NodeId) -> DescendantIter<'_> {
        let mut stack = Vec::new();
        for &child in self.children(id).iter().rev() {
            stack.push(child);
        }
        DescendantIter { tree: self, stack }
    }

    /// Self followed by descendants, in pre-order.
    pub fn self_and_descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::once(id).chain(self.descendants(id))
    }

    fn unlink(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.index()].children.retain(|&c| c != child);
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
        let depth = self.nodes[parent.index()].depth.saturating_add(1);
        self.refresh_depths(child, depth);
    }

    fn refresh_depths(&mut self, id: NodeId, depth: u16) {
        let mut stack = vec![(id, depth)];
        while let Some((node, d)) = stack.pop() {
            self.nodes[node.index()].depth = d;
            for &child in &self.nodes[node.index()].children {
                stack.push((child, d.saturating_add(1)));
            }
        }
    }
}

/// Iterator over strict descendants in pre-order.
pub struct DescendantIter<'a> {
    tree: &'a Tree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for DescendantIter<'a> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        for &child in self.tree.children(current).iter().rev() {
            self.stack.push(child);
        }
        Some(current)
    }
}
