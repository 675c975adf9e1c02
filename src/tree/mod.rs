//! Arena-based document tree.
//!
//! Nodes live in a single arena indexed by compact handles:
//! - NodeId (u32) indices for cache-friendly traversal
//! - each node owns its ordered children; a child has at most one parent
//! - comments ride along on their owning node, outside the child list
//! - mutation hooks observe connect/disconnect transitions

pub mod arena;
pub mod node;
pub mod serialize;

pub use arena::Tree;
pub use node::{NodeId, NodeKind, TreeNode};
pub use serialize::{JsonOptions, MarkupOptions};

/// Signal returned by a traversal visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    /// Keep walking.
    Continue,
    /// Halt the entire walk immediately, at any depth.
    Stop,
}

/// Mutation hooks observed by a tree.
///
/// `connected` fires after a node gains a parent and `disconnected` after it
/// loses one. Reparenting an attached node fires both, disconnect first.
pub trait TreeHooks: Send + Sync {
    fn connected(&self, _tree: &Tree, _node: NodeId) {}
    fn disconnected(&self, _tree: &Tree, _node: NodeId) {}
}
