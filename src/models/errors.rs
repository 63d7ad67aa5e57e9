//! Error types for skein mutations
//!
//! Structural requests that would break the tree are rejected with one of
//! these; the tree is left exactly as it was.

use super::node::NodeId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkeinError {
    /// No node with this id exists in the tree
    #[error("Unknown skein node {0}")]
    UnknownNode(NodeId),

    /// The root cannot be moved, removed or re-linked
    #[error("Operation not permitted on the root node")]
    RootNode,

    /// The node is the active item or one of its ancestors
    #[error("Node {0} is on the active path")]
    OnActivePath(NodeId),

    /// The new parent lies inside the node's own subtree
    #[error("Attaching node {node} under {parent} would create a cycle")]
    WouldCreateCycle { node: NodeId, parent: NodeId },

    /// The parent already has a child with the same command and test flag
    #[error("Node {parent} already has a child with command '{command}'")]
    DuplicateChild { parent: NodeId, command: String },

    /// A node being restored collides with an id already in the tree
    #[error("Node id {0} is already in use")]
    DuplicateId(NodeId),

    /// The node still has a parent
    #[error("Node {0} is still attached to the tree")]
    NotDetached(NodeId),

    /// The node has no parent, so it cannot be moved or unlinked
    #[error("Node {0} is not attached to the tree")]
    Detached(NodeId),

    /// `child` is not in `parent`'s children
    #[error("Node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    /// `from` does not lie on the path from the root to `to`
    #[error("Node {from} is not an ancestor of {to}")]
    NotAncestor { from: NodeId, to: NodeId },
}
