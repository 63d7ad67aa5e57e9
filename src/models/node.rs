//! Skein node ("knot") entity
//!
//! A node is the state reached by typing `command` at its parent. Nodes live
//! in the arena owned by [`Skein`](super::skein::Skein) and refer to each
//! other by [`NodeId`]; the parent link is a plain index, never an owner.

use crate::diff::{self, Comparison, DiffResult};
use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Label shown for the root node, whose command is always empty
pub const START_LABEL: &str = "- start -";

/// Identifier of a node, unique for the lifetime of its tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tree-scoped id allocator
///
/// Ids are handed out in increasing order and never reused, even when the
/// node that held one is removed and later restored by undo.
#[derive(Clone, Debug)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Hand out the next unused id
    pub fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }

    /// Make sure `id` will never be handed out (used when loading files)
    pub fn reserve(&mut self, id: NodeId) {
        if id.0 >= self.next {
            self.next = id.0 + 1;
        }
    }

    /// The id the next call to `allocate` will return
    pub fn peek(&self) -> NodeId {
        NodeId(self.next)
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// A single knot in the skein
#[derive(Clone, Debug)]
pub struct SkeinNode {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,

    pub(crate) command: String,
    pub(crate) actual: Option<String>,
    pub(crate) ideal: Option<String>,
    pub(crate) annotation: Option<String>,
    pub(crate) commentary: Option<String>,

    pub(crate) temporary: bool,
    pub(crate) temporary_score: u64,
    pub(crate) is_test_sub_item: bool,
    pub(crate) played: bool,
    pub(crate) changed: bool,

    /// Diff of `ideal` against `actual`, computed on first read
    diff_cache: OnceCell<Option<DiffResult>>,
}

impl SkeinNode {
    pub fn new(id: NodeId, command: impl Into<String>) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            command: command.into(),
            actual: None,
            ideal: None,
            annotation: None,
            commentary: None,
            temporary: false,
            temporary_score: 0,
            is_test_sub_item: false,
            played: false,
            changed: false,
            diff_cache: OnceCell::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Text drawn on the node's lozenge
    pub fn label(&self) -> &str {
        if self.parent.is_none() && self.command.is_empty() {
            START_LABEL
        } else {
            &self.command
        }
    }

    pub fn actual(&self) -> Option<&str> {
        self.actual.as_deref()
    }

    pub fn ideal(&self) -> Option<&str> {
        self.ideal.as_deref()
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn commentary(&self) -> Option<&str> {
        self.commentary.as_deref()
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Lower scores are removed first when pruning temporary items
    pub fn temporary_score(&self) -> u64 {
        self.temporary_score
    }

    pub fn is_test_sub_item(&self) -> bool {
        self.is_test_sub_item
    }

    pub fn played(&self) -> bool {
        self.played
    }

    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Sibling uniqueness key: command plus test-sub-item flag
    pub fn key(&self) -> (&str, bool) {
        (&self.command, self.is_test_sub_item)
    }

    pub(crate) fn set_actual(&mut self, actual: Option<String>) {
        self.actual = actual;
        self.diff_cache = OnceCell::new();
    }

    pub(crate) fn set_ideal(&mut self, ideal: Option<String>) {
        self.ideal = ideal;
        self.diff_cache = OnceCell::new();
    }

    // ============================================================================
    // Differences
    // ============================================================================

    /// Cached diff of ideal against actual (`None` if either is missing)
    pub fn differences(&self) -> Option<&DiffResult> {
        self.diff_cache
            .get_or_init(|| diff::diff(self.ideal.as_deref(), self.actual.as_deref()))
            .as_ref()
    }

    pub fn has_ideal(&self) -> bool {
        self.ideal.is_some()
    }

    /// True when there is an ideal and the actual output does not match it
    /// exactly (whitespace-only mismatches count)
    pub fn has_differences(&self) -> bool {
        self.ideal.is_some() && self.differences().map_or(false, |d| d.has_changes())
    }

    /// Three-valued ideal/actual comparison
    pub fn comparison(&self) -> Comparison {
        self.differences()
            .map_or(Comparison::NoResult, |d| d.comparison())
    }

    /// Compare the author's commentary against the actual output
    pub fn commentary_comparison(&self) -> Comparison {
        diff::compare(self.commentary.as_deref(), self.actual.as_deref())
    }

    /// Field-by-field equality, ignoring links and caches
    pub fn same_content(&self, other: &SkeinNode) -> bool {
        self.id == other.id
            && self.command == other.command
            && self.actual == other.actual
            && self.ideal == other.ideal
            && self.annotation == other.annotation
            && self.commentary == other.commentary
            && self.temporary == other.temporary
            && self.temporary_score == other.temporary_score
            && self.is_test_sub_item == other.is_test_sub_item
            && self.played == other.played
            && self.changed == other.changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_never_reuses() {
        let mut ids = IdAllocator::new();
        let a = ids.allocate();
        let b = ids.allocate();
        assert_ne!(a, b);
        ids.reserve(NodeId(10));
        assert_eq!(ids.allocate(), NodeId(11));
        ids.reserve(NodeId(3));
        assert_eq!(ids.peek(), NodeId(12));
    }

    #[test]
    fn test_root_label() {
        let root = SkeinNode::new(NodeId(1), "");
        assert_eq!(root.label(), START_LABEL);

        let mut child = SkeinNode::new(NodeId(2), "look");
        child.parent = Some(NodeId(1));
        assert_eq!(child.label(), "look");
    }

    #[test]
    fn test_diff_cache_invalidated_on_write() {
        let mut node = SkeinNode::new(NodeId(2), "look");
        node.set_ideal(Some("A garden.".into()));
        assert!(node.differences().is_none());

        node.set_actual(Some("A garden.".into()));
        assert_eq!(node.comparison(), Comparison::Identical);
        assert!(!node.has_differences());

        node.set_actual(Some("A  garden.".into()));
        assert_eq!(node.comparison(), Comparison::DiffersOnlyByWhitespace);
        assert!(node.has_differences());
    }

    #[test]
    fn test_no_differences_without_ideal() {
        let mut node = SkeinNode::new(NodeId(2), "look");
        node.set_actual(Some("A garden.".into()));
        assert!(!node.has_differences());
        assert_eq!(node.comparison(), Comparison::NoResult);
    }

    #[test]
    fn test_commentary_comparison() {
        let mut node = SkeinNode::new(NodeId(2), "look");
        node.commentary = Some("A garden.".into());
        node.set_actual(Some("A garden.".into()));
        assert_eq!(node.commentary_comparison(), Comparison::Identical);
    }
}
