//! Shared types for the WASM API
//!
//! Views handed to JavaScript. They are plain serde structs so the document
//! logic can build them without touching `JsValue`.

use crate::diff::{Comparison, DiffResult};
use crate::models::{ChangeHints, NodeId, Skein, SkeinEvent};
use serde::Serialize;

/// One change notification, as delivered to listeners
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct EventView {
    pub event: SkeinEvent,
    pub hints: ChangeHints,
}

/// Result of a mutating call
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    /// Node created or returned by the call, if any
    pub node: Option<NodeId>,
    pub events: Vec<EventView>,
    pub can_undo: bool,
    pub can_redo: bool,
    pub layout_dirty: bool,
    /// The skein has changes that have not been saved
    pub skein_changed: bool,
}

/// Snapshot of one node for the inspector
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub command: String,
    pub label: String,
    pub actual: Option<String>,
    pub ideal: Option<String>,
    pub annotation: Option<String>,
    pub commentary: Option<String>,
    pub played: bool,
    pub changed: bool,
    pub temporary: bool,
    pub temporary_score: u64,
    pub test_sub_item: bool,
    pub comparison: Comparison,
    pub differences: Option<DiffResult>,
    pub has_badge: bool,
    pub on_active_path: bool,
}

impl NodeView {
    pub fn of(skein: &Skein, id: NodeId) -> Option<Self> {
        let node = skein.node(id)?;
        Some(Self {
            id,
            parent: node.parent(),
            children: node.children().to_vec(),
            command: node.command().to_string(),
            label: node.label().to_string(),
            actual: node.actual().map(str::to_string),
            ideal: node.ideal().map(str::to_string),
            annotation: node.annotation().map(str::to_string),
            commentary: node.commentary().map(str::to_string),
            played: node.played(),
            changed: node.changed(),
            temporary: node.is_temporary(),
            temporary_score: node.temporary_score(),
            test_sub_item: node.is_test_sub_item(),
            comparison: node.comparison(),
            differences: node.differences().cloned(),
            has_badge: skein.has_badge(id),
            on_active_path: skein.is_on_active_path(id),
        })
    }
}

/// Document-level summary returned when a skein is created or loaded
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SkeinSummary {
    pub root: NodeId,
    pub active: Option<NodeId>,
    pub winning: Option<NodeId>,
    pub item_count: usize,
}

impl SkeinSummary {
    pub fn of(skein: &Skein) -> Self {
        Self {
            root: skein.root_item(),
            active: skein.active_item(),
            winning: skein.winning_item(),
            item_count: skein.len(),
        }
    }
}
