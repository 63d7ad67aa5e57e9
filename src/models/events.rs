//! Change notifications
//!
//! Listeners registered on a skein receive one event per change, together
//! with hints for the view (animate the change, keep the active node in view).

use super::node::NodeId;
use serde::Serialize;
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SkeinEvent {
    /// `node` was attached under `parent`
    NodeAdded { node: NodeId, parent: NodeId },
    /// `node` (with its subtree) was detached from `parent`
    NodeRemoved { node: NodeId, parent: NodeId },
    /// The interpreter moved to another node
    ActiveItemChanged { old: Option<NodeId>, new: Option<NodeId> },
    /// A text field or flag of `node` changed
    ContentChanged { node: NodeId },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeHints {
    pub animate: bool,
    pub keep_active_visible: bool,
}

impl ChangeHints {
    pub const NONE: ChangeHints = ChangeHints { animate: false, keep_active_visible: false };
    pub const ANIMATE: ChangeHints = ChangeHints { animate: true, keep_active_visible: false };
    pub const FOLLOW_ACTIVE: ChangeHints = ChangeHints { animate: true, keep_active_visible: true };
}

/// Receiver of skein change notifications
pub trait SkeinListener: Send {
    fn skein_changed(&mut self, event: &SkeinEvent, hints: ChangeHints);
}

/// Listener that queues events until someone collects them
///
/// Clones share the same queue, so one clone can be registered on the skein
/// while another is kept to drain it.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(SkeinEvent, ChangeHints)>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return everything queued so far
    pub fn take(&self) -> Vec<(SkeinEvent, ChangeHints)> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(e) => {
                log::error!("Event log poisoned: {}", e);
                Vec::new()
            }
        }
    }
}

impl SkeinListener for EventLog {
    fn skein_changed(&mut self, event: &SkeinEvent, hints: ChangeHints) {
        if let Ok(mut events) = self.events.lock() {
            events.push((event.clone(), hints));
        }
    }
}
