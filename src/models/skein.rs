//! The skein: tree of every command sequence explored for one story
//!
//! All nodes live in one arena keyed by [`NodeId`]. Mutations come in two
//! layers:
//!
//! - `raw_*` / `write_field`: perform exactly one structural or field change,
//!   check only what is needed to keep the arena consistent, and notify
//!   listeners. [`SkeinEdit`] replays through this layer.
//! - the public mutators: validate the tree invariants, then call the raw
//!   layer and journal one [`SkeinEdit`] per change for the host's undo stack.

use super::errors::SkeinError;
use super::events::{ChangeHints, SkeinEvent, SkeinListener};
use super::node::{IdAllocator, NodeId, SkeinNode};
use super::session::Turn;
use crate::diff::{Comparison, DiffResult};
use crate::undo::{NodeField, SkeinEdit, Subtree};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub struct Skein {
    nodes: BTreeMap<NodeId, SkeinNode>,
    root: NodeId,
    active: Option<NodeId>,
    winning: Option<NodeId>,
    ids: IdAllocator,
    score_counter: u64,

    layout_dirty: bool,
    skein_changed: bool,

    pub(crate) previous_commands: Vec<String>,
    pub(crate) turn: Option<Turn>,

    journal: Vec<SkeinEdit>,
    journaling: bool,
    listeners: Vec<Box<dyn SkeinListener>>,
}

impl Skein {
    /// Create a skein holding only the root node, which is also active
    pub fn new() -> Self {
        let mut ids = IdAllocator::new();
        let root = ids.allocate();
        let mut nodes = BTreeMap::new();
        nodes.insert(root, SkeinNode::new(root, ""));

        Self {
            nodes,
            root,
            active: Some(root),
            winning: None,
            ids,
            score_counter: 0,
            layout_dirty: true,
            skein_changed: false,
            previous_commands: Vec::new(),
            turn: None,
            journal: Vec::new(),
            journaling: true,
            listeners: Vec::new(),
        }
    }

    /// Assemble a skein from already-validated nodes (used by the loader)
    pub(crate) fn from_parts(
        nodes: BTreeMap<NodeId, SkeinNode>,
        root: NodeId,
        active: Option<NodeId>,
        winning: Option<NodeId>,
    ) -> Self {
        let mut ids = IdAllocator::new();
        let mut score_counter = 0;
        for node in nodes.values() {
            ids.reserve(node.id);
            score_counter = score_counter.max(node.temporary_score);
        }

        Self {
            nodes,
            root,
            active,
            winning,
            ids,
            score_counter,
            layout_dirty: true,
            skein_changed: false,
            previous_commands: Vec::new(),
            turn: None,
            journal: Vec::new(),
            journaling: true,
            listeners: Vec::new(),
        }
    }

    // ============================================================================
    // Listeners, dirty flags and the edit journal
    // ============================================================================

    pub fn add_listener(&mut self, listener: Box<dyn SkeinListener>) {
        self.listeners.push(listener);
    }

    pub(crate) fn notify(&mut self, event: SkeinEvent, hints: ChangeHints) {
        self.layout_dirty = true;
        if !matches!(event, SkeinEvent::ActiveItemChanged { .. }) {
            self.skein_changed = true;
        }
        for listener in self.listeners.iter_mut() {
            listener.skein_changed(&event, hints);
        }
    }

    /// Does the skein need laying out?
    pub fn is_layout_dirty(&self) -> bool {
        self.layout_dirty
    }

    pub fn set_layout_dirty(&mut self) {
        self.layout_dirty = true;
    }

    /// Called by the layout once it has caught up with the tree
    pub fn clear_layout_dirty(&mut self) {
        self.layout_dirty = false;
    }

    /// Has the skein changed since the flag was last reset?
    pub fn skein_changed(&self) -> bool {
        self.skein_changed
    }

    pub fn set_skein_changed(&mut self) {
        self.skein_changed = true;
    }

    /// Read and reset the changed flag
    pub fn take_skein_changed(&mut self) -> bool {
        std::mem::replace(&mut self.skein_changed, false)
    }

    fn record(&mut self, edit: SkeinEdit) {
        if self.journaling {
            self.journal.push(edit);
        }
    }

    pub(crate) fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Collapse everything journaled since `mark` into one batch edit
    pub(crate) fn close_batch(&mut self, mark: usize) {
        if self.journaling && self.journal.len() > mark + 1 {
            let edits: Vec<SkeinEdit> = self.journal.drain(mark..).collect();
            self.journal.push(SkeinEdit::Batch { edits });
        }
    }

    /// Remove and return the edits performed since the last call
    pub fn take_journal(&mut self) -> Vec<SkeinEdit> {
        std::mem::take(&mut self.journal)
    }

    /// Run `f` with journaling switched off (undo/redo, interpreter events)
    pub fn without_journal<T>(&mut self, f: impl FnOnce(&mut Skein) -> T) -> T {
        let previous = std::mem::replace(&mut self.journaling, false);
        let result = f(self);
        self.journaling = previous;
        result
    }

    // ============================================================================
    // Queries
    // ============================================================================

    pub fn root_item(&self) -> NodeId {
        self.root
    }

    pub fn active_item(&self) -> Option<NodeId> {
        self.active
    }

    pub fn winning_item(&self) -> Option<NodeId> {
        self.winning
    }

    /// Look up a node in the arena (attached or not)
    pub fn node(&self, id: NodeId) -> Option<&SkeinNode> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut SkeinNode, SkeinError> {
        self.nodes.get_mut(&id).ok_or(SkeinError::UnknownNode(id))
    }

    fn require(&self, id: NodeId) -> Result<&SkeinNode, SkeinError> {
        self.nodes.get(&id).ok_or(SkeinError::UnknownNode(id))
    }

    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(&id).map_or(&[], |n| n.children())
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Child of `parent` with the given command and test flag (not recursive)
    pub fn child_with_command(&self, parent: NodeId, command: &str, is_test_sub_item: bool) -> Option<NodeId> {
        self.children_of(parent).iter().copied().find(|child| {
            self.nodes
                .get(child)
                .map_or(false, |n| n.key() == (command, is_test_sub_item))
        })
    }

    /// Children that are real commands rather than "test me" sub-items
    pub fn non_test_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children_of(id)
            .iter()
            .copied()
            .filter(|c| self.nodes.get(c).map_or(false, |n| !n.is_test_sub_item))
            .collect()
    }

    /// Is `ancestor` on the path from the root to `node` (inclusive)?
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    /// Is `node` strictly below `ancestor`? (recursive)
    pub fn has_descendant(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor != node && self.is_ancestor_or_self(ancestor, node)
    }

    /// Is the node the active item or one of its ancestors?
    pub fn is_on_active_path(&self, id: NodeId) -> bool {
        self.active.map_or(false, |active| self.is_ancestor_or_self(id, active))
    }

    /// Can the node be reached from the root?
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id) && self.is_ancestor_or_self(self.root, id)
    }

    /// Nodes from the root down to `id`, both included
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            path.push(node);
            current = self.parent_of(node);
        }
        path.reverse();
        path
    }

    /// Pre-order ids of the subtree rooted at `id`
    pub fn preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        if !self.nodes.contains_key(&id) {
            return order;
        }

        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            order.push(next);
            stack.extend(self.children_of(next).iter().rev().copied());
        }
        order
    }

    /// Every attached node, in pre-order
    pub fn iter(&self) -> impl Iterator<Item = &SkeinNode> + '_ {
        self.preorder(self.root)
            .into_iter()
            .filter_map(move |id| self.nodes.get(&id))
    }

    /// Number of attached nodes, root included
    pub fn len(&self) -> usize {
        self.preorder(self.root).len()
    }

    pub fn is_empty(&self) -> bool {
        self.children_of(self.root).is_empty()
    }

    /// Find an attached node by id
    pub fn find_item(&self, id: NodeId) -> Option<&SkeinNode> {
        if self.is_attached(id) {
            self.nodes.get(&id)
        } else {
            None
        }
    }

    /// All distinct annotations in use, sorted
    pub fn annotations(&self) -> Vec<String> {
        let set: BTreeSet<&str> = self.iter().filter_map(|n| n.annotation()).collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Nodes carrying the given annotation, in pre-order
    pub fn items_with_annotation(&self, annotation: &str) -> Vec<NodeId> {
        self.iter()
            .filter(|n| n.annotation() == Some(annotation))
            .map(|n| n.id)
            .collect()
    }

    // ============================================================================
    // Differences
    // ============================================================================

    pub fn differences(&self, id: NodeId) -> Option<&DiffResult> {
        self.nodes.get(&id).and_then(|n| n.differences())
    }

    pub fn has_differences(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map_or(false, |n| n.has_differences())
    }

    pub fn has_ideal(&self, id: NodeId) -> bool {
        self.nodes.get(&id).map_or(false, |n| n.has_ideal())
    }

    pub fn comparison(&self, id: NodeId) -> Comparison {
        self.nodes.get(&id).map_or(Comparison::NoResult, |n| n.comparison())
    }

    /// Should the node be drawn with a "differs" badge?
    ///
    /// Also true when any node of its collapsed "test me" chain differs.
    pub fn has_badge(&self, id: NodeId) -> bool {
        if self.has_differences(id) {
            return true;
        }
        let mut current = id;
        while let Some(sub) = self.test_sub_item_of(current) {
            if self.has_differences(sub) {
                return true;
            }
            current = sub;
        }
        false
    }

    /// First node below `id` (pre-order) whose output differs from its ideal
    pub fn next_diff(&self, id: NodeId) -> Option<NodeId> {
        self.preorder(id)
            .into_iter()
            .skip(1)
            .find(|n| self.has_differences(*n))
    }

    /// First test-sub-item child of a node
    pub fn test_sub_item_of(&self, id: NodeId) -> Option<NodeId> {
        self.children_of(id)
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).map_or(false, |n| n.is_test_sub_item))
    }

    // ============================================================================
    // Raw layer (shared with undo/redo)
    // ============================================================================

    /// Attach a detached subtree under `parent` at `index`
    pub(crate) fn raw_insert(&mut self, subtree: Subtree, parent: NodeId, index: usize) -> Result<(), SkeinError> {
        self.require(parent)?;
        if subtree.nodes.is_empty() {
            return Err(SkeinError::UnknownNode(subtree.top));
        }
        if let Some(id) = subtree.ids().find(|id| self.nodes.contains_key(id)) {
            return Err(SkeinError::DuplicateId(id));
        }

        let top = subtree.top;
        for mut node in subtree.nodes {
            if node.id == top {
                node.parent = Some(parent);
            }
            self.ids.reserve(node.id);
            self.nodes.insert(node.id, node);
        }

        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, top);

        self.notify(SkeinEvent::NodeAdded { node: top, parent }, ChangeHints::ANIMATE);
        Ok(())
    }

    /// Detach a subtree and take its nodes out of the arena
    ///
    /// Returns the subtree and where it was attached.
    pub(crate) fn raw_take(&mut self, id: NodeId) -> Result<(Subtree, Option<(NodeId, usize)>), SkeinError> {
        self.require(id)?;
        if id == self.root {
            return Err(SkeinError::RootNode);
        }
        if self.is_on_active_path(id) {
            return Err(SkeinError::OnActivePath(id));
        }

        let place = match self.parent_of(id) {
            Some(parent) => {
                let children = &mut self.node_mut(parent)?.children;
                let index = children
                    .iter()
                    .position(|c| *c == id)
                    .ok_or(SkeinError::NotAChild { parent, child: id })?;
                children.remove(index);
                Some((parent, index))
            }
            None => None,
        };

        let ids = self.preorder(id);
        if self.winning.map_or(false, |w| ids.contains(&w)) {
            self.winning = None;
        }

        let mut nodes = Vec::with_capacity(ids.len());
        for node_id in ids {
            if let Some(mut node) = self.nodes.remove(&node_id) {
                if node_id == id {
                    node.parent = None;
                }
                nodes.push(node);
            }
        }

        if let Some((parent, _)) = place {
            self.notify(SkeinEvent::NodeRemoved { node: id, parent }, ChangeHints::ANIMATE);
        }
        Ok((Subtree { top: id, nodes }, place))
    }

    /// Link a detached node into `parent`'s children
    pub(crate) fn raw_link(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<(), SkeinError> {
        self.require(parent)?;
        let node = self.require(child)?;
        if child == self.root {
            return Err(SkeinError::RootNode);
        }
        if node.parent.is_some() {
            return Err(SkeinError::NotDetached(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SkeinError::WouldCreateCycle { node: child, parent });
        }

        self.node_mut(child)?.parent = Some(parent);
        let children = &mut self.node_mut(parent)?.children;
        let index = index.min(children.len());
        children.insert(index, child);

        self.notify(SkeinEvent::NodeAdded { node: child, parent }, ChangeHints::ANIMATE);
        Ok(())
    }

    /// Unlink a node from its parent, leaving it detached in the arena
    pub(crate) fn raw_unlink(&mut self, parent: NodeId, child: NodeId) -> Result<usize, SkeinError> {
        self.require(child)?;
        if self.is_on_active_path(child) {
            return Err(SkeinError::OnActivePath(child));
        }

        let children = &mut self.node_mut(parent)?.children;
        let index = children
            .iter()
            .position(|c| *c == child)
            .ok_or(SkeinError::NotAChild { parent, child })?;
        children.remove(index);
        self.node_mut(child)?.parent = None;

        self.notify(SkeinEvent::NodeRemoved { node: child, parent }, ChangeHints::ANIMATE);
        Ok(index)
    }

    /// Move an attached node under `new_parent` at `index`
    ///
    /// Returns the old parent and index.
    pub(crate) fn raw_move(&mut self, id: NodeId, new_parent: NodeId, index: usize) -> Result<(NodeId, usize), SkeinError> {
        self.require(new_parent)?;
        let node = self.require(id)?;
        if id == self.root {
            return Err(SkeinError::RootNode);
        }
        let old_parent = node.parent.ok_or(SkeinError::Detached(id))?;
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(SkeinError::WouldCreateCycle { node: id, parent: new_parent });
        }

        let old_children = &mut self.node_mut(old_parent)?.children;
        let old_index = old_children
            .iter()
            .position(|c| *c == id)
            .ok_or(SkeinError::NotAChild { parent: old_parent, child: id })?;
        old_children.remove(old_index);

        let new_children = &mut self.node_mut(new_parent)?.children;
        let index = index.min(new_children.len());
        new_children.insert(index, id);
        self.node_mut(id)?.parent = Some(new_parent);

        self.notify(SkeinEvent::NodeRemoved { node: id, parent: old_parent }, ChangeHints::ANIMATE);
        self.notify(SkeinEvent::NodeAdded { node: id, parent: new_parent }, ChangeHints::ANIMATE);
        Ok((old_parent, old_index))
    }

    /// Overwrite one field, returning its previous value
    pub(crate) fn write_field(&mut self, id: NodeId, field: NodeField) -> Result<NodeField, SkeinError> {
        let node = self.node_mut(id)?;
        let old = match field {
            NodeField::Command(value) => NodeField::Command(std::mem::replace(&mut node.command, value)),
            NodeField::Actual(value) => {
                let old = node.actual.take();
                node.set_actual(value);
                NodeField::Actual(old)
            }
            NodeField::Ideal(value) => {
                let old = node.ideal.take();
                node.set_ideal(value);
                NodeField::Ideal(old)
            }
            NodeField::Annotation(value) => NodeField::Annotation(std::mem::replace(&mut node.annotation, value)),
            NodeField::Commentary(value) => NodeField::Commentary(std::mem::replace(&mut node.commentary, value)),
            NodeField::IsTestSubItem(value) => {
                NodeField::IsTestSubItem(std::mem::replace(&mut node.is_test_sub_item, value))
            }
            NodeField::Temporary { temporary, score } => {
                let old = NodeField::Temporary {
                    temporary: node.temporary,
                    score: node.temporary_score,
                };
                node.temporary = temporary;
                node.temporary_score = score;
                old
            }
            NodeField::Played(value) => NodeField::Played(std::mem::replace(&mut node.played, value)),
            NodeField::Changed(value) => NodeField::Changed(std::mem::replace(&mut node.changed, value)),
        };

        self.notify(SkeinEvent::ContentChanged { node: id }, ChangeHints::NONE);
        Ok(old)
    }

    pub(crate) fn raw_set_winning(&mut self, winning: Option<NodeId>) {
        let old = std::mem::replace(&mut self.winning, winning);
        if let Some(node) = winning.or(old) {
            self.notify(SkeinEvent::ContentChanged { node }, ChangeHints::NONE);
        }
    }

    pub(crate) fn raw_set_active(&mut self, active: Option<NodeId>) {
        let old = std::mem::replace(&mut self.active, active);
        if old != active {
            self.notify(
                SkeinEvent::ActiveItemChanged { old, new: active },
                ChangeHints::FOLLOW_ACTIVE,
            );
        }
    }

    /// Hand the active item to the parent of `id` when it sits inside `id`'s subtree
    ///
    /// Interpreter moves are never journaled, so undo can meet an active item
    /// the history knows nothing about.
    pub(crate) fn release_active_within(&mut self, id: NodeId) {
        if !self.is_on_active_path(id) {
            return;
        }
        if let Some(parent) = self.parent_of(id) {
            log::debug!("Active item leaves the subtree of {} for {}", id, parent);
            self.raw_set_active(Some(parent));
        }
    }

    /// Write a field and journal the change
    fn set_field(&mut self, id: NodeId, field: NodeField) -> bool {
        match self.write_field(id, field.clone()) {
            Ok(old) => {
                if old != field {
                    self.record(SkeinEdit::SetField { node: id, old, new: field });
                }
                true
            }
            Err(e) => {
                log::warn!("⚠️ Ignoring field update: {}", e);
                false
            }
        }
    }

    // ============================================================================
    // Structural mutators
    // ============================================================================

    /// Child of `parent` reached by `command`, created if it doesn't exist yet
    pub fn add_child(&mut self, parent: NodeId, command: &str) -> Result<NodeId, SkeinError> {
        self.add_child_with(parent, command, false)
    }

    /// Like [`add_child`](Self::add_child), for "test me" sub-items
    pub fn add_test_child(&mut self, parent: NodeId, command: &str) -> Result<NodeId, SkeinError> {
        self.add_child_with(parent, command, true)
    }

    fn add_child_with(&mut self, parent: NodeId, command: &str, is_test_sub_item: bool) -> Result<NodeId, SkeinError> {
        self.require(parent)?;
        if let Some(existing) = self.child_with_command(parent, command, is_test_sub_item) {
            return Ok(existing);
        }

        let id = self.ids.allocate();
        let mut node = SkeinNode::new(id, command);
        node.is_test_sub_item = is_test_sub_item;

        let index = self.children_of(parent).len();
        let subtree = Subtree::leaf(node);
        self.raw_insert(subtree.clone(), parent, index)?;
        self.record(SkeinEdit::InsertSubtree { parent, index, subtree });

        log::debug!("Added node {} '{}' under {}", id, command, parent);
        Ok(id)
    }

    /// Detach a node and its whole subtree from the tree
    ///
    /// Rejected for the root and for anything on the active path.
    pub fn remove_from_parent(&mut self, id: NodeId) -> Result<(), SkeinError> {
        self.require(id)?;
        if id == self.root {
            return Err(SkeinError::RootNode);
        }
        if self.is_on_active_path(id) {
            return Err(SkeinError::OnActivePath(id));
        }
        if self.parent_of(id).is_none() {
            return Err(SkeinError::Detached(id));
        }

        let mark = self.journal.len();
        self.clear_winning_within(id);

        let (subtree, place) = self.raw_take(id)?;
        if let Some((parent, index)) = place {
            log::debug!("Removed subtree of {} ({} nodes) from {}", id, subtree.nodes.len(), parent);
            self.record(SkeinEdit::RemoveSubtree { parent, index, subtree });
        }
        self.close_batch(mark);
        Ok(())
    }

    /// Move a node (with its subtree) under a new parent
    pub fn set_parent_of(&mut self, id: NodeId, new_parent: NodeId) -> Result<(), SkeinError> {
        let node = self.require(id)?;
        self.require(new_parent)?;
        if id == self.root {
            return Err(SkeinError::RootNode);
        }

        let Some(old_parent) = node.parent else {
            return self.add_to_children_array_of(new_parent, id);
        };
        if old_parent == new_parent {
            return Ok(());
        }
        if self.is_ancestor_or_self(id, new_parent) {
            return Err(SkeinError::WouldCreateCycle { node: id, parent: new_parent });
        }
        self.check_unique_key(new_parent, id)?;

        let new_index = self.children_of(new_parent).len();
        let (old_parent, old_index) = self.raw_move(id, new_parent, new_index)?;
        self.record(SkeinEdit::Move {
            node: id,
            old_parent,
            old_index,
            new_parent,
            new_index,
        });
        Ok(())
    }

    /// Link a detached node at the end of `parent`'s children
    pub fn add_to_children_array_of(&mut self, parent: NodeId, child: NodeId) -> Result<(), SkeinError> {
        self.require(parent)?;
        let node = self.require(child)?;
        if child == self.root {
            return Err(SkeinError::RootNode);
        }
        if node.parent.is_some() {
            return Err(SkeinError::NotDetached(child));
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(SkeinError::WouldCreateCycle { node: child, parent });
        }
        self.check_unique_key(parent, child)?;

        let index = self.children_of(parent).len();
        self.raw_link(parent, child, index)?;
        self.record(SkeinEdit::Link { parent, child, index });
        Ok(())
    }

    /// Unlink `child` from `parent`, leaving it detached (restorable with
    /// [`add_to_children_array_of`](Self::add_to_children_array_of))
    pub fn remove_from_children_array_of(&mut self, parent: NodeId, child: NodeId) -> Result<(), SkeinError> {
        self.require(parent)?;
        self.require(child)?;
        if !self.children_of(parent).contains(&child) {
            return Err(SkeinError::NotAChild { parent, child });
        }
        if self.is_on_active_path(child) {
            return Err(SkeinError::OnActivePath(child));
        }

        let mark = self.journal.len();
        self.clear_winning_within(child);
        let index = self.raw_unlink(parent, child)?;
        self.record(SkeinEdit::Unlink { parent, child, index });
        self.close_batch(mark);
        Ok(())
    }

    fn check_unique_key(&self, parent: NodeId, child: NodeId) -> Result<(), SkeinError> {
        let node = self.require(child)?;
        match self.child_with_command(parent, &node.command, node.is_test_sub_item) {
            Some(existing) if existing != child => Err(SkeinError::DuplicateChild {
                parent,
                command: node.command.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn clear_winning_within(&mut self, id: NodeId) {
        if let Some(winning) = self.winning {
            if self.is_ancestor_or_self(id, winning) {
                self.raw_set_winning(None);
                self.record(SkeinEdit::SetWinning { old: Some(winning), new: None });
            }
        }
    }

    // ============================================================================
    // Content mutators (never fail; unknown ids are logged and ignored)
    // ============================================================================

    /// Change the command of a node
    ///
    /// If a sibling already uses the new command, the node is merged into it.
    pub fn set_command_of(&mut self, id: NodeId, command: &str) -> bool {
        if id == self.root {
            log::warn!("⚠️ The root command is always empty");
            return false;
        }
        let Some(node) = self.nodes.get(&id) else {
            log::warn!("⚠️ set_command_of: unknown node {}", id);
            return false;
        };
        if node.command == command {
            return true;
        }
        let is_test = node.is_test_sub_item;
        self.rekey(id, NodeField::Command(command.to_string()), command, is_test)
    }

    /// Flag or unflag a node as a "test me" sub-item
    pub fn set_is_test_sub_item(&mut self, id: NodeId, is_test_sub_item: bool) -> bool {
        if id == self.root {
            log::warn!("⚠️ The root is never a test sub-item");
            return false;
        }
        let Some(node) = self.nodes.get(&id) else {
            log::warn!("⚠️ set_is_test_sub_item: unknown node {}", id);
            return false;
        };
        if node.is_test_sub_item == is_test_sub_item {
            return true;
        }
        let command = node.command.clone();
        self.rekey(id, NodeField::IsTestSubItem(is_test_sub_item), &command, is_test_sub_item)
    }

    /// Write a key field, merging into a sibling that already has the new key
    fn rekey(&mut self, id: NodeId, field: NodeField, command: &str, is_test: bool) -> bool {
        let mark = self.journal.len();
        if !self.set_field(id, field) {
            return false;
        }

        if let Some(parent) = self.parent_of(id) {
            let twin = self.children_of(parent).iter().copied().find(|c| {
                *c != id && self.nodes.get(c).map_or(false, |n| n.key() == (command, is_test))
            });
            if let Some(twin) = twin {
                log::info!("🔀 Merging node {} into sibling {} ('{}')", id, twin, command);
                if let Err(e) = self.merge_into(id, twin) {
                    log::error!("❌ Merge of {} into {} stopped: {}", id, twin, e);
                }
            }
        }

        self.close_batch(mark);
        true
    }

    /// Fold `source` into `target`: children move across (equal keys merge
    /// recursively), missing text is taken from `source`, then `source` goes
    fn merge_into(&mut self, source: NodeId, target: NodeId) -> Result<(), SkeinError> {
        for child in self.children_of(source).to_vec() {
            let (command, is_test) = {
                let node = self.require(child)?;
                (node.command.clone(), node.is_test_sub_item)
            };
            match self.child_with_command(target, &command, is_test) {
                Some(twin) => self.merge_into(child, twin)?,
                None => {
                    let new_index = self.children_of(target).len();
                    let (old_parent, old_index) = self.raw_move(child, target, new_index)?;
                    self.record(SkeinEdit::Move {
                        node: child,
                        old_parent,
                        old_index,
                        new_parent: target,
                        new_index,
                    });
                }
            }
        }

        let source_node = self.require(source)?.clone();
        let target_node = self.require(target)?.clone();
        if target_node.actual.is_none() && source_node.actual.is_some() {
            self.set_field(target, NodeField::Actual(source_node.actual.clone()));
        }
        if target_node.ideal.is_none() && source_node.ideal.is_some() {
            self.set_field(target, NodeField::Ideal(source_node.ideal.clone()));
        }
        if target_node.annotation.is_none() && source_node.annotation.is_some() {
            self.set_field(target, NodeField::Annotation(source_node.annotation.clone()));
        }
        if target_node.commentary.is_none() && source_node.commentary.is_some() {
            self.set_field(target, NodeField::Commentary(source_node.commentary.clone()));
        }

        if self.active == Some(source) {
            self.raw_set_active(Some(target));
            self.record(SkeinEdit::SetActive { old: Some(source), new: Some(target) });
        }
        if self.winning == Some(source) {
            self.raw_set_winning(Some(target));
            self.record(SkeinEdit::SetWinning { old: Some(source), new: Some(target) });
        }

        let (subtree, place) = self.raw_take(source)?;
        if let Some((parent, index)) = place {
            self.record(SkeinEdit::RemoveSubtree { parent, index, subtree });
        }
        Ok(())
    }

    pub fn set_ideal_of(&mut self, id: NodeId, ideal: Option<String>) -> bool {
        self.set_field(id, NodeField::Ideal(ideal))
    }

    pub fn set_actual_of(&mut self, id: NodeId, actual: Option<String>) -> bool {
        self.set_field(id, NodeField::Actual(actual))
    }

    pub fn set_annotation_of(&mut self, id: NodeId, annotation: Option<String>) -> bool {
        self.set_field(id, NodeField::Annotation(annotation))
    }

    pub fn set_commentary_of(&mut self, id: NodeId, commentary: Option<String>) -> bool {
        self.set_field(id, NodeField::Commentary(commentary))
    }

    pub fn set_temporary_of(&mut self, id: NodeId, temporary: bool, score: u64) -> bool {
        self.set_field(id, NodeField::Temporary { temporary, score })
    }

    pub(crate) fn set_played_of(&mut self, id: NodeId, played: bool) -> bool {
        self.set_field(id, NodeField::Played(played))
    }

    pub(crate) fn set_changed_of(&mut self, id: NodeId, changed: bool) -> bool {
        self.set_field(id, NodeField::Changed(changed))
    }

    // ============================================================================
    // Active / winning items
    // ============================================================================

    /// Point the interpreter at another node (`None` when no game is running)
    pub fn set_active_item(&mut self, active: Option<NodeId>) -> Result<(), SkeinError> {
        if let Some(id) = active {
            if !self.is_attached(id) {
                return Err(SkeinError::UnknownNode(id));
            }
        }
        let old = self.active;
        if old != active {
            self.raw_set_active(active);
            self.record(SkeinEdit::SetActive { old, new: active });
        }
        Ok(())
    }

    /// Designate the node whose path is the best known walkthrough
    pub fn set_winning_item(&mut self, winning: Option<NodeId>) -> Result<(), SkeinError> {
        if let Some(id) = winning {
            if !self.is_attached(id) {
                return Err(SkeinError::UnknownNode(id));
            }
        }
        let old = self.winning;
        if old != winning {
            self.raw_set_winning(winning);
            self.record(SkeinEdit::SetWinning { old, new: winning });
        }
        Ok(())
    }

    // ============================================================================
    // Temporary items
    // ============================================================================

    /// Make a branch permanent (node and ancestors) or temporary (node and
    /// descendants)
    pub fn set_branch_temporary(&mut self, id: NodeId, temporary: bool) -> bool {
        if !self.nodes.contains_key(&id) {
            log::warn!("⚠️ set_branch_temporary: unknown node {}", id);
            return false;
        }

        let targets = if temporary {
            self.preorder(id)
        } else {
            self.path_to(id)
        };

        let mark = self.journal.len();
        for target in targets {
            if target == self.root {
                continue;
            }
            let score = self.nodes.get(&target).map_or(0, |n| n.temporary_score);
            self.set_field(target, NodeField::Temporary { temporary, score });
        }
        self.close_batch(mark);
        true
    }

    /// Mark a node as recently visited
    pub fn increase_temporary_score(&mut self, id: NodeId) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let temporary = node.temporary;
        self.score_counter += 1;
        let score = self.score_counter;
        self.set_field(id, NodeField::Temporary { temporary, score })
    }

    pub(crate) fn next_temporary_score(&mut self) -> u64 {
        self.score_counter += 1;
        self.score_counter
    }

    /// Prune temporary leaves until at most `max_temps` temporary nodes remain
    ///
    /// Lowest scores go first (ties: lowest id). Nodes on the active path or
    /// the winning path are never removed. Returns the number of nodes removed.
    pub fn remove_temporary_items(&mut self, max_temps: usize) -> usize {
        let mut removed = 0;

        loop {
            let temporaries = self.iter().filter(|n| n.temporary && n.id != self.root).count();
            if temporaries <= max_temps {
                break;
            }

            let candidate = self
                .iter()
                .filter(|n| n.temporary && n.id != self.root && n.children.is_empty())
                .filter(|n| !self.is_on_active_path(n.id))
                .filter(|n| self.winning.map_or(true, |w| !self.is_ancestor_or_self(n.id, w)))
                .min_by_key(|n| (n.temporary_score, n.id))
                .map(|n| n.id);

            let Some(candidate) = candidate else {
                break;
            };
            match self.remove_from_parent(candidate) {
                Ok(()) => removed += 1,
                Err(e) => {
                    log::warn!("⚠️ Could not prune {}: {}", candidate, e);
                    break;
                }
            }
        }

        if removed > 0 {
            log::info!("🧹 Removed {} temporary items", removed);
        }
        removed
    }
}

impl Default for Skein {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Skein {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skein")
            .field("root", &self.root)
            .field("active", &self.active)
            .field("winning", &self.winning)
            .field("nodes", &self.nodes.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Structural equality: every node field and the full parent/child shape
impl PartialEq for Skein {
    fn eq(&self, other: &Self) -> bool {
        if self.root != other.root || self.active != other.active || self.winning != other.winning {
            return false;
        }

        let mine = self.preorder(self.root);
        let theirs = other.preorder(other.root);
        if mine != theirs {
            return false;
        }

        mine.iter().all(|id| match (self.nodes.get(id), other.nodes.get(id)) {
            (Some(a), Some(b)) => a.same_content(b) && a.children == b.children && a.parent == b.parent,
            _ => false,
        })
    }
}
