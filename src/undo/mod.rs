use crate::models::errors::SkeinError;
use crate::models::node::{NodeId, SkeinNode};
use crate::models::skein::Skein;
use std::collections::VecDeque;
use thiserror::Error;

/// A detached subtree, top node first, in pre-order
#[derive(Clone, Debug)]
pub struct Subtree {
    pub top: NodeId,
    pub nodes: Vec<SkeinNode>,
}

impl Subtree {
    /// A single childless node
    pub fn leaf(node: SkeinNode) -> Self {
        Self { top: node.id(), nodes: vec![node] }
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|n| n.id())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|n| n.id() == id)
    }
}

/// Value of one writable node field
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeField {
    Command(String),
    Actual(Option<String>),
    Ideal(Option<String>),
    Annotation(Option<String>),
    Commentary(Option<String>),
    IsTestSubItem(bool),
    Temporary { temporary: bool, score: u64 },
    Played(bool),
    Changed(bool),
}

/// Represents a reversible skein mutation
///
/// Each variant carries both the old and the new state, so a host can replay
/// it in either direction without looking at the tree first.
#[derive(Clone, Debug)]
pub enum SkeinEdit {
    /// A subtree was attached under `parent` at `index`
    InsertSubtree {
        parent: NodeId,
        index: usize,
        subtree: Subtree,
    },
    /// A subtree was detached from `parent` (kept here for restoration)
    RemoveSubtree {
        parent: NodeId,
        index: usize,
        subtree: Subtree,
    },
    /// A node moved from one parent to another
    Move {
        node: NodeId,
        old_parent: NodeId,
        old_index: usize,
        new_parent: NodeId,
        new_index: usize,
    },
    /// A detached node was linked into `parent`'s children
    Link {
        parent: NodeId,
        child: NodeId,
        index: usize,
    },
    /// A node was unlinked from `parent` but kept in the arena
    Unlink {
        parent: NodeId,
        child: NodeId,
        index: usize,
    },
    /// A node field was overwritten
    SetField {
        node: NodeId,
        old: NodeField,
        new: NodeField,
    },
    /// The winning item changed
    SetWinning {
        old: Option<NodeId>,
        new: Option<NodeId>,
    },
    /// The user pointed the active item somewhere else
    SetActive {
        old: Option<NodeId>,
        new: Option<NodeId>,
    },
    /// Several edits performed as one step
    Batch {
        edits: Vec<SkeinEdit>,
    },
}

impl SkeinEdit {
    /// Perform this edit on the skein
    pub fn apply(&mut self, skein: &mut Skein) -> Result<(), SkeinError> {
        match self {
            SkeinEdit::InsertSubtree { parent, index, subtree } => {
                skein.raw_insert(subtree.clone(), *parent, *index)
            }
            SkeinEdit::RemoveSubtree { subtree, .. } => {
                skein.release_active_within(subtree.top);
                *subtree = skein.raw_take(subtree.top)?.0;
                Ok(())
            }
            SkeinEdit::Move { node, new_parent, new_index, .. } => {
                skein.raw_move(*node, *new_parent, *new_index).map(|_| ())
            }
            SkeinEdit::Link { parent, child, index } => skein.raw_link(*parent, *child, *index),
            SkeinEdit::Unlink { parent, child, .. } => {
                skein.release_active_within(*child);
                skein.raw_unlink(*parent, *child).map(|_| ())
            }
            SkeinEdit::SetField { node, new, .. } => skein.write_field(*node, new.clone()).map(|_| ()),
            SkeinEdit::SetWinning { new, .. } => {
                skein.raw_set_winning(*new);
                Ok(())
            }
            SkeinEdit::SetActive { new, .. } => set_active(skein, *new),
            SkeinEdit::Batch { edits } => {
                for done in 0..edits.len() {
                    if let Err(e) = edits[done].apply(skein) {
                        // Put back what already ran so the batch is all or nothing
                        for edit in edits[..done].iter_mut().rev() {
                            if let Err(rollback) = edit.revert(skein) {
                                log::error!("❌ Rolling back batch failed: {}", rollback);
                            }
                        }
                        return Err(e);
                    }
                }
                Ok(())
            }
        }
    }

    /// Reverse this edit (undo)
    pub fn revert(&mut self, skein: &mut Skein) -> Result<(), SkeinError> {
        match self {
            SkeinEdit::InsertSubtree { subtree, .. } => {
                // Keep whatever grew under the subtree since, so redo restores it
                skein.release_active_within(subtree.top);
                *subtree = skein.raw_take(subtree.top)?.0;
                Ok(())
            }
            SkeinEdit::RemoveSubtree { parent, index, subtree } => {
                skein.raw_insert(subtree.clone(), *parent, *index)
            }
            SkeinEdit::Move { node, old_parent, old_index, .. } => {
                skein.raw_move(*node, *old_parent, *old_index).map(|_| ())
            }
            SkeinEdit::Link { parent, child, .. } => {
                skein.release_active_within(*child);
                skein.raw_unlink(*parent, *child).map(|_| ())
            }
            SkeinEdit::Unlink { parent, child, index } => skein.raw_link(*parent, *child, *index),
            SkeinEdit::SetField { node, old, .. } => skein.write_field(*node, old.clone()).map(|_| ()),
            SkeinEdit::SetWinning { old, .. } => {
                skein.raw_set_winning(*old);
                Ok(())
            }
            SkeinEdit::SetActive { old, .. } => set_active(skein, *old),
            SkeinEdit::Batch { edits } => {
                // Undo batch in reverse order
                let count = edits.len();
                for done in 0..count {
                    if let Err(e) = edits[count - 1 - done].revert(skein) {
                        for edit in edits[count - done..].iter_mut() {
                            if let Err(rollback) = edit.apply(skein) {
                                log::error!("❌ Rolling back batch failed: {}", rollback);
                            }
                        }
                        return Err(e);
                    }
                }
                Ok(())
            }
        }
    }

    /// Get the node this edit is about (the first one, for batches)
    pub fn affected_node(&self) -> Option<NodeId> {
        match self {
            SkeinEdit::InsertSubtree { subtree, .. } => Some(subtree.top),
            SkeinEdit::RemoveSubtree { subtree, .. } => Some(subtree.top),
            SkeinEdit::Move { node, .. } => Some(*node),
            SkeinEdit::Link { child, .. } => Some(*child),
            SkeinEdit::Unlink { child, .. } => Some(*child),
            SkeinEdit::SetField { node, .. } => Some(*node),
            SkeinEdit::SetWinning { new, old } => new.or(*old),
            SkeinEdit::SetActive { new, old } => new.or(*old),
            SkeinEdit::Batch { edits } => edits.iter().find_map(|e| e.affected_node()),
        }
    }
}

fn set_active(skein: &mut Skein, active: Option<NodeId>) -> Result<(), SkeinError> {
    if let Some(id) = active {
        if !skein.is_attached(id) {
            return Err(SkeinError::UnknownNode(id));
        }
    }
    skein.raw_set_active(active);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UndoError {
    #[error("No undo history available")]
    NothingToUndo,

    #[error("No redo history available")]
    NothingToRedo,

    #[error(transparent)]
    Skein(#[from] SkeinError),
}

/// Manages undo/redo history of skein edits
///
/// Edits are taken from the skein's journal with [`UndoStack::record`]. Between
/// [`begin_batch`](UndoStack::begin_batch) and
/// [`finalize_batch`](UndoStack::finalize_batch) everything recorded becomes a
/// single undo step.
#[derive(Clone, Debug)]
pub struct UndoStack {
    /// Stack of edits that can be undone
    commands: VecDeque<SkeinEdit>,
    /// Current position in the stack (for redo support)
    current_index: usize,
    /// Maximum number of steps to keep in history
    max_size: usize,
    /// Current batch being accumulated (if any)
    current_batch: Option<Vec<SkeinEdit>>,
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new(100)
    }
}

impl UndoStack {
    /// Create a new undo stack with specified maximum size
    pub fn new(max_size: usize) -> Self {
        Self {
            commands: VecDeque::new(),
            current_index: 0,
            max_size,
            current_batch: None,
        }
    }

    /// Move everything the skein journaled since the last call onto the stack
    pub fn record(&mut self, skein: &mut Skein) {
        for edit in skein.take_journal() {
            self.push(edit);
        }
    }

    /// Add an edit to the stack (or to the open batch)
    pub fn push(&mut self, edit: SkeinEdit) {
        match self.current_batch {
            Some(ref mut batch) => batch.push(edit),
            None => self.push_step(edit),
        }
    }

    /// Start grouping edits into one undo step
    pub fn begin_batch(&mut self) {
        self.finalize_batch();
        self.current_batch = Some(Vec::new());
    }

    /// Finalize the current batch and add it to the undo stack
    pub fn finalize_batch(&mut self) {
        if let Some(mut batch) = self.current_batch.take() {
            match batch.len() {
                0 => {}
                1 => {
                    if let Some(edit) = batch.pop() {
                        self.push_step(edit);
                    }
                }
                _ => self.push_step(SkeinEdit::Batch { edits: batch }),
            }
        }
    }

    fn push_step(&mut self, edit: SkeinEdit) {
        // Truncate any redo history when new step is added
        self.commands.truncate(self.current_index);
        self.commands.push_back(edit);
        self.current_index = self.commands.len();

        // Enforce max size
        if self.commands.len() > self.max_size {
            self.commands.pop_front();
            self.current_index = self.current_index.saturating_sub(1);
        }
    }

    /// Undo the last step
    pub fn undo(&mut self, skein: &mut Skein) -> Result<(), UndoError> {
        // Finalize any pending batch first
        self.finalize_batch();

        if !self.can_undo() {
            return Err(UndoError::NothingToUndo);
        }

        let index = self.current_index - 1;
        skein.without_journal(|s| self.commands[index].revert(s))?;
        self.current_index = index;
        Ok(())
    }

    /// Redo the last undone step
    pub fn redo(&mut self, skein: &mut Skein) -> Result<(), UndoError> {
        if !self.can_redo() {
            return Err(UndoError::NothingToRedo);
        }

        let index = self.current_index;
        skein.without_journal(|s| self.commands[index].apply(s))?;
        self.current_index += 1;
        Ok(())
    }

    /// Check if undo is available
    pub fn can_undo(&self) -> bool {
        self.current_index > 0
    }

    /// Check if redo is available
    pub fn can_redo(&self) -> bool {
        self.current_index < self.commands.len()
    }

    /// Clear all undo history
    pub fn clear(&mut self) {
        self.commands.clear();
        self.current_index = 0;
        self.current_batch = None;
    }

    /// Get the number of available undo steps
    pub fn undo_count(&self) -> usize {
        self.current_index
    }

    /// Get the number of available redo steps
    pub fn redo_count(&self) -> usize {
        self.commands.len() - self.current_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(skein: &mut Skein, stack: &mut UndoStack) {
        stack.record(skein);
    }

    #[test]
    fn test_add_child_undo_redo_keeps_id() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();

        let a = skein.add_child(root, "open door").unwrap();
        recorded(&mut skein, &mut stack);
        assert!(stack.can_undo());

        stack.undo(&mut skein).unwrap();
        assert!(skein.node(a).is_none());
        assert!(skein.children_of(root).is_empty());
        assert!(stack.can_redo());

        stack.redo(&mut skein).unwrap();
        assert_eq!(skein.children_of(root), &[a]);
        assert_eq!(skein.node(a).unwrap().command(), "open door");

        // A fresh node never reuses the restored id
        let b = skein.add_child(root, "go north").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_remove_undo_restores_subtree_in_place() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();

        let a = skein.add_child(root, "a").unwrap();
        let b = skein.add_child(root, "b").unwrap();
        let c = skein.add_child(root, "c").unwrap();
        let b1 = skein.add_child(b, "b1").unwrap();
        skein.set_ideal_of(b1, Some("ideal".into()));
        recorded(&mut skein, &mut stack);

        skein.remove_from_parent(b).unwrap();
        recorded(&mut skein, &mut stack);
        assert_eq!(skein.children_of(root), &[a, c]);
        assert!(skein.node(b1).is_none());

        stack.undo(&mut skein).unwrap();
        assert_eq!(skein.children_of(root), &[a, b, c]);
        assert_eq!(skein.node(b1).unwrap().ideal(), Some("ideal"));
        assert_eq!(skein.parent_of(b1), Some(b));
    }

    #[test]
    fn test_content_edit_undo() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();
        let a = skein.add_child(root, "look").unwrap();
        recorded(&mut skein, &mut stack);

        skein.set_command_of(a, "examine me");
        skein.set_actual_of(a, Some("As good-looking as ever.".into()));
        recorded(&mut skein, &mut stack);
        assert_eq!(stack.undo_count(), 3);

        stack.undo(&mut skein).unwrap();
        assert_eq!(skein.node(a).unwrap().actual(), None);
        stack.undo(&mut skein).unwrap();
        assert_eq!(skein.node(a).unwrap().command(), "look");
    }

    #[test]
    fn test_batch_is_one_step() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();

        stack.begin_batch();
        let a = skein.add_child(root, "a").unwrap();
        skein.add_child(a, "b").unwrap();
        recorded(&mut skein, &mut stack);
        stack.finalize_batch();

        assert_eq!(stack.undo_count(), 1);
        stack.undo(&mut skein).unwrap();
        assert!(skein.children_of(root).is_empty());
        stack.redo(&mut skein).unwrap();
        assert_eq!(skein.len(), 3);
    }

    #[test]
    fn test_undo_history_errors() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::default();
        assert_eq!(stack.undo(&mut skein), Err(UndoError::NothingToUndo));
        assert_eq!(stack.redo(&mut skein), Err(UndoError::NothingToRedo));
    }

    #[test]
    fn test_new_edit_truncates_redo() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();

        skein.add_child(root, "a").unwrap();
        recorded(&mut skein, &mut stack);
        stack.undo(&mut skein).unwrap();
        assert_eq!(stack.redo_count(), 1);

        skein.add_child(root, "b").unwrap();
        recorded(&mut skein, &mut stack);
        assert_eq!(stack.redo_count(), 0);
        assert_eq!(stack.undo_count(), 1);
    }

    #[test]
    fn test_max_size_enforcement() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(3);
        let root = skein.root_item();

        for i in 0..5 {
            skein.add_child(root, &format!("cmd {}", i)).unwrap();
            recorded(&mut skein, &mut stack);
        }

        assert_eq!(stack.undo_count(), 3);
    }

    #[test]
    fn test_active_item_change_is_undoable() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();

        let a = skein.add_child(root, "a").unwrap();
        recorded(&mut skein, &mut stack);
        skein.set_active_item(Some(a)).unwrap();
        recorded(&mut skein, &mut stack);
        assert_eq!(stack.undo_count(), 2);

        stack.undo(&mut skein).unwrap();
        assert_eq!(skein.active_item(), Some(root));
        stack.undo(&mut skein).unwrap();
        assert!(skein.node(a).is_none());

        stack.redo(&mut skein).unwrap();
        stack.redo(&mut skein).unwrap();
        assert_eq!(skein.active_item(), Some(a));
    }

    #[test]
    fn test_undo_hands_interpreter_active_item_to_parent() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();

        stack.begin_batch();
        let a = skein.add_child(root, "a").unwrap();
        let b = skein.add_child(a, "b").unwrap();
        recorded(&mut skein, &mut stack);
        stack.finalize_batch();

        // The interpreter moves the active item outside the history
        skein.without_journal(|s| s.set_active_item(Some(b))).unwrap();
        assert!(skein.take_journal().is_empty());

        stack.undo(&mut skein).unwrap();
        assert!(skein.node(a).is_none());
        assert!(skein.node(b).is_none());
        assert_eq!(skein.active_item(), Some(root));
        assert!(stack.can_redo());

        stack.redo(&mut skein).unwrap();
        assert_eq!(skein.parent_of(b), Some(a));
        assert_eq!(skein.active_item(), Some(root));
    }

    #[test]
    fn test_failed_batch_undo_leaves_skein_untouched() {
        let mut skein = Skein::new();
        let mut stack = UndoStack::new(10);
        let root = skein.root_item();
        let a = skein.add_child(root, "a").unwrap();
        recorded(&mut skein, &mut stack);

        skein.set_command_of(a, "b");
        let rename = skein.take_journal().pop().unwrap();
        // Reverted last, after the rename has already been undone
        let dangling = SkeinEdit::Link { parent: root, child: NodeId(99), index: 0 };
        stack.push(SkeinEdit::Batch { edits: vec![dangling, rename] });
        let before = crate::xml::to_xml(&skein);

        assert_eq!(
            stack.undo(&mut skein),
            Err(UndoError::Skein(SkeinError::UnknownNode(NodeId(99))))
        );
        assert_eq!(skein.node(a).unwrap().command(), "b");
        assert_eq!(crate::xml::to_xml(&skein), before);
        assert_eq!(stack.undo_count(), 2);
    }

    #[test]
    fn test_failed_batch_apply_rolls_back() {
        let mut skein = Skein::new();
        let root = skein.root_item();
        let a = skein.add_child(root, "a").unwrap();
        skein.set_command_of(a, "b");
        let mut rename = skein.take_journal().pop().unwrap();
        skein.without_journal(|s| rename.revert(s)).unwrap();
        assert_eq!(skein.node(a).unwrap().command(), "a");

        let dangling = SkeinEdit::Link { parent: root, child: NodeId(99), index: 0 };
        let mut batch = SkeinEdit::Batch { edits: vec![rename, dangling] };
        assert!(skein.without_journal(|s| batch.apply(s)).is_err());
        assert_eq!(skein.node(a).unwrap().command(), "a");
        assert_eq!(skein.children_of(root), &[a]);
    }
}
