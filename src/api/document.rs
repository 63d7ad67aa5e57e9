//! Document held by the WASM module
//!
//! Bundles the skein with its undo history, the event queue the view drains
//! after every call, and the last computed layout. Everything here is plain
//! Rust so it can be tested without a JS host; `core` only converts.

use super::types::{EditResult, EventView};
use crate::layout::{LayoutConfig, SkeinLayout, TextMeasure};
use crate::models::{EventLog, NodeId, Skein, SkeinError};
use crate::undo::{UndoError, UndoStack};

/// Undo steps kept per document
pub const UNDO_LIMIT: usize = 100;

pub struct SkeinDocument {
    skein: Skein,
    undo: UndoStack,
    events: EventLog,
    layout: Option<SkeinLayout>,
    config: LayoutConfig,
    selected: Option<NodeId>,
}

impl SkeinDocument {
    pub fn new(mut skein: Skein) -> Self {
        let events = EventLog::new();
        skein.add_listener(Box::new(events.clone()));
        skein.take_journal();

        Self {
            skein,
            undo: UndoStack::new(UNDO_LIMIT),
            events,
            layout: None,
            config: LayoutConfig::default(),
            selected: None,
        }
    }

    pub fn skein(&self) -> &Skein {
        &self.skein
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn layout(&self) -> Option<&SkeinLayout> {
        self.layout.as_ref()
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Run one user edit as a single undo step and report what happened
    pub fn edit<T>(
        &mut self,
        f: impl FnOnce(&mut Skein) -> Result<T, SkeinError>,
    ) -> Result<(T, EditResult), SkeinError> {
        self.undo.begin_batch();
        let outcome = f(&mut self.skein);
        self.undo.record(&mut self.skein);
        self.undo.finalize_batch();

        let value = outcome?;
        Ok((value, self.finish(None)))
    }

    /// Run an interpreter event; these never enter the undo history
    pub fn session<T>(&mut self, f: impl FnOnce(&mut Skein) -> T) -> T {
        f(&mut self.skein)
    }

    pub fn undo(&mut self) -> Result<EditResult, UndoError> {
        self.undo.undo(&mut self.skein)?;
        Ok(self.finish(None))
    }

    pub fn redo(&mut self) -> Result<EditResult, UndoError> {
        self.undo.redo(&mut self.skein)?;
        Ok(self.finish(None))
    }

    /// Choose the node whose line is highlighted by the layout
    pub fn select(&mut self, item: Option<NodeId>) -> Result<(), SkeinError> {
        if let Some(id) = item {
            if !self.skein.is_attached(id) {
                return Err(SkeinError::UnknownNode(id));
            }
        }
        if self.selected != item {
            self.selected = item;
            self.skein.set_layout_dirty();
        }
        Ok(())
    }

    /// Collect queued events and flags after a call
    pub fn finish(&mut self, node: Option<NodeId>) -> EditResult {
        if let Some(selected) = self.selected {
            if !self.skein.is_attached(selected) {
                self.selected = None;
                self.skein.set_layout_dirty();
            }
        }

        let events = self
            .events
            .take()
            .into_iter()
            .map(|(event, hints)| EventView { event, hints })
            .collect();

        EditResult {
            node,
            events,
            can_undo: self.undo.can_undo(),
            can_redo: self.undo.can_redo(),
            layout_dirty: self.skein.is_layout_dirty() || self.layout.is_none(),
            skein_changed: self.skein.skein_changed(),
        }
    }

    /// Lay the skein out, reusing the previous layout when nothing changed
    pub fn layout_with(&mut self, config: Option<LayoutConfig>, measure: &dyn TextMeasure) -> &SkeinLayout {
        if let Some(config) = config {
            if config != self.config {
                self.config = config;
                self.layout = None;
            }
        }

        if self.skein.is_layout_dirty() {
            self.layout = None;
            self.skein.clear_layout_dirty();
        }

        let (skein, selected, config) = (&self.skein, self.selected, &self.config);
        self.layout
            .get_or_insert_with(|| SkeinLayout::compute(skein, selected, config, measure))
    }

    /// Mark the document saved and return the XML
    pub fn save(&mut self) -> String {
        let xml = crate::xml::to_xml(&self.skein);
        self.skein.take_skein_changed();
        xml
    }
}
