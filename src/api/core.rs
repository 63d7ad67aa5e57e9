//! WASM API for the skein
//!
//! This module provides the JavaScript-facing API: the document lives in WASM
//! memory and every call converts ids and results at the boundary.

use super::document::SkeinDocument;
use super::helpers::{deserialize, js_error, js_node_id, node_id, optional_node_id, serialize};
use super::types::{EditResult, NodeView, SkeinSummary};
use crate::layout::{LayoutConfig, MonospaceMeasure, TextMeasure};
use crate::models::{NodeId, Skein, SkeinError};
use crate::{transcript, xml};
use crate::{wasm_info, wasm_log, wasm_warn};
use lazy_static::lazy_static;
use std::sync::{Mutex, MutexGuard};
use wasm_bindgen::prelude::*;

// WASM-owned skein storage (canonical source of truth)
lazy_static! {
    static ref DOCUMENT: Mutex<Option<SkeinDocument>> = Mutex::new(None);
}

fn lock_document() -> Result<MutexGuard<'static, Option<SkeinDocument>>, JsValue> {
    DOCUMENT.lock().map_err(|e| js_error("Skein store unavailable", e))
}

/// Run `f` against the loaded document
fn with_document<T>(f: impl FnOnce(&mut SkeinDocument) -> Result<T, JsValue>) -> Result<T, JsValue> {
    let mut guard = lock_document()?;
    let doc = guard.as_mut().ok_or_else(|| {
        wasm_warn!("No skein loaded");
        JsValue::from_str("No skein loaded")
    })?;
    f(doc)
}

/// Run one journaled edit and serialize its [`EditResult`]
fn edit<T>(
    context: &str,
    f: impl FnOnce(&mut Skein) -> Result<T, SkeinError>,
    node: impl FnOnce(&T) -> Option<NodeId>,
) -> Result<JsValue, JsValue> {
    with_document(|doc| {
        let (value, mut result) = doc.edit(f).map_err(|e| js_error(context, e))?;
        result.node = node(&value);
        serialize(&result, "EditResult serialization error")
    })
}

/// Run an interpreter event and serialize the resulting notifications
fn session(
    context: &str,
    f: impl FnOnce(&mut Skein) -> Result<Option<NodeId>, SkeinError>,
) -> Result<JsValue, JsValue> {
    with_document(|doc| {
        let node = doc.session(f).map_err(|e| js_error(context, e))?;
        let result = doc.finish(node);
        serialize(&result, "EditResult serialization error")
    })
}

fn unknown_node(id: NodeId) -> JsValue {
    js_error("Content update failed", SkeinError::UnknownNode(id))
}

/// Setters report unknown ids by returning false; turn that into an error
fn set_content(context: &str, id: u32, f: impl FnOnce(&mut Skein, NodeId) -> bool) -> Result<JsValue, JsValue> {
    let id = node_id(id);
    with_document(|doc| {
        let (found, result) = doc
            .edit(|s| Ok(f(s, id)))
            .map_err(|e| js_error(context, e))?;
        if !found {
            return Err(unknown_node(id));
        }
        serialize(&result, "EditResult serialization error")
    })
}

/// Measure function supplied by the page, usually a canvas `measureText`
struct JsMeasure<'a>(&'a js_sys::Function);

impl TextMeasure for JsMeasure<'_> {
    fn measure(&self, text: &str) -> f32 {
        match self.0.call1(&JsValue::NULL, &JsValue::from_str(text)) {
            Ok(width) => width.as_f64().unwrap_or(0.0) as f32,
            Err(e) => {
                wasm_warn!("measure({:?}) failed: {:?}", text, e);
                0.0
            }
        }
    }
}

// ============================================================================
// Document lifecycle
// ============================================================================

/// Create an empty skein and make it the current document
#[wasm_bindgen(js_name = createSkein)]
pub fn create_skein() -> Result<JsValue, JsValue> {
    wasm_info!("createSkein called");

    let doc = SkeinDocument::new(Skein::new());
    let summary = SkeinSummary::of(doc.skein());
    *lock_document()? = Some(doc);

    serialize(&summary, "Summary serialization error")
}

/// Parse a skein document and make it the current document
#[wasm_bindgen(js_name = loadSkeinXml)]
pub fn load_skein_xml(xml_text: &str) -> Result<JsValue, JsValue> {
    wasm_info!("loadSkeinXml called ({} bytes)", xml_text.len());

    let skein = xml::from_xml(xml_text).map_err(|e| js_error("Skein parsing failed", e))?;
    let doc = SkeinDocument::new(skein);
    let summary = SkeinSummary::of(doc.skein());
    *lock_document()? = Some(doc);

    wasm_info!("loadSkeinXml completed: {} items", summary.item_count);
    serialize(&summary, "Summary serialization error")
}

/// Serialize the current document; clears the unsaved-changes flag
#[wasm_bindgen(js_name = saveSkeinXml)]
pub fn save_skein_xml() -> Result<String, JsValue> {
    wasm_info!("saveSkeinXml called");
    with_document(|doc| Ok(doc.save()))
}

// ============================================================================
// Structure edits
// ============================================================================

#[wasm_bindgen(js_name = addChild)]
pub fn add_child(parent: u32, command: &str) -> Result<JsValue, JsValue> {
    wasm_log!("addChild({}, {:?})", parent, command);
    edit("addChild failed", |s| s.add_child(node_id(parent), command), |id| Some(*id))
}

/// Delete a node together with everything below it
#[wasm_bindgen(js_name = removeNode)]
pub fn remove_node(id: u32) -> Result<JsValue, JsValue> {
    wasm_log!("removeNode({})", id);
    edit("removeNode failed", |s| s.remove_from_parent(node_id(id)), |_| None)
}

/// Move a node (and its subtree) to the end of another node's children
#[wasm_bindgen(js_name = moveNode)]
pub fn move_node(id: u32, new_parent: u32) -> Result<JsValue, JsValue> {
    wasm_log!("moveNode({} -> {})", id, new_parent);
    edit(
        "moveNode failed",
        |s| s.set_parent_of(node_id(id), node_id(new_parent)),
        |_| Some(node_id(id)),
    )
}

// ============================================================================
// Content edits
// ============================================================================

#[wasm_bindgen(js_name = setCommand)]
pub fn set_command(id: u32, command: &str) -> Result<JsValue, JsValue> {
    set_content("setCommand failed", id, |s, id| s.set_command_of(id, command))
}

#[wasm_bindgen(js_name = setIdeal)]
pub fn set_ideal(id: u32, ideal: Option<String>) -> Result<JsValue, JsValue> {
    set_content("setIdeal failed", id, |s, id| s.set_ideal_of(id, ideal))
}

#[wasm_bindgen(js_name = setActual)]
pub fn set_actual(id: u32, actual: Option<String>) -> Result<JsValue, JsValue> {
    set_content("setActual failed", id, |s, id| s.set_actual_of(id, actual))
}

#[wasm_bindgen(js_name = setAnnotation)]
pub fn set_annotation(id: u32, annotation: Option<String>) -> Result<JsValue, JsValue> {
    set_content("setAnnotation failed", id, |s, id| s.set_annotation_of(id, annotation))
}

#[wasm_bindgen(js_name = setCommentary)]
pub fn set_commentary(id: u32, commentary: Option<String>) -> Result<JsValue, JsValue> {
    set_content("setCommentary failed", id, |s, id| s.set_commentary_of(id, commentary))
}

#[wasm_bindgen(js_name = setActiveItem)]
pub fn set_active_item(id: Option<u32>) -> Result<JsValue, JsValue> {
    let id = optional_node_id(id);
    edit("setActiveItem failed", |s| s.set_active_item(id), |_| id)
}

#[wasm_bindgen(js_name = setWinningItem)]
pub fn set_winning_item(id: Option<u32>) -> Result<JsValue, JsValue> {
    let id = optional_node_id(id);
    edit("setWinningItem failed", |s| s.set_winning_item(id), |_| id)
}

/// Highlight the line through `id` (defaults to the active item)
#[wasm_bindgen(js_name = selectItem)]
pub fn select_item(id: Option<u32>) -> Result<JsValue, JsValue> {
    let id = optional_node_id(id);
    with_document(|doc| {
        doc.select(id).map_err(|e| js_error("selectItem failed", e))?;
        serialize(&doc.finish(id), "EditResult serialization error")
    })
}

// ============================================================================
// Interpreter events
// ============================================================================

#[wasm_bindgen(js_name = commandEntered)]
pub fn command_entered(text: &str) -> Result<JsValue, JsValue> {
    session("commandEntered failed", |s| s.on_command_entered(text).map(Some))
}

#[wasm_bindgen(js_name = outputProduced)]
pub fn output_produced(text: &str) -> Result<JsValue, JsValue> {
    session("outputProduced failed", |s| {
        s.on_output_produced(text);
        Ok(s.active_item())
    })
}

#[wasm_bindgen(js_name = waitingForInput)]
pub fn waiting_for_input() -> Result<JsValue, JsValue> {
    session("waitingForInput failed", |s| {
        s.on_waiting_for_input();
        Ok(s.active_item())
    })
}

#[wasm_bindgen(js_name = sessionRestarted)]
pub fn session_restarted() -> Result<JsValue, JsValue> {
    wasm_info!("sessionRestarted called");
    session("sessionRestarted failed", |s| {
        s.on_session_restarted();
        Ok(s.active_item())
    })
}

#[wasm_bindgen(js_name = sessionStopped)]
pub fn session_stopped() -> Result<JsValue, JsValue> {
    wasm_info!("sessionStopped called");
    session("sessionStopped failed", |s| {
        s.on_session_stopped();
        Ok(None)
    })
}

// ============================================================================
// Undo
// ============================================================================

/// Undo the last edit operation
#[wasm_bindgen(js_name = undo)]
pub fn undo() -> Result<JsValue, JsValue> {
    wasm_info!("undo called");
    with_document(|doc| {
        let result: EditResult = doc.undo().map_err(|e| js_error("Undo failed", e))?;
        serialize(&result, "EditResult serialization error")
    })
}

#[wasm_bindgen(js_name = redo)]
pub fn redo() -> Result<JsValue, JsValue> {
    wasm_info!("redo called");
    with_document(|doc| {
        let result = doc.redo().map_err(|e| js_error("Redo failed", e))?;
        serialize(&result, "EditResult serialization error")
    })
}

// ============================================================================
// Layout and queries
// ============================================================================

/// Lay the skein out and return the positioned nodes
///
/// # Parameters
/// - `measure`: `(text) => width`; fixed-width estimates are used when absent
/// - `config`: partial `LayoutConfig`; the previous configuration is kept when absent
#[wasm_bindgen(js_name = layoutSkein)]
pub fn layout_skein(measure: Option<js_sys::Function>, config: JsValue) -> Result<JsValue, JsValue> {
    let config: Option<LayoutConfig> = if config.is_undefined() || config.is_null() {
        None
    } else {
        Some(deserialize(config, "LayoutConfig deserialization error")?)
    };

    with_document(|doc| {
        let layout = match measure {
            Some(ref f) => doc.layout_with(config, &JsMeasure(f)),
            None => doc.layout_with(config, &MonospaceMeasure::default()),
        };
        serialize(layout, "Layout serialization error")
    })
}

/// The last layout as pretty JSON, for debugging panels
#[wasm_bindgen(js_name = getLayoutJson)]
pub fn get_layout_json() -> Result<String, JsValue> {
    with_document(|doc| {
        let layout = doc
            .layout()
            .ok_or_else(|| JsValue::from_str("Skein has not been laid out"))?;
        serde_json::to_string_pretty(layout).map_err(|e| js_error("Layout serialization error", e))
    })
}

/// Node under a view-space point of the last layout
#[wasm_bindgen(js_name = itemAtPosition)]
pub fn item_at_position(x: f32, y: f32) -> Result<Option<u32>, JsValue> {
    with_document(|doc| {
        let layout = doc
            .layout()
            .ok_or_else(|| JsValue::from_str("Skein has not been laid out"))?;
        layout.item_at_position(x, y).map(js_node_id).transpose()
    })
}

/// Levels that intersect `min_y..=max_y`, as `[start, end)`
#[wasm_bindgen(js_name = rangeOfLevels)]
pub fn range_of_levels(min_y: f32, max_y: f32) -> Result<Vec<u32>, JsValue> {
    with_document(|doc| {
        let layout = doc
            .layout()
            .ok_or_else(|| JsValue::from_str("Skein has not been laid out"))?;
        let range = layout.range_of_levels_between(min_y, max_y);
        Ok(vec![range.start as u32, range.end as u32])
    })
}

#[wasm_bindgen(js_name = getNode)]
pub fn get_node(id: u32) -> Result<JsValue, JsValue> {
    let id = node_id(id);
    with_document(|doc| {
        let view = NodeView::of(doc.skein(), id).ok_or_else(|| unknown_node(id))?;
        serialize(&view, "Node serialization error")
    })
}

/// Transcript from the start to `id` (defaults to the winning, then active, item)
#[wasm_bindgen(js_name = transcriptToPoint)]
pub fn transcript_to_point(id: Option<u32>) -> Result<String, JsValue> {
    let id = optional_node_id(id);
    with_document(|doc| {
        if let Some(id) = id {
            if !doc.skein().is_attached(id) {
                return Err(unknown_node(id));
            }
        }
        Ok(transcript::transcript_to_point(doc.skein(), id))
    })
}

/// Commands to replay from the start to reach `id`, one per line
#[wasm_bindgen(js_name = recordingToPoint)]
pub fn recording_to_point(id: Option<u32>) -> Result<String, JsValue> {
    let id = optional_node_id(id);
    with_document(|doc| {
        if let Some(id) = id {
            if !doc.skein().is_attached(id) {
                return Err(unknown_node(id));
            }
        }
        Ok(transcript::recording_to_point(doc.skein(), id))
    })
}
