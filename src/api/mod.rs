//! Skein WASM API
//!
//! This module provides the JavaScript-facing API for the skein view and the
//! story runner.
//!
//! # Module Structure
//!
//! - `helpers`: Console logging, serde conversion and id conversion at the boundary
//! - `types`: Result and view structs handed to JavaScript
//! - `document`: The stored document (skein, undo history, layout cache)
//! - `core`: The `#[wasm_bindgen]` functions

pub mod helpers;
pub mod types;
pub mod document;
pub mod core;

pub use core::*;
pub use document::SkeinDocument;
pub use types::{EditResult, EventView, NodeView, SkeinSummary};
