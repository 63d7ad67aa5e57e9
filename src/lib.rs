//! Skein WASM Module
//!
//! Core of the skein view in the interactive fiction IDE: the tree of
//! commands a story has been played through, the ideal/actual transcript
//! diff shown on each node, and the tree layout the view draws.

pub mod diff;
pub mod layout;
pub mod models;
pub mod transcript;
pub mod undo;
pub mod xml;
pub mod api;

// Re-export commonly used types
pub use layout::{LayoutConfig, PackingStyle, SkeinLayout, TextMeasure};
pub use models::{NodeId, Skein, SkeinError, SkeinEvent, SkeinListener, SkeinNode};
pub use undo::{SkeinEdit, UndoStack};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();

    #[cfg(feature = "console_log")]
    {
        if let Err(e) = console_log::init_with_level(log::Level::Debug) {
            wasm_warn!("Logger already initialized: {}", e);
        }
    }

    log::info!("Skein WASM module initialized");
}
