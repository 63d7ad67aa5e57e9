//! Skein layout engine
//!
//! This module positions every skein node for display. Widths are measured
//! through [`TextMeasure`], then the tree is packed loose or tight and the
//! result can be queried in view space.

pub mod config;
pub mod query;
mod tight;
pub mod tree;

pub use config::{LayoutConfig, MonospaceMeasure, PackingStyle, TextMeasure};
pub use query::{Rect, Size};
pub use tree::{LayoutNode, SkeinLayout};
