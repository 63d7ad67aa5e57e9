//! Models module for the skein engine
//!
//! This module contains the skein tree, its nodes, and the operations the
//! editor and the running interpreter perform on them.

pub mod errors;
pub mod events;
pub mod node;
pub mod session;
pub mod skein;
pub mod test_items;

// Re-export commonly used types
pub use errors::SkeinError;
pub use events::{ChangeHints, EventLog, SkeinEvent, SkeinListener};
pub use node::{IdAllocator, NodeId, SkeinNode, START_LABEL};
pub use session::{prompt_of, strip_prompt};
pub use skein::Skein;
pub use test_items::{is_test_command, split_sections, Section};
