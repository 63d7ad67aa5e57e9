//! Transcript differ
//!
//! - `myers`: generic shortest edit script
//! - `transcript`: character-level ideal/actual comparison with whitespace
//!   classification

pub mod myers;
pub mod transcript;

pub use transcript::{compare, diff, Comparison, DiffEdit, DiffResult, EditKind};
