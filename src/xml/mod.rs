//! Skein documents on disk
//!
//! The format is the `<Skein>` XML shared with earlier IDE releases: one
//! `<item>` per node, children listed by id, flags written as `YES`/`NO`.
//! Reading uses roxmltree, writing escapes through quick-xml.

pub mod errors;
pub mod parser;
pub mod writer;

pub use errors::{LoadError, ParseError};
pub use parser::from_xml;
pub use writer::{escape_text, to_xml};

use crate::models::Skein;
use std::fs;
use std::path::Path;

/// Namespace of the `<Skein>` document element
pub const SKEIN_NAMESPACE: &str = "http://www.logicalshift.org.uk/IF/Skein";

/// Written to `<generator>` in every saved document
pub const GENERATOR: &str = concat!("skein-wasm ", env!("CARGO_PKG_VERSION"));

/// Write the skein to `path`, replacing any existing file
pub fn save_file(skein: &Skein, path: &Path) -> std::io::Result<()> {
    fs::write(path, to_xml(skein))?;
    log::info!("💾 Saved skein ({} items) to {}", skein.len(), path.display());
    Ok(())
}

/// Read a skein file from `path`
pub fn load_file(path: &Path) -> Result<Skein, LoadError> {
    let content = fs::read_to_string(path)?;
    let skein = from_xml(&content)?;
    log::info!("📂 Loaded skein ({} items) from {}", skein.len(), path.display());
    Ok(skein)
}
