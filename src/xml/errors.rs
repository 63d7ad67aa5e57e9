//! Error types for skein documents
//!
//! Parse errors name the structural rule the document broke. Unknown or
//! missing optional content is never an error.

use thiserror::Error;

/// Error reading a skein file from disk
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read skein file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Skein parsing failed: {0}")]
    Parse(#[from] ParseError),
}

/// Fatal skein document errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// XML is malformed (not well-formed)
    #[error("Invalid XML: {0}")]
    InvalidXml(String),

    /// The document element is not `<Skein>`
    #[error("Expected a Skein document, found <{0}>")]
    UnexpectedRoot(String),

    /// `<Skein>` has no `rootNode` attribute
    #[error("Skein document has no rootNode attribute")]
    MissingRootNode,

    /// No `<item>` carries the id named by `rootNode`
    #[error("Root item '{0}' not found")]
    MissingRootItem(String),

    #[error("Item id '{0}' is used more than once")]
    DuplicateNodeId(String),

    /// A `<child>` refers to an item that does not exist
    #[error("Item '{parent}' lists unknown child '{child}'")]
    UnknownChild { parent: String, child: String },

    /// An item is listed as a child more than once
    #[error("Item '{0}' has more than one parent")]
    MultipleParents(String),

    /// Two children of one item share the same command
    #[error("Item '{parent}' has two children with command '{command}'")]
    DuplicateChild { parent: String, command: String },

    #[error("Cyclic reference through item '{0}'")]
    CyclicReference(String),

    /// An item other than the root has no parent
    #[error("Item '{0}' is a second root")]
    MultipleRoots(String),
}
