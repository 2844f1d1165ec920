//! Error types for keyfile reading, mesh transforms and output.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::mesh::{ElementId, NodeId, PartId};

/// Which id namespace a duplicate was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdKind {
    /// Node table.
    Node,
    /// Element table.
    Element,
}

impl fmt::Display for IdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdKind::Node => f.write_str("node"),
            IdKind::Element => f.write_str("element"),
        }
    }
}

/// Errors that can occur while reading keyfiles or transforming meshes.
#[derive(Error, Debug)]
pub enum KeyfileError {
    /// I/O error while streaming an already opened source, or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input cannot be opened or is not a plain file.
    #[error("cannot read {}: {reason}", path.display())]
    SourceAccess {
        /// Path that was requested.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// A required token inside a `NODE` or `ELEMENT_*` record is missing or
    /// of the wrong kind.
    #[error("syntax error at line {line}: {message}")]
    Syntax {
        /// Line number (1-indexed).
        line: usize,
        /// Expected-vs-found description.
        message: String,
    },

    /// An id was used twice in the accumulated document.
    #[error("duplicate {kind} id {id}{}", line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    DuplicateId {
        /// Node or element.
        kind: IdKind,
        /// The repeated id.
        id: u64,
        /// Line of the second occurrence, if it came from a parse.
        line: Option<usize>,
    },

    /// An element references a node that is not in the node table.
    #[error("element {element} references missing node {node}")]
    MissingNode {
        /// Element holding the dangling slot.
        element: ElementId,
        /// The absent node id.
        node: NodeId,
    },

    /// A document handed to the writer holds elements of more than one part.
    #[error("expected elements of part {expected} only, found part {found}")]
    MixedParts {
        /// Part id of the first element.
        expected: PartId,
        /// Part id of the first element that differs.
        found: PartId,
    },

    /// Options file could not be deserialized.
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl KeyfileError {
    /// Create a syntax error.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Create a source access error.
    pub fn source_access(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::SourceAccess {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate id error.
    pub fn duplicate(kind: IdKind, id: u64, line: Option<usize>) -> Self {
        Self::DuplicateId { kind, id, line }
    }

    /// Line number carried by the error, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            Self::Syntax { line, .. } => Some(*line),
            Self::DuplicateId { line, .. } => *line,
            _ => None,
        }
    }
}

/// Result type for keyfile operations.
pub type Result<T> = std::result::Result<T, KeyfileError>;
