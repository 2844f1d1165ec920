#![warn(missing_docs)]

//! Mesh extraction from LS-DYNA style keyfiles.
//!
//! Reads the `*NODE`, `*ELEMENT_SOLID|SHELL|BEAM` and `*PART|PART_INERTIA`
//! blocks of one or more keyfiles into a [`Document`], isolates single parts
//! and compacts their ids to dense ranges.
//!
//! # Example
//!
//! ```no_run
//! use keymesh::{extract_part, read_keyfiles, renumber, writer, ParseOptions};
//!
//! let doc = read_keyfiles(["model.k"], &ParseOptions::default()).unwrap();
//! let part_ids = doc.part_ids();
//! for (part_id, label) in part_ids.iter().zip(writer::part_labels(&doc, &part_ids)) {
//!     let part = renumber(&extract_part(&doc, *part_id).unwrap()).unwrap();
//!     writer::write_part(&part, "model", &label).unwrap();
//! }
//! ```

mod error;
mod extract;
pub mod lexer;
mod mesh;
mod options;
pub mod parser;
mod reader;
mod renumber;
pub mod writer;

pub use error::{IdKind, KeyfileError, Result};
pub use extract::{extract_all, extract_part};
pub use lexer::{Lexer, Token};
pub use mesh::{
    Document, Element, ElementId, MeshStats, Node, NodeId, PartId, PartStats, ABSENT_NODE,
    NODES_PER_ELEMENT,
};
pub use options::{DuplicateNodePolicy, ParseMode, ParseOptions};
pub use parser::{parse_reader, parse_str, ParseSummary};
pub use reader::{read_keyfile, read_keyfiles};
pub use renumber::{node_remap, renumber};
