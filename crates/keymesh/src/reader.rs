//! Keyfile reader: source access and multi-file accumulation.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::info;

use crate::error::{KeyfileError, Result};
use crate::mesh::Document;
use crate::options::ParseOptions;
use crate::parser::{parse_reader, ParseSummary};

/// Read one keyfile from a path into `doc`.
///
/// # Arguments
///
/// * `path` - Path to the keyfile; must be a regular file
/// * `doc` - Document the file's nodes, elements and parts are added to
/// * `options` - Parser behavior
///
/// # Returns
///
/// What the file contributed. On error `doc` is left as it was.
pub fn read_keyfile(
    path: impl AsRef<Path>,
    doc: &mut Document,
    options: &ParseOptions,
) -> Result<ParseSummary> {
    let path = path.as_ref();
    let meta = std::fs::metadata(path).map_err(|e| KeyfileError::source_access(path, e.to_string()))?;
    if !meta.is_file() {
        return Err(KeyfileError::source_access(path, "not a regular file"));
    }
    let file = File::open(path).map_err(|e| KeyfileError::source_access(path, e.to_string()))?;

    info!(path = %path.display(), "reading keyfile");
    let summary = parse_reader(BufReader::new(file), doc, options)?;
    info!(
        path = %path.display(),
        nodes = summary.nodes,
        elements = summary.elements,
        parts = summary.parts,
        tokens = summary.tokens,
        lines = summary.lines,
        "keyfile read"
    );
    Ok(summary)
}

/// Read several keyfiles, in order, into one fresh document.
///
/// Ids share one namespace across all files. The first failing file aborts
/// the whole run and no document is returned.
pub fn read_keyfiles<P: AsRef<Path>>(
    paths: impl IntoIterator<Item = P>,
    options: &ParseOptions,
) -> Result<Document> {
    let mut doc = Document::new();
    for path in paths {
        read_keyfile(path, &mut doc, options)?;
    }
    Ok(doc)
}
