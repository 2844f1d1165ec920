//! Tab-separated output of a single-part document.
//!
//! Two files are produced per part:
//!
//! - `<base>-<part>-nodes.txt`: `id x y z`
//! - `<base>-<part>-elements.txt`: `id n1 .. n8`
//!
//! Fields are separated by tabs, one record per line. Coordinates use the
//! shortest representation that reads back to the same `f64`.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{KeyfileError, Result};
use crate::mesh::{Document, PartId};

/// Write the node table.
pub fn write_nodes(doc: &Document, mut writer: impl Write) -> Result<()> {
    for node in doc.nodes() {
        let [x, y, z] = node.coords;
        writeln!(writer, "{}\t{x}\t{y}\t{z}", node.id)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the element table.
pub fn write_elements(doc: &Document, mut writer: impl Write) -> Result<()> {
    for element in doc.elements() {
        write!(writer, "{}", element.id)?;
        for node in element.nodes {
            write!(writer, "\t{node}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// The part id shared by every element, or `None` when there are no elements.
pub fn single_part(doc: &Document) -> Result<Option<PartId>> {
    let mut elements = doc.elements().iter();
    let Some(first) = elements.next() else {
        return Ok(None);
    };
    match elements.find(|e| e.part_id != first.part_id) {
        Some(other) => Err(KeyfileError::MixedParts {
            expected: first.part_id,
            found: other.part_id,
        }),
        None => Ok(Some(first.part_id)),
    }
}

/// File-name label for a part: its trimmed display name, or the numeric id
/// when no usable name exists.
pub fn part_label(id: PartId, name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.replace(['/', '\\'], "_"),
        _ => id.to_string(),
    }
}

/// Labels for several parts of `doc`, one per entry of `part_ids`, no two alike.
///
/// Parts sharing a display name get their id appended (`Shell-1`, `Shell-2`)
/// so every part keeps its own pair of output files.
pub fn part_labels(doc: &Document, part_ids: &[PartId]) -> Vec<String> {
    let base: Vec<String> = part_ids
        .iter()
        .map(|&id| part_label(id, doc.part_name(id)))
        .collect();

    let mut uses: HashMap<&str, usize> = HashMap::new();
    for label in &base {
        *uses.entry(label.as_str()).or_default() += 1;
    }

    let mut taken = HashSet::new();
    part_ids
        .iter()
        .zip(&base)
        .map(|(&id, label)| {
            let mut label = if uses[label.as_str()] > 1 {
                format!("{label}-{id}")
            } else {
                label.clone()
            };
            // A suffixed label can still meet another part's own name
            while taken.contains(&label) {
                label = format!("{label}-{id}");
            }
            taken.insert(label.clone());
            label
        })
        .collect()
}

/// Paths of the node and element files for one part.
pub fn output_paths(base: impl AsRef<Path>, label: &str) -> (PathBuf, PathBuf) {
    let base = base.as_ref();
    let stem = base
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let with_suffix = |suffix: &str| base.with_file_name(format!("{stem}-{label}-{suffix}.txt"));
    (with_suffix("nodes"), with_suffix("elements"))
}

/// Write both files for a single-part document.
pub fn write_part(doc: &Document, base: impl AsRef<Path>, label: &str) -> Result<(PathBuf, PathBuf)> {
    single_part(doc)?;
    let (nodes_path, elements_path) = output_paths(base, label);
    write_nodes(doc, BufWriter::new(File::create(&nodes_path)?))?;
    write_elements(doc, BufWriter::new(File::create(&elements_path)?))?;
    Ok((nodes_path, elements_path))
}
