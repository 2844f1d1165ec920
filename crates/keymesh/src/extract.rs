//! Part extraction: the closed subgraph of one part.

use crate::error::{KeyfileError, Result};
use crate::mesh::{Document, PartId};

/// Copy the elements of `part_id` and every node they reference into a new
/// document.
///
/// Elements keep their relative order. Nodes appear in order of first
/// reference; the sentinel `0` is never copied. The part's name is carried
/// over when one is registered.
pub fn extract_part(doc: &Document, part_id: PartId) -> Result<Document> {
    let mut out = Document::new();

    for element in doc.elements_of_part(part_id) {
        for node_id in element.used_nodes() {
            if out.contains_node(node_id) {
                continue;
            }
            let node = doc.node(node_id).ok_or(KeyfileError::MissingNode {
                element: element.id,
                node: node_id,
            })?;
            out.insert_node(*node)?;
        }
        out.insert_element(*element)?;
    }

    if let Some(name) = doc.part_name(part_id) {
        out.set_part_name(part_id, name);
    }

    Ok(out)
}

/// Extract every part of `doc`, in ascending part id order.
pub fn extract_all(doc: &Document) -> Result<Vec<(PartId, Document)>> {
    doc.part_ids()
        .into_iter()
        .map(|id| extract_part(doc, id).map(|part| (id, part)))
        .collect()
}
