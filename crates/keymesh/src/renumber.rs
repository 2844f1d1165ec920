//! Dense renumbering of node and element ids.

use std::collections::HashMap;

use crate::error::{KeyfileError, Result};
use crate::mesh::{Document, Element, ElementId, Node, NodeId, ABSENT_NODE};

/// Map from original node id to its dense replacement.
///
/// Nodes are numbered `1..=N` in document order; `0` always maps to `0`.
pub fn node_remap(doc: &Document) -> HashMap<NodeId, NodeId> {
    let mut remap = HashMap::with_capacity(doc.node_count() + 1);
    remap.insert(ABSENT_NODE, ABSENT_NODE);
    for (new_id, node) in (1..).zip(doc.nodes()) {
        remap.insert(node.id, new_id);
    }
    remap
}

/// Produce a copy of `doc` whose node ids are `1..=N` and element ids are
/// `1..=M`, both in original order.
///
/// Connectivity is rewritten through [`node_remap`]; part ids and part names
/// are carried over unchanged.
pub fn renumber(doc: &Document) -> Result<Document> {
    let remap = node_remap(doc);
    let mut out = Document::new();

    for (new_id, node) in (1..).zip(doc.nodes()) {
        out.insert_node(Node {
            id: new_id,
            coords: node.coords,
        })?;
    }

    for (new_id, element) in (1..).zip(doc.elements()) {
        let new_id: ElementId = new_id;
        let mut nodes = element.nodes;
        for slot in nodes.iter_mut() {
            let old = *slot;
            *slot = remap.get(&old).copied().ok_or(KeyfileError::MissingNode {
                element: element.id,
                node: old,
            })?;
        }
        out.insert_element(Element::new(new_id, element.part_id, nodes))?;
    }

    for (id, name) in doc.part_names() {
        out.set_part_name(id, name);
    }

    Ok(out)
}
