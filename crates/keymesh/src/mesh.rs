//! In-memory mesh model: nodes, elements, part names and their indices.
//!
//! A [`Document`] keeps nodes and elements in insertion order and maintains
//! id→position maps alongside. Node id `0` is the "unused slot" sentinel of
//! element connectivity and is never stored as a node.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{IdKind, KeyfileError, Result};

/// Identifier of a node.
pub type NodeId = u64;

/// Identifier of an element.
pub type ElementId = u64;

/// Identifier of a part.
pub type PartId = u64;

/// Number of connectivity slots in every element.
pub const NODES_PER_ELEMENT: usize = 8;

/// Connectivity value meaning "slot unused".
pub const ABSENT_NODE: NodeId = 0;

/// A mesh node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node id (never [`ABSENT_NODE`]).
    pub id: NodeId,
    /// X, Y, Z coordinates.
    pub coords: [f64; 3],
}

impl Node {
    /// Create a new node.
    pub fn new(id: NodeId, x: f64, y: f64, z: f64) -> Self {
        Self {
            id,
            coords: [x, y, z],
        }
    }
}

/// A mesh element with fixed-width connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Element id.
    pub id: ElementId,
    /// Owning part.
    pub part_id: PartId,
    /// Node ids, [`ABSENT_NODE`] for unused slots.
    pub nodes: [NodeId; NODES_PER_ELEMENT],
}

impl Element {
    /// Create a new element.
    pub fn new(id: ElementId, part_id: PartId, nodes: [NodeId; NODES_PER_ELEMENT]) -> Self {
        Self { id, part_id, nodes }
    }

    /// Nonzero connectivity entries, in slot order.
    pub fn used_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().copied().filter(|&n| n != ABSENT_NODE)
    }
}

/// The structured mesh extracted from one or more keyfiles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
    node_index: HashMap<NodeId, usize>,
    elements: Vec<Element>,
    element_index: HashMap<ElementId, usize>,
    part_names: BTreeMap<PartId, String>,
    part_elements: BTreeMap<PartId, Vec<usize>>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All elements in insertion order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    /// Look up an element by id.
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        self.element_index.get(&id).map(|&i| &self.elements[i])
    }

    /// Whether a node with this id exists.
    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    /// Whether an element with this id exists.
    pub fn contains_element(&self, id: ElementId) -> bool {
        self.element_index.contains_key(&id)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// True when the document holds no nodes, elements or part names.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.elements.is_empty() && self.part_names.is_empty()
    }

    /// Display name of a part, if one was registered.
    pub fn part_name(&self, id: PartId) -> Option<&str> {
        self.part_names.get(&id).map(String::as_str)
    }

    /// Registered part names, ordered by part id.
    pub fn part_names(&self) -> impl Iterator<Item = (PartId, &str)> {
        self.part_names.iter().map(|(&id, name)| (id, name.as_str()))
    }

    /// Every part id that owns an element or has a name, ascending.
    pub fn part_ids(&self) -> Vec<PartId> {
        let ids: BTreeSet<PartId> = self
            .part_elements
            .keys()
            .chain(self.part_names.keys())
            .copied()
            .collect();
        ids.into_iter().collect()
    }

    /// Elements owned by `part_id`, in insertion order.
    pub fn elements_of_part(&self, part_id: PartId) -> impl Iterator<Item = &Element> {
        self.part_elements
            .get(&part_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(|&i| &self.elements[i])
    }

    /// Append a node. Fails if the id is already present or is the sentinel.
    pub fn insert_node(&mut self, node: Node) -> Result<()> {
        if node.id == ABSENT_NODE || self.contains_node(node.id) {
            return Err(KeyfileError::duplicate(IdKind::Node, node.id, None));
        }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Append an element. Fails if the id is already present.
    pub fn insert_element(&mut self, element: Element) -> Result<()> {
        if self.contains_element(element.id) {
            return Err(KeyfileError::duplicate(IdKind::Element, element.id, None));
        }
        let pos = self.elements.len();
        self.element_index.insert(element.id, pos);
        self.part_elements
            .entry(element.part_id)
            .or_default()
            .push(pos);
        self.elements.push(element);
        Ok(())
    }

    /// Register a display name for a part, returning the name it replaces.
    pub fn set_part_name(&mut self, id: PartId, name: impl Into<String>) -> Option<String> {
        self.part_names.insert(id, name.into())
    }

    /// Move everything from `other` into `self`.
    ///
    /// All ids in `other` must be new to `self`; on a clash nothing is moved.
    pub fn merge(&mut self, other: Document) -> Result<()> {
        if let Some(node) = other.nodes.iter().find(|n| self.contains_node(n.id)) {
            return Err(KeyfileError::duplicate(IdKind::Node, node.id, None));
        }
        if let Some(el) = other.elements.iter().find(|e| self.contains_element(e.id)) {
            return Err(KeyfileError::duplicate(IdKind::Element, el.id, None));
        }
        for node in other.nodes {
            self.insert_node(node)?;
        }
        for element in other.elements {
            self.insert_element(element)?;
        }
        self.part_names.extend(other.part_names);
        Ok(())
    }

    /// Find the first element slot that points at a node not in the table.
    pub fn check_references(&self) -> Result<()> {
        for element in &self.elements {
            if let Some(node) = element.used_nodes().find(|&n| !self.contains_node(n)) {
                return Err(KeyfileError::MissingNode {
                    element: element.id,
                    node,
                });
            }
        }
        Ok(())
    }

    /// Summary counts for reporting.
    pub fn stats(&self) -> MeshStats {
        let parts = self
            .part_ids()
            .into_iter()
            .map(|id| {
                let mut nodes = BTreeSet::new();
                let mut elements = 0;
                for element in self.elements_of_part(id) {
                    elements += 1;
                    nodes.extend(element.used_nodes());
                }
                PartStats {
                    id,
                    name: self.part_name(id).map(str::to_string),
                    elements,
                    nodes: nodes.len(),
                }
            })
            .collect();
        MeshStats {
            nodes: self.node_count(),
            elements: self.element_count(),
            parts,
        }
    }
}

/// Per-part counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartStats {
    /// Part id.
    pub id: PartId,
    /// Registered display name.
    pub name: Option<String>,
    /// Elements owned by the part.
    pub elements: usize,
    /// Distinct nodes referenced by those elements.
    pub nodes: usize,
}

/// Document-wide counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshStats {
    /// Total nodes.
    pub nodes: usize,
    /// Total elements.
    pub elements: usize,
    /// One entry per part id.
    pub parts: Vec<PartStats>,
}

impl MeshStats {
    /// Serialize to a pretty JSON string.
    pub fn to_json(&self) -> std::result::Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
