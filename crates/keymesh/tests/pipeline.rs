//! End-to-end: keyfile text to renumbered per-part documents.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use approx::assert_relative_eq;
use keymesh::{
    extract_all, extract_part, parse_str, read_keyfiles, renumber, writer, Document, IdKind,
    KeyfileError, NodeId, ParseOptions, ABSENT_NODE,
};

const PLATE: &str = "*NODE
1,0.0,0.0,0.0
2,1.0,0.0,0.0
*ELEMENT_SHELL
10,5,1,2,0,0,0,0,0,0
*PART
Plate
5
";

const ASSEMBLY: &str = "$ two parts sharing an edge
*KEYWORD
*NODE
     101     0.0     0.0     0.0
     102     1.0     0.0     0.0
     103     1.0     1.0     0.0
     104     0.0     1.0     0.0
     105     2.0     0.0     0.0
     106     2.0     1.0     0.0
     107     0.5     0.5     1.0
*ELEMENT_SHELL
$   eid     pid      n1      n2      n3      n4
     501       1     101     102     103     104       0       0       0       0
     502       2     102     105     106     103       0       0       0       0
*ELEMENT_SOLID
     503       1     101     102     103     107     107     107     107     107
*PART
Skin panel
         1         1         1
*PART
Doubler
         2         1         1
*END
";

fn parse(text: &str) -> Document {
    let mut doc = Document::new();
    parse_str(text, &mut doc, &ParseOptions::default()).unwrap();
    doc
}

#[test]
fn test_plate_scenario() {
    let doc = parse(PLATE);
    assert_eq!(doc.node_count(), 2);
    assert_eq!(doc.element(10).unwrap().nodes, [1, 2, 0, 0, 0, 0, 0, 0]);
    assert_eq!(doc.part_name(5), Some("Plate"));

    let part = extract_part(&doc, 5).unwrap();
    assert_eq!(part.node_count(), 2);
    assert_eq!(part.element_count(), 1);

    let dense = renumber(&part).unwrap();
    let ids: Vec<NodeId> = dense.nodes().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1, 2]);
    assert_relative_eq!(dense.node(2).unwrap().coords[0], 1.0);
    assert_eq!(dense.elements()[0].id, 1);
    assert_eq!(dense.elements()[0].part_id, 5);
}

#[test]
fn test_extracted_parts_are_closed() {
    let doc = parse(ASSEMBLY);
    for (part_id, part) in extract_all(&doc).unwrap() {
        assert!(part.elements().iter().all(|e| e.part_id == part_id));

        let referenced: BTreeSet<NodeId> =
            part.elements().iter().flat_map(|e| e.used_nodes()).collect();
        let held: Vec<NodeId> = part.nodes().iter().map(|n| n.id).collect();
        let held_set: BTreeSet<NodeId> = held.iter().copied().collect();
        assert_eq!(held.len(), held_set.len(), "node listed twice in part {part_id}");
        assert_eq!(referenced, held_set);
        assert!(!held_set.contains(&ABSENT_NODE));
    }
}

#[test]
fn test_renumbered_ids_are_dense() {
    let doc = parse(ASSEMBLY);
    let part = extract_part(&doc, 1).unwrap();
    let dense = renumber(&part).unwrap();

    let n = part.node_count() as u64;
    let m = part.element_count() as u64;
    let node_ids: BTreeSet<NodeId> = dense.nodes().iter().map(|n| n.id).collect();
    assert_eq!(node_ids, (1..=n).collect::<BTreeSet<_>>());
    let element_ids: BTreeSet<u64> = dense.elements().iter().map(|e| e.id).collect();
    assert_eq!(element_ids, (1..=m).collect::<BTreeSet<_>>());

    // Zero stays exactly where the original slot was zero
    for (before, after) in part.elements().iter().zip(dense.elements()) {
        for (old, new) in before.nodes.iter().zip(after.nodes.iter()) {
            assert_eq!(*old == 0, *new == 0);
        }
    }

    // Coordinates follow their node
    let by_old: HashMap<NodeId, [f64; 3]> = part.nodes().iter().map(|n| (n.id, n.coords)).collect();
    let remap = keymesh::node_remap(&part);
    for (old, coords) in by_old {
        assert_eq!(dense.node(remap[&old]).unwrap().coords, coords);
    }

    assert_eq!(renumber(&dense).unwrap(), dense);
}

#[test]
fn test_part_names_from_assembly() {
    let doc = parse(ASSEMBLY);
    assert_eq!(doc.part_ids(), vec![1, 2]);
    assert_eq!(doc.part_name(1), Some("Skin panel"));
    assert_eq!(doc.part_name(2), Some("Doubler"));
    assert_eq!(writer::part_label(1, doc.part_name(1)), "Skin panel");

    let stats = doc.stats();
    assert_eq!(stats.parts[0].elements, 2);
    assert_eq!(stats.parts[0].nodes, 5);
    assert_eq!(stats.parts[1].nodes, 4);
}

#[test]
fn test_malformed_record_cites_line() {
    let mut doc = Document::new();
    let err = parse_str("*NODE\n1 0.0\n", &mut doc, &ParseOptions::default()).unwrap_err();
    assert!(matches!(err, KeyfileError::Syntax { line: 2, .. }));
    assert!(doc.is_empty());
}

fn temp_keyfile(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("keymesh-pipeline-{}-{name}", std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_duplicate_element_across_files_aborts_run() {
    let first = temp_keyfile("first.k", PLATE);
    let second = temp_keyfile(
        "second.k",
        "*NODE\n3,0.0,1.0,0.0\n*ELEMENT_SHELL\n10,6,3,0,0,0,0,0,0,0\n",
    );

    let err = read_keyfiles([&first, &second], &ParseOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        KeyfileError::DuplicateId {
            kind: IdKind::Element,
            id: 10,
            ..
        }
    ));

    std::fs::remove_file(first).ok();
    std::fs::remove_file(second).ok();
}

#[test]
fn test_multi_file_shared_namespace() {
    let mesh = temp_keyfile("mesh.k", "*NODE\n1,0,0,0\n2,1,0,0\n*ELEMENT_BEAM\n1,9,1,2,0,0,0,0,0,0\n");
    let parts = temp_keyfile("parts.k", "*PART\nRod\n9\n");

    let doc = read_keyfiles([&mesh, &parts], &ParseOptions::default()).unwrap();
    let rod = extract_part(&doc, 9).unwrap();
    assert_eq!(rod.part_name(9), Some("Rod"));
    assert_eq!(rod.node_count(), 2);

    std::fs::remove_file(mesh).ok();
    std::fs::remove_file(parts).ok();
}

#[test]
fn test_write_renumbered_part() {
    let doc = parse(PLATE);
    let dense = renumber(&extract_part(&doc, 5).unwrap()).unwrap();
    let base = std::env::temp_dir().join(format!("keymesh-pipeline-{}", std::process::id()));
    let label = writer::part_label(5, doc.part_name(5));

    let (nodes, elements) = writer::write_part(&dense, &base, &label).unwrap();
    assert!(nodes.to_string_lossy().ends_with("-Plate-nodes.txt"));
    assert_eq!(
        std::fs::read_to_string(&nodes).unwrap(),
        "1\t0\t0\t0\n2\t1\t0\t0\n"
    );
    assert_eq!(
        std::fs::read_to_string(&elements).unwrap(),
        "1\t1\t2\t0\t0\t0\t0\t0\t0\n"
    );

    std::fs::remove_file(nodes).ok();
    std::fs::remove_file(elements).ok();
}
