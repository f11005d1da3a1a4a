//! File-backed store round trips.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use eikonal_store::{Dataset, GroupNode, GroupPath, StoreError, TreeStore};

#[test]
fn flush_and_reopen() {
    let dir = tempfile::tempdir().expect("temp dir");
    let file = dir.path().join("eikonal.json");

    let mut store = TreeStore::open(&file).unwrap();
    assert!(store.root().attrs().is_empty());
    store.root_mut().set_attr("dlon", 0.2).unwrap();
    store
        .root_mut()
        .set_attr("period_array", vec![10.0, 24.5])
        .unwrap();

    let run = GroupPath::parse("Eikonal_run_0").unwrap();
    store.create_group(&run).unwrap().set_attr("fieldtype", "Tph").unwrap();
    let mut record = GroupNode::new();
    record
        .create_dataset(
            "travelT",
            Dataset::new(2, 2, vec![f64::NAN, 1.0, 2.0, 3.0]).unwrap(),
        )
        .unwrap();
    store.insert_group(&run.join("TA.A04A").unwrap(), record).unwrap();
    store.flush().unwrap();
    assert!(file.exists());

    let reopened = TreeStore::open(&file).unwrap();
    assert_eq!(reopened.root().attr_f64("dlon").unwrap(), 0.2);
    assert_eq!(
        reopened.root().attr_floats("period_array").unwrap(),
        &[10.0, 24.5]
    );
    let run_node = reopened.group(&run).unwrap();
    assert_eq!(run_node.attr_text("fieldtype").unwrap(), "Tph");
    let travel = run_node
        .child("TA.A04A")
        .and_then(|r| r.dataset("travelT"))
        .unwrap();
    assert_eq!(travel.shape(), (2, 2));
    assert!(travel.values().first().unwrap().is_nan());
}

#[test]
fn corrupt_file_is_a_serialization_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let file = dir.path().join("broken.json");
    std::fs::write(&file, b"{ not json").unwrap();
    assert!(matches!(
        TreeStore::open(&file),
        Err(StoreError::Serialization(_))
    ));
}
