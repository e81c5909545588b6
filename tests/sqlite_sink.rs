use tempfile::tempdir;

use featedit::{
    edit::{BATCH_FORMAT_VERSION, Edit, EditBatch},
    feature::{Feature, Geometry},
    submit::{EditSink, sqlite::SqliteEditSink},
    types::{EditKind, FeatureId},
};

fn batch(through_index: usize) -> EditBatch {
    let after = Feature::new(0, Some(Geometry::point(1.0, 2.0)))
        .with_property("name", "pump")
        .snapshot();
    EditBatch::new(
        through_index,
        vec![
            Edit::Create {
                layer: 3,
                id: FeatureId::from("a"),
                after: after.clone(),
            },
            Edit::Delete {
                layer: 3,
                id: FeatureId::Num(11),
                before: after,
            },
        ],
    )
}

#[test]
fn journaled_batches_survive_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("edits.db");

    {
        let mut sink = SqliteEditSink::open(&path).expect("open");
        sink.submit(&batch(0)).expect("submit");
        sink.submit(&batch(4)).expect("submit");
        sink.flush().expect("flush");
    }

    let sink = SqliteEditSink::open(&path).expect("reopen");
    assert_eq!(sink.batch_count().expect("count"), 2);
    assert_eq!(sink.latest_through_index().expect("latest"), Some(4));

    let loaded = sink.load_batches().expect("load");
    assert_eq!(loaded, vec![batch(0), batch(4)]);
    assert!(loaded.iter().all(|b| b.format_version == BATCH_FORMAT_VERSION));
}

#[test]
fn edits_are_indexed_by_feature() {
    let mut sink = SqliteEditSink::open_in_memory().expect("open");
    assert_eq!(sink.latest_through_index().expect("latest"), None);

    sink.submit(&batch(0)).expect("submit");
    sink.submit(&batch(1)).expect("submit");

    assert_eq!(
        sink.feature_kinds(3, "a").expect("kinds"),
        vec![EditKind::Create, EditKind::Create]
    );
    assert_eq!(sink.feature_kinds(3, "11").expect("kinds"), vec![EditKind::Delete, EditKind::Delete]);
    assert!(sink.feature_kinds(4, "a").expect("kinds").is_empty());
}
