use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tracing_subscriber::EnvFilter;

use featedit::{
    edit::EditBatch,
    editor::session::{EditorSession, EditorState},
    feature::{Feature, Geometry, Properties},
    layer::{LayerStore, VectorLayer},
    runtime::{
        events::EditorEvent,
        handle::{EditorConfig, EditorHandle, RuntimeError, spawn_editor},
    },
    submit::{EditSink, SubmitError, SubmitResult, sqlite::SqliteEditSink},
    types::FeatureId,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn session() -> EditorSession {
    let mut layers = LayerStore::new();
    layers.add_layer(VectorLayer::new(1, "poles")).expect("add");
    EditorSession::new(layers)
}

async fn create_one(handle: &EditorHandle, id: i64) {
    handle.start_operation().await.expect("start");
    handle
        .create(1, Feature::new(id, Some(Geometry::point(0.0, 0.0))))
        .await
        .expect("create");
    assert!(handle.stop_operation().await.expect("stop"));
}

struct RecordingSink {
    seen: Arc<Mutex<Vec<EditBatch>>>,
    delay: Duration,
    fail: bool,
}

impl EditSink for RecordingSink {
    fn submit(&mut self, batch: &EditBatch) -> SubmitResult<()> {
        std::thread::sleep(self.delay);
        if self.fail {
            return Err(SubmitError::Rejected("backend offline".to_string()));
        }
        self.seen.lock().expect("lock").push(batch.clone());
        Ok(())
    }
}

#[tokio::test]
async fn edits_undo_redo_and_events_ordered() {
    init_tracing();
    let handle = spawn_editor(session(), None, EditorConfig::default());
    let mut sub = handle.subscribe();

    handle.activate().await.expect("activate");
    create_one(&handle, 1).await;

    handle.start_operation().await.expect("start");
    let mut changes = Properties::new();
    changes.insert("height".to_string(), serde_json::json!(12));
    handle
        .set_properties(1, FeatureId::Num(1), changes)
        .await
        .expect("set");
    handle.stop_operation().await.expect("stop");

    assert!(handle.undo().await.expect("undo"));
    let f = handle.get(1, FeatureId::Num(1)).await.expect("get").expect("feature");
    assert!(f.get("height").is_none());
    assert!(handle.redo().await.expect("redo"));
    assert!(!handle.redo().await.expect("redo"));

    let status = handle.status().await.expect("status");
    assert_eq!(status.state, EditorState::Editing);
    assert_eq!(status.edit_index, 1);
    assert_eq!(status.len, 2);

    let mut seen = Vec::new();
    for _ in 0..7 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        seen.push(evt);
    }
    assert_eq!(
        seen,
        vec![
            EditorEvent::Activated,
            EditorEvent::FeatureCreated {
                layer: 1,
                id: FeatureId::Num(1)
            },
            EditorEvent::OperationCommitted { edit_index: 0 },
            EditorEvent::FeatureUpdated {
                layer: 1,
                id: FeatureId::Num(1)
            },
            EditorEvent::OperationCommitted { edit_index: 1 },
            EditorEvent::UndoApplied { edit_index: 0 },
            EditorEvent::RedoApplied { edit_index: 1 },
        ]
    );

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn process_requires_sink_and_applied_edits() {
    init_tracing();
    let handle = spawn_editor(session(), None, EditorConfig::default());
    assert!(matches!(handle.process().await, Err(RuntimeError::NoSink)));
    handle.shutdown().await.expect("shutdown");

    let sink = SqliteEditSink::open_in_memory().expect("sqlite");
    let handle = spawn_editor(session(), Some(Box::new(sink)), EditorConfig::default());
    assert!(matches!(handle.process().await, Err(RuntimeError::NothingToSubmit)));

    handle.activate().await.expect("activate");
    create_one(&handle, 1).await;
    create_one(&handle, 2).await;
    assert_eq!(handle.process().await.expect("process"), 2);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn failed_submission_keeps_history_for_retry() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        seen: Arc::clone(&seen),
        delay: Duration::ZERO,
        fail: true,
    };
    let handle = spawn_editor(session(), Some(Box::new(sink)), EditorConfig::default());
    let mut sub = handle.subscribe();

    handle.activate().await.expect("activate");
    create_one(&handle, 5).await;

    let err = handle.process().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Submit(SubmitError::Rejected(_))));

    let status = handle.status().await.expect("status");
    assert_eq!(status.len, 1);
    assert_eq!(status.edit_index, 0);
    assert!(handle.get(1, FeatureId::Num(5)).await.expect("get").is_some());

    let mut failed = false;
    for _ in 0..5 {
        let evt = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("event")
            .expect("recv");
        if let EditorEvent::SubmitFailed { through_index, .. } = evt {
            assert_eq!(through_index, 0);
            failed = true;
            break;
        }
    }
    assert!(failed, "expected SubmitFailed event");
    assert!(seen.lock().expect("lock").is_empty());

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn slow_submission_does_not_block_undo() {
    init_tracing();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        seen: Arc::clone(&seen),
        delay: Duration::from_millis(400),
        fail: false,
    };
    let handle = spawn_editor(session(), Some(Box::new(sink)), EditorConfig::default());
    handle.activate().await.expect("activate");
    create_one(&handle, 1).await;
    create_one(&handle, 2).await;

    let submitting = {
        let handle = handle.clone();
        tokio::spawn(async move { handle.process().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let undone = tokio::time::timeout(Duration::from_millis(200), handle.undo())
        .await
        .expect("undo while submitting")
        .expect("undo");
    assert!(undone);
    assert!(!submitting.is_finished());

    assert_eq!(submitting.await.expect("join").expect("process"), 2);
    assert_eq!(seen.lock().expect("lock")[0].through_index, 1);

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn full_submit_queue_surfaces_as_error() {
    init_tracing();
    let sink = RecordingSink {
        seen: Arc::new(Mutex::new(Vec::new())),
        delay: Duration::from_millis(200),
        fail: false,
    };
    let cfg = EditorConfig {
        submit_queue_bound: 1,
        ..EditorConfig::default()
    };
    let handle = spawn_editor(session(), Some(Box::new(sink)), cfg);
    handle.activate().await.expect("activate");
    create_one(&handle, 1).await;

    let calls: Vec<_> = (0..4)
        .map(|_| {
            let handle = handle.clone();
            tokio::spawn(async move { handle.process().await })
        })
        .collect();

    let mut queue_error_seen = false;
    for call in calls {
        if let Err(RuntimeError::Submit(SubmitError::Message(_))) = call.await.expect("join") {
            queue_error_seen = true;
        }
    }
    assert!(queue_error_seen, "expected submit queue pressure to surface as error");

    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn deactivate_rolls_back_open_operation() {
    init_tracing();
    let handle = spawn_editor(session(), None, EditorConfig::default());
    handle.activate().await.expect("activate");
    handle.start_operation().await.expect("start");
    handle.create(1, Feature::new(9, None)).await.expect("create");
    handle.deactivate().await.expect("deactivate");

    assert!(handle.get(1, FeatureId::Num(9)).await.expect("get").is_none());
    let status = handle.status().await.expect("status");
    assert_eq!(status.state, EditorState::Idle);
    assert_eq!(status.len, 0);
    assert!(matches!(
        handle.create(1, Feature::new(9, None)).await,
        Err(RuntimeError::Edit(_))
    ));

    handle.shutdown().await.expect("shutdown");
}
