use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot};

use crate::{
    edit::EditBatch,
    editor::{
        Activatable, MapBound,
        session::{EditorSession, EditorState},
    },
    feature::{Feature, FeatureSnapshot, Properties},
    history::log::EditError,
    layer::MapContext,
    selection::SelectionError,
    style::model::Style,
    submit::{EditSink, SubmitError, SubmitResult},
    types::{FeatureId, LayerId},
};

use super::events::EditorEvent;

/// Errors surfaced through [`EditorHandle`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Edit(#[from] EditError),
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("submission failed: {0}")]
    Submit(#[from] SubmitError),
    #[error("no edit sink configured")]
    NoSink,
    #[error("no applied edits to submit")]
    NothingToSubmit,
    #[error("editor runtime stopped")]
    ChannelClosed,
}

/// Channel sizing for the editor runtime.
#[derive(Debug, Clone)]
pub struct EditorConfig {
    pub command_queue_bound: usize,
    pub event_capacity: usize,
    /// Batches allowed to wait for the backend before `process` reports
    /// queue pressure.
    pub submit_queue_bound: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
            submit_queue_bound: 8,
        }
    }
}

/// Point-in-time view of the session's history and lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStatus {
    pub state: EditorState,
    pub edit_index: isize,
    pub len: usize,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Cloneable async front end to an [`EditorSession`] running on its own task.
#[derive(Clone)]
pub struct EditorHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<EditorEvent>,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    Activate {
        resp: oneshot::Sender<()>,
    },
    Deactivate {
        resp: oneshot::Sender<()>,
    },
    Attach {
        map: MapContext,
        resp: oneshot::Sender<()>,
    },
    StartOperation {
        resp: Reply<()>,
    },
    StopOperation {
        resp: Reply<bool>,
    },
    Create {
        layer: LayerId,
        feature: Feature,
        resp: Reply<FeatureId>,
    },
    Update {
        layer: LayerId,
        id: FeatureId,
        after: FeatureSnapshot,
        resp: Reply<()>,
    },
    SetProperties {
        layer: LayerId,
        id: FeatureId,
        changes: Properties,
        resp: Reply<()>,
    },
    Delete {
        layer: LayerId,
        id: FeatureId,
        resp: Reply<()>,
    },
    Undo {
        resp: Reply<bool>,
    },
    Redo {
        resp: Reply<bool>,
    },
    Select {
        layer: LayerId,
        id: FeatureId,
        resp: Reply<bool>,
    },
    ClearSelection {
        resp: oneshot::Sender<()>,
    },
    Highlight {
        layer: LayerId,
        id: FeatureId,
        resp: Reply<()>,
    },
    SetHidden {
        layer: LayerId,
        id: FeatureId,
        hidden: bool,
        resp: Reply<()>,
    },
    Get {
        layer: LayerId,
        id: FeatureId,
        resp: oneshot::Sender<Option<Feature>>,
    },
    ResolveStyles {
        layer: LayerId,
        id: FeatureId,
        resp: oneshot::Sender<Option<Vec<Style>>>,
    },
    Status {
        resp: oneshot::Sender<HistoryStatus>,
    },
    Process {
        resp: Reply<usize>,
    },
    Shutdown {
        resp: Reply<()>,
    },
}

enum SubmitMsg {
    Batch { batch: EditBatch, resp: Reply<usize> },
    Shutdown { resp: oneshot::Sender<SubmitResult<()>> },
}

/// Moves `session` onto a tokio task and returns a handle to drive it.
///
/// With a sink, submissions run on a separate worker so the command loop
/// keeps serving edits, undo and redo while the backend is busy.
pub fn spawn_editor(session: EditorSession, sink: Option<Box<dyn EditSink>>, config: EditorConfig) -> EditorHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound);
    let (events_tx, _) = broadcast::channel::<EditorEvent>(config.event_capacity);

    let submit_tx = sink.map(|sink| {
        let (tx, rx) = mpsc::channel::<SubmitMsg>(config.submit_queue_bound);
        spawn_submit_worker(sink, rx, events_tx.clone());
        tx
    });

    let events_tx_loop = events_tx.clone();
    tokio::spawn(async move {
        let mut session = session;
        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &mut session, &events_tx_loop, submit_tx.as_ref()).await {
                break;
            }
        }
        tracing::debug!("editor loop stopped");
    });

    EditorHandle { cmd_tx, events_tx }
}

impl EditorHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<EditorEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    pub async fn activate(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Activate { resp }).await
    }

    /// Deactivates the session, rolling back any open operation.
    pub async fn deactivate(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Deactivate { resp }).await
    }

    pub async fn attach(&self, map: MapContext) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Attach { map, resp }).await
    }

    pub async fn start_operation(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::StartOperation { resp }).await?
    }

    /// Closes the open operation. Returns whether anything was committed.
    pub async fn stop_operation(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::StopOperation { resp }).await?
    }

    pub async fn create(&self, layer: LayerId, feature: Feature) -> Result<FeatureId, RuntimeError> {
        self.request(|resp| Command::Create { layer, feature, resp }).await?
    }

    pub async fn update(&self, layer: LayerId, id: FeatureId, after: FeatureSnapshot) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Update { layer, id, after, resp }).await?
    }

    pub async fn set_properties(&self, layer: LayerId, id: FeatureId, changes: Properties) -> Result<(), RuntimeError> {
        self.request(|resp| Command::SetProperties {
            layer,
            id,
            changes,
            resp,
        })
        .await?
    }

    pub async fn delete(&self, layer: LayerId, id: FeatureId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Delete { layer, id, resp }).await?
    }

    /// Undoes one operation. `Ok(false)` when there was nothing to undo.
    pub async fn undo(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Undo { resp }).await?
    }

    /// Redoes one operation. `Ok(false)` when there was nothing to redo.
    pub async fn redo(&self) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Redo { resp }).await?
    }

    pub async fn select(&self, layer: LayerId, id: FeatureId) -> Result<bool, RuntimeError> {
        self.request(|resp| Command::Select { layer, id, resp }).await?
    }

    pub async fn clear_selection(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::ClearSelection { resp }).await
    }

    pub async fn highlight(&self, layer: LayerId, id: FeatureId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Highlight { layer, id, resp }).await?
    }

    pub async fn set_hidden(&self, layer: LayerId, id: FeatureId, hidden: bool) -> Result<(), RuntimeError> {
        self.request(|resp| Command::SetHidden {
            layer,
            id,
            hidden,
            resp,
        })
        .await?
    }

    pub async fn get(&self, layer: LayerId, id: FeatureId) -> Result<Option<Feature>, RuntimeError> {
        self.request(|resp| Command::Get { layer, id, resp }).await
    }

    pub async fn resolve_styles(&self, layer: LayerId, id: FeatureId) -> Result<Option<Vec<Style>>, RuntimeError> {
        self.request(|resp| Command::ResolveStyles { layer, id, resp }).await
    }

    pub async fn status(&self) -> Result<HistoryStatus, RuntimeError> {
        self.request(|resp| Command::Status { resp }).await
    }

    /// Submits every applied edit, deduplicated per feature, to the sink.
    ///
    /// Resolves once the backend answers, with the number of edits sent.
    /// History is left intact either way, so a failed batch can be resent.
    pub async fn process(&self) -> Result<usize, RuntimeError> {
        self.request(|resp| Command::Process { resp }).await?
    }

    /// Stops the loop after waiting for queued submissions.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.request(|resp| Command::Shutdown { resp }).await?
    }
}

async fn handle_command(
    cmd: Command,
    session: &mut EditorSession,
    events_tx: &broadcast::Sender<EditorEvent>,
    submit_tx: Option<&mpsc::Sender<SubmitMsg>>,
) -> bool {
    match cmd {
        Command::Activate { resp } => {
            session.activate();
            let _ = events_tx.send(EditorEvent::Activated);
            let _ = resp.send(());
        }
        Command::Deactivate { resp } => {
            session.deactivate();
            let _ = events_tx.send(EditorEvent::Deactivated);
            let _ = resp.send(());
        }
        Command::Attach { map, resp } => {
            session.attach(map);
            let _ = resp.send(());
        }
        Command::StartOperation { resp } => {
            let _ = resp.send(session.start_operation().map_err(RuntimeError::from));
        }
        Command::StopOperation { resp } => {
            let res = session.stop_operation().map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(EditorEvent::OperationCommitted {
                    edit_index: session.history().edit_index(),
                });
            }
            let _ = resp.send(res);
        }
        Command::Create { layer, feature, resp } => {
            let res = session.create_feature(layer, feature).map_err(RuntimeError::from);
            if let Ok(id) = &res {
                let _ = events_tx.send(EditorEvent::FeatureCreated { layer, id: id.clone() });
            }
            let _ = resp.send(res);
        }
        Command::Update { layer, id, after, resp } => {
            let res = session.update_feature(layer, &id, after).map_err(RuntimeError::from);
            if res.is_ok() {
                let _ = events_tx.send(EditorEvent::FeatureUpdated { layer, id });
            }
            let _ = resp.send(res);
        }
        Command::SetProperties {
            layer,
            id,
            changes,
            resp,
        } => {
            let res = session.set_properties(layer, &id, changes).map_err(RuntimeError::from);
            if res.is_ok() {
                let _ = events_tx.send(EditorEvent::FeatureUpdated { layer, id });
            }
            let _ = resp.send(res);
        }
        Command::Delete { layer, id, resp } => {
            let res = session.delete_feature(layer, &id).map_err(RuntimeError::from);
            if res.is_ok() {
                let _ = events_tx.send(EditorEvent::FeatureDeleted { layer, id });
            }
            let _ = resp.send(res);
        }
        Command::Undo { resp } => {
            let res = session.undo().map(|op| op.is_some()).map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(EditorEvent::UndoApplied {
                    edit_index: session.history().edit_index(),
                });
            }
            let _ = resp.send(res);
        }
        Command::Redo { resp } => {
            let res = session.redo().map(|op| op.is_some()).map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(EditorEvent::RedoApplied {
                    edit_index: session.history().edit_index(),
                });
            }
            let _ = resp.send(res);
        }
        Command::Select { layer, id, resp } => {
            let res = session.select(layer, &id).map_err(RuntimeError::from);
            if let Ok(true) = res {
                let _ = events_tx.send(EditorEvent::SelectionChanged);
            }
            let _ = resp.send(res);
        }
        Command::ClearSelection { resp } => {
            session.clear_selection();
            let _ = events_tx.send(EditorEvent::SelectionChanged);
            let _ = resp.send(());
        }
        Command::Highlight { layer, id, resp } => {
            let res = session.highlight(layer, &id).map_err(RuntimeError::from);
            if res.is_ok() {
                let _ = events_tx.send(EditorEvent::SelectionChanged);
            }
            let _ = resp.send(res);
        }
        Command::SetHidden {
            layer,
            id,
            hidden,
            resp,
        } => {
            let _ = resp.send(session.set_hidden(layer, &id, hidden).map_err(RuntimeError::from));
        }
        Command::Get { layer, id, resp } => {
            let _ = resp.send(session.feature(layer, &id).cloned());
        }
        Command::ResolveStyles { layer, id, resp } => {
            let _ = resp.send(session.resolve_styles(layer, &id));
        }
        Command::Status { resp } => {
            let history = session.history();
            let _ = resp.send(HistoryStatus {
                state: session.state(),
                edit_index: history.edit_index(),
                len: history.len(),
                can_undo: history.can_undo(),
                can_redo: history.can_redo(),
            });
        }
        Command::Process { resp } => {
            let Some(tx) = submit_tx else {
                let _ = resp.send(Err(RuntimeError::NoSink));
                return false;
            };
            let Some(batch) = session.pending_batch() else {
                let _ = resp.send(Err(RuntimeError::NothingToSubmit));
                return false;
            };
            tracing::debug!(through_index = batch.through_index, edits = batch.len(), "queueing batch");
            enqueue_batch(tx, batch, resp);
        }
        Command::Shutdown { resp } => {
            let out = if let Some(tx) = submit_tx {
                let (done_tx, done_rx) = oneshot::channel();
                if tx.send(SubmitMsg::Shutdown { resp: done_tx }).await.is_err() {
                    Err(RuntimeError::ChannelClosed)
                } else {
                    match done_rx.await {
                        Ok(flushed) => flushed.map_err(RuntimeError::from),
                        Err(_) => Err(RuntimeError::ChannelClosed),
                    }
                }
            } else {
                Ok(())
            };
            let _ = resp.send(out);
            return true;
        }
    }

    false
}

fn enqueue_batch(tx: &mpsc::Sender<SubmitMsg>, batch: EditBatch, resp: Reply<usize>) {
    if let Err(err) = tx.try_send(SubmitMsg::Batch { batch, resp }) {
        let reason = format!("submit queue error: {err}");
        if let SubmitMsg::Batch { resp, .. } = err.into_inner() {
            let _ = resp.send(Err(RuntimeError::Submit(SubmitError::Message(reason))));
        }
    }
}

fn spawn_submit_worker(
    sink: Box<dyn EditSink>,
    mut rx: mpsc::Receiver<SubmitMsg>,
    events_tx: broadcast::Sender<EditorEvent>,
) {
    let sink = Arc::new(Mutex::new(sink));
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                SubmitMsg::Batch { batch, resp } => {
                    let through_index = batch.through_index;
                    let edits = batch.len();
                    let result = with_sink(&sink, move |sink| {
                        sink.submit(&batch)?;
                        sink.flush()
                    })
                    .await;

                    match &result {
                        Ok(()) => {
                            tracing::debug!(through_index, edits, "batch submitted");
                            let _ = events_tx.send(EditorEvent::Submitted { through_index, edits });
                        }
                        Err(err) => {
                            tracing::warn!(through_index, error = %err, "batch submission failed");
                            let _ = events_tx.send(EditorEvent::SubmitFailed {
                                through_index,
                                reason: err.to_string(),
                            });
                        }
                    }
                    let _ = resp.send(result.map(|()| edits).map_err(RuntimeError::from));
                }
                SubmitMsg::Shutdown { resp } => {
                    let _ = resp.send(with_sink(&sink, |sink| sink.flush()).await);
                    break;
                }
            }
        }
    });
}

async fn with_sink<T, F>(sink: &Arc<Mutex<Box<dyn EditSink>>>, f: F) -> SubmitResult<T>
where
    T: Send + 'static,
    F: FnOnce(&mut dyn EditSink) -> SubmitResult<T> + Send + 'static,
{
    let sink_ref = Arc::clone(sink);
    tokio::task::spawn_blocking(move || {
        let mut sink = sink_ref.blocking_lock();
        f(&mut **sink)
    })
    .await
    .map_err(|e| SubmitError::Message(format!("join error: {e}")))?
}
