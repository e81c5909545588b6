use hashbrown::HashMap;

use crate::{
    edit::{Edit, EditBatch, Operation},
    feature::Feature,
    layer::{LayerError, LayerStore},
    schema::SchemaError,
    types::{FeatureId, LayerId},
};

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("feature {id} not found in layer {layer}")]
    NotFound { layer: LayerId, id: FeatureId },
    #[error(transparent)]
    Layer(LayerError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl From<LayerError> for EditError {
    fn from(value: LayerError) -> Self {
        match value {
            LayerError::MissingFeature { layer, id } => Self::NotFound { layer, id },
            LayerError::Schema(err) => Self::Schema(err),
            other => Self::Layer(other),
        }
    }
}

/// Linear, grouped undo/redo log.
///
/// `operations[..=cursor]` are applied; everything after the cursor can be
/// redone until a new operation is committed, which discards it.
#[derive(Debug, Default)]
pub struct EditHistory {
    operations: Vec<Operation>,
    cursor: Option<usize>,
    open: Option<Operation>,
}

impl EditHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_operation(&mut self) -> Result<(), EditError> {
        if self.open.is_some() {
            return Err(EditError::InvalidState("an operation is already open"));
        }
        self.open = Some(Operation::new());
        Ok(())
    }

    pub fn record_edit(&mut self, edit: Edit) -> Result<(), EditError> {
        let open = self
            .open
            .as_mut()
            .ok_or(EditError::InvalidState("no open operation"))?;
        open.edits.push(edit);
        Ok(())
    }

    /// Commits the open operation. Returns `false` when it was empty and
    /// therefore dropped.
    pub fn stop_operation(&mut self) -> Result<bool, EditError> {
        let op = self
            .open
            .take()
            .ok_or(EditError::InvalidState("no open operation"))?;
        if op.is_empty() {
            return Ok(false);
        }
        self.add(op);
        Ok(true)
    }

    /// Closes the open operation without committing it.
    pub fn abort_operation(&mut self) -> Option<Operation> {
        self.open.take()
    }

    pub fn is_recording(&self) -> bool {
        self.open.is_some()
    }

    /// Commits a group at `cursor + 1`, discarding any redo entries.
    pub fn add(&mut self, edits: impl Into<Operation>) {
        let at = self.cursor.map_or(0, |c| c + 1);
        let dropped = self.operations.len().saturating_sub(at);
        if dropped > 0 {
            tracing::debug!(dropped, "discarding redo history");
        }
        self.operations.truncate(at);
        self.operations.push(edits.into());
        self.cursor = Some(at);
    }

    pub fn can_undo(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.operations.len() > self.cursor.map_or(0, |c| c + 1)
    }

    /// Cursor position; `-1` when nothing is applied.
    pub fn edit_index(&self) -> isize {
        self.cursor.map_or(-1, |c| c as isize)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Applied operations, oldest first.
    pub fn applied(&self) -> &[Operation] {
        match self.cursor {
            Some(c) => &self.operations[..=c],
            None => &[],
        }
    }

    /// Reverts the operation at the cursor.
    ///
    /// Edits are reverted newest first. If any edit fails, the ones already
    /// reverted in this step are re-applied and the cursor stays put.
    pub fn undo(&mut self, layers: &mut LayerStore) -> Result<Option<&Operation>, EditError> {
        if self.open.is_some() {
            return Err(EditError::InvalidState("cannot undo while an operation is open"));
        }
        let Some(idx) = self.cursor else {
            return Ok(None);
        };

        let inverses = self.operations[idx].edits.iter().rev().map(Edit::inverse);
        apply_step(layers, inverses)?;

        self.cursor = idx.checked_sub(1);
        tracing::debug!(index = idx, edit_index = self.edit_index(), "undo applied");
        Ok(Some(&self.operations[idx]))
    }

    /// Re-applies the operation after the cursor, in recorded order.
    pub fn redo(&mut self, layers: &mut LayerStore) -> Result<Option<&Operation>, EditError> {
        if self.open.is_some() {
            return Err(EditError::InvalidState("cannot redo while an operation is open"));
        }
        if !self.can_redo() {
            return Ok(None);
        }
        let idx = self.cursor.map_or(0, |c| c + 1);

        apply_step(layers, self.operations[idx].edits.iter().cloned())?;

        self.cursor = Some(idx);
        tracing::debug!(index = idx, "redo applied");
        Ok(Some(&self.operations[idx]))
    }

    /// Deduplicated batch of every applied edit, or `None` when nothing is applied.
    pub fn pending_batch(&self) -> Option<EditBatch> {
        let through = self.cursor?;
        let edits = dedup_last_write_wins(self.applied().iter().flat_map(|op| op.edits.iter()));
        Some(EditBatch::new(through, edits))
    }

    /// Forgets all history, including an open operation.
    pub fn reset(&mut self) {
        self.operations.clear();
        self.cursor = None;
        self.open = None;
    }
}

/// Keeps only the last edit per `(layer, feature id)`, preserving the
/// relative order of the survivors.
pub fn dedup_last_write_wins<'a>(edits: impl IntoIterator<Item = &'a Edit>) -> Vec<Edit> {
    let all: Vec<&Edit> = edits.into_iter().collect();
    let mut last: HashMap<(LayerId, &FeatureId), usize> = HashMap::new();
    for (pos, edit) in all.iter().enumerate() {
        last.insert((edit.layer(), edit.feature_id()), pos);
    }
    all.iter()
        .enumerate()
        .filter(|&(pos, edit)| last.get(&(edit.layer(), edit.feature_id())).copied() == Some(pos))
        .map(|(_, edit)| (*edit).clone())
        .collect()
}

/// Forward effect of one edit on the live layers.
pub fn apply_edit(layers: &mut LayerStore, edit: &Edit) -> Result<(), EditError> {
    match edit {
        Edit::Create { layer, id, after } => {
            layers.require_mut(*layer)?.insert(after.to_feature(id.clone()))?;
        }
        Edit::Update { layer, id, after, .. } => {
            let feature = layers
                .require_mut(*layer)?
                .get_mut(id)
                .ok_or_else(|| EditError::NotFound {
                    layer: *layer,
                    id: id.clone(),
                })?;
            after.apply_to(feature);
        }
        Edit::Delete { layer, id, .. } => {
            layers
                .require_mut(*layer)?
                .remove(id)
                .ok_or_else(|| EditError::NotFound {
                    layer: *layer,
                    id: id.clone(),
                })?;
        }
    }
    Ok(())
}

/// What one applied edit changed, kept so a failed step can be undone exactly.
enum Applied {
    Edit(Edit),
    /// Deleted feature, held as-is so rollback keeps its state and position.
    Removed {
        layer: LayerId,
        pos: usize,
        feature: Feature,
    },
}

fn apply_tracked(layers: &mut LayerStore, edit: Edit) -> Result<Applied, EditError> {
    if let Edit::Delete { layer, id, .. } = &edit {
        let (pos, feature) = layers
            .require_mut(*layer)?
            .take(id)
            .ok_or_else(|| EditError::NotFound {
                layer: *layer,
                id: id.clone(),
            })?;
        return Ok(Applied::Removed {
            layer: *layer,
            pos,
            feature,
        });
    }
    apply_edit(layers, &edit)?;
    Ok(Applied::Edit(edit))
}

fn revert(layers: &mut LayerStore, applied: Applied) -> Result<(), EditError> {
    match applied {
        Applied::Edit(edit) => apply_edit(layers, &edit.inverse()),
        Applied::Removed { layer, pos, feature } => Ok(layers.require_mut(layer)?.restore(pos, feature)?),
    }
}

/// Applies `edits` as one all-or-nothing step.
///
/// On failure the edits already applied are reverted newest first. Features
/// deleted earlier in the step come back unchanged, display state included.
pub(crate) fn apply_step(layers: &mut LayerStore, edits: impl Iterator<Item = Edit>) -> Result<(), EditError> {
    let mut done: Vec<Applied> = Vec::new();
    for edit in edits {
        let (layer, id) = (edit.layer(), edit.feature_id().clone());
        match apply_tracked(layers, edit) {
            Ok(applied) => done.push(applied),
            Err(err) => {
                tracing::warn!(layer, id = %id, error = %err, "edit failed; rolling back step");
                while let Some(prior) = done.pop() {
                    if let Err(rollback) = revert(layers, prior) {
                        tracing::error!(error = %rollback, "rollback failed");
                    }
                }
                return Err(err);
            }
        }
    }
    Ok(())
}
