use serde::{Deserialize, Serialize};

use super::{Activatable, Interaction, MapBound, translated};
use crate::{
    edit::{Edit, EditBatch, Operation},
    feature::{Feature, FeatureSnapshot, Geometry, Properties},
    history::log::{EditError, EditHistory, apply_step},
    layer::{LayerStore, MapContext},
    selection::{SelectionError, SelectionManager},
    style::{model::Style, resolve::StyleResolver},
    types::{FeatureId, GeometryKind, LayerId},
};

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EditorState {
    /// Not accepting edits. Undo/redo still allowed.
    Idle,
    /// Active, no operation open.
    Editing,
    /// Active with an open operation collecting edits.
    Recording,
}

/// One editing session over a set of layers.
///
/// Owns the layers it edits, the edit history, and the selection, so every
/// mutation goes through one writer.
#[derive(Debug)]
pub struct EditorSession {
    state: EditorState,
    layers: LayerStore,
    history: EditHistory,
    selection: SelectionManager,
    resolver: StyleResolver,
    map: Option<MapContext>,
    interaction: Option<Interaction>,
    snap_tolerance_px: Option<f64>,
}

impl EditorSession {
    pub fn new(layers: LayerStore) -> Self {
        Self {
            state: EditorState::Idle,
            layers,
            history: EditHistory::new(),
            selection: SelectionManager::new(),
            resolver: StyleResolver::default(),
            map: None,
            interaction: None,
            snap_tolerance_px: None,
        }
    }

    pub fn with_resolver(mut self, resolver: StyleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn state(&self) -> EditorState {
        self.state
    }

    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// Direct layer access for data loading. Changes made here bypass history.
    pub fn layers_mut(&mut self) -> &mut LayerStore {
        &mut self.layers
    }

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    pub fn interaction(&self) -> Option<&Interaction> {
        self.interaction.as_ref()
    }

    pub fn feature(&self, layer: LayerId, id: &FeatureId) -> Option<&Feature> {
        self.layers.feature(layer, id)
    }

    pub fn start_operation(&mut self) -> Result<(), EditError> {
        match self.state {
            EditorState::Editing => {
                self.history.start_operation()?;
                self.state = EditorState::Recording;
                Ok(())
            }
            EditorState::Recording => Err(EditError::InvalidState("an operation is already open")),
            EditorState::Idle => Err(EditError::InvalidState("editor is not active")),
        }
    }

    /// Closes the open operation. Returns whether anything was committed.
    pub fn stop_operation(&mut self) -> Result<bool, EditError> {
        if self.state != EditorState::Recording {
            return Err(EditError::InvalidState("no open operation"));
        }
        let committed = self.history.stop_operation()?;
        self.state = EditorState::Editing;
        tracing::debug!(committed, edit_index = self.history.edit_index(), "operation closed");
        Ok(committed)
    }

    /// Adds a feature to `layer` and records the create.
    ///
    /// Absent properties are filled from field defaults before validation.
    pub fn create_feature(&mut self, layer: LayerId, mut feature: Feature) -> Result<FeatureId, EditError> {
        self.require_recording()?;
        let target = self.layers.require_mut(layer)?;
        target.apply_defaults(&mut feature.properties);
        target.validate_properties(&feature.properties)?;

        let id = feature.id.clone();
        let after = feature.snapshot();
        target.insert(feature)?;
        self.history.record_edit(Edit::Create {
            layer,
            id: id.clone(),
            after,
        })?;
        Ok(id)
    }

    /// Replaces geometry and properties of a feature and records the update.
    pub fn update_feature(&mut self, layer: LayerId, id: &FeatureId, after: FeatureSnapshot) -> Result<(), EditError> {
        self.require_recording()?;
        let target = self.layers.require_mut(layer)?;
        let before = target
            .get(id)
            .ok_or_else(|| EditError::NotFound { layer, id: id.clone() })?
            .snapshot();
        target.validate_update(&before.properties, &after.properties)?;

        if let Some(feature) = target.get_mut(id) {
            after.apply_to(feature);
        }
        self.history.record_edit(Edit::Update {
            layer,
            id: id.clone(),
            before,
            after,
        })
    }

    /// Merges `changes` into a feature's properties and records the update.
    pub fn set_properties(&mut self, layer: LayerId, id: &FeatureId, changes: Properties) -> Result<(), EditError> {
        let mut after = self
            .layers
            .feature(layer, id)
            .ok_or_else(|| EditError::NotFound { layer, id: id.clone() })?
            .snapshot();
        after.properties.extend(changes);
        self.update_feature(layer, id, after)
    }

    /// Removes a feature and records the delete.
    pub fn delete_feature(&mut self, layer: LayerId, id: &FeatureId) -> Result<(), EditError> {
        self.require_recording()?;
        let removed = self
            .layers
            .require_mut(layer)?
            .remove(id)
            .ok_or_else(|| EditError::NotFound { layer, id: id.clone() })?;
        self.selection.forget(layer, id);
        self.history.record_edit(Edit::Delete {
            layer,
            id: id.clone(),
            before: removed.snapshot(),
        })
    }

    /// Reverts the last applied operation. `Ok(None)` when there is none.
    pub fn undo(&mut self) -> Result<Option<Operation>, EditError> {
        if self.state == EditorState::Recording {
            return Err(EditError::InvalidState("cannot undo while an operation is open"));
        }
        self.cancel_interaction();
        let op = self.history.undo(&mut self.layers)?.cloned();
        if let Some(op) = &op {
            self.prune_selection(op);
        }
        Ok(op)
    }

    /// Re-applies the next operation. `Ok(None)` when there is none.
    pub fn redo(&mut self) -> Result<Option<Operation>, EditError> {
        if self.state == EditorState::Recording {
            return Err(EditError::InvalidState("cannot redo while an operation is open"));
        }
        self.cancel_interaction();
        let op = self.history.redo(&mut self.layers)?.cloned();
        if let Some(op) = &op {
            self.prune_selection(op);
        }
        Ok(op)
    }

    /// Deduplicated batch of all applied edits.
    pub fn pending_batch(&self) -> Option<EditBatch> {
        self.history.pending_batch()
    }

    /// Starts a fresh history. Fails while an operation is open.
    pub fn reset_history(&mut self) -> Result<(), EditError> {
        if self.state == EditorState::Recording {
            return Err(EditError::InvalidState("cannot reset while an operation is open"));
        }
        self.history.reset();
        Ok(())
    }

    /// Enables vertex snapping within `tolerance_px` screen pixels, or disables it.
    pub fn set_snapping(&mut self, tolerance_px: Option<f64>) {
        self.snap_tolerance_px = tolerance_px;
    }

    pub fn begin_draw(&mut self, layer: LayerId, kind: GeometryKind) -> Result<(), EditError> {
        self.require_active()?;
        self.layers.require(layer)?;
        self.replace_interaction(Interaction::Draw {
            layer,
            kind,
            sketch: Vec::new(),
        });
        Ok(())
    }

    /// Places a sketch vertex, snapped to a nearby existing vertex when
    /// snapping is on. Returns the placed position.
    pub fn push_vertex(&mut self, x: f64, y: f64) -> Result<[f64; 2], EditError> {
        let Some(Interaction::Draw { layer, .. }) = &self.interaction else {
            return Err(EditError::InvalidState("no draw in progress"));
        };
        let pos = self.snap(*layer, [x, y]);
        if let Some(Interaction::Draw { sketch, .. }) = self.interaction.as_mut() {
            sketch.push(pos);
        }
        Ok(pos)
    }

    /// Turns the sketch into a feature. Opens and closes its own operation
    /// unless one is already open. On failure the sketch stays in progress.
    pub fn finish_draw(&mut self, id: impl Into<FeatureId>, properties: Properties) -> Result<FeatureId, EditError> {
        let Some(Interaction::Draw { layer, kind, sketch }) = &self.interaction else {
            return Err(EditError::InvalidState("no draw in progress"));
        };
        if sketch.len() < Interaction::min_vertices(*kind) {
            return Err(EditError::InvalidState("sketch has too few vertices"));
        }
        let layer = *layer;
        let geometry = Geometry {
            kind: *kind,
            coordinates: sketch.clone(),
        };

        let mut feature = Feature::new(id, Some(geometry));
        feature.properties = properties;
        let id = self.within_operation(|s| s.create_feature(layer, feature))?;
        self.interaction = None;
        Ok(id)
    }

    pub fn begin_modify(&mut self, layer: LayerId, id: &FeatureId) -> Result<(), EditError> {
        self.require_target(layer, id)?;
        self.replace_interaction(Interaction::Modify { layer, id: id.clone() });
        Ok(())
    }

    /// Commits the reshaped geometry as an update. On failure the modify
    /// stays in progress.
    pub fn finish_modify(&mut self, geometry: Geometry) -> Result<(), EditError> {
        let Some(Interaction::Modify { layer, id }) = self.interaction.clone() else {
            return Err(EditError::InvalidState("no modify in progress"));
        };
        self.commit_geometry(layer, &id, geometry)?;
        self.interaction = None;
        Ok(())
    }

    pub fn begin_translate(&mut self, layer: LayerId, id: &FeatureId) -> Result<(), EditError> {
        self.require_target(layer, id)?;
        self.replace_interaction(Interaction::Translate { layer, id: id.clone() });
        Ok(())
    }

    /// Commits a move by `(dx, dy)` map units as an update.
    pub fn finish_translate(&mut self, dx: f64, dy: f64) -> Result<(), EditError> {
        let Some(Interaction::Translate { layer, id }) = self.interaction.clone() else {
            return Err(EditError::InvalidState("no translate in progress"));
        };
        let geometry = self
            .layers
            .feature(layer, &id)
            .and_then(|f| f.geometry.as_ref())
            .map(|g| translated(g, dx, dy))
            .ok_or_else(|| EditError::NotFound { layer, id: id.clone() })?;
        self.commit_geometry(layer, &id, geometry)?;
        self.interaction = None;
        Ok(())
    }

    /// Drops the current interaction without emitting any edit.
    pub fn cancel_interaction(&mut self) -> Option<Interaction> {
        let cancelled = self.interaction.take();
        if let Some(i) = &cancelled {
            tracing::debug!(interaction = ?i, "interaction cancelled");
        }
        cancelled
    }

    pub fn select(&mut self, layer: LayerId, id: &FeatureId) -> Result<bool, SelectionError> {
        self.selection.select(&mut self.layers, layer, id)
    }

    pub fn deselect(&mut self, layer: LayerId, id: &FeatureId) -> Result<bool, SelectionError> {
        self.selection.deselect(&mut self.layers, layer, id)
    }

    pub fn toggle_selection(&mut self, layer: LayerId, id: &FeatureId) -> Result<bool, SelectionError> {
        self.selection.toggle(&mut self.layers, layer, id)
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear_selection(&mut self.layers);
    }

    pub fn highlight(&mut self, layer: LayerId, id: &FeatureId) -> Result<(), SelectionError> {
        self.selection.highlight(&mut self.layers, layer, id)
    }

    pub fn clear_highlight(&mut self) {
        self.selection.clear_highlight(&mut self.layers);
    }

    pub fn set_hidden(&mut self, layer: LayerId, id: &FeatureId, hidden: bool) -> Result<(), SelectionError> {
        self.selection.set_hidden(&mut self.layers, layer, id, hidden)
    }

    /// Style stack for a feature at the attached map's resolution.
    pub fn resolve_styles(&self, layer: LayerId, id: &FeatureId) -> Option<Vec<Style>> {
        let resolution = self.map.as_ref().map_or(1.0, |m| m.resolution);
        self.resolve_styles_at(layer, id, resolution)
    }

    /// Style stack for a feature at an explicit resolution.
    pub fn resolve_styles_at(&self, layer: LayerId, id: &FeatureId, resolution: f64) -> Option<Vec<Style>> {
        let target = self.layers.layer(layer)?;
        let feature = target.get(id)?;
        self.resolver.resolve(target, feature, resolution)
    }

    fn within_operation<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, EditError>) -> Result<T, EditError> {
        match self.state {
            EditorState::Recording => f(self),
            EditorState::Editing => {
                self.start_operation()?;
                match f(self) {
                    Ok(out) => {
                        self.stop_operation()?;
                        Ok(out)
                    }
                    Err(err) => {
                        self.rollback_open_operation();
                        self.state = EditorState::Editing;
                        Err(err)
                    }
                }
            }
            EditorState::Idle => Err(EditError::InvalidState("editor is not active")),
        }
    }

    fn commit_geometry(&mut self, layer: LayerId, id: &FeatureId, geometry: Geometry) -> Result<(), EditError> {
        let mut after = self
            .layers
            .feature(layer, id)
            .ok_or_else(|| EditError::NotFound { layer, id: id.clone() })?
            .snapshot();
        after.geometry = Some(geometry);
        self.within_operation(|s| s.update_feature(layer, id, after))
    }

    fn rollback_open_operation(&mut self) {
        let Some(op) = self.history.abort_operation() else {
            return;
        };
        if op.is_empty() {
            return;
        }
        tracing::debug!(edits = op.len(), "rolling back uncommitted operation");
        if let Err(err) = apply_step(&mut self.layers, op.edits.iter().rev().map(Edit::inverse)) {
            tracing::error!(error = %err, "rollback of uncommitted operation failed");
        }
        self.prune_selection(&op);
    }

    fn prune_selection(&mut self, op: &Operation) {
        for edit in &op.edits {
            if self.layers.feature(edit.layer(), edit.feature_id()).is_none() {
                self.selection.forget(edit.layer(), edit.feature_id());
            }
        }
    }

    fn snap(&self, layer: LayerId, pos: [f64; 2]) -> [f64; 2] {
        let Some(tolerance_px) = self.snap_tolerance_px else {
            return pos;
        };
        let resolution = self.map.as_ref().map_or(1.0, |m| m.resolution);
        let tolerance = tolerance_px * resolution;
        let Some(target) = self.layers.layer(layer) else {
            return pos;
        };

        let mut best: Option<([f64; 2], f64)> = None;
        for vertex in target
            .features()
            .filter_map(|f| f.geometry.as_ref())
            .flat_map(|g| g.coordinates.iter().copied())
        {
            let d = ((vertex[0] - pos[0]).powi(2) + (vertex[1] - pos[1]).powi(2)).sqrt();
            if d <= tolerance && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((vertex, d));
            }
        }
        best.map_or(pos, |(v, _)| v)
    }

    fn replace_interaction(&mut self, next: Interaction) {
        self.cancel_interaction();
        self.interaction = Some(next);
    }

    fn require_active(&self) -> Result<(), EditError> {
        if self.state == EditorState::Idle {
            return Err(EditError::InvalidState("editor is not active"));
        }
        Ok(())
    }

    fn require_recording(&self) -> Result<(), EditError> {
        if self.state != EditorState::Recording {
            return Err(EditError::InvalidState("no open operation"));
        }
        Ok(())
    }

    fn require_target(&self, layer: LayerId, id: &FeatureId) -> Result<(), EditError> {
        self.require_active()?;
        if self.layers.require(layer)?.get(id).is_none() {
            return Err(EditError::NotFound { layer, id: id.clone() });
        }
        Ok(())
    }
}

impl Activatable for EditorSession {
    fn activate(&mut self) {
        if self.state == EditorState::Idle {
            self.state = EditorState::Editing;
            tracing::debug!("editor activated");
        }
    }

    fn deactivate(&mut self) {
        self.cancel_interaction();
        if self.state == EditorState::Recording {
            self.rollback_open_operation();
        }
        self.clear_highlight();
        self.state = EditorState::Idle;
        tracing::debug!("editor deactivated");
    }

    fn is_active(&self) -> bool {
        self.state != EditorState::Idle
    }
}

impl MapBound for EditorSession {
    fn attach(&mut self, map: MapContext) {
        self.map = Some(map);
    }

    fn map(&self) -> Option<&MapContext> {
        self.map.as_ref()
    }
}
