//! Selection and highlight bookkeeping shared by the editing widgets.
//!
//! The manager is the single writer of `DisplayState::selected` and
//! `DisplayState::highlighted`; style resolution only reads them.

use hashbrown::HashSet;

use crate::{
    layer::LayerStore,
    types::{FeatureId, LayerId},
};

/// Selection failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    /// Target feature does not exist.
    #[error("feature {id} not found in layer {layer}")]
    NotFound {
        /// Layer id.
        layer: LayerId,
        /// Feature id.
        id: FeatureId,
    },
}

type Key = (LayerId, FeatureId);

/// Multi-feature selection plus at most one highlighted feature.
#[derive(Debug, Default, Clone)]
pub struct SelectionManager {
    selected: HashSet<Key>,
    highlighted: Option<Key>,
}

impl SelectionManager {
    /// Empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a feature to the selection. Returns `true` if it was not selected.
    pub fn select(&mut self, layers: &mut LayerStore, layer: LayerId, id: &FeatureId) -> Result<bool, SelectionError> {
        set_flag(layers, layer, id, |s| s.selected = true)?;
        Ok(self.selected.insert((layer, id.clone())))
    }

    /// Removes a feature from the selection. Returns `true` if it was selected.
    pub fn deselect(&mut self, layers: &mut LayerStore, layer: LayerId, id: &FeatureId) -> Result<bool, SelectionError> {
        set_flag(layers, layer, id, |s| s.selected = false)?;
        Ok(self.selected.remove(&(layer, id.clone())))
    }

    /// Flips selection. Returns the new selected state.
    pub fn toggle(&mut self, layers: &mut LayerStore, layer: LayerId, id: &FeatureId) -> Result<bool, SelectionError> {
        if self.is_selected(layer, id) {
            self.deselect(layers, layer, id)?;
            Ok(false)
        } else {
            self.select(layers, layer, id)?;
            Ok(true)
        }
    }

    /// Deselects everything. Features that have since disappeared are skipped.
    pub fn clear_selection(&mut self, layers: &mut LayerStore) {
        for (layer, id) in self.selected.drain() {
            if let Some(f) = layers.feature_mut(layer, &id) {
                f.state.selected = false;
            }
        }
    }

    /// Moves the single highlight to this feature.
    pub fn highlight(&mut self, layers: &mut LayerStore, layer: LayerId, id: &FeatureId) -> Result<(), SelectionError> {
        if layers.feature(layer, id).is_none() {
            return Err(SelectionError::NotFound { layer, id: id.clone() });
        }
        self.clear_highlight(layers);
        set_flag(layers, layer, id, |s| s.highlighted = true)?;
        self.highlighted = Some((layer, id.clone()));
        Ok(())
    }

    /// Removes the highlight, if any.
    pub fn clear_highlight(&mut self, layers: &mut LayerStore) {
        if let Some((layer, id)) = self.highlighted.take()
            && let Some(f) = layers.feature_mut(layer, &id)
        {
            f.state.highlighted = false;
        }
    }

    /// Hides or shows a feature.
    pub fn set_hidden(
        &mut self,
        layers: &mut LayerStore,
        layer: LayerId,
        id: &FeatureId,
        hidden: bool,
    ) -> Result<(), SelectionError> {
        set_flag(layers, layer, id, |s| s.hidden = hidden)
    }

    /// Drops bookkeeping for a feature that left its layer.
    pub fn forget(&mut self, layer: LayerId, id: &FeatureId) {
        let key = (layer, id.clone());
        self.selected.remove(&key);
        if self.highlighted.as_ref() == Some(&key) {
            self.highlighted = None;
        }
    }

    /// Whether a feature is selected.
    pub fn is_selected(&self, layer: LayerId, id: &FeatureId) -> bool {
        self.selected.contains(&(layer, id.clone()))
    }

    /// Highlighted feature.
    pub fn highlighted(&self) -> Option<&(LayerId, FeatureId)> {
        self.highlighted.as_ref()
    }

    /// Selected features, ordered by layer then id.
    pub fn selected(&self) -> Vec<(LayerId, FeatureId)> {
        let mut out: Vec<_> = self.selected.iter().cloned().collect();
        out.sort();
        out
    }

    /// Number of selected features.
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// True when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

fn set_flag(
    layers: &mut LayerStore,
    layer: LayerId,
    id: &FeatureId,
    f: impl FnOnce(&mut crate::feature::DisplayState),
) -> Result<(), SelectionError> {
    let feature = layers
        .feature_mut(layer, id)
        .ok_or_else(|| SelectionError::NotFound { layer, id: id.clone() })?;
    f(&mut feature.state);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{feature::Feature, layer::VectorLayer};

    fn store() -> LayerStore {
        let mut layer = VectorLayer::new(1, "pts");
        for i in 0..3i64 {
            layer.insert(Feature::new(i, None)).expect("insert");
        }
        let mut store = LayerStore::new();
        store.add_layer(layer).expect("add");
        store
    }

    #[test]
    fn highlight_is_exclusive() {
        let mut layers = store();
        let mut sel = SelectionManager::new();
        sel.highlight(&mut layers, 1, &FeatureId::Num(0)).expect("h0");
        sel.highlight(&mut layers, 1, &FeatureId::Num(1)).expect("h1");

        let lit: Vec<_> = layers
            .layer(1)
            .expect("layer")
            .features()
            .filter(|f| f.state.highlighted)
            .map(|f| f.id.clone())
            .collect();
        assert_eq!(lit, vec![FeatureId::Num(1)]);
    }

    #[test]
    fn select_writes_through_and_clear_resets() {
        let mut layers = store();
        let mut sel = SelectionManager::new();
        assert!(sel.select(&mut layers, 1, &FeatureId::Num(2)).expect("select"));
        assert!(!sel.select(&mut layers, 1, &FeatureId::Num(2)).expect("select again"));
        assert!(layers.feature(1, &FeatureId::Num(2)).expect("f").state.selected);
        assert!(!sel.toggle(&mut layers, 1, &FeatureId::Num(2)).expect("toggle"));
        sel.select(&mut layers, 1, &FeatureId::Num(0)).expect("select 0");

        sel.clear_selection(&mut layers);
        assert!(sel.is_empty());
        assert!(layers.layer(1).expect("layer").features().all(|f| !f.state.selected));
    }

    #[test]
    fn missing_feature_is_reported() {
        let mut layers = store();
        let mut sel = SelectionManager::new();
        let err = sel.select(&mut layers, 1, &FeatureId::Num(99)).unwrap_err();
        assert_eq!(err, SelectionError::NotFound { layer: 1, id: FeatureId::Num(99) });
    }
}
