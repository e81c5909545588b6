//! Editing session state machine and widget capabilities.

use crate::{
    feature::Geometry,
    layer::MapContext,
    types::{FeatureId, GeometryKind, LayerId},
};

/// Editor session and its state machine.
pub mod session;

/// Widgets that can be switched on and off.
pub trait Activatable {
    /// Starts listening for interactions.
    fn activate(&mut self);
    /// Stops, cancelling anything in progress without committing it.
    fn deactivate(&mut self);
    /// Current activation.
    fn is_active(&self) -> bool;
}

/// Widgets that read viewport state from a map.
pub trait MapBound {
    /// Binds to `map`, replacing any previous binding.
    fn attach(&mut self, map: MapContext);
    /// Current binding.
    fn map(&self) -> Option<&MapContext>;
}

/// Geometry interaction currently driving the editor.
#[derive(Debug, Clone, PartialEq)]
pub enum Interaction {
    /// Sketching a new feature.
    Draw {
        /// Target layer.
        layer: LayerId,
        /// Geometry type being drawn.
        kind: GeometryKind,
        /// Vertices placed so far.
        sketch: Vec<[f64; 2]>,
    },
    /// Reshaping an existing feature.
    Modify {
        /// Layer of the feature.
        layer: LayerId,
        /// Feature being modified.
        id: FeatureId,
    },
    /// Moving an existing feature.
    Translate {
        /// Layer of the feature.
        layer: LayerId,
        /// Feature being moved.
        id: FeatureId,
    },
}

impl Interaction {
    /// Vertices needed before a sketch of `kind` can be finished.
    pub fn min_vertices(kind: GeometryKind) -> usize {
        match kind {
            GeometryKind::Point => 1,
            GeometryKind::LineString => 2,
            GeometryKind::Polygon => 3,
        }
    }
}

/// Shifts every vertex of `geometry` by `(dx, dy)`.
pub fn translated(geometry: &Geometry, dx: f64, dy: f64) -> Geometry {
    Geometry {
        kind: geometry.kind,
        coordinates: geometry.coordinates.iter().map(|[x, y]| [x + dx, y + dy]).collect(),
    }
}
