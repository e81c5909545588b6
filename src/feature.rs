//! Feature record, geometry handle, display state, and snapshot types.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{FeatureId, GeometryKind, LayerId};

/// Loosely-typed attribute bag. Key order is irrelevant.
pub type Properties = HashMap<String, Value>;

/// Axis-aligned bounding box `[min_x, min_y, max_x, max_y]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    /// Minimum x.
    pub min_x: f64,
    /// Minimum y.
    pub min_y: f64,
    /// Maximum x.
    pub max_x: f64,
    /// Maximum y.
    pub max_y: f64,
}

/// Opaque geometry handle. Only kind and extent are ever queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// Geometry type.
    pub kind: GeometryKind,
    /// Vertex list in map units.
    pub coordinates: Vec<[f64; 2]>,
}

impl Geometry {
    /// Single point geometry.
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            kind: GeometryKind::Point,
            coordinates: vec![[x, y]],
        }
    }

    /// Returns the geometry type.
    pub fn kind(&self) -> GeometryKind {
        self.kind
    }

    /// Bounding box over all finite vertices, `None` when there are none.
    pub fn extent(&self) -> Option<Extent> {
        let mut out: Option<Extent> = None;
        for [x, y] in self.coordinates.iter().copied() {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            out = Some(match out {
                None => Extent {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                },
                Some(e) => Extent {
                    min_x: e.min_x.min(x),
                    min_y: e.min_y.min(y),
                    max_x: e.max_x.max(x),
                    max_y: e.max_y.max(y),
                },
            });
        }
        out
    }
}

/// Transient display flags consumed by style resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayState {
    /// Feature is part of the current selection.
    pub selected: bool,
    /// Feature is under the pointer or otherwise emphasized.
    pub highlighted: bool,
    /// Feature must not be drawn.
    pub hidden: bool,
}

/// Geographic entity owned by exactly one layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Stable identifier within the owning layer.
    pub id: FeatureId,
    /// Geometry, if any.
    pub geometry: Option<Geometry>,
    /// Attribute values.
    pub properties: Properties,
    /// Display flags. Never part of edit history.
    #[serde(skip)]
    pub state: DisplayState,
    /// Back-reference to the owning layer, set on insertion.
    #[serde(skip)]
    pub layer: Option<LayerId>,
}

impl Feature {
    /// New feature with no properties.
    pub fn new(id: impl Into<FeatureId>, geometry: Option<Geometry>) -> Self {
        Self {
            id: id.into(),
            geometry,
            properties: Properties::new(),
            state: DisplayState::default(),
            layer: None,
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Raw property value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Deep copy of the persistent part of this feature.
    pub fn snapshot(&self) -> FeatureSnapshot {
        FeatureSnapshot {
            geometry: self.geometry.clone(),
            properties: self.properties.clone(),
        }
    }
}

/// Owned copy of a feature's geometry and properties.
///
/// Snapshots never alias the live feature, so history stays intact no matter
/// what happens to the feature afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    /// Geometry at capture time.
    pub geometry: Option<Geometry>,
    /// Properties at capture time.
    pub properties: Properties,
}

impl FeatureSnapshot {
    /// Overwrites geometry and properties of `feature` with this snapshot.
    pub fn apply_to(&self, feature: &mut Feature) {
        feature.geometry = self.geometry.clone();
        feature.properties = self.properties.clone();
    }

    /// Materializes a fresh feature carrying this snapshot.
    pub fn to_feature(&self, id: FeatureId) -> Feature {
        Feature {
            id,
            geometry: self.geometry.clone(),
            properties: self.properties.clone(),
            state: DisplayState::default(),
            layer: None,
        }
    }
}
