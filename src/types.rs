//! Shared primitive IDs and enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Layer identifier, unique within a [`crate::layer::LayerStore`].
pub type LayerId = u32;

/// Stable feature identifier, unique within its owning layer.
///
/// Backends hand out either numeric object ids or string keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    /// Numeric object id.
    Num(i64),
    /// String key.
    Str(String),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num(n) => write!(f, "{n}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        Self::Num(value)
    }
}

impl From<i32> for FeatureId {
    fn from(value: i32) -> Self {
        Self::Num(i64::from(value))
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Kind of mutation an [`crate::edit::Edit`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditKind {
    /// Feature was added to its layer.
    Create,
    /// Feature geometry or properties changed.
    Update,
    /// Feature was removed from its layer.
    Delete,
}

/// Geometry type bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    /// Single position.
    Point,
    /// Open polyline.
    LineString,
    /// Closed ring.
    Polygon,
}
