//! Edit records, operation groups, and the submission envelope.

use serde::{Deserialize, Serialize};

use crate::{
    feature::FeatureSnapshot,
    types::{EditKind, FeatureId, LayerId},
};

/// Version number for serialized [`EditBatch`] payloads.
pub const BATCH_FORMAT_VERSION: u16 = 1;

/// One recorded feature mutation. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Edit {
    /// Feature was added.
    Create {
        /// Owning layer.
        layer: LayerId,
        /// Feature id.
        id: FeatureId,
        /// State after creation.
        after: FeatureSnapshot,
    },
    /// Feature geometry or properties changed.
    Update {
        /// Owning layer.
        layer: LayerId,
        /// Feature id.
        id: FeatureId,
        /// State before the change.
        before: FeatureSnapshot,
        /// State after the change.
        after: FeatureSnapshot,
    },
    /// Feature was removed.
    Delete {
        /// Owning layer.
        layer: LayerId,
        /// Feature id.
        id: FeatureId,
        /// State before removal.
        before: FeatureSnapshot,
    },
}

impl Edit {
    /// Mutation kind.
    pub fn kind(&self) -> EditKind {
        match self {
            Self::Create { .. } => EditKind::Create,
            Self::Update { .. } => EditKind::Update,
            Self::Delete { .. } => EditKind::Delete,
        }
    }

    /// Owning layer.
    pub fn layer(&self) -> LayerId {
        match self {
            Self::Create { layer, .. } | Self::Update { layer, .. } | Self::Delete { layer, .. } => *layer,
        }
    }

    /// Feature id.
    pub fn feature_id(&self) -> &FeatureId {
        match self {
            Self::Create { id, .. } | Self::Update { id, .. } | Self::Delete { id, .. } => id,
        }
    }

    /// State before the mutation, `None` for a create.
    pub fn before(&self) -> Option<&FeatureSnapshot> {
        match self {
            Self::Create { .. } => None,
            Self::Update { before, .. } | Self::Delete { before, .. } => Some(before),
        }
    }

    /// State after the mutation, `None` for a delete.
    pub fn after(&self) -> Option<&FeatureSnapshot> {
        match self {
            Self::Create { after, .. } | Self::Update { after, .. } => Some(after),
            Self::Delete { .. } => None,
        }
    }

    /// Edit whose forward effect undoes this one.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Create { layer, id, after } => Self::Delete {
                layer: *layer,
                id: id.clone(),
                before: after.clone(),
            },
            Self::Update {
                layer,
                id,
                before,
                after,
            } => Self::Update {
                layer: *layer,
                id: id.clone(),
                before: after.clone(),
                after: before.clone(),
            },
            Self::Delete { layer, id, before } => Self::Create {
                layer: *layer,
                id: id.clone(),
                after: before.clone(),
            },
        }
    }
}

/// Edits made during one logical user action; undone and redone as a unit.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Operation {
    /// Edits in recorded order.
    pub edits: Vec<Edit>,
}

impl Operation {
    /// Empty operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// True when no edit was recorded.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

impl From<Edit> for Operation {
    fn from(edit: Edit) -> Self {
        Self { edits: vec![edit] }
    }
}

impl From<Vec<Edit>> for Operation {
    fn from(edits: Vec<Edit>) -> Self {
        Self { edits }
    }
}

/// Deduplicated set of edits sent to a backend in one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditBatch {
    /// Payload format version.
    pub format_version: u16,
    /// History cursor the batch covers, inclusive.
    pub through_index: usize,
    /// At most one edit per `(layer, feature id)`, in history order.
    pub edits: Vec<Edit>,
}

impl EditBatch {
    /// Constructs a batch using [`BATCH_FORMAT_VERSION`].
    pub fn new(through_index: usize, edits: Vec<Edit>) -> Self {
        Self {
            format_version: BATCH_FORMAT_VERSION,
            through_index,
            edits,
        }
    }

    /// Number of edits.
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// True when the batch carries nothing.
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}
