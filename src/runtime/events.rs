//! Runtime event stream payloads.

use crate::types::{FeatureId, LayerId};

/// Events emitted from the single-writer editor loop.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    /// The session started accepting edits.
    Activated,
    /// The session stopped; uncommitted work was rolled back.
    Deactivated,
    /// An operation was closed and added to history.
    OperationCommitted {
        /// History cursor after the commit.
        edit_index: isize,
    },
    /// A feature was created inside the open operation.
    FeatureCreated {
        /// Owning layer.
        layer: LayerId,
        /// New feature id.
        id: FeatureId,
    },
    /// A feature's geometry or properties changed.
    FeatureUpdated {
        /// Owning layer.
        layer: LayerId,
        /// Updated feature id.
        id: FeatureId,
    },
    /// A feature was removed.
    FeatureDeleted {
        /// Former owning layer.
        layer: LayerId,
        /// Removed feature id.
        id: FeatureId,
    },
    /// One operation was undone.
    UndoApplied {
        /// History cursor after the undo.
        edit_index: isize,
    },
    /// One operation was redone.
    RedoApplied {
        /// History cursor after the redo.
        edit_index: isize,
    },
    /// Selection or highlight changed.
    SelectionChanged,
    /// A batch was accepted by the backend.
    Submitted {
        /// History cursor the batch covers.
        through_index: usize,
        /// Edits in the batch after deduplication.
        edits: usize,
    },
    /// A batch was rejected; history is unchanged.
    SubmitFailed {
        /// History cursor the batch covered.
        through_index: usize,
        /// Backend error text.
        reason: String,
    },
}
