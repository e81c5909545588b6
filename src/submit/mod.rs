pub mod sqlite;

use crate::edit::EditBatch;

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("backend rejected batch: {0}")]
    Rejected(String),
    #[error("{0}")]
    Message(String),
}

pub type SubmitResult<T> = Result<T, SubmitError>;

/// Backend that persists submitted edit batches.
///
/// A batch succeeds or fails as a whole. Implementations must not retry on
/// their own; the caller decides whether to resubmit.
pub trait EditSink: Send {
    fn submit(&mut self, batch: &EditBatch) -> SubmitResult<()>;
    fn flush(&mut self) -> SubmitResult<()> {
        Ok(())
    }
}
