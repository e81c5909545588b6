//! Edit history: grouped operations, cursor-based undo/redo, batching.

/// Operation log and undo/redo engine.
pub mod log;
