//! Feature editing with grouped undo/redo and rule-based style resolution.
//!
//! # Examples
//!
//! In-memory editing with [`editor::session::EditorSession`]:
//! ```
//! use featedit::{
//!     editor::{Activatable, session::EditorSession},
//!     feature::{Feature, Geometry},
//!     layer::{LayerStore, VectorLayer},
//!     types::FeatureId,
//! };
//!
//! let mut layers = LayerStore::new();
//! layers.add_layer(VectorLayer::new(1, "sites")).expect("add layer");
//!
//! let mut session = EditorSession::new(layers);
//! session.activate();
//! session.start_operation().expect("start");
//! session
//!     .create_feature(1, Feature::new(7, Some(Geometry::point(0.0, 0.0))))
//!     .expect("create");
//! session.stop_operation().expect("stop");
//!
//! session.undo().expect("undo");
//! assert!(session.feature(1, &FeatureId::Num(7)).is_none());
//! session.redo().expect("redo");
//! assert!(session.feature(1, &FeatureId::Num(7)).is_some());
//! ```
//!
//! Runtime usage with a SQLite sink:
//! ```no_run
//! use featedit::{
//!     editor::session::EditorSession,
//!     feature::Feature,
//!     layer::{LayerStore, VectorLayer},
//!     runtime::handle::{EditorConfig, spawn_editor},
//!     submit::sqlite::SqliteEditSink,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let mut layers = LayerStore::new();
//! layers.add_layer(VectorLayer::new(1, "sites")).expect("add layer");
//! let sink = SqliteEditSink::open("edits.db").expect("open sqlite");
//! let handle = spawn_editor(EditorSession::new(layers), Some(Box::new(sink)), EditorConfig::default());
//!
//! handle.activate().await.expect("activate");
//! handle.start_operation().await.expect("start");
//! handle.create(1, Feature::new("a", None)).await.expect("create");
//! handle.stop_operation().await.expect("stop");
//! handle.process().await.expect("submit");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Recorded edits, operations and submission batches.
pub mod edit;
/// Editing session state machine and interactions.
pub mod editor;
/// Features, geometry and snapshots.
pub mod feature;
/// Undo/redo history.
pub mod history;
/// Layers, layer configuration and map context.
pub mod layer;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Fields, domains and property validation.
pub mod schema;
/// Selection and highlight coordination.
pub mod selection;
/// Style model and resolution.
pub mod style;
/// Backend submission of edit batches.
pub mod submit;
/// Shared primitive types and enums.
pub mod types;
/// Loose comparison and formatting of property values.
pub mod value;
