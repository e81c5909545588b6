//! Style rules, label rules, filters, and the per-feature resolver.

/// Attribute filters.
pub mod filter;
/// Style primitives and overlay configuration.
pub mod model;
/// Style resolution.
pub mod resolve;
/// Style and label rule lists.
pub mod rule;
/// Label template substitution.
pub mod template;
