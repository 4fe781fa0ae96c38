//! Shared geometry helpers.
//!
//! Bounding boxes and segment queries used by culling and cluster
//! assignment.

/// Axis-aligned boxes and closest-point queries.
pub mod aabb;
