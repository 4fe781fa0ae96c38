//! Camera inputs for the occlusion pipeline.
//!
//! Provides a simple perspective camera, the per-frame camera snapshot the
//! pipeline consumes, and frustum plane extraction for culling.

/// Core camera struct and the per-frame camera snapshot.
pub mod core;
/// View frustum extraction and intersection tests.
pub mod frustum;

pub use self::core::{Camera, CameraFrame};
pub use self::frustum::{Frustum, Plane};
