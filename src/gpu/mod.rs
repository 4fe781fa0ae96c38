//! GPU upload of selected capsules and merged clusters.
//!
//! The CPU pipeline produces everything; this module only mirrors it into
//! wgpu buffers for a shading pass to read.

/// Occlusion uniform, storage buffers and their bind group.
pub mod cluster_buffers;
/// Growable GPU buffers with automatic reallocation.
pub mod dynamic_buffer;

pub use cluster_buffers::{ClusterGpuBuffers, OcclusionUniform};
