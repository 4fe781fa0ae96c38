//! Occlusion capsule instances and the registry of active capsules.

pub mod figure;
mod instance;
mod set;

pub use instance::{CachedCapsule, CapsuleVolume, OcclusionCapsule};
pub use set::{CapsuleId, CapsuleSet};
