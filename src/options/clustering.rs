use glam::UVec3;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::cluster::builder::{BuildSettings, ClusteringMethod};
use crate::cluster::grid::clamp_resolution;

/// Smallest record pool multiplier per cell.
pub const MIN_HEADROOM: u32 = 4;
/// Largest record pool multiplier per cell.
pub const MAX_HEADROOM: u32 = 32;

/// Cluster grid shape and assignment strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Clustering", inline)]
#[serde(default)]
pub struct ClusteringOptions {
    /// Cells per axis (screen X, screen Y, depth).
    #[schemars(title = "Resolution")]
    pub resolution: [u32; 3],
    /// Record pool size as a multiple of the cell count.
    #[schemars(title = "Headroom", range(min = 4, max = 32))]
    pub headroom: u32,
    /// Farthest depth covered by the grid.
    #[schemars(title = "Max Range", range(min = 0.0), extend("step" = 1.0))]
    pub max_range: f32,
    /// Capsule-to-cell assignment strategy.
    #[schemars(title = "Method")]
    pub method: ClusteringMethod,
    /// Cover every tile a capsule touches, not only tiles whose centre it
    /// covers.
    #[schemars(title = "Conservative")]
    pub conservative: bool,
    /// Rebuild clusters every frame. When off the last clusters are kept.
    #[schemars(title = "Update Clusters")]
    pub update_clusters: bool,
}

impl Default for ClusteringOptions {
    fn default() -> Self {
        Self {
            resolution: [64, 64, 32],
            headroom: 16,
            max_range: 50.0,
            method: ClusteringMethod::Rasterizer,
            conservative: true,
            update_clusters: true,
        }
    }
}

impl ClusteringOptions {
    /// Resolution as a vector.
    #[must_use]
    pub fn resolution(&self) -> UVec3 {
        UVec3::from_array(self.resolution)
    }

    /// Builder settings for these options.
    #[must_use]
    pub fn build_settings(&self, parallel: bool) -> BuildSettings {
        BuildSettings {
            method: self.method,
            conservative: self.conservative,
            parallel,
        }
    }

    pub(super) fn clamp(&mut self) {
        self.resolution = clamp_resolution(self.resolution()).to_array();
        self.headroom = self.headroom.clamp(MIN_HEADROOM, MAX_HEADROOM);
        self.max_range = if self.max_range.is_nan() {
            0.0
        } else {
            self.max_range.max(0.0)
        };
    }
}
