use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::select::SelectionSettings;

/// Smallest capsule budget.
pub const MIN_CAPSULES: u32 = 16;
/// Largest capsule budget (the effective ceiling is one lower).
pub const MAX_CAPSULES: u32 = 512;
/// Smallest range multiplier.
pub const MIN_RANGE_MULTIPLIER: f32 = 1.0;
/// Largest range multiplier.
pub const MAX_RANGE_MULTIPLIER: f32 = 8.0;

/// Per-frame capsule selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Selection", inline)]
#[serde(default)]
pub struct SelectionOptions {
    /// Most capsules processed per frame.
    #[schemars(title = "Max Capsules", range(min = 16, max = 512))]
    pub max_capsules: u32,
    /// Influence radius as a multiple of the capsule radius, on top of it.
    #[schemars(title = "Range Multiplier", range(min = 1.0, max = 8.0), extend("step" = 0.1))]
    pub range_multiplier: f32,
    /// Skip capsules outside the view frustum.
    #[schemars(title = "Cull")]
    pub cull: bool,
    /// Prefer capsules nearest the camera.
    #[schemars(title = "Sort")]
    pub sort: bool,
    /// Run selection, assignment and merging on the rayon pool.
    #[schemars(title = "Parallel")]
    pub parallel: bool,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            max_capsules: 256,
            range_multiplier: 4.0,
            cull: true,
            sort: true,
            parallel: true,
        }
    }
}

impl SelectionOptions {
    /// Selector settings for these options.
    #[must_use]
    pub fn settings(&self) -> SelectionSettings {
        SelectionSettings {
            max_count: self.max_capsules as usize,
            range_multiplier: self.range_multiplier,
            cull: self.cull,
            sort: self.sort,
        }
    }

    pub(super) fn clamp(&mut self) {
        self.max_capsules = self.max_capsules.clamp(MIN_CAPSULES, MAX_CAPSULES);
        self.range_multiplier = if self.range_multiplier.is_nan() {
            MIN_RANGE_MULTIPLIER
        } else {
            self.range_multiplier
                .clamp(MIN_RANGE_MULTIPLIER, MAX_RANGE_MULTIPLIER)
        };
    }
}
