use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Upper bound of [`EffectOptions::intensity`].
pub const MAX_INTENSITY: f32 = 100.0;

/// Strength of the shading effect that consumes the clusters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[schemars(title = "Effect", inline)]
#[serde(default)]
pub struct EffectOptions {
    /// Occlusion strength.
    #[schemars(title = "Intensity", range(min = 0.0, max = 100.0), extend("step" = 0.5))]
    pub intensity: f32,
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self { intensity: 10.0 }
    }
}

impl EffectOptions {
    pub(super) fn clamp(&mut self) {
        self.intensity = if self.intensity.is_nan() {
            0.0
        } else {
            self.intensity.clamp(0.0, MAX_INTENSITY)
        };
    }
}
