use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Debug visualization toggles.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[schemars(title = "Debug", inline)]
#[serde(default)]
pub struct DebugOptions {
    /// Shade each pixel by the capsule count of its cell.
    #[schemars(title = "Debug Clusters")]
    pub debug_clusters: bool,
    /// Draw the selected capsules.
    #[schemars(title = "Show Capsules")]
    pub show_capsules: bool,
}
