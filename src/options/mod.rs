//! Occlusion options with TOML preset support.
//!
//! Every tweakable setting (grid shape, selection budget, effect strength,
//! debug toggles) lives here. Options serialize to/from TOML for presets
//! stored in `presets/`. Out-of-range values are clamped, never rejected;
//! the pipeline always runs on [`Options::clamped`].

mod clustering;
mod debug;
mod effect;
mod selection;

use std::path::Path;

pub use clustering::{ClusteringOptions, MAX_HEADROOM, MIN_HEADROOM};
pub use debug::DebugOptions;
pub use effect::{EffectOptions, MAX_INTENSITY};
pub use selection::{
    SelectionOptions, MAX_CAPSULES, MAX_RANGE_MULTIPLIER, MIN_CAPSULES,
    MIN_RANGE_MULTIPLIER,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::OcclusionError;

/// Top-level options container. All sub-structs use `#[serde(default)]` so
/// partial TOML files (e.g. only overriding `[selection]`) work correctly.
#[derive(
    Debug, Clone, Serialize, Deserialize, PartialEq, Default, JsonSchema,
)]
#[serde(default)]
pub struct Options {
    /// Cluster grid shape and assignment strategy.
    pub clustering: ClusteringOptions,
    /// Capsule budget, culling and sorting.
    pub selection: SelectionOptions,
    /// Effect strength.
    pub effect: EffectOptions,
    /// Debug visualization options.
    pub debug: DebugOptions,
}

impl Options {
    /// Generate JSON Schema describing the UI-exposed options.
    #[must_use]
    pub fn json_schema() -> schemars::Schema {
        schemars::schema_for!(Options)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    pub fn load(path: &Path) -> Result<Self, OcclusionError> {
        let content =
            std::fs::read_to_string(path).map_err(OcclusionError::Io)?;
        Self::from_toml(&content)
    }

    /// Parse options from TOML text. Missing fields use defaults.
    pub fn from_toml(content: &str) -> Result<Self, OcclusionError> {
        toml::from_str(content)
            .map_err(|e| OcclusionError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    pub fn save(&self, path: &Path) -> Result<(), OcclusionError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OcclusionError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(OcclusionError::Io)?;
        }
        std::fs::write(path, content).map_err(OcclusionError::Io)
    }

    /// List available preset names (TOML file stems) in a directory.
    #[must_use]
    pub fn list_presets(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    if let Some(stem) =
                        path.file_stem().and_then(|s| s.to_str())
                    {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        names
    }

    /// Copy with every value clamped into its valid range.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let mut out = self.clone();
        out.clustering.clamp();
        out.selection.clamp();
        out.effect.clamp();
        out
    }
}
