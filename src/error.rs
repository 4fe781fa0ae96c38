//! Crate-level error types.

use std::fmt;

/// Errors produced by the capsule-occlusion crate.
///
/// The per-frame path never fails; these only surface from option presets
/// and the demo binary.
#[derive(Debug)]
pub enum OcclusionError {
    /// Generic I/O failure.
    Io(std::io::Error),
    /// TOML options parsing/serialization failure.
    OptionsParse(String),
}

impl fmt::Display for OcclusionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::OptionsParse(msg) => {
                write!(f, "options parse error: {msg}")
            }
        }
    }
}

impl std::error::Error for OcclusionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::OptionsParse(_) => None,
        }
    }
}

impl From<std::io::Error> for OcclusionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
