//! # Realization Configuration
//!
//! Knobs for the instance manager

use crate::RealizationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Instance manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealizationConfig {
    /// Mirror told role subsumptions on inverses (r ⊑ s gives r⁻ ⊑ s⁻)
    pub uses_inverse_roles: bool,

    /// Drop anonymous and `internal:` individuals from results
    pub filter_internal_individuals: bool,

    /// Progress reporting
    pub progress: ProgressConfig,

    /// Resolve every pending identity edge right after seeding
    pub eager_same_as: bool,
}

/// Progress reporting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Emit a progress event every `log_every` steps (0 disables intermediate events)
    pub log_every: usize,
}

impl Default for RealizationConfig {
    fn default() -> Self {
        Self {
            uses_inverse_roles: false,
            filter_internal_individuals: true,
            progress: ProgressConfig::default(),
            eager_same_as: false,
        }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { log_every: 100 }
    }
}

impl RealizationConfig {
    pub fn from_json_str(json: &str) -> Result<Self, RealizationError> {
        serde_json::from_str(json).map_err(|e| RealizationError::Config(e.to_string()))
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, RealizationError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RealizationError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&contents)
    }
}
