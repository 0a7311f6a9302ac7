//! Player configuration.
//!
//! Startup defaults for the controller, loadable from a JSON file. Runtime
//! state (playlist contents, selection) is never persisted here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::playlist::Repeat;
use crate::{Result, WavedeckError};

/// Startup defaults for a [`crate::player::Player`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Initial engine volume in [0, 1]; clamped on apply.
    pub volume: f32,
    /// Start with shuffle enabled.
    pub shuffle: bool,
    /// Initial repeat policy.
    pub repeat: Repeat,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            shuffle: false,
            repeat: Repeat::None,
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| WavedeckError::Config(e.to_string()))
    }
}
