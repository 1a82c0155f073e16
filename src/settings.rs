//! Engine settings
//!
//! Tunables that aren't part of a sim config: GCD length, regeneration
//! cadence, batching and safety limits. Read from `raidsim.ron` next to the
//! working directory when present.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::Millis;

/// Engine-wide settings shared by every run in a batch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Global cooldown triggered by on-GCD spells
    pub gcd_ms: Millis,
    /// Period of the power regeneration tick
    pub regen_interval_ms: Millis,
    /// Iterations handed to one rayon task
    pub batch_size: usize,
    /// Hard cap on processed events per run
    pub max_events_per_run: u64,
    /// Directory holding `spells.ron` / `items.ron`
    pub data_dir: PathBuf,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            gcd_ms: 1_500,
            regen_interval_ms: 1_000,
            batch_size: 50,
            max_events_per_run: 2_000_000,
            data_dir: PathBuf::from("assets/config"),
        }
    }
}

impl EngineSettings {
    /// Get the path to the settings file
    fn settings_path() -> PathBuf {
        PathBuf::from("raidsim.ron")
    }

    /// Load settings from `raidsim.ron`, or return defaults if it doesn't exist
    pub fn load() -> Self {
        let path = Self::settings_path();
        if path.exists() {
            match Self::load_from(&path) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to load settings file: {}", e);
                    Self::default()
                }
            }
        } else {
            info!("No settings file found, using defaults");
            Self::default()
        }
    }

    /// Load and validate settings from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Self = ron::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.regen_interval_ms == 0 {
            return Err(ConfigError::Invalid("regen_interval_ms must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be positive".into()));
        }
        if self.max_events_per_run == 0 {
            return Err(ConfigError::Invalid("max_events_per_run must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let settings: EngineSettings = ron::from_str("(gcd_ms: 1000)").unwrap();
        assert_eq!(settings.gcd_ms, 1_000);
        assert_eq!(settings.regen_interval_ms, 1_000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let settings = EngineSettings {
            regen_interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }
}
