//! JSON configuration parsing for headless mode
//!
//! Parses JSON sim configurations and converts them to the engine's
//! [`SimulationConfig`].

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::rotation::PriorityRotation;
use crate::settings::EngineSettings;
use crate::sim::config::{CharacterDef, SimulationConfig};
use crate::specs;

/// Headless sim configuration loaded from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadlessSimConfig {
    /// Spec module id (default: "beast-mastery")
    #[serde(default = "default_spec")]
    pub spec: String,
    /// Encounter length in seconds (default: 300)
    #[serde(default = "default_duration")]
    pub duration_secs: f64,
    /// Everyone taking part: players, pets and enemies
    pub characters: Vec<CharacterDef>,
    /// Custom priority list replacing the player's built-in rotation
    #[serde(default)]
    pub rotation: Option<PriorityRotation>,
    /// Number of iterations to run (default: 1)
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Seed of the first iteration; iteration `i` uses `seed + i`
    #[serde(default)]
    pub seed: u64,
    /// Engine settings; `raidsim.ron` or defaults when absent
    #[serde(default)]
    pub settings: Option<EngineSettings>,
    /// Where to write the batch response JSON (optional)
    #[serde(default)]
    pub output_path: Option<String>,
    /// Where to write the first iteration's combat log JSON (optional)
    #[serde(default)]
    pub events_path: Option<String>,
}

fn default_spec() -> String {
    "beast-mastery".to_string()
}

fn default_duration() -> f64 {
    300.0
}

fn default_iterations() -> u32 {
    1
}

impl HeadlessSimConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, String> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, String> {
        let config: HeadlessSimConfig =
            serde_json::from_str(json).map_err(|e| format!("Failed to parse JSON: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if specs::lookup(&self.spec).is_none() {
            let known: Vec<String> = specs::all().iter().map(|s| s.id().to_string()).collect();
            return Err(format!(
                "Unknown spec: '{}'. Valid specs: {}",
                self.spec,
                known.join(", ")
            ));
        }
        if !self.duration_secs.is_finite() || self.duration_secs <= 0.0 {
            return Err("durationSecs must be positive".to_string());
        }
        if self.iterations == 0 {
            return Err("iterations must be at least 1".to_string());
        }
        if let Some(settings) = &self.settings {
            settings.validate().map_err(|e| e.to_string())?;
        }
        // Character checks live with the engine config
        self.to_sim_config(EngineSettings::default()).validate()
    }

    /// Convert to the engine's config format, using `settings` unless the
    /// file carries its own
    pub fn to_sim_config(&self, settings: EngineSettings) -> SimulationConfig {
        SimulationConfig {
            spec: self.spec.clone(),
            duration: (self.duration_secs * 1000.0).round() as u64,
            characters: self.characters.clone(),
            rotation: self.rotation.clone(),
            settings: self.settings.clone().unwrap_or(settings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UnitKind;

    const MINIMAL: &str = r#"{
        "characters": [
            { "name": "Hunter", "kind": "Player", "maxHealth": 100000, "spells": [193455] },
            { "name": "Dummy", "kind": "Enemy", "maxHealth": 1000000 }
        ]
    }"#;

    #[test]
    fn test_defaults_applied() {
        let config = HeadlessSimConfig::from_json(MINIMAL).unwrap();
        assert_eq!(config.spec, "beast-mastery");
        assert_eq!(config.duration_secs, 300.0);
        assert_eq!(config.iterations, 1);
        assert_eq!(config.seed, 0);
        assert!(config.output_path.is_none());

        let sim = config.to_sim_config(EngineSettings::default());
        assert_eq!(sim.duration, 300_000);
        assert_eq!(sim.characters[0].kind, UnitKind::Player);
        assert_eq!(sim.characters[0].spells.len(), 1);
    }

    #[test]
    fn test_fractional_duration_converts_to_millis() {
        let json = MINIMAL.replacen('{', r#"{ "durationSecs": 2.5,"#, 1);
        let config = HeadlessSimConfig::from_json(&json).unwrap();
        assert_eq!(config.to_sim_config(EngineSettings::default()).duration, 2_500);
    }

    #[test]
    fn test_unknown_spec_rejected() {
        let json = MINIMAL.replacen('{', r#"{ "spec": "arcane","#, 1);
        let err = HeadlessSimConfig::from_json(&json).unwrap_err();
        assert!(err.contains("Unknown spec"));
        assert!(err.contains("beast-mastery"));
    }

    #[test]
    fn test_missing_enemy_rejected() {
        let json = r#"{ "characters": [ { "name": "Hunter", "kind": "Player", "maxHealth": 1 } ] }"#;
        assert!(HeadlessSimConfig::from_json(json).unwrap_err().contains("enemy"));
    }

    #[test]
    fn test_file_settings_win() {
        let json = MINIMAL.replacen('{', r#"{ "settings": { "gcd_ms": 1000 },"#, 1);
        let config = HeadlessSimConfig::from_json(&json).unwrap();
        let sim = config.to_sim_config(EngineSettings {
            gcd_ms: 750,
            ..Default::default()
        });
        assert_eq!(sim.settings.gcd_ms, 1_000);
        assert_eq!(sim.settings.batch_size, 50);
    }
}
