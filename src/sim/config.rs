//! Typed simulation configuration
//!
//! What one run needs to know: which spec, how long, and who takes part.
//! The headless JSON format converts into this; the worker protocol carries
//! it as-is.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::{ItemId, MetadataProvider, SpellId};
use crate::rotation::PriorityRotation;
use crate::settings::EngineSettings;
use crate::state::UnitKind;
use crate::Millis;

/// One unit taking part in the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterDef {
    pub name: String,
    pub kind: UnitKind,
    pub max_health: f64,
    #[serde(default)]
    pub max_power: f64,
    /// Power per second
    #[serde(default)]
    pub power_regen: f64,
    /// Percent
    #[serde(default)]
    pub crit_chance: f64,
    #[serde(default)]
    pub spells: Vec<SpellId>,
    #[serde(default)]
    pub items: Vec<ItemId>,
    /// Profile bundle ids, e.g. `spec-beast-mastery`
    #[serde(default)]
    pub profiles: Vec<String>,
    /// Built-in rotation name; `None` uses the spec default for players and
    /// pets and idles enemies
    #[serde(default)]
    pub rotation: Option<String>,
}

impl CharacterDef {
    pub fn new(name: impl Into<String>, kind: UnitKind, max_health: f64) -> Self {
        Self {
            name: name.into(),
            kind,
            max_health,
            max_power: 0.0,
            power_regen: 0.0,
            crit_chance: 0.0,
            spells: Vec::new(),
            items: Vec::new(),
            profiles: Vec::new(),
            rotation: None,
        }
    }

    pub fn with_power(mut self, max: f64, regen_per_second: f64) -> Self {
        self.max_power = max;
        self.power_regen = regen_per_second;
        self
    }

    pub fn with_crit(mut self, crit_chance: f64) -> Self {
        self.crit_chance = crit_chance;
        self
    }

    pub fn with_spells(mut self, spells: impl IntoIterator<Item = u32>) -> Self {
        self.spells.extend(spells.into_iter().map(SpellId));
        self
    }

    pub fn with_rotation(mut self, rotation: impl Into<String>) -> Self {
        self.rotation = Some(rotation.into());
        self
    }

    /// Max health and crit after equipped items. Unknown items are skipped.
    pub fn equipped_stats(&self, data: &dyn MetadataProvider) -> (f64, f64) {
        self.items
            .iter()
            .filter_map(|id| match data.load_item(*id) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("{}: {}", self.name, e);
                    None
                }
            })
            .fold((self.max_health, self.crit_chance), |(health, crit), item| {
                (health + item.stamina * 10.0, crit + item.crit_percent)
            })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Spec module id, e.g. `beast-mastery`
    pub spec: String,
    /// Encounter length
    pub duration: Millis,
    pub characters: Vec<CharacterDef>,
    /// Replaces the player's built-in rotation
    #[serde(default)]
    pub rotation: Option<PriorityRotation>,
    #[serde(default)]
    pub settings: EngineSettings,
}

impl SimulationConfig {
    pub fn new(spec: impl Into<String>, duration: Millis, characters: Vec<CharacterDef>) -> Self {
        Self {
            spec: spec.into(),
            duration,
            characters,
            rotation: None,
            settings: EngineSettings::default(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.duration == 0 {
            return Err("duration must be positive".to_string());
        }
        if !self.characters.iter().any(|c| c.kind == UnitKind::Player) {
            return Err("at least one player character is required".to_string());
        }
        if !self.characters.iter().any(|c| c.kind == UnitKind::Enemy) {
            return Err("at least one enemy is required".to_string());
        }
        for c in &self.characters {
            if c.max_health <= 0.0 {
                return Err(format!("{}: max_health must be positive", c.name));
            }
            if !(0.0..=100.0).contains(&c.crit_chance) {
                return Err(format!("{}: crit_chance must be within 0-100", c.name));
            }
        }
        self.settings.validate().map_err(|e| e.to_string())
    }
}
