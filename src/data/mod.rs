//! Static game data
//!
//! Spell and item definitions are loaded once from RON files under
//! `assets/config/` and handed to the engine as immutable `Arc`s. The engine
//! never mutates them and never caches them past a single run; loading and
//! caching are the data pipeline's job.
//!
//! ## Usage
//! ```ignore
//! let data = InMemoryMetadata::load_from_dir("assets/config")?;
//! let kill_command = data.load_spell(SpellId(34026))?;
//! println!("Kill Command cooldown: {}ms", kill_command.cooldown);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, SimError};
use crate::Millis;

/// Static spell identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpellId(pub u32);

impl fmt::Display for SpellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Static item identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Magic school of a spell. Serialized into combat-log events as its bitmask.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpellSchool {
    #[default]
    Physical,
    Holy,
    Fire,
    Nature,
    Frost,
    Shadow,
    Arcane,
}

impl SpellSchool {
    pub fn mask(self) -> u8 {
        match self {
            SpellSchool::Physical => 0x01,
            SpellSchool::Holy => 0x02,
            SpellSchool::Fire => 0x04,
            SpellSchool::Nature => 0x08,
            SpellSchool::Frost => 0x10,
            SpellSchool::Shadow => 0x20,
            SpellSchool::Arcane => 0x40,
        }
    }
}

/// How re-applying an active aura changes its duration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshBehavior {
    /// Replace the remaining duration with the full duration
    #[default]
    Duration,
    /// Carry over up to 30% of the base duration from the remaining time
    Pandemic,
}

/// What a periodic aura does on each tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PeriodicKind {
    Damage,
    Heal,
    /// Restores power to the aura's holder
    Energize,
}

/// Periodic tick configuration of an aura.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PeriodicEffect {
    /// Time between ticks
    pub period: Millis,
    /// Amount per tick
    pub amount: f64,
    pub kind: PeriodicKind,
    /// Tick once immediately when the aura is applied
    #[serde(default)]
    pub tick_on_application: bool,
}

/// Aura definition carried by the spell that *is* the aura.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuraInfo {
    /// Base duration (0 = lasts until removed)
    #[serde(default)]
    pub duration: Millis,
    #[serde(default = "default_one")]
    pub max_stacks: u32,
    #[serde(default)]
    pub refresh: RefreshBehavior,
    #[serde(default)]
    pub periodic: Option<PeriodicEffect>,
}

impl Default for AuraInfo {
    /// Permanent, single-stack, no ticks.
    fn default() -> Self {
        Self {
            duration: 0,
            max_stacks: 1,
            refresh: RefreshBehavior::Duration,
            periodic: None,
        }
    }
}

/// One effect resolved when a spell's cast succeeds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpellEffect {
    /// Direct damage to the target (or a projectile if the spell travels)
    Damage { amount: f64 },
    /// Direct heal (target, or caster when there is no target)
    Heal { amount: f64 },
    /// Apply the aura defined on `spell`
    ApplyAura {
        spell: SpellId,
        #[serde(default)]
        target_self: bool,
    },
    /// Restore power to the caster
    Energize { amount: f64 },
}

/// Immutable static spell definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpellInfo {
    pub id: SpellId,
    pub name: String,

    // === Casting ===
    #[serde(default)]
    pub school: SpellSchool,
    /// Cast time (0 = instant)
    #[serde(default)]
    pub cast_time: Millis,
    #[serde(default = "default_true")]
    pub triggers_gcd: bool,
    /// Resource cost
    #[serde(default)]
    pub cost: f64,
    #[serde(default)]
    pub requires_target: bool,

    // === Cooldowns ===
    #[serde(default)]
    pub cooldown: Millis,
    /// 1 = no charge system
    #[serde(default = "default_one")]
    pub max_charges: u32,
    #[serde(default)]
    pub charge_recovery: Millis,

    // === Effects ===
    /// Projectile travel time (None = instant effect)
    #[serde(default)]
    pub travel_time: Option<Millis>,
    /// Extra crit chance in percent
    #[serde(default)]
    pub crit_bonus: f64,
    #[serde(default)]
    pub effects: Vec<SpellEffect>,
    /// Present when this spell is an aura
    #[serde(default)]
    pub aura: Option<AuraInfo>,
}

fn default_true() -> bool {
    true
}

fn default_one() -> u32 {
    1
}

impl SpellInfo {
    /// Instant, free, on-GCD spell with no effects.
    pub fn new(id: u32, name: impl Into<String>) -> Self {
        Self {
            id: SpellId(id),
            name: name.into(),
            school: SpellSchool::Physical,
            cast_time: 0,
            triggers_gcd: true,
            cost: 0.0,
            requires_target: false,
            cooldown: 0,
            max_charges: 1,
            charge_recovery: 0,
            travel_time: None,
            crit_bonus: 0.0,
            effects: Vec::new(),
            aura: None,
        }
    }

    pub fn with_school(mut self, school: SpellSchool) -> Self {
        self.school = school;
        self
    }

    pub fn with_cast_time(mut self, cast_time: Millis) -> Self {
        self.cast_time = cast_time;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Millis) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_charges(mut self, max_charges: u32, recovery: Millis) -> Self {
        self.max_charges = max_charges.max(1);
        self.charge_recovery = recovery;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_target(mut self) -> Self {
        self.requires_target = true;
        self
    }

    pub fn off_gcd(mut self) -> Self {
        self.triggers_gcd = false;
        self
    }

    pub fn with_travel_time(mut self, travel_time: Millis) -> Self {
        self.travel_time = Some(travel_time);
        self
    }

    pub fn with_effect(mut self, effect: SpellEffect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_aura(mut self, aura: AuraInfo) -> Self {
        self.aura = Some(aura);
        self
    }

    /// Whether this spell uses the charge system
    pub fn has_charges(&self) -> bool {
        self.max_charges > 1
    }

    pub fn is_damage(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, SpellEffect::Damage { .. }))
    }
}

/// Immutable static item definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub item_level: u32,
    /// Each point adds 10 maximum health
    #[serde(default)]
    pub stamina: f64,
    /// Flat crit chance in percent
    #[serde(default)]
    pub crit_percent: f64,
}

/// Source of static definitions for a run.
pub trait MetadataProvider: Send + Sync {
    fn load_spell(&self, id: SpellId) -> Result<Arc<SpellInfo>, SimError>;
    fn load_item(&self, id: ItemId) -> Result<Arc<ItemInfo>, SimError>;
}

/// Root structure for spells.ron
#[derive(Debug, Serialize, Deserialize)]
pub struct SpellsConfig {
    pub spells: Vec<SpellInfo>,
}

/// Root structure for items.ron
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ItemsConfig {
    #[serde(default)]
    pub items: Vec<ItemInfo>,
}

/// In-memory metadata provider backed by hash maps.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMetadata {
    spells: HashMap<SpellId, Arc<SpellInfo>>,
    items: HashMap<ItemId, Arc<ItemInfo>>,
}

impl InMemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_spell(&mut self, info: SpellInfo) {
        self.spells.insert(info.id, Arc::new(info));
    }

    pub fn insert_item(&mut self, info: ItemInfo) {
        self.items.insert(info.id, Arc::new(info));
    }

    pub fn with_spell(mut self, info: SpellInfo) -> Self {
        self.insert_spell(info);
        self
    }

    pub fn with_item(mut self, info: ItemInfo) -> Self {
        self.insert_item(info);
        self
    }

    pub fn spell_count(&self) -> usize {
        self.spells.len()
    }

    pub fn spell_ids(&self) -> impl Iterator<Item = &SpellId> {
        self.spells.keys()
    }

    /// Parse spell and item definitions from RON text.
    pub fn from_ron(spells_ron: &str, items_ron: Option<&str>) -> Result<Self, ConfigError> {
        let spells: SpellsConfig = ron::from_str(spells_ron)?;
        let items: ItemsConfig = match items_ron {
            Some(text) => ron::from_str(text)?,
            None => ItemsConfig::default(),
        };

        let mut data = Self::new();
        for spell in spells.spells {
            data.insert_spell(spell);
        }
        for item in items.items {
            data.insert_item(item);
        }

        data.validate().map_err(|missing| {
            ConfigError::Invalid(format!("spells reference undefined auras: {:?}", missing))
        })?;
        Ok(data)
    }

    /// Load `spells.ron` (required) and `items.ron` (optional) from a directory.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let spells_path = dir.join("spells.ron");
        let items_path = dir.join("items.ron");

        let spells = std::fs::read_to_string(&spells_path).map_err(|source| ConfigError::Io {
            path: spells_path.clone(),
            source,
        })?;
        let items = if items_path.exists() {
            Some(
                std::fs::read_to_string(&items_path).map_err(|source| ConfigError::Io {
                    path: items_path.clone(),
                    source,
                })?,
            )
        } else {
            None
        };

        let data = Self::from_ron(&spells, items.as_deref())?;
        info!(
            "Loaded {} spell and {} item definitions from {}",
            data.spells.len(),
            data.items.len(),
            dir.display()
        );
        Ok(data)
    }

    /// Check every `ApplyAura` effect points at a spell with an aura definition.
    pub fn validate(&self) -> Result<(), Vec<SpellId>> {
        let mut missing: Vec<SpellId> = self
            .spells
            .values()
            .flat_map(|spell| spell.effects.iter())
            .filter_map(|effect| match effect {
                SpellEffect::ApplyAura { spell, .. } => Some(*spell),
                _ => None,
            })
            .filter(|aura| {
                self.spells
                    .get(aura)
                    .map(|info| info.aura.is_none())
                    .unwrap_or(true)
            })
            .collect();
        missing.sort();
        missing.dedup();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(missing)
        }
    }
}

impl MetadataProvider for InMemoryMetadata {
    fn load_spell(&self, id: SpellId) -> Result<Arc<SpellInfo>, SimError> {
        self.spells
            .get(&id)
            .cloned()
            .ok_or(SimError::SpellInfoNotFound(id))
    }

    fn load_item(&self, id: ItemId) -> Result<Arc<ItemInfo>, SimError> {
        self.items.get(&id).cloned().ok_or(SimError::ItemNotFound(id))
    }
}
