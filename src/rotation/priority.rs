//! Data-driven priority rotation
//!
//! An ordered list of spells, each with conditions. Evaluation casts the first
//! entry whose conditions all hold and whose cast validates. Lists are plain
//! JSON so sim configs can carry their own rotation:
//!
//! ```json
//! {
//!   "name": "bm-st",
//!   "entries": [
//!     { "spell": 217200, "conditions": [{ "type": "chargesAtLeast", "spell": 217200, "charges": 2 }] },
//!     { "spell": 34026 },
//!     { "spell": 193455, "conditions": [{ "type": "powerAtLeast", "amount": 65.0 }] }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::{Rotation, RotationContext, WakeCondition};
use crate::data::SpellId;
use crate::error::{ConfigError, SimError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RotationCondition {
    SpellReady { spell: SpellId },
    PowerAtLeast { amount: f64 },
    /// Aura absent on the caster, or on the target with `on_target`
    AuraMissing {
        aura: SpellId,
        #[serde(default)]
        on_target: bool,
    },
    /// Fewer than `stacks` stacks on the caster (missing counts as 0)
    AuraStacksBelow { aura: SpellId, stacks: u32 },
    ChargesAtLeast { spell: SpellId, charges: u32 },
    /// Target health fraction in `[0, 1]`
    TargetHealthBelow { pct: f64 },
}

impl RotationCondition {
    pub fn holds(&self, ctx: &RotationContext<'_>) -> bool {
        let Ok(me) = ctx.player() else {
            return false;
        };
        match self {
            RotationCondition::SpellReady { spell } => ctx.spell(*spell).is_ok_and(|view| view.is_ready),
            RotationCondition::PowerAtLeast { amount } => me.power.current >= *amount,
            RotationCondition::AuraMissing { aura, on_target } => {
                if *on_target {
                    ctx.target().is_some_and(|t| t.aura(*aura).is_none())
                } else {
                    me.aura(*aura).is_none()
                }
            }
            RotationCondition::AuraStacksBelow { aura, stacks } => me.aura_stacks(*aura) < *stacks,
            RotationCondition::ChargesAtLeast { spell, charges } => {
                ctx.spell(*spell).is_ok_and(|view| view.spell.charges >= *charges)
            }
            RotationCondition::TargetHealthBelow { pct } => ctx.target().is_some_and(|t| t.health.pct() < *pct),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityEntry {
    pub spell: SpellId,
    #[serde(default)]
    pub conditions: Vec<RotationCondition>,
}

impl PriorityEntry {
    pub fn new(spell: SpellId) -> Self {
        Self {
            spell,
            conditions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: RotationCondition) -> Self {
        self.conditions.push(condition);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriorityRotation {
    pub name: String,
    pub entries: Vec<PriorityEntry>,
}

impl PriorityRotation {
    pub fn new(name: impl Into<String>, entries: Vec<PriorityEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let rotation: PriorityRotation = serde_json::from_str(json)?;
        if rotation.entries.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "rotation '{}' has no entries",
                rotation.name
            )));
        }
        Ok(rotation)
    }
}

impl Rotation for PriorityRotation {
    fn name(&self) -> &str {
        &self.name
    }

    fn evaluate(&self, ctx: &mut RotationContext<'_>) -> Result<(), SimError> {
        for entry in &self.entries {
            if !entry.conditions.iter().all(|c| c.holds(ctx)) {
                continue;
            }
            match ctx.cast(entry.spell, None) {
                Ok(()) => return Ok(()),
                Err(reason) => trace!("{}: skip {} ({})", self.name, entry.spell, reason),
            }
        }

        // Nothing castable: wake when a spell on cooldown comes back or
        // anything else happens to this unit. Ready spells are left out, they
        // failed on something other than their cooldown.
        let mut wake_on: Vec<WakeCondition> = Vec::new();
        for entry in &self.entries {
            let cooling = ctx.spell(entry.spell).is_ok_and(|view| !view.is_ready);
            let condition = WakeCondition::SpellReady(entry.spell);
            if cooling && !wake_on.contains(&condition) {
                wake_on.push(condition);
            }
        }
        wake_on.push(WakeCondition::AnyChange);
        ctx.wait_until(WakeCondition::Any(wake_on));
        Ok(())
    }
}
