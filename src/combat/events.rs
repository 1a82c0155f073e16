//! Combat-log events
//!
//! Every state change in a run is expressed as a [`CombatLogEvent`]: eleven
//! base fields shared by all events plus a subevent payload. Events are
//! immutable once built and serialize with the external field names
//! (`sourceGUID`, `spellId`, ...) consumed by timeline viewers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::data::{SpellId, SpellInfo, SpellSchool};
use crate::state::{Unit, UnitId};
use crate::Millis;

/// Spell triple carried by every spell subevent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellRef {
    pub spell_id: SpellId,
    pub spell_name: String,
    pub spell_school: u8,
}

impl SpellRef {
    pub fn new(id: SpellId, name: impl Into<String>, school: SpellSchool) -> Self {
        Self {
            spell_id: id,
            spell_name: name.into(),
            spell_school: school.mask(),
        }
    }

    /// Power regeneration pseudo-spell.
    pub fn regeneration() -> Self {
        Self::new(SpellId(0), "Regeneration", SpellSchool::Physical)
    }
}

impl From<&SpellInfo> for SpellRef {
    fn from(info: &SpellInfo) -> Self {
        Self::new(info.id, info.name.clone(), info.school)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuraType {
    Buff,
    Debuff,
}

/// Subevent payload. Serialized with its kind in the `subevent` field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "subevent", rename_all = "SCREAMING_SNAKE_CASE", rename_all_fields = "camelCase")]
pub enum Subevent {
    SpellCastStart {
        #[serde(flatten)]
        spell: SpellRef,
    },
    SpellCastSuccess {
        #[serde(flatten)]
        spell: SpellRef,
    },
    SpellCastFailed {
        #[serde(flatten)]
        spell: SpellRef,
        failed_type: String,
    },
    SpellDamage {
        #[serde(flatten)]
        spell: SpellRef,
        amount: f64,
        overkill: f64,
        critical: bool,
    },
    SpellPeriodicDamage {
        #[serde(flatten)]
        spell: SpellRef,
        amount: f64,
        overkill: f64,
        critical: bool,
    },
    SpellHeal {
        #[serde(flatten)]
        spell: SpellRef,
        amount: f64,
        overhealing: f64,
        critical: bool,
    },
    SpellPeriodicHeal {
        #[serde(flatten)]
        spell: SpellRef,
        amount: f64,
        overhealing: f64,
        critical: bool,
    },
    SpellAuraApplied {
        #[serde(flatten)]
        spell: SpellRef,
        aura_type: AuraType,
        amount: Option<u32>,
    },
    SpellAuraRemoved {
        #[serde(flatten)]
        spell: SpellRef,
        aura_type: AuraType,
        amount: Option<u32>,
    },
    SpellAuraRefresh {
        #[serde(flatten)]
        spell: SpellRef,
        aura_type: AuraType,
        amount: Option<u32>,
    },
    SpellAuraAppliedDose {
        #[serde(flatten)]
        spell: SpellRef,
        aura_type: AuraType,
        amount: Option<u32>,
    },
    SpellAuraRemovedDose {
        #[serde(flatten)]
        spell: SpellRef,
        aura_type: AuraType,
        amount: Option<u32>,
    },
    SpellEnergize {
        #[serde(flatten)]
        spell: SpellRef,
        amount: f64,
        over_energize: f64,
    },
    SpellDrain {
        #[serde(flatten)]
        spell: SpellRef,
        amount: f64,
    },
    SpellCooldownReady {
        #[serde(flatten)]
        spell: SpellRef,
    },
    SpellChargeReady {
        #[serde(flatten)]
        spell: SpellRef,
    },
    UnitDied,
}

/// Fieldless mirror of [`Subevent`] used for filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubeventKind {
    SpellCastStart,
    SpellCastSuccess,
    SpellCastFailed,
    SpellDamage,
    SpellPeriodicDamage,
    SpellHeal,
    SpellPeriodicHeal,
    SpellAuraApplied,
    SpellAuraRemoved,
    SpellAuraRefresh,
    SpellAuraAppliedDose,
    SpellAuraRemovedDose,
    SpellEnergize,
    SpellDrain,
    SpellCooldownReady,
    SpellChargeReady,
    UnitDied,
}

impl SubeventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SubeventKind::SpellCastStart => "SPELL_CAST_START",
            SubeventKind::SpellCastSuccess => "SPELL_CAST_SUCCESS",
            SubeventKind::SpellCastFailed => "SPELL_CAST_FAILED",
            SubeventKind::SpellDamage => "SPELL_DAMAGE",
            SubeventKind::SpellPeriodicDamage => "SPELL_PERIODIC_DAMAGE",
            SubeventKind::SpellHeal => "SPELL_HEAL",
            SubeventKind::SpellPeriodicHeal => "SPELL_PERIODIC_HEAL",
            SubeventKind::SpellAuraApplied => "SPELL_AURA_APPLIED",
            SubeventKind::SpellAuraRemoved => "SPELL_AURA_REMOVED",
            SubeventKind::SpellAuraRefresh => "SPELL_AURA_REFRESH",
            SubeventKind::SpellAuraAppliedDose => "SPELL_AURA_APPLIED_DOSE",
            SubeventKind::SpellAuraRemovedDose => "SPELL_AURA_REMOVED_DOSE",
            SubeventKind::SpellEnergize => "SPELL_ENERGIZE",
            SubeventKind::SpellDrain => "SPELL_DRAIN",
            SubeventKind::SpellCooldownReady => "SPELL_COOLDOWN_READY",
            SubeventKind::SpellChargeReady => "SPELL_CHARGE_READY",
            SubeventKind::UnitDied => "UNIT_DIED",
        }
    }
}

impl fmt::Display for SubeventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Subevent {
    pub fn kind(&self) -> SubeventKind {
        match self {
            Subevent::SpellCastStart { .. } => SubeventKind::SpellCastStart,
            Subevent::SpellCastSuccess { .. } => SubeventKind::SpellCastSuccess,
            Subevent::SpellCastFailed { .. } => SubeventKind::SpellCastFailed,
            Subevent::SpellDamage { .. } => SubeventKind::SpellDamage,
            Subevent::SpellPeriodicDamage { .. } => SubeventKind::SpellPeriodicDamage,
            Subevent::SpellHeal { .. } => SubeventKind::SpellHeal,
            Subevent::SpellPeriodicHeal { .. } => SubeventKind::SpellPeriodicHeal,
            Subevent::SpellAuraApplied { .. } => SubeventKind::SpellAuraApplied,
            Subevent::SpellAuraRemoved { .. } => SubeventKind::SpellAuraRemoved,
            Subevent::SpellAuraRefresh { .. } => SubeventKind::SpellAuraRefresh,
            Subevent::SpellAuraAppliedDose { .. } => SubeventKind::SpellAuraAppliedDose,
            Subevent::SpellAuraRemovedDose { .. } => SubeventKind::SpellAuraRemovedDose,
            Subevent::SpellEnergize { .. } => SubeventKind::SpellEnergize,
            Subevent::SpellDrain { .. } => SubeventKind::SpellDrain,
            Subevent::SpellCooldownReady { .. } => SubeventKind::SpellCooldownReady,
            Subevent::SpellChargeReady { .. } => SubeventKind::SpellChargeReady,
            Subevent::UnitDied => SubeventKind::UnitDied,
        }
    }

    pub fn spell(&self) -> Option<&SpellRef> {
        match self {
            Subevent::SpellCastStart { spell }
            | Subevent::SpellCastSuccess { spell }
            | Subevent::SpellCastFailed { spell, .. }
            | Subevent::SpellDamage { spell, .. }
            | Subevent::SpellPeriodicDamage { spell, .. }
            | Subevent::SpellHeal { spell, .. }
            | Subevent::SpellPeriodicHeal { spell, .. }
            | Subevent::SpellAuraApplied { spell, .. }
            | Subevent::SpellAuraRemoved { spell, .. }
            | Subevent::SpellAuraRefresh { spell, .. }
            | Subevent::SpellAuraAppliedDose { spell, .. }
            | Subevent::SpellAuraRemovedDose { spell, .. }
            | Subevent::SpellEnergize { spell, .. }
            | Subevent::SpellDrain { spell, .. }
            | Subevent::SpellCooldownReady { spell }
            | Subevent::SpellChargeReady { spell } => Some(spell),
            Subevent::UnitDied => None,
        }
    }
}

/// One combat-log line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombatLogEvent {
    pub timestamp: Millis,
    #[serde(rename = "sourceGUID")]
    pub source_guid: String,
    #[serde(rename = "sourceName")]
    pub source_name: String,
    #[serde(rename = "sourceFlags")]
    pub source_flags: u32,
    #[serde(rename = "sourceRaidFlags")]
    pub source_raid_flags: u32,
    #[serde(rename = "destGUID")]
    pub dest_guid: String,
    #[serde(rename = "destName")]
    pub dest_name: String,
    #[serde(rename = "destFlags")]
    pub dest_flags: u32,
    #[serde(rename = "destRaidFlags")]
    pub dest_raid_flags: u32,
    #[serde(flatten)]
    pub payload: Subevent,

    /// Engine-side handles; not part of the serialized shape
    #[serde(skip)]
    pub source: Option<UnitId>,
    #[serde(skip)]
    pub dest: Option<UnitId>,
}

impl CombatLogEvent {
    /// Event from `source` to `dest`. A missing dest leaves the dest fields
    /// blank, as the log does for untargeted casts.
    pub fn new(timestamp: Millis, source: &Unit, dest: Option<&Unit>, payload: Subevent) -> Self {
        Self {
            timestamp,
            source_guid: source.guid.clone(),
            source_name: source.name.clone(),
            source_flags: source.flags,
            source_raid_flags: source.raid_flags,
            dest_guid: dest.map(|d| d.guid.clone()).unwrap_or_default(),
            dest_name: dest.map(|d| d.name.clone()).unwrap_or_default(),
            dest_flags: dest.map(|d| d.flags).unwrap_or(0),
            dest_raid_flags: dest.map(|d| d.raid_flags).unwrap_or(0),
            payload,
            source: Some(source.id),
            dest: dest.map(|d| d.id),
        }
    }

    /// Event whose source and dest are the same unit.
    pub fn on_self(timestamp: Millis, unit: &Unit, payload: Subevent) -> Self {
        Self::new(timestamp, unit, Some(unit), payload)
    }

    /// Same source/dest, new payload and timestamp.
    pub fn follow_up(&self, timestamp: Millis, payload: Subevent) -> Self {
        Self {
            timestamp,
            payload,
            ..self.clone()
        }
    }

    /// Same source, retargeted to `dest`.
    pub fn redirected(&self, dest: &Unit, payload: Subevent) -> Self {
        Self {
            dest_guid: dest.guid.clone(),
            dest_name: dest.name.clone(),
            dest_flags: dest.flags,
            dest_raid_flags: dest.raid_flags,
            dest: Some(dest.id),
            payload,
            ..self.clone()
        }
    }

    pub fn kind(&self) -> SubeventKind {
        self.payload.kind()
    }

    pub fn spell(&self) -> Option<&SpellRef> {
        self.payload.spell()
    }

    pub fn spell_id(&self) -> Option<SpellId> {
        self.spell().map(|s| s.spell_id)
    }

    /// Damage or heal amount, for events that carry one.
    pub fn amount(&self) -> Option<f64> {
        match &self.payload {
            Subevent::SpellDamage { amount, .. }
            | Subevent::SpellPeriodicDamage { amount, .. }
            | Subevent::SpellHeal { amount, .. }
            | Subevent::SpellPeriodicHeal { amount, .. }
            | Subevent::SpellEnergize { amount, .. }
            | Subevent::SpellDrain { amount, .. } => Some(*amount),
            _ => None,
        }
    }

    pub fn is_damage(&self) -> bool {
        matches!(
            self.kind(),
            SubeventKind::SpellDamage | SubeventKind::SpellPeriodicDamage
        )
    }
}
