//! Error types
//!
//! `SimError` covers everything that can stop or degrade a simulation run.
//! Not-found variants are expected and usually recovered from by the caller;
//! `InvalidProcChance` means bad data and fails the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::data::{ItemId, SpellId};
use crate::modifier::ModifierError;
use crate::Millis;

/// Errors raised by the engine while building or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unit not found: {0}")]
    UnitNotFound(String),

    #[error("spell {spell} not found on unit {unit}")]
    SpellNotFound { unit: String, spell: SpellId },

    #[error("no static data for spell {0}")]
    SpellInfoNotFound(SpellId),

    #[error("no static data for item {0}")]
    ItemNotFound(ItemId),

    #[error("profile bundle not found: {0}")]
    ProfileBundleNotFound(String),

    #[error("invalid profile bundle id '{0}' (expected a player-, spec-, class-, race- or shared- prefix)")]
    InvalidBundleId(String),

    #[error("proc chance {0} is outside [0, 100]")]
    InvalidProcChance(f64),

    #[error("cannot schedule event at {event_time}ms, current time is {current_time}ms")]
    ScheduleInPast { current_time: Millis, event_time: Millis },

    #[error("world time cannot move backwards ({current}ms -> {requested}ms)")]
    TimeWentBackwards { current: Millis, requested: Millis },

    #[error("handler '{handler_id}' failed on {subevent}: {reason}")]
    Handler {
        handler_id: String,
        subevent: String,
        reason: String,
    },

    #[error(transparent)]
    Modifier(#[from] ModifierError),

    #[error("unknown rotation '{0}'")]
    UnknownRotation(String),

    #[error("simulation aborted")]
    Aborted,
}

impl SimError {
    /// Not-found errors that callers are expected to degrade around.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SimError::UnitNotFound(_)
                | SimError::SpellNotFound { .. }
                | SimError::SpellInfoNotFound(_)
                | SimError::ItemNotFound(_)
                | SimError::ProfileBundleNotFound(_)
        )
    }
}

/// Reasons a rotation's cast request is rejected before any event is scheduled.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CastError {
    #[error("caster is dead")]
    CasterDead,

    #[error("already casting until {ends_at}ms")]
    AlreadyCasting { ends_at: Millis },

    #[error("global cooldown active until {ends_at}ms")]
    GcdActive { ends_at: Millis },

    #[error("spell on cooldown for another {remaining}ms")]
    OnCooldown { remaining: Millis },

    #[error("no charges available")]
    NoCharges,

    #[error("not enough power ({available} < {required})")]
    InsufficientPower { required: f64, available: f64 },

    #[error("spell requires a target")]
    TargetRequired,

    #[error("target is dead")]
    TargetDead,

    #[error("unit does not know spell {0}")]
    UnknownSpell(SpellId),

    #[error("an action was already chosen this evaluation")]
    AlreadyActed,
}

/// Errors while loading configuration or static data files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
