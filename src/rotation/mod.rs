//! Rotation / decision engine
//!
//! A rotation decides what one unit does next. The driver evaluates it
//! whenever the unit is eligible (alive, not casting, GCD elapsed).
//!
//! ## Architecture
//!
//! Evaluation works in two phases:
//! 1. **Context Building**: `RotationContext` gives a read-only view of the
//!    world for one unit
//! 2. **Decision Making**: the rotation calls `cast`, `wait` or `wait_until`,
//!    which records an [`Intent`] the driver resolves afterwards
//!
//! The first successful `cast` fixes the intent. A rotation that records
//! nothing parks its unit until something happens to it.

pub mod priority;
pub mod wake;

use std::sync::Arc;

use crate::data::SpellId;
use crate::error::{CastError, SimError};
use crate::sim::casting::{default_target, validate_cast};
use crate::state::{SpellAccessor, SpellView, Unit, UnitId, WorldState};
use crate::Millis;

pub use priority::{PriorityEntry, PriorityRotation, RotationCondition};
pub use wake::{Wake, WakeCondition, WakeRegistry};

/// What an evaluation decided.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// Start a validated cast
    Cast {
        spell: SpellId,
        target: Option<UnitId>,
    },
    /// Re-evaluate after a delay
    Wait(Millis),
    /// Re-evaluate once the condition holds
    WaitUntil(WakeCondition),
}

/// Read-only view of the world for one unit's decision.
pub struct RotationContext<'a> {
    state: &'a WorldState,
    unit: UnitId,
    intent: Option<Intent>,
}

impl<'a> RotationContext<'a> {
    pub fn new(state: &'a WorldState, unit: UnitId) -> Self {
        Self {
            state,
            unit,
            intent: None,
        }
    }

    pub fn now(&self) -> Millis {
        self.state.current_time()
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit
    }

    /// Get any unit by id
    pub fn unit(&self, id: UnitId) -> Option<&Arc<Unit>> {
        self.state.unit(id)
    }

    /// Get the unit being evaluated
    pub fn player(&self) -> Result<&Arc<Unit>, SimError> {
        self.state
            .unit(self.unit)
            .ok_or_else(|| SimError::UnitNotFound(self.unit.to_string()))
    }

    pub fn units(&self) -> impl Iterator<Item = &Arc<Unit>> {
        self.state.units()
    }

    /// Readiness is computed against the current time.
    pub fn spell(&self, id: SpellId) -> Result<SpellView, SimError> {
        SpellAccessor::get(self.state, self.unit, id)
    }

    pub fn spells(&self) -> Vec<SpellView> {
        let Some(unit) = self.state.unit(self.unit) else {
            return Vec::new();
        };
        unit.spells
            .keys()
            .filter_map(|id| SpellAccessor::get(self.state, self.unit, *id).ok())
            .collect()
    }

    /// Get the default target (chosen target, else first living enemy)
    pub fn target(&self) -> Option<&Arc<Unit>> {
        default_target(self.state, self.unit).and_then(|id| self.state.unit(id))
    }

    /// Whether `spell` could be cast right now.
    pub fn can_cast(&self, spell: SpellId) -> bool {
        validate_cast(self.state, self.unit, spell, None).is_ok()
    }

    /// Validate and record a cast. Fails without recording anything when the
    /// cast isn't possible, so the rotation can try the next option.
    pub fn cast(&mut self, spell: SpellId, target: Option<UnitId>) -> Result<(), CastError> {
        if self.intent.is_some() {
            return Err(CastError::AlreadyActed);
        }
        let target = validate_cast(self.state, self.unit, spell, target)?;
        self.intent = Some(Intent::Cast { spell, target });
        Ok(())
    }

    /// Re-evaluate after `ms`.
    pub fn wait(&mut self, ms: Millis) {
        if self.intent.is_none() {
            self.intent = Some(Intent::Wait(ms));
        }
    }

    /// Re-evaluate once `condition` holds.
    pub fn wait_until(&mut self, condition: WakeCondition) {
        if self.intent.is_none() {
            self.intent = Some(Intent::WaitUntil(condition));
        }
    }

    pub fn intent(&self) -> Option<&Intent> {
        self.intent.as_ref()
    }

    pub fn into_intent(self) -> Option<Intent> {
        self.intent
    }
}

/// Decision logic for one unit.
///
/// Implementations read the context and record at most one intent.
pub trait Rotation: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, ctx: &mut RotationContext<'_>) -> Result<(), SimError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SpellEffect, SpellInfo};
    use crate::state::{Spell, UnitKind};

    const SHOT: SpellId = SpellId(1);
    const BIG: SpellId = SpellId(2);

    fn world() -> (WorldState, UnitId, UnitId) {
        let shot = SpellInfo::new(1, "Shot").with_effect(SpellEffect::Damage { amount: 10.0 });
        let big = SpellInfo::new(2, "Big Shot").with_cost(200.0);
        let (state, hunter) = WorldState::new().insert_unit(|id| {
            Unit::new(id, "Hunter", UnitKind::Player, 100.0)
                .with_power(100.0, 5.0)
                .with_spell(Spell::new(Arc::new(shot)))
                .with_spell(Spell::new(Arc::new(big)))
        });
        let (state, dummy) = state.insert_unit(|id| Unit::new(id, "Dummy", UnitKind::Enemy, 100.0));
        (state, hunter, dummy)
    }

    #[test]
    fn test_first_cast_fixes_intent() {
        let (state, hunter, dummy) = world();
        let mut ctx = RotationContext::new(&state, hunter);
        assert!(matches!(ctx.cast(BIG, None), Err(CastError::InsufficientPower { .. })));
        assert!(ctx.intent().is_none(), "failed casts record nothing");

        ctx.cast(SHOT, None).unwrap();
        assert_eq!(ctx.cast(SHOT, None), Err(CastError::AlreadyActed));
        ctx.wait(500);
        assert_eq!(
            ctx.into_intent(),
            Some(Intent::Cast {
                spell: SHOT,
                target: Some(dummy)
            })
        );
    }

    #[test]
    fn test_context_views() {
        let (state, hunter, dummy) = world();
        let ctx = RotationContext::new(&state, hunter);
        assert_eq!(ctx.player().unwrap().name, "Hunter");
        assert_eq!(ctx.target().map(|t| t.id), Some(dummy));
        assert_eq!(ctx.spells().len(), 2);
        assert!(ctx.spell(SHOT).unwrap().is_ready);
        assert!(ctx.can_cast(SHOT));
        assert!(!ctx.can_cast(BIG));
    }
}
