//! Cast resolution
//!
//! Turns a rotation's cast intent into events. Validation happens up front so
//! a rejected cast never schedules anything; costs and cooldowns are
//! committed later by the `SPELL_CAST_SUCCESS` mutation.

use tracing::debug;

use crate::combat::events::{CombatLogEvent, SpellRef, Subevent};
use crate::data::SpellId;
use crate::error::{CastError, SimError};
use crate::scheduler::SimEvent;
use crate::state::{UnitAccessor, UnitId, WorldState};
use crate::Millis;

/// Explicit target, the unit's chosen target, or the first living unit of
/// the opposite side in slot order.
pub fn default_target(state: &WorldState, unit_id: UnitId) -> Option<UnitId> {
    let unit = state.unit(unit_id)?;
    if let Some(target) = unit.target.and_then(|t| state.unit(t)) {
        if target.is_alive() {
            return Some(target.id);
        }
    }
    state
        .units()
        .find(|other| other.is_alive() && other.is_hostile() != unit.is_hostile())
        .map(|other| other.id)
}

/// Check a cast is allowed right now. Returns the resolved target.
pub fn validate_cast(
    state: &WorldState,
    unit_id: UnitId,
    spell_id: SpellId,
    target: Option<UnitId>,
) -> Result<Option<UnitId>, CastError> {
    let now = state.current_time();
    let unit = state.unit(unit_id).ok_or(CastError::CasterDead)?;
    if !unit.is_alive() {
        return Err(CastError::CasterDead);
    }
    if let Some(casting) = unit.casting {
        return Err(CastError::AlreadyCasting {
            ends_at: casting.ends_at,
        });
    }

    let spell = unit.spell(spell_id).ok_or(CastError::UnknownSpell(spell_id))?;
    let info = &spell.info;
    if info.triggers_gcd && now < unit.gcd_expiry {
        return Err(CastError::GcdActive {
            ends_at: unit.gcd_expiry,
        });
    }
    if info.has_charges() {
        if spell.charges == 0 {
            return Err(CastError::NoCharges);
        }
    } else if !spell.is_ready(now) {
        return Err(CastError::OnCooldown {
            remaining: spell.cooldown_remaining(now),
        });
    }
    if unit.power.current < info.cost {
        return Err(CastError::InsufficientPower {
            required: info.cost,
            available: unit.power.current,
        });
    }

    let resolved = match target {
        Some(t) => Some(t),
        None if info.requires_target || info.is_damage() => default_target(state, unit_id),
        None => None,
    };
    match resolved.map(|t| state.unit(t)) {
        None if info.requires_target => Err(CastError::TargetRequired),
        Some(None) => Err(CastError::TargetDead),
        Some(Some(t)) if !t.is_alive() => Err(CastError::TargetDead),
        _ => Ok(resolved),
    }
}

/// Start a validated cast: trigger the GCD and schedule `SPELL_CAST_START`
/// now and the completion after the cast time.
pub fn begin_cast(
    state: &WorldState,
    unit_id: UnitId,
    spell_id: SpellId,
    target: Option<UnitId>,
    gcd: Millis,
) -> Result<(WorldState, Vec<(Millis, SimEvent)>), SimError> {
    let now = state.current_time();
    let unit = UnitAccessor::get(state, unit_id)?;
    let spell = unit.spell(spell_id).ok_or_else(|| SimError::SpellNotFound {
        unit: unit.name.clone(),
        spell: spell_id,
    })?;
    let info = &spell.info;

    let dest = target.and_then(|t| state.unit(t));
    let start = CombatLogEvent::new(
        now,
        &unit,
        dest.map(|d| d.as_ref()),
        Subevent::SpellCastStart {
            spell: SpellRef::from(info.as_ref()),
        },
    );
    let complete = SimEvent::CastComplete {
        unit: unit_id,
        spell: spell_id,
        target,
        started_at: now,
    };

    debug!(
        "[{}ms] {} begins {}{}",
        now,
        unit.name,
        info.name,
        dest.map(|d| format!(" on {}", d.name)).unwrap_or_default()
    );

    let next = if info.triggers_gcd {
        state.with_unit(unit.gcd().trigger(gcd, now))?
    } else {
        state.clone()
    };
    Ok((
        next,
        vec![(now, SimEvent::CombatLog(start)), (now + info.cast_time, complete)],
    ))
}

/// Build the success or failure event for a finished cast. `None` when the
/// caster no longer exists.
pub fn complete_cast(
    state: &WorldState,
    unit_id: UnitId,
    spell_id: SpellId,
    target: Option<UnitId>,
) -> Option<CombatLogEvent> {
    let now = state.current_time();
    let unit = state.unit(unit_id)?;
    let info = &unit.spell(spell_id)?.info;
    let dest = target.and_then(|t| state.unit(t));
    let spell = SpellRef::from(info.as_ref());

    let failed = if !unit.is_alive() {
        Some("Caster died")
    } else if target.is_some() && !dest.is_some_and(|d| d.is_alive()) {
        Some("Target died")
    } else {
        None
    };

    let payload = match failed {
        Some(reason) => Subevent::SpellCastFailed {
            spell,
            failed_type: reason.to_string(),
        },
        None => Subevent::SpellCastSuccess { spell },
    };
    Some(CombatLogEvent::new(now, unit, dest.map(|d| d.as_ref()), payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::events::SubeventKind;
    use crate::data::{SpellEffect, SpellInfo};
    use crate::state::{Spell, Unit, UnitKind};
    use std::sync::Arc;

    const SHOT: SpellId = SpellId(1);
    const SLOW: SpellId = SpellId(2);
    const BURST: SpellId = SpellId(3);

    fn world() -> (WorldState, UnitId, UnitId) {
        let shot = SpellInfo::new(1, "Shot")
            .with_cost(30.0)
            .with_target()
            .with_effect(SpellEffect::Damage { amount: 10.0 });
        let slow = SpellInfo::new(2, "Slow Shot").with_cast_time(2_000).with_target();
        let burst = SpellInfo::new(3, "Burst").with_cooldown(12_000).off_gcd();
        let (state, hunter) = WorldState::new().insert_unit(|id| {
            Unit::new(id, "Hunter", UnitKind::Player, 100.0)
                .with_power(100.0, 5.0)
                .with_spell(Spell::new(Arc::new(shot)))
                .with_spell(Spell::new(Arc::new(slow)))
                .with_spell(Spell::new(Arc::new(burst)))
        });
        let (state, dummy) = state.insert_unit(|id| Unit::new(id, "Dummy", UnitKind::Enemy, 100.0));
        (state, hunter, dummy)
    }

    #[test]
    fn test_default_target_is_first_hostile() {
        let (state, hunter, dummy) = world();
        assert_eq!(default_target(&state, hunter), Some(dummy));
        assert_eq!(default_target(&state, dummy), Some(hunter));
        assert_eq!(validate_cast(&state, hunter, SHOT, None), Ok(Some(dummy)));
    }

    #[test]
    fn test_validation_failures() {
        let (state, hunter, dummy) = world();
        assert_eq!(validate_cast(&state, hunter, SpellId(99), None), Err(CastError::UnknownSpell(SpellId(99))));

        let broke = UnitAccessor::update(&state, hunter, |u| u.power().set(10.0, 0)).unwrap();
        assert_eq!(
            validate_cast(&broke, hunter, SHOT, None),
            Err(CastError::InsufficientPower {
                required: 30.0,
                available: 10.0
            })
        );

        let dead_target = UnitAccessor::update(&state, dummy, |u| u.health().set(0.0, 0)).unwrap();
        assert_eq!(validate_cast(&dead_target, hunter, SHOT, Some(dummy)), Err(CastError::TargetDead));
        assert_eq!(validate_cast(&dead_target, hunter, SHOT, None), Err(CastError::TargetRequired));

        let on_gcd = UnitAccessor::update(&state, hunter, |u| u.gcd().trigger(1_500, 0)).unwrap();
        assert_eq!(validate_cast(&on_gcd, hunter, SHOT, None), Err(CastError::GcdActive { ends_at: 1_500 }));
        assert!(validate_cast(&on_gcd, hunter, BURST, None).is_ok(), "off-GCD spells ignore the GCD");
    }

    #[test]
    fn test_begin_cast_schedules_start_and_completion() {
        let (state, hunter, dummy) = world();
        let (next, events) = begin_cast(&state, hunter, SLOW, Some(dummy), 1_500).unwrap();
        assert_eq!(next.unit(hunter).unwrap().gcd_expiry, 1_500);
        assert_eq!(events.len(), 2);
        match &events[0] {
            (0, SimEvent::CombatLog(e)) => assert_eq!(e.kind(), SubeventKind::SpellCastStart),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(events[1], (2_000, SimEvent::CastComplete { spell: SLOW, .. })));
    }

    #[test]
    fn test_complete_cast_fails_when_target_died() {
        let (state, hunter, dummy) = world();
        let ok = complete_cast(&state, hunter, SHOT, Some(dummy)).unwrap();
        assert_eq!(ok.kind(), SubeventKind::SpellCastSuccess);

        let dead = UnitAccessor::update(&state, dummy, |u| u.health().set(0.0, 0)).unwrap();
        let failed = complete_cast(&dead, hunter, SHOT, Some(dummy)).unwrap();
        assert!(matches!(
            failed.payload,
            Subevent::SpellCastFailed { ref failed_type, .. } if failed_type == "Target died"
        ));
    }
}
