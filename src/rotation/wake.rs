//! Event-triggered wake-ups for parked rotations
//!
//! A rotation that can't act yet parks its unit on a [`WakeCondition`]. After
//! each dispatched event the registry re-checks only the waiters that event
//! can affect. A condition that holds wakes the unit immediately; one that
//! will hold at a known time (a cooldown, a deadline) gets a timed wake that
//! is moved whenever that time changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::combat::events::{CombatLogEvent, SubeventKind};
use crate::data::SpellId;
use crate::state::{Unit, UnitId, WorldState};
use crate::Millis;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum WakeCondition {
    /// Spell off cooldown with a charge available
    SpellReady(SpellId),
    PowerAtLeast(f64),
    AuraPresent(SpellId),
    AuraAbsent(SpellId),
    /// Absolute time
    At(Millis),
    Any(Vec<WakeCondition>),
    /// Any event where the unit is source or destination
    AnyChange,
}

impl WakeCondition {
    pub fn is_met(&self, unit: &Unit, now: Millis) -> bool {
        match self {
            WakeCondition::SpellReady(id) => unit.spell(*id).is_some_and(|s| s.is_ready(now)),
            WakeCondition::PowerAtLeast(amount) => unit.power.current >= *amount,
            WakeCondition::AuraPresent(id) => unit.aura(*id).is_some(),
            WakeCondition::AuraAbsent(id) => unit.aura(*id).is_none(),
            WakeCondition::At(at) => now >= *at,
            WakeCondition::Any(conditions) => conditions.iter().any(|c| c.is_met(unit, now)),
            WakeCondition::AnyChange => false,
        }
    }

    /// Known future time at which the condition will hold.
    pub fn ready_at(&self, unit: &Unit, now: Millis) -> Option<Millis> {
        match self {
            WakeCondition::SpellReady(id) => {
                let spell = unit.spell(*id)?;
                let at = if spell.charges == 0 {
                    spell.charge_expiry.max(spell.cooldown_expiry)
                } else {
                    spell.cooldown_expiry
                };
                Some(at.max(now))
            }
            WakeCondition::At(at) => Some((*at).max(now)),
            WakeCondition::Any(conditions) => conditions.iter().filter_map(|c| c.ready_at(unit, now)).min(),
            _ => None,
        }
    }

    /// Whether `event` can change this condition for `unit`.
    pub fn wakes_on(&self, event: &CombatLogEvent, unit: UnitId) -> bool {
        let by_unit = event.source == Some(unit);
        let on_unit = event.dest == Some(unit);
        match self {
            WakeCondition::SpellReady(_) => {
                by_unit
                    && matches!(
                        event.kind(),
                        SubeventKind::SpellCooldownReady
                            | SubeventKind::SpellChargeReady
                            | SubeventKind::SpellCastSuccess
                    )
            }
            WakeCondition::PowerAtLeast(_) => {
                (on_unit && matches!(event.kind(), SubeventKind::SpellEnergize | SubeventKind::SpellDrain))
                    || (by_unit && event.kind() == SubeventKind::SpellCastSuccess)
            }
            WakeCondition::AuraPresent(id) | WakeCondition::AuraAbsent(id) => {
                on_unit
                    && event.spell_id() == Some(*id)
                    && matches!(
                        event.kind(),
                        SubeventKind::SpellAuraApplied
                            | SubeventKind::SpellAuraRemoved
                            | SubeventKind::SpellAuraAppliedDose
                            | SubeventKind::SpellAuraRemovedDose
                            | SubeventKind::SpellAuraRefresh
                    )
            }
            WakeCondition::At(_) => false,
            WakeCondition::Any(conditions) => conditions.iter().any(|c| c.wakes_on(event, unit)),
            WakeCondition::AnyChange => by_unit || on_unit,
        }
    }

    /// Conditions satisfied by the event itself rather than by state.
    fn fired_by(&self, event: &CombatLogEvent, unit: UnitId) -> bool {
        match self {
            WakeCondition::AnyChange => self.wakes_on(event, unit),
            WakeCondition::Any(conditions) => conditions.iter().any(|c| c.fired_by(event, unit)),
            _ => false,
        }
    }
}

/// When to run a unit's rotation next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Wake {
    pub unit: UnitId,
    pub at: Millis,
}

#[derive(Clone, Debug)]
struct Waiter {
    condition: WakeCondition,
    timed_wake: Option<Millis>,
}

#[derive(Debug, Default)]
pub struct WakeRegistry {
    waiters: BTreeMap<UnitId, Waiter>,
}

impl WakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }

    pub fn is_waiting(&self, unit: UnitId) -> bool {
        self.waiters.contains_key(&unit)
    }

    /// Park `unit` until `condition` holds, replacing any earlier wait.
    /// Returns the wake to schedule now, if one is already known.
    pub fn register(&mut self, state: &WorldState, unit: UnitId, condition: WakeCondition) -> Option<Wake> {
        let now = state.current_time();
        let current = state.unit(unit)?;
        if condition.is_met(current, now) {
            self.waiters.remove(&unit);
            return Some(Wake { unit, at: now });
        }
        let timed_wake = condition.ready_at(current, now);
        self.waiters.insert(unit, Waiter { condition, timed_wake });
        timed_wake.map(|at| Wake { unit, at })
    }

    /// The unit is being evaluated; its wait is over.
    pub fn remove(&mut self, unit: UnitId) -> bool {
        self.waiters.remove(&unit).is_some()
    }

    /// Re-check the waiters `event` can affect. Met conditions wake now and
    /// leave the registry; a moved ready time produces a new timed wake.
    pub fn check(&mut self, state: &WorldState, event: &CombatLogEvent) -> Vec<Wake> {
        let now = state.current_time();
        let mut wakes = Vec::new();
        let mut woken = Vec::new();

        for (&unit, waiter) in self.waiters.iter_mut() {
            if !waiter.condition.wakes_on(event, unit) {
                continue;
            }
            let Some(current) = state.unit(unit) else {
                woken.push(unit);
                continue;
            };
            if waiter.condition.is_met(current, now) || waiter.condition.fired_by(event, unit) {
                woken.push(unit);
                wakes.push(Wake { unit, at: now });
                continue;
            }
            let timed_wake = waiter.condition.ready_at(current, now);
            if timed_wake != waiter.timed_wake {
                waiter.timed_wake = timed_wake;
                if let Some(at) = timed_wake {
                    wakes.push(Wake { unit, at });
                }
            }
        }

        for unit in woken {
            self.waiters.remove(&unit);
        }
        wakes
    }
}
