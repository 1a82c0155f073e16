//! Accessors
//!
//! The only sanctioned way to read or rewrite a unit or one of its spells.
//! Updates are total `state -> state'` functions; the caller owns the single
//! world value for the run and swaps in whatever these return.

use std::sync::Arc;

use super::entities::{Spell, Unit, UnitId};
use super::world::WorldState;
use crate::data::SpellId;
use crate::error::SimError;

pub struct UnitAccessor;

impl UnitAccessor {
    pub fn get(state: &WorldState, id: UnitId) -> Result<Arc<Unit>, SimError> {
        state
            .unit(id)
            .cloned()
            .ok_or_else(|| SimError::UnitNotFound(id.to_string()))
    }

    pub fn find_by_guid(state: &WorldState, guid: &str) -> Result<Arc<Unit>, SimError> {
        state
            .units()
            .find(|u| u.guid == guid)
            .cloned()
            .ok_or_else(|| SimError::UnitNotFound(guid.to_string()))
    }

    /// First unit flagged as a player, in slot order.
    pub fn player(state: &WorldState) -> Result<Arc<Unit>, SimError> {
        state
            .units()
            .find(|u| u.is_player())
            .cloned()
            .ok_or_else(|| SimError::UnitNotFound("player".to_string()))
    }

    pub fn update(
        state: &WorldState,
        id: UnitId,
        f: impl FnOnce(&Unit) -> Unit,
    ) -> Result<WorldState, SimError> {
        let unit = Self::get(state, id)?;
        state.with_unit(f(&unit))
    }
}

/// A spell read with its readiness computed against the state's clock.
#[derive(Clone, Debug)]
pub struct SpellView {
    pub spell: Spell,
    pub is_ready: bool,
    pub cooldown_remaining: crate::Millis,
}

pub struct SpellAccessor;

impl SpellAccessor {
    pub fn get(state: &WorldState, unit_id: UnitId, spell_id: SpellId) -> Result<SpellView, SimError> {
        let unit = UnitAccessor::get(state, unit_id)?;
        let spell = unit.spell(spell_id).ok_or_else(|| SimError::SpellNotFound {
            unit: unit.name.clone(),
            spell: spell_id,
        })?;
        let now = state.current_time();
        Ok(SpellView {
            is_ready: spell.is_ready(now),
            cooldown_remaining: spell.cooldown_remaining(now),
            spell: spell.clone(),
        })
    }

    pub fn update(
        state: &WorldState,
        unit_id: UnitId,
        spell_id: SpellId,
        f: impl FnOnce(&Spell) -> Spell,
    ) -> Result<WorldState, SimError> {
        let unit = UnitAccessor::get(state, unit_id)?;
        let spell = unit.spell(spell_id).ok_or_else(|| SimError::SpellNotFound {
            unit: unit.name.clone(),
            spell: spell_id,
        })?;
        state.with_unit(unit.with_spell(f(spell)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::SpellInfo;
    use crate::state::entities::UnitKind;

    fn setup() -> (WorldState, UnitId) {
        let info = Arc::new(SpellInfo::new(34026, "Kill Command").with_cooldown(7_500));
        let (state, id) = WorldState::new().insert_unit(|id| {
            let unit = Unit::new(id, "Hunter", UnitKind::Player, 100.0);
            unit.with_spell(Spell::new(info))
        });
        (state, id)
    }

    #[test]
    fn test_spell_view_readiness_follows_clock() {
        let (state, id) = setup();
        let state = SpellAccessor::update(&state, id, SpellId(34026), |s| s.cooldown().trigger(7_500, 0)).unwrap();

        let view = SpellAccessor::get(&state, id, SpellId(34026)).unwrap();
        assert!(!view.is_ready);
        assert_eq!(view.cooldown_remaining, 7_500);

        let later = state.with_current_time(7_500).unwrap();
        assert!(SpellAccessor::get(&later, id, SpellId(34026)).unwrap().is_ready);
    }

    #[test]
    fn test_missing_spell_and_unit() {
        let (state, id) = setup();
        assert!(matches!(
            SpellAccessor::get(&state, id, SpellId(1)),
            Err(SimError::SpellNotFound { .. })
        ));
        assert!(matches!(
            UnitAccessor::get(&state, UnitId::new(5, 0)),
            Err(SimError::UnitNotFound(_))
        ));
        assert!(UnitAccessor::find_by_guid(&state, "nope").is_err());
    }

    #[test]
    fn test_player_lookup() {
        let (state, id) = setup();
        let (state, _) = state.insert_unit(|id| Unit::new(id, "Dummy", UnitKind::Enemy, 1.0));
        assert_eq!(UnitAccessor::player(&state).unwrap().id, id);
        let guid = state.unit(id).unwrap().guid.clone();
        assert_eq!(UnitAccessor::find_by_guid(&state, &guid).unwrap().id, id);
    }
}
