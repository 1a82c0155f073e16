//! Modifier pipeline
//!
//! A [`Modifier`] is a named set of hooks attached to a spell through profile
//! bundles. Hooks only see the [`ModifierRuntime`] capability surface, never
//! the handler context itself, so they can be exercised against a fake
//! runtime in tests.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::combat::bus::HandlerContext;
use crate::data::SpellId;
use crate::error::SimError;
use crate::state::{Spell, SpellAccessor, Unit, UnitAccessor, UnitId};
use crate::Millis;

/// Lifecycle point a hook runs at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModifierPhase {
    OnCast,
    OnDamage,
}

impl fmt::Display for ModifierPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModifierPhase::OnCast => f.write_str("on_cast"),
            ModifierPhase::OnDamage => f.write_str("on_damage"),
        }
    }
}

/// Names the exact hook that failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("modifier '{modifier_name}' failed in {phase} of spell {spell}: {reason}")]
pub struct ModifierError {
    pub modifier_name: String,
    pub phase: ModifierPhase,
    pub reason: String,
    pub spell: SpellId,
}

/// What a hook is allowed to do.
pub trait ModifierRuntime {
    fn log(&mut self, message: &str);
    fn roll(&mut self, chance_percent: f64) -> Result<bool, SimError>;
    fn current_time(&self) -> Millis;
    fn spell(&self, id: SpellId) -> Result<Spell, SimError>;
    fn update_spell(&mut self, spell: Spell) -> Result<(), SimError>;
    fn player(&self) -> Result<Arc<Unit>, SimError>;
    fn update_player(&mut self, unit: Unit) -> Result<(), SimError>;
}

pub type Hook = Arc<dyn Fn(&mut dyn ModifierRuntime, &Spell) -> Result<(), SimError> + Send + Sync>;

#[derive(Clone)]
pub struct Modifier {
    pub name: String,
    on_cast: Option<Hook>,
    on_damage: Option<Hook>,
}

impl fmt::Debug for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modifier")
            .field("name", &self.name)
            .field("on_cast", &self.on_cast.is_some())
            .field("on_damage", &self.on_damage.is_some())
            .finish()
    }
}

impl Modifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_cast: None,
            on_damage: None,
        }
    }

    pub fn on_cast<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn ModifierRuntime, &Spell) -> Result<(), SimError> + Send + Sync + 'static,
    {
        self.on_cast = Some(Arc::new(hook));
        self
    }

    pub fn on_damage<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn ModifierRuntime, &Spell) -> Result<(), SimError> + Send + Sync + 'static,
    {
        self.on_damage = Some(Arc::new(hook));
        self
    }

    pub fn hook(&self, phase: ModifierPhase) -> Option<&Hook> {
        match phase {
            ModifierPhase::OnCast => self.on_cast.as_ref(),
            ModifierPhase::OnDamage => self.on_damage.as_ref(),
        }
    }
}

/// Run each modifier's `phase` hook in list order, stopping at the first failure.
pub fn run_hooks(
    modifiers: &[Arc<Modifier>],
    phase: ModifierPhase,
    runtime: &mut dyn ModifierRuntime,
    spell: &Spell,
) -> Result<(), ModifierError> {
    for modifier in modifiers {
        if let Some(hook) = modifier.hook(phase) {
            (hook.as_ref())(&mut *runtime, spell).map_err(|e| ModifierError {
                modifier_name: modifier.name.clone(),
                phase,
                reason: e.to_string(),
                spell: spell.id(),
            })?;
        }
    }
    Ok(())
}

/// [`ModifierRuntime`] over a handler context, scoped to one unit.
pub struct ScopedRuntime<'c, 'a> {
    ctx: &'c mut HandlerContext<'a>,
    unit: UnitId,
}

impl<'c, 'a> ScopedRuntime<'c, 'a> {
    pub fn new(ctx: &'c mut HandlerContext<'a>, unit: UnitId) -> Self {
        Self { ctx, unit }
    }
}

impl ModifierRuntime for ScopedRuntime<'_, '_> {
    fn log(&mut self, message: &str) {
        debug!("[modifier {}] {}", self.unit, message);
    }

    fn roll(&mut self, chance_percent: f64) -> Result<bool, SimError> {
        self.ctx.rng.roll(chance_percent)
    }

    fn current_time(&self) -> Millis {
        self.ctx.now()
    }

    fn spell(&self, id: SpellId) -> Result<Spell, SimError> {
        SpellAccessor::get(&self.ctx.state, self.unit, id).map(|view| view.spell)
    }

    fn update_spell(&mut self, spell: Spell) -> Result<(), SimError> {
        self.ctx.state = SpellAccessor::update(&self.ctx.state, self.unit, spell.id(), |_| spell)?;
        Ok(())
    }

    fn player(&self) -> Result<Arc<Unit>, SimError> {
        UnitAccessor::get(&self.ctx.state, self.unit)
    }

    fn update_player(&mut self, unit: Unit) -> Result<(), SimError> {
        if unit.id != self.unit {
            return Err(SimError::UnitNotFound(unit.id.to_string()));
        }
        self.ctx.state = self.ctx.state.with_unit(unit)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::log::CombatLog;
    use crate::data::{InMemoryMetadata, SpellInfo};
    use crate::rng::SimRng;
    use crate::state::{UnitKind, WorldState};

    const KILL_COMMAND: SpellId = SpellId(34026);
    const COBRA_SHOT: SpellId = SpellId(193455);

    fn world() -> (WorldState, UnitId) {
        let kc = Arc::new(SpellInfo::new(34026, "Kill Command").with_cooldown(7_500));
        let cobra = Arc::new(SpellInfo::new(193455, "Cobra Shot"));
        WorldState::new().insert_unit(|id| {
            Unit::new(id, "Hunter", UnitKind::Player, 100.0)
                .with_spell(Spell::new(kc))
                .with_spell(Spell::new(cobra))
        })
    }

    fn reduce_kc() -> Arc<Modifier> {
        Arc::new(Modifier::new("cobra-reduces-kc").on_cast(|rt, _| {
            let now = rt.current_time();
            let kc = rt.spell(KILL_COMMAND)?;
            let reduced = kc.cooldown().reduce(1_000, now);
            rt.update_spell(reduced)
        }))
    }

    #[test]
    fn test_hooks_run_in_order_and_mutate_through_runtime() {
        let (state, hunter) = world();
        let state = SpellAccessor::update(&state, hunter, KILL_COMMAND, |s| s.cooldown().trigger(7_500, 0)).unwrap();

        let mut rng = SimRng::from_seed(1);
        let data = InMemoryMetadata::new();
        let mut log = CombatLog::default();
        let mut ctx = HandlerContext::new(state, &mut rng, &data, &mut log);

        let cobra = SpellAccessor::get(&ctx.state, hunter, COBRA_SHOT).unwrap().spell;
        let modifiers = vec![reduce_kc(), reduce_kc()];
        run_hooks(&modifiers, ModifierPhase::OnCast, &mut ScopedRuntime::new(&mut ctx, hunter), &cobra).unwrap();

        let kc = SpellAccessor::get(&ctx.state, hunter, KILL_COMMAND).unwrap();
        assert_eq!(kc.spell.cooldown_expiry, 5_500);
    }

    #[test]
    fn test_first_failure_stops_chain() {
        let (state, hunter) = world();
        let mut rng = SimRng::from_seed(1);
        let data = InMemoryMetadata::new();
        let mut log = CombatLog::default();
        let mut ctx = HandlerContext::new(state, &mut rng, &data, &mut log);

        let broken = Arc::new(Modifier::new("bad-proc").on_cast(|rt, _| rt.roll(250.0).map(|_| ())));
        let cobra = SpellAccessor::get(&ctx.state, hunter, COBRA_SHOT).unwrap().spell;
        let modifiers = vec![broken, reduce_kc()];
        let revision = ctx.state.revision();

        let err = run_hooks(&modifiers, ModifierPhase::OnCast, &mut ScopedRuntime::new(&mut ctx, hunter), &cobra)
            .unwrap_err();
        assert_eq!(err.modifier_name, "bad-proc");
        assert_eq!(err.phase, ModifierPhase::OnCast);
        assert_eq!(err.spell, COBRA_SHOT);
        assert_eq!(ctx.state.revision(), revision, "second modifier must not run");
    }

    #[test]
    fn test_phase_selects_hook() {
        let (state, hunter) = world();
        let mut rng = SimRng::from_seed(1);
        let data = InMemoryMetadata::new();
        let mut log = CombatLog::default();
        let mut ctx = HandlerContext::new(state, &mut rng, &data, &mut log);
        let cobra = SpellAccessor::get(&ctx.state, hunter, COBRA_SHOT).unwrap().spell;
        let revision = ctx.state.revision();

        run_hooks(&[reduce_kc()], ModifierPhase::OnDamage, &mut ScopedRuntime::new(&mut ctx, hunter), &cobra).unwrap();
        assert_eq!(ctx.state.revision(), revision, "on_cast hook must not run on damage");
    }
}
