//! Simulation driver
//!
//! Owns one run: the world state, the scheduler, the bus and the RNG. Each
//! step pops the earliest event, moves the world clock to it and handles it:
//! combat-log events go through the bus, internal events are resolved into
//! combat-log events, and rotation evaluations turn intents into casts or
//! waits. Everything handlers emit is scheduled relative to the current time.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::casting::{begin_cast, complete_cast};
use super::config::SimulationConfig;
use super::results::SimulationResult;
use crate::combat::bus::{EventBus, HandlerContext};
use crate::combat::events::CombatLogEvent;
use crate::combat::default_bus;
use crate::combat::log::CombatLog;
use crate::combat::systems::{regen_event, resolve_aura_expiry, resolve_periodic_tick, resolve_projectile_impact};
use crate::data::MetadataProvider;
use crate::error::SimError;
use crate::profile::{ComposedProfile, ProfileComposer};
use crate::rng::SimRng;
use crate::rotation::{Intent, Rotation, RotationContext, WakeCondition, WakeRegistry};
use crate::scheduler::{EventId, EventScheduler, SimEvent};
use crate::settings::EngineSettings;
use crate::specs::SpecModule;
use crate::state::{Spell, Unit, UnitAccessor, UnitId, UnitKind, WorldState};
use crate::Millis;

/// One simulation run
pub struct Simulation<'a> {
    state: WorldState,
    scheduler: EventScheduler,
    bus: EventBus,
    rng: SimRng,
    data: &'a dyn MetadataProvider,
    log: CombatLog,
    wakes: WakeRegistry,
    rotations: BTreeMap<UnitId, Arc<dyn Rotation>>,
    /// The one pending `RotationEvaluate` per unit
    pending_eval: BTreeMap<UnitId, EventId>,
    settings: EngineSettings,
    duration: Millis,
    seed: u64,
    processed: u64,
    initial_revision: u64,
}

impl<'a> Simulation<'a> {
    pub fn new(
        config: &SimulationConfig,
        data: &'a dyn MetadataProvider,
        composer: &ProfileComposer,
        spec: &dyn SpecModule,
        seed: u64,
    ) -> Result<Self, SimError> {
        let mut state = WorldState::new();
        let mut rotations: BTreeMap<UnitId, Arc<dyn Rotation>> = BTreeMap::new();

        for def in &config.characters {
            let profile_ids = if def.profiles.is_empty() && def.kind == UnitKind::Player {
                spec.default_profiles()
            } else {
                def.profiles.clone()
            };
            let profile = match composer.compose_ids(&profile_ids) {
                Ok(profile) => profile,
                Err(e) if e.is_not_found() => {
                    warn!("{}: {}, running without modifiers", def.name, e);
                    Arc::new(ComposedProfile::default())
                }
                Err(e) => return Err(e),
            };

            let (max_health, crit_chance) = def.equipped_stats(data);
            let mut spells = Vec::new();
            for id in &def.spells {
                match data.load_spell(*id) {
                    Ok(info) => {
                        spells.push(Spell::new(info).with_modifiers(profile.modifiers_for(*id).to_vec()))
                    }
                    Err(e) => warn!("{}: skipping spell: {}", def.name, e),
                }
            }

            let (next, id) = state.insert_unit(|id| {
                let mut unit = Unit::new(id, def.name.clone(), def.kind, max_health)
                    .with_power(def.max_power, def.power_regen);
                unit.crit_chance = crit_chance;
                spells.into_iter().fold(unit, |unit, spell| unit.with_spell(spell))
            });
            state = next;

            let rotation: Option<Arc<dyn Rotation>> = match (&config.rotation, def.kind) {
                (Some(custom), UnitKind::Player) => Some(Arc::new(custom.clone())),
                _ => match def.rotation.as_deref().or_else(|| spec.default_rotation(def.kind)) {
                    None | Some("idle") => None,
                    Some(name) => Some(
                        spec.rotation(name)
                            .ok_or_else(|| SimError::UnknownRotation(name.to_string()))?,
                    ),
                },
            };
            if let Some(rotation) = rotation {
                debug!("{} uses rotation '{}'", def.name, rotation.name());
                rotations.insert(id, rotation);
            }
        }

        let mut bus = default_bus();
        spec.register_handlers(&mut bus);

        let settings = config.settings.clone();
        let mut sim = Self {
            initial_revision: state.revision(),
            state,
            scheduler: EventScheduler::new(),
            bus,
            rng: SimRng::from_seed(seed),
            data,
            log: CombatLog::default(),
            wakes: WakeRegistry::new(),
            rotations,
            pending_eval: BTreeMap::new(),
            settings,
            duration: config.duration,
            seed,
            processed: 0,
        };

        let units: Vec<Arc<Unit>> = sim.state.units().cloned().collect();
        for unit in units {
            if sim.rotations.contains_key(&unit.id) {
                sim.schedule_eval(unit.id, 0)?;
            }
            if unit.power_regen > 0.0 {
                sim.scheduler
                    .schedule(sim.settings.regen_interval_ms, SimEvent::PowerRegen(unit.id))?;
            }
        }
        Ok(sim)
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    /// Run to completion. Fails with [`SimError::Aborted`] once `abort` is set.
    pub fn run(mut self, abort: &AtomicBool) -> Result<SimulationResult, SimError> {
        let final_time = self.process_events(abort)?;
        debug!(
            "Run (seed {}) finished at {}ms: {} events processed, {} logged, {} rolls",
            self.seed,
            final_time,
            self.processed,
            self.log.len(),
            self.rng.draws()
        );
        let snapshots = self.state.revision().saturating_sub(self.initial_revision);
        Ok(SimulationResult::new(self.log.events, snapshots, final_time, self.seed))
    }

    /// The event loop. Returns the time the run ended at.
    fn process_events(&mut self, abort: &AtomicBool) -> Result<Millis, SimError> {
        let mut final_time = self.duration;
        // Events already due when the last enemy dies still resolve.
        let mut cleared_at: Option<Millis> = None;

        while let Some(at) = self.scheduler.peek_time() {
            if abort.load(Ordering::Relaxed) {
                return Err(SimError::Aborted);
            }
            if at > self.duration || cleared_at.is_some_and(|t| at > t) {
                break;
            }
            if self.processed >= self.settings.max_events_per_run {
                warn!(
                    "Stopping at {}ms after {} events (max_events_per_run)",
                    self.state.current_time(),
                    self.processed
                );
                final_time = self.state.current_time();
                break;
            }
            let Some((at, event)) = self.scheduler.pop() else {
                break;
            };
            self.processed += 1;
            if at != self.state.current_time() {
                self.state = self.state.with_current_time(at)?;
            }
            self.state = self.state.with_iteration_count(self.processed);

            self.handle(event)?;
            self.state = self.state.with_next_event_time(self.scheduler.peek_time());

            if cleared_at.is_none() && self.hostiles_dead() {
                debug!("All enemies dead at {}ms", at);
                cleared_at = Some(at);
            }
        }
        if let Some(at) = cleared_at {
            final_time = at;
        } else if self.scheduler.is_empty() {
            final_time = final_time.min(self.state.current_time());
        }
        Ok(final_time)
    }

    fn hostiles_dead(&self) -> bool {
        let mut hostiles = self.state.units().filter(|u| u.is_hostile()).peekable();
        hostiles.peek().is_some() && hostiles.all(|u| !u.is_alive())
    }

    // ========================================================================
    // Event handling
    // ========================================================================

    fn handle(&mut self, event: SimEvent) -> Result<(), SimError> {
        match event {
            SimEvent::CombatLog(event) => self.dispatch(event),
            SimEvent::CastComplete {
                unit,
                spell,
                target,
                ..
            } => match complete_cast(&self.state, unit, spell, target) {
                Some(event) => self.dispatch(event),
                None => Ok(()),
            },
            SimEvent::PeriodicTick(tick) => self.resolve(|ctx| resolve_periodic_tick(ctx, tick)),
            SimEvent::ProjectileImpact(id) => self.resolve(|ctx| resolve_projectile_impact(ctx, id)),
            SimEvent::AuraExpire {
                unit,
                spell,
                expires_at,
            } => self.resolve(|ctx| resolve_aura_expiry(ctx, unit, spell, expires_at)),
            SimEvent::PowerRegen(unit) => {
                let interval = self.settings.regen_interval_ms;
                self.resolve(|ctx| {
                    if let Some(event) = regen_event(ctx, unit, interval) {
                        ctx.emitter.emit(event);
                    }
                    Ok(())
                })?;
                if self.state.unit(unit).is_some_and(|u| u.is_alive()) {
                    let next = self.state.current_time() + interval;
                    self.scheduler.schedule(next, SimEvent::PowerRegen(unit))?;
                }
                Ok(())
            }
            SimEvent::RotationEvaluate(unit) => self.evaluate(unit),
        }
    }

    /// Run one combat-log event through the bus, then wake the units it affects.
    fn dispatch(&mut self, event: CombatLogEvent) -> Result<(), SimError> {
        let mut ctx = HandlerContext::new(self.state.clone(), &mut self.rng, self.data, &mut self.log);
        self.bus.dispatch(&event, &mut ctx)?;
        let HandlerContext { state, mut emitter, .. } = ctx;
        self.state = state;
        self.schedule_emitted(emitter.drain())?;

        for wake in self.wakes.check(&self.state, &event) {
            self.schedule_eval(wake.unit, wake.at)?;
        }
        Ok(())
    }

    /// Resolve an internal event with a handler context and schedule what it emits.
    fn resolve<F>(&mut self, resolver: F) -> Result<(), SimError>
    where
        F: FnOnce(&mut HandlerContext<'_>) -> Result<(), SimError>,
    {
        let mut ctx = HandlerContext::new(self.state.clone(), &mut self.rng, self.data, &mut self.log);
        resolver(&mut ctx)?;
        let HandlerContext { state, mut emitter, .. } = ctx;
        self.state = state;
        self.schedule_emitted(emitter.drain())
    }

    fn schedule_emitted(&mut self, pending: Vec<(Millis, SimEvent)>) -> Result<(), SimError> {
        let now = self.state.current_time();
        for (delay, event) in pending {
            self.scheduler.schedule(now + delay, event)?;
        }
        Ok(())
    }

    // ========================================================================
    // Rotations
    // ========================================================================

    /// Replace the unit's pending evaluation with one at `at`.
    fn schedule_eval(&mut self, unit: UnitId, at: Millis) -> Result<(), SimError> {
        if let Some(previous) = self.pending_eval.remove(&unit) {
            self.scheduler.cancel(previous);
        }
        let at = at.max(self.state.current_time());
        let id = self.scheduler.schedule(at, SimEvent::RotationEvaluate(unit))?;
        self.pending_eval.insert(unit, id);
        Ok(())
    }

    fn evaluate(&mut self, unit_id: UnitId) -> Result<(), SimError> {
        self.pending_eval.remove(&unit_id);
        self.wakes.remove(unit_id);

        let Some(rotation) = self.rotations.get(&unit_id).cloned() else {
            return Ok(());
        };
        let now = self.state.current_time();
        let unit = UnitAccessor::get(&self.state, unit_id)?;
        if !unit.is_alive() {
            return Ok(());
        }
        if !unit.can_act(now) {
            return self.schedule_eval(unit_id, unit.next_action_time(now));
        }

        let intent = {
            let mut ctx = RotationContext::new(&self.state, unit_id);
            rotation.evaluate(&mut ctx)?;
            ctx.into_intent()
        };

        match intent {
            Some(Intent::Cast { spell, target }) => {
                let (state, events) = begin_cast(&self.state, unit_id, spell, target, self.settings.gcd_ms)?;
                self.state = state;
                for (at, event) in events {
                    self.scheduler.schedule(at, event)?;
                }
                // Casting state is only recorded once START dispatches, so the
                // next decision point is computed here.
                let caster = UnitAccessor::get(&self.state, unit_id)?;
                let cast_time = caster.spell(spell).map_or(0, |s| s.info.cast_time);
                self.schedule_eval(unit_id, (now + cast_time).max(caster.gcd_expiry))
            }
            Some(Intent::Wait(ms)) => self.schedule_eval(unit_id, now + ms.max(1)),
            Some(Intent::WaitUntil(condition)) => self.park(unit_id, condition),
            None => self.park(unit_id, WakeCondition::AnyChange),
        }
    }

    fn park(&mut self, unit: UnitId, condition: WakeCondition) -> Result<(), SimError> {
        let now = self.state.current_time();
        match self.wakes.register(&self.state, unit, condition) {
            Some(wake) if wake.at > now => self.schedule_eval(unit, wake.at),
            Some(_) => {
                // Already satisfied, yet the rotation chose to wait.
                debug!("{} waits on a met condition, parking until its next event", unit);
                // AnyChange is never met up front and has no timed wake.
                let parked = self.wakes.register(&self.state, unit, WakeCondition::AnyChange);
                debug_assert!(parked.is_none(), "AnyChange woke {} immediately", unit);
                Ok(())
            }
            None => Ok(()),
        }
    }
}
