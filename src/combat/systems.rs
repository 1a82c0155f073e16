//! State mutation handlers
//!
//! One handler per subevent kind, registered in the `Core` phase at
//! [`MUTATION_PRIORITY`]. Each reads the entity it touches, computes the next
//! value through a Bounded/Expiry transform and writes it back.
//!
//! The `resolve_*` functions handle the non-log events the driver wakes up for
//! (projectile impacts, aura ticks, aura expiry, power regeneration) by
//! emitting the combat-log event they turn into.

use std::sync::Arc;

use tracing::{debug, warn};

use super::bus::{EventBus, EventFilter, HandlerContext, HandlerMeta, MUTATION_PRIORITY};
use super::events::{AuraType, CombatLogEvent, SpellRef, Subevent, SubeventKind};
use crate::data::{AuraInfo, MetadataProvider, PeriodicKind, RefreshBehavior, SpellEffect, SpellId, SpellInfo};
use crate::error::SimError;
use crate::modifier::{run_hooks, ModifierPhase, ScopedRuntime};
use crate::scheduler::{PeriodicTick, SimEvent};
use crate::state::{Aura, Projectile, ProjectileId, Spell, Unit, UnitAccessor, UnitId};
use crate::Millis;

/// Share of the base duration carried over by a pandemic refresh, in percent.
pub const PANDEMIC_PERCENT: Millis = 30;

/// Damage and healing multiplier on a critical hit.
pub const CRIT_MULTIPLIER: f64 = 2.0;

/// Register every built-in mutation handler on `bus`.
pub fn register_state_mutations(bus: &mut EventBus) {
    let core = |id: &str| HandlerMeta::new(id).priority(MUTATION_PRIORITY);
    let on = EventFilter::subevent;

    bus.subscribe(on(SubeventKind::SpellCastStart), core("state:cast-start"), cast_start);
    bus.subscribe(on(SubeventKind::SpellCastSuccess), core("state:cast-success"), cast_success);
    bus.subscribe(on(SubeventKind::SpellCastFailed), core("state:cast-failed"), cast_failed);
    bus.subscribe(on(SubeventKind::SpellDamage), core("state:damage"), apply_damage);
    bus.subscribe(on(SubeventKind::SpellPeriodicDamage), core("state:periodic-damage"), apply_damage);
    bus.subscribe(on(SubeventKind::SpellHeal), core("state:heal"), apply_healing);
    bus.subscribe(on(SubeventKind::SpellPeriodicHeal), core("state:periodic-heal"), apply_healing);
    bus.subscribe(on(SubeventKind::SpellAuraApplied), core("state:aura-applied"), aura_applied);
    bus.subscribe(on(SubeventKind::SpellAuraRefresh), core("state:aura-refresh"), aura_refresh);
    bus.subscribe(on(SubeventKind::SpellAuraAppliedDose), core("state:aura-applied-dose"), aura_applied_dose);
    bus.subscribe(on(SubeventKind::SpellAuraRemovedDose), core("state:aura-removed-dose"), aura_removed_dose);
    bus.subscribe(on(SubeventKind::SpellAuraRemoved), core("state:aura-removed"), aura_removed);
    bus.subscribe(on(SubeventKind::SpellEnergize), core("state:energize"), power_gain);
    bus.subscribe(on(SubeventKind::SpellDrain), core("state:drain"), power_loss);
    bus.subscribe(on(SubeventKind::SpellCooldownReady), core("state:cooldown-ready"), cooldown_ready);
    bus.subscribe(on(SubeventKind::SpellChargeReady), core("state:charge-ready"), charge_ready);
    bus.subscribe(on(SubeventKind::UnitDied), core("state:unit-died"), unit_died);
}

// ============================================================================
// Lookups and event builders
// ============================================================================

fn source_of(ctx: &HandlerContext<'_>, event: &CombatLogEvent) -> Option<Arc<Unit>> {
    event
        .source
        .and_then(|id| ctx.state.unit(id).cloned())
        .or_else(|| UnitAccessor::find_by_guid(&ctx.state, &event.source_guid).ok())
}

fn dest_of(ctx: &HandlerContext<'_>, event: &CombatLogEvent) -> Option<Arc<Unit>> {
    event
        .dest
        .and_then(|id| ctx.state.unit(id).cloned())
        .or_else(|| UnitAccessor::find_by_guid(&ctx.state, &event.dest_guid).ok())
}

/// Spell triple and aura definition for an aura spell. Spells missing from
/// the data get a placeholder name and a permanent single-stack aura.
pub fn aura_definition(data: &dyn MetadataProvider, spell: SpellId) -> (SpellRef, AuraInfo) {
    match data.load_spell(spell) {
        Ok(info) => (SpellRef::from(info.as_ref()), info.aura.clone().unwrap_or_default()),
        Err(_) => {
            debug!("No aura definition for spell {}, using defaults", spell);
            (
                SpellRef::new(spell, format!("Spell {}", spell), Default::default()),
                AuraInfo::default(),
            )
        }
    }
}

/// Roll a crit for `caster` casting `info`. Chances above 100 are capped.
pub fn roll_crit(ctx: &mut HandlerContext<'_>, caster: &Unit, crit_bonus: f64) -> Result<bool, SimError> {
    let chance = (caster.crit_chance + crit_bonus).clamp(0.0, 100.0);
    ctx.rng.roll(chance)
}

/// `SPELL_DAMAGE` (or periodic) with overkill against `dest`'s current health.
pub fn damage_event(
    now: Millis,
    source: &Unit,
    dest: &Unit,
    spell: SpellRef,
    amount: f64,
    critical: bool,
    periodic: bool,
) -> CombatLogEvent {
    let overkill = (amount - dest.health.current).max(0.0);
    let payload = if periodic {
        Subevent::SpellPeriodicDamage {
            spell,
            amount,
            overkill,
            critical,
        }
    } else {
        Subevent::SpellDamage {
            spell,
            amount,
            overkill,
            critical,
        }
    };
    CombatLogEvent::new(now, source, Some(dest), payload)
}

/// `SPELL_HEAL` (or periodic) with overhealing against `dest`'s missing health.
pub fn heal_event(
    now: Millis,
    source: &Unit,
    dest: &Unit,
    spell: SpellRef,
    amount: f64,
    critical: bool,
    periodic: bool,
) -> CombatLogEvent {
    let overhealing = (dest.health.current + amount - dest.health.max).max(0.0);
    let payload = if periodic {
        Subevent::SpellPeriodicHeal {
            spell,
            amount,
            overhealing,
            critical,
        }
    } else {
        Subevent::SpellHeal {
            spell,
            amount,
            overhealing,
            critical,
        }
    };
    CombatLogEvent::new(now, source, Some(dest), payload)
}

/// `SPELL_ENERGIZE` on the unit itself.
pub fn energize_event(now: Millis, unit: &Unit, spell: SpellRef, amount: f64) -> CombatLogEvent {
    let over_energize = (unit.power.current + amount - unit.power.max).max(0.0);
    CombatLogEvent::on_self(
        now,
        unit,
        Subevent::SpellEnergize {
            spell,
            amount,
            over_energize,
        },
    )
}

/// Applied, dose or refresh event depending on what `dest` already has.
pub fn aura_event(
    now: Millis,
    data: &dyn MetadataProvider,
    caster: &Unit,
    dest: &Unit,
    aura_spell: SpellId,
) -> CombatLogEvent {
    let (spell, _) = aura_definition(data, aura_spell);
    let aura_type = if dest.is_hostile() == caster.is_hostile() {
        AuraType::Buff
    } else {
        AuraType::Debuff
    };
    let payload = match dest.aura(aura_spell) {
        None => Subevent::SpellAuraApplied {
            spell,
            aura_type,
            amount: None,
        },
        Some(aura) if aura.stacks < aura.max_stacks => Subevent::SpellAuraAppliedDose {
            spell,
            aura_type,
            amount: Some(aura.stacks + 1),
        },
        Some(_) => Subevent::SpellAuraRefresh {
            spell,
            aura_type,
            amount: None,
        },
    };
    CombatLogEvent::new(now, caster, Some(dest), payload)
}

// ============================================================================
// Health
// ============================================================================

/// Apply direct or periodic damage to the destination unit
pub fn apply_damage(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(amount) = event.amount() else {
        return Ok(());
    };
    let Some(dest) = dest_of(ctx, event) else {
        return Ok(());
    };
    if !dest.is_alive() {
        return Ok(());
    }

    let now = ctx.now();
    let before = dest.health.current;
    let updated = dest.health().decrement(amount, now);
    let died = before > 0.0 && updated.health.current <= 0.0;
    if amount > before {
        debug!("{} overkilled by {:.0}", dest.name, amount - before);
    }
    ctx.state = ctx.state.with_unit(updated)?;

    // Source spell's on-damage modifiers
    if let (Some(source), Some(spell_id)) = (source_of(ctx, event), event.spell_id()) {
        if let Some(spell) = source.spell(spell_id).cloned() {
            if !spell.modifiers.is_empty() {
                let mut runtime = ScopedRuntime::new(ctx, source.id);
                if let Err(e) = run_hooks(&spell.modifiers, ModifierPhase::OnDamage, &mut runtime, &spell) {
                    warn!("{}", e);
                }
            }
        }
    }

    if died {
        if let Some(dead) = ctx.state.unit(dest.id).cloned() {
            ctx.emitter.emit(CombatLogEvent::on_self(now, &dead, Subevent::UnitDied));
        }
    }
    Ok(())
}

/// Apply direct or periodic healing, clamped to max health
pub fn apply_healing(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(amount), Some(dest)) = (event.amount(), dest_of(ctx, event)) else {
        return Ok(());
    };
    if !dest.is_alive() {
        return Ok(());
    }
    ctx.state = ctx.state.with_unit(dest.health().increment(amount, ctx.now()))?;
    Ok(())
}

// ============================================================================
// Auras
// ============================================================================

fn schedule_expiry(ctx: &mut HandlerContext<'_>, unit: UnitId, aura: &Aura) {
    if aura.is_permanent() {
        return;
    }
    let now = ctx.now();
    ctx.emitter.schedule(
        aura.expires_at.saturating_sub(now),
        SimEvent::AuraExpire {
            unit,
            spell: aura.spell_id,
            expires_at: aura.expires_at,
        },
    );
}

fn refreshed(aura: &Aura, def: &AuraInfo, now: Millis) -> Aura {
    if def.duration == 0 {
        return aura.clone();
    }
    match def.refresh {
        RefreshBehavior::Duration => aura.expiry().refresh(def.duration, now),
        RefreshBehavior::Pandemic => {
            let carry = aura.remaining(now).min(def.duration * PANDEMIC_PERCENT / 100);
            aura.expiry().refresh(def.duration + carry, now)
        }
    }
}

/// Create the aura record, schedule its expiry and first tick
pub fn aura_applied(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(dest)) = (event.spell_id(), dest_of(ctx, event)) else {
        return Ok(());
    };
    if !dest.is_alive() {
        return Ok(());
    }
    if dest.aura(spell_id).is_some() {
        // Re-application of an active aura behaves like a refresh.
        return aura_refresh(event, ctx);
    }

    let now = ctx.now();
    let (_, def) = aura_definition(ctx.data, spell_id);
    let caster = source_of(ctx, event).map(|u| u.id).unwrap_or(dest.id);
    let aura = Aura::new(spell_id, caster, def.max_stacks, def.duration, now);

    ctx.state = ctx.state.with_unit(dest.with_aura(aura.clone()))?;
    schedule_expiry(ctx, dest.id, &aura);

    if let Some(periodic) = &def.periodic {
        let tick = PeriodicTick {
            unit: dest.id,
            caster,
            spell: spell_id,
            applied_at: now,
        };
        let delay = if periodic.tick_on_application { 0 } else { periodic.period };
        ctx.emitter.schedule(delay, SimEvent::PeriodicTick(tick));
    }
    Ok(())
}

/// Extend an active aura per its refresh behaviour
pub fn aura_refresh(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(dest)) = (event.spell_id(), dest_of(ctx, event)) else {
        return Ok(());
    };
    let Some(aura) = dest.aura(spell_id) else {
        return aura_applied(event, ctx);
    };

    let now = ctx.now();
    let (_, def) = aura_definition(ctx.data, spell_id);
    let next = refreshed(aura, &def, now);
    ctx.state = ctx.state.with_unit(dest.with_aura(next.clone()))?;
    schedule_expiry(ctx, dest.id, &next);
    Ok(())
}

/// Add a stack (capped) and refresh the duration
pub fn aura_applied_dose(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(dest)) = (event.spell_id(), dest_of(ctx, event)) else {
        return Ok(());
    };
    let Some(aura) = dest.aura(spell_id) else {
        return aura_applied(event, ctx);
    };

    let now = ctx.now();
    let (_, def) = aura_definition(ctx.data, spell_id);
    let stacked = aura.stacks().increment(1, now);
    let next = refreshed(&stacked, &def, now);
    ctx.state = ctx.state.with_unit(dest.with_aura(next.clone()))?;
    schedule_expiry(ctx, dest.id, &next);
    Ok(())
}

/// Remove a stack; the aura goes away at zero
pub fn aura_removed_dose(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(dest)) = (event.spell_id(), dest_of(ctx, event)) else {
        return Ok(());
    };
    let Some(aura) = dest.aura(spell_id) else {
        return Ok(());
    };

    let next = aura.stacks().decrement(1, ctx.now());
    let unit = if next.stacks == 0 {
        dest.without_aura(spell_id)
    } else {
        dest.with_aura(next)
    };
    ctx.state = ctx.state.with_unit(unit)?;
    Ok(())
}

/// Delete the aura record
pub fn aura_removed(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(dest)) = (event.spell_id(), dest_of(ctx, event)) else {
        return Ok(());
    };
    if dest.aura(spell_id).is_some() {
        ctx.state = ctx.state.with_unit(dest.without_aura(spell_id))?;
    }
    Ok(())
}

/// Emit `SPELL_AURA_REMOVED` if the aura still expires at `expires_at`.
/// Refreshed auras have a later expiry and ignore the old deadline.
pub fn resolve_aura_expiry(
    ctx: &mut HandlerContext<'_>,
    unit: UnitId,
    spell: SpellId,
    expires_at: Millis,
) -> Result<(), SimError> {
    let Some(dest) = ctx.state.unit(unit).cloned() else {
        return Ok(());
    };
    let Some(aura) = dest.aura(spell) else {
        return Ok(());
    };
    if aura.expires_at != expires_at {
        return Ok(());
    }

    let caster = ctx.state.unit(aura.caster).cloned().unwrap_or_else(|| Arc::clone(&dest));
    let (spell_ref, _) = aura_definition(ctx.data, spell);
    let aura_type = if dest.is_hostile() == caster.is_hostile() {
        AuraType::Buff
    } else {
        AuraType::Debuff
    };
    ctx.emitter.emit(CombatLogEvent::new(
        ctx.now(),
        &caster,
        Some(&dest),
        Subevent::SpellAuraRemoved {
            spell: spell_ref,
            aura_type,
            amount: None,
        },
    ));
    Ok(())
}

/// Emit one periodic tick and schedule the next while the aura lives.
pub fn resolve_periodic_tick(ctx: &mut HandlerContext<'_>, tick: PeriodicTick) -> Result<(), SimError> {
    let Some(unit) = ctx.state.unit(tick.unit).cloned() else {
        return Ok(());
    };
    let Some(aura) = unit.aura(tick.spell).cloned() else {
        return Ok(());
    };
    if aura.applied_at != tick.applied_at || ctx.now() > aura.expires_at || !unit.is_alive() {
        return Ok(());
    }
    let (spell_ref, def) = aura_definition(ctx.data, tick.spell);
    let Some(periodic) = def.periodic else {
        return Ok(());
    };

    let now = ctx.now();
    let caster = ctx.state.unit(tick.caster).cloned().unwrap_or_else(|| Arc::clone(&unit));
    let amount = periodic.amount * f64::from(aura.stacks);
    let event = match periodic.kind {
        PeriodicKind::Energize => energize_event(now, &unit, spell_ref, amount),
        kind => {
            let critical = roll_crit(ctx, &caster, 0.0)?;
            let amount = if critical { amount * CRIT_MULTIPLIER } else { amount };
            if kind == PeriodicKind::Heal {
                heal_event(now, &caster, &unit, spell_ref, amount, critical, true)
            } else {
                damage_event(now, &caster, &unit, spell_ref, amount, critical, true)
            }
        }
    };
    ctx.emitter.emit(event);

    // Always re-armed: a refresh or dose before the next tick can push the
    // expiry past it. A tick landing after the expiry is dropped above.
    if periodic.period > 0 {
        ctx.emitter.schedule(periodic.period, SimEvent::PeriodicTick(tick));
    }
    Ok(())
}

// ============================================================================
// Power
// ============================================================================

/// Restore power on the destination unit
pub fn power_gain(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(amount), Some(dest)) = (event.amount(), dest_of(ctx, event)) else {
        return Ok(());
    };
    ctx.state = ctx.state.with_unit(dest.power().increment(amount, ctx.now()))?;
    Ok(())
}

/// Drain power from the destination unit
pub fn power_loss(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(amount), Some(dest)) = (event.amount(), dest_of(ctx, event)) else {
        return Ok(());
    };
    ctx.state = ctx.state.with_unit(dest.power().decrement(amount, ctx.now()))?;
    Ok(())
}

/// Periodic regeneration for one unit, if it has anything to regenerate.
pub fn regen_event(ctx: &HandlerContext<'_>, unit: UnitId, interval: Millis) -> Option<CombatLogEvent> {
    let unit = ctx.state.unit(unit)?;
    if !unit.is_alive() || unit.power_regen <= 0.0 || unit.power.current >= unit.power.max {
        return None;
    }
    let amount = unit.power_regen * interval as f64 / 1000.0;
    Some(energize_event(ctx.now(), unit, SpellRef::regeneration(), amount))
}

// ============================================================================
// Units
// ============================================================================

/// Clear casting state and every aura on the dead unit
pub fn unit_died(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(dest) = dest_of(ctx, event) else {
        return Ok(());
    };
    let mut dead = dest.with_casting(None);
    dead.auras.clear();
    debug!("[{}ms] {} died", ctx.now(), dest.name);
    ctx.state = ctx.state.with_unit(dead)?;
    Ok(())
}

// ============================================================================
// Casting
// ============================================================================

/// Record the in-progress cast for spells with a cast time
pub fn cast_start(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(caster)) = (event.spell_id(), source_of(ctx, event)) else {
        return Ok(());
    };
    let Some(spell) = caster.spell(spell_id) else {
        return Ok(());
    };
    if spell.info.cast_time == 0 {
        return Ok(());
    }

    let now = ctx.now();
    let casting = crate::state::CastingState {
        spell_id,
        target: event.dest,
        started_at: now,
        ends_at: now + spell.info.cast_time,
    };
    ctx.state = ctx.state.with_unit(caster.with_casting(Some(casting)))?;
    Ok(())
}

/// Consume a charge or start the cooldown, scheduling the matching ready event.
fn commit_cooldown(ctx: &mut HandlerContext<'_>, caster: &Unit, spell: &Spell) -> Spell {
    let now = ctx.now();
    let info = &spell.info;
    let spell_ref = SpellRef::from(info.as_ref());

    if info.has_charges() {
        let next = spell.charges().decrement(1, now);
        // The recharge timer only starts when a full spell loses a charge.
        if spell.charges >= info.max_charges && info.charge_recovery > 0 {
            let recovery = info.charge_recovery;
            ctx.emitter.emit_at(
                recovery,
                CombatLogEvent::on_self(now + recovery, caster, Subevent::SpellChargeReady { spell: spell_ref }),
            );
            return next.charge_timer().trigger(recovery, now);
        }
        next
    } else if info.cooldown > 0 {
        ctx.emitter.emit_at(
            info.cooldown,
            CombatLogEvent::on_self(
                now + info.cooldown,
                caster,
                Subevent::SpellCooldownReady { spell: spell_ref },
            ),
        );
        spell.cooldown().trigger(info.cooldown, now)
    } else {
        spell.clone()
    }
}

/// Finish a cast: clear casting state, pay costs, run on-cast modifiers and
/// resolve the spell's effects
pub fn cast_success(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(caster)) = (event.spell_id(), source_of(ctx, event)) else {
        return Ok(());
    };
    let now = ctx.now();
    let caster = caster.with_casting(None);

    // Casts of spells the unit doesn't own (emitted by spec handlers) only log.
    let Some(spell) = caster.spell(spell_id).cloned() else {
        ctx.state = ctx.state.with_unit(caster)?;
        return Ok(());
    };

    let paid = caster.power().decrement(spell.info.cost, now);
    let committed = commit_cooldown(ctx, &paid, &spell);
    ctx.state = ctx.state.with_unit(paid.with_spell(committed.clone()))?;

    if !committed.modifiers.is_empty() {
        let mut runtime = ScopedRuntime::new(ctx, caster.id);
        if let Err(e) = run_hooks(&committed.modifiers, ModifierPhase::OnCast, &mut runtime, &committed) {
            warn!("{}", e);
        }
    }

    resolve_effects(event, ctx, caster.id, &spell.info)
}

fn resolve_effects(
    event: &CombatLogEvent,
    ctx: &mut HandlerContext<'_>,
    caster_id: UnitId,
    info: &SpellInfo,
) -> Result<(), SimError> {
    let now = ctx.now();
    let target_id = dest_of(ctx, event).map(|d| d.id);

    for effect in &info.effects {
        let caster = UnitAccessor::get(&ctx.state, caster_id)?;
        let target = target_id.and_then(|id| ctx.state.unit(id).cloned());

        match effect {
            SpellEffect::Damage { amount } => {
                let Some(target) = target.filter(|t| t.is_alive()) else {
                    debug!("{} has no living target for {}", caster.name, info.name);
                    continue;
                };
                let critical = roll_crit(ctx, &caster, info.crit_bonus)?;
                let amount = if critical { amount * CRIT_MULTIPLIER } else { *amount };

                match info.travel_time {
                    Some(travel) if travel > 0 => {
                        let (state, projectile) = ctx.state.insert_projectile(|id| Projectile {
                            id,
                            caster: caster.id,
                            target: target.id,
                            spell_id: info.id,
                            launch_time: now,
                            impact_time: now + travel,
                            damage: amount,
                            critical,
                        });
                        ctx.state = state;
                        ctx.emitter.schedule(travel, SimEvent::ProjectileImpact(projectile));
                    }
                    _ => ctx.emitter.emit(damage_event(
                        now,
                        &caster,
                        &target,
                        SpellRef::from(info),
                        amount,
                        critical,
                        false,
                    )),
                }
            }
            SpellEffect::Heal { amount } => {
                let dest = target
                    .filter(|t| t.is_hostile() == caster.is_hostile())
                    .unwrap_or_else(|| Arc::clone(&caster));
                let critical = roll_crit(ctx, &caster, info.crit_bonus)?;
                let amount = if critical { amount * CRIT_MULTIPLIER } else { *amount };
                ctx.emitter
                    .emit(heal_event(now, &caster, &dest, SpellRef::from(info), amount, critical, false));
            }
            SpellEffect::ApplyAura { spell, target_self } => {
                let dest = if *target_self {
                    Arc::clone(&caster)
                } else {
                    target.unwrap_or_else(|| Arc::clone(&caster))
                };
                ctx.emitter.emit(aura_event(now, ctx.data, &caster, &dest, *spell));
            }
            SpellEffect::Energize { amount } => {
                ctx.emitter
                    .emit(energize_event(now, &caster, SpellRef::from(info), *amount));
            }
        }
    }
    Ok(())
}

/// A cast that didn't complete just clears casting state
pub fn cast_failed(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(caster) = source_of(ctx, event) else {
        return Ok(());
    };
    if caster.is_casting() {
        ctx.state = ctx.state.with_unit(caster.with_casting(None))?;
    }
    Ok(())
}

/// Land a projectile: remove it and emit its damage
pub fn resolve_projectile_impact(ctx: &mut HandlerContext<'_>, id: ProjectileId) -> Result<(), SimError> {
    let Some(projectile) = ctx.state.projectile(id).cloned() else {
        return Ok(());
    };
    ctx.state = ctx.state.remove_projectile(id);

    let (Some(caster), Some(target)) = (
        ctx.state.unit(projectile.caster).cloned(),
        ctx.state.unit(projectile.target).cloned(),
    ) else {
        return Ok(());
    };
    if !target.is_alive() {
        return Ok(());
    }

    let spell = match caster.spell(projectile.spell_id) {
        Some(spell) => SpellRef::from(spell.info.as_ref()),
        None => aura_definition(ctx.data, projectile.spell_id).0,
    };
    ctx.emitter.emit(damage_event(
        ctx.now(),
        &caster,
        &target,
        spell,
        projectile.damage,
        projectile.critical,
        false,
    ));
    Ok(())
}

// ============================================================================
// Cooldowns
// ============================================================================

/// Expire the cooldown. Ignored when a newer cooldown is running.
pub fn cooldown_ready(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(unit)) = (event.spell_id(), source_of(ctx, event)) else {
        return Ok(());
    };
    let Some(spell) = unit.spell(spell_id) else {
        return Ok(());
    };
    let now = ctx.now();
    if spell.cooldown_expiry > now {
        return Ok(());
    }
    ctx.state = ctx.state.with_unit(unit.with_spell(spell.cooldown().reset(now)))?;
    Ok(())
}

/// Restore one charge and keep recharging while below max
pub fn charge_ready(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let (Some(spell_id), Some(unit)) = (event.spell_id(), source_of(ctx, event)) else {
        return Ok(());
    };
    let Some(spell) = unit.spell(spell_id) else {
        return Ok(());
    };
    let now = ctx.now();
    if spell.charge_expiry > now || spell.charges >= spell.info.max_charges {
        return Ok(());
    }

    let mut next = spell.charges().increment(1, now);
    let recovery = next.info.charge_recovery;
    if next.charges < next.info.max_charges && recovery > 0 {
        let recharging = next.charge_timer().trigger(recovery, now);
        next = recharging;
        ctx.emitter.emit_at(
            recovery,
            CombatLogEvent::on_self(
                now + recovery,
                &unit,
                Subevent::SpellChargeReady {
                    spell: SpellRef::from(next.info.as_ref()),
                },
            ),
        );
    }
    ctx.state = ctx.state.with_unit(unit.with_spell(next))?;
    Ok(())
}
