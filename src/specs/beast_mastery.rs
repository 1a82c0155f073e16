//! Beast Mastery hunter
//!
//! Cast handlers for the spells whose effects involve more than their own
//! static data (pet auras, pet damage, procs), the hunter profile bundles and
//! the built-in single-target and pet rotations.

use std::sync::Arc;

use tracing::debug;

use super::{SpecModule, SPEC_HANDLER_PRIORITY};
use crate::combat::bus::{EventBus, EventFilter, HandlerContext, HandlerMeta};
use crate::combat::events::{CombatLogEvent, SpellRef, SubeventKind};
use crate::combat::systems::{aura_event, damage_event, roll_crit, CRIT_MULTIPLIER};
use crate::data::{MetadataProvider, SpellEffect, SpellId};
use crate::error::SimError;
use crate::modifier::{Modifier, ModifierRuntime};
use crate::profile::{BundleId, Dimension, ProfileBundle};
use crate::rotation::{PriorityEntry, PriorityRotation, Rotation, RotationCondition};
use crate::state::{Unit, UnitAccessor, UnitKind, WorldState};
use crate::Millis;

// ============================================================================
// Spell ids
// ============================================================================

pub const BESTIAL_WRATH: SpellId = SpellId(19574);
pub const BARBED_SHOT: SpellId = SpellId(217200);
/// Focus-over-time buff on the hunter
pub const BARBED_SHOT_BUFF: SpellId = SpellId(246152);
pub const FRENZY: SpellId = SpellId(272790);
pub const THRILL_OF_THE_HUNT: SpellId = SpellId(257946);
pub const KILL_COMMAND: SpellId = SpellId(34026);
/// Damage dealt by the pet when the hunter casts Kill Command
pub const PET_KILL_COMMAND: SpellId = SpellId(83381);
pub const DIRE_BEAST: SpellId = SpellId(120679);
pub const COBRA_SHOT: SpellId = SpellId(193455);
pub const MULTI_SHOT: SpellId = SpellId(2643);
pub const BEAST_CLEAVE: SpellId = SpellId(268877);
pub const KILL_SHOT: SpellId = SpellId(53351);
pub const PET_CLAW: SpellId = SpellId(16827);

/// Chance for Kill Command to also call a Dire Beast, in percent.
pub const DIRE_COMMAND_CHANCE: f64 = 15.0;
/// Kill Command cooldown taken off by each Cobra Shot.
pub const COBRA_SHOT_KC_REDUCTION: Millis = 1_000;
/// Bestial Wrath cooldown taken off by each Barbed Shot.
pub const BARBED_SHOT_BW_REDUCTION: Millis = 12_000;

pub const ST_ROTATION: &str = "beast-mastery-st";
pub const PET_ROTATION: &str = "pet-basic";

pub struct BeastMastery;

impl SpecModule for BeastMastery {
    fn id(&self) -> &str {
        "beast-mastery"
    }

    fn register_handlers(&self, bus: &mut EventBus) {
        let on_cast = |spell: SpellId| EventFilter::subevent(SubeventKind::SpellCastSuccess).spell(spell);
        let meta = |id: &str| HandlerMeta::new(id).priority(SPEC_HANDLER_PRIORITY);

        bus.subscribe(on_cast(BARBED_SHOT), meta("bm:barbed-shot"), barbed_shot);
        bus.subscribe(on_cast(KILL_COMMAND), meta("bm:kill-command"), kill_command);
        bus.subscribe(on_cast(MULTI_SHOT), meta("bm:multi-shot"), multi_shot);
        bus.subscribe(on_cast(BESTIAL_WRATH), meta("bm:bestial-wrath"), bestial_wrath);
    }

    fn bundles(&self) -> Vec<ProfileBundle> {
        vec![
            ProfileBundle::new(BundleId::new(Dimension::Class, "hunter"))
                .with_modifier(COBRA_SHOT, kill_command_cdr(false)),
            ProfileBundle::new(BundleId::new(Dimension::Spec, "beast-mastery"))
                .with_modifier(COBRA_SHOT, kill_command_cdr(true))
                .with_modifier(BARBED_SHOT, barbed_wrath()),
        ]
    }

    fn default_profiles(&self) -> Vec<String> {
        vec!["class-hunter".to_string(), "spec-beast-mastery".to_string()]
    }

    fn rotation(&self, name: &str) -> Option<Arc<dyn Rotation>> {
        match name {
            ST_ROTATION => Some(Arc::new(single_target_rotation())),
            PET_ROTATION => Some(Arc::new(pet_rotation())),
            _ => None,
        }
    }

    fn default_rotation(&self, kind: UnitKind) -> Option<&'static str> {
        match kind {
            UnitKind::Player => Some(ST_ROTATION),
            UnitKind::Pet => Some(PET_ROTATION),
            UnitKind::Enemy => None,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// First living pet on `owner`'s side.
pub fn pet_of(state: &WorldState, owner: &Unit) -> Option<Arc<Unit>> {
    state
        .units()
        .find(|u| u.kind == UnitKind::Pet && u.is_alive() && u.is_hostile() == owner.is_hostile())
        .cloned()
}

fn caster_of(ctx: &HandlerContext<'_>, event: &CombatLogEvent) -> Option<Arc<Unit>> {
    event
        .source
        .and_then(|id| ctx.state.unit(id).cloned())
        .or_else(|| UnitAccessor::find_by_guid(&ctx.state, &event.source_guid).ok())
}

/// Damage amount and crit bonus of a spell's first damage effect. Missing
/// data yields `None`.
fn damage_of(data: &dyn MetadataProvider, spell: SpellId) -> Result<Option<(SpellRef, f64, f64)>, SimError> {
    match data.load_spell(spell) {
        Ok(info) => Ok(info.effects.iter().find_map(|effect| match effect {
            SpellEffect::Damage { amount } => Some((SpellRef::from(info.as_ref()), *amount, info.crit_bonus)),
            _ => None,
        })),
        Err(e) if e.is_not_found() => {
            debug!("{}", e);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Roll and emit a damage event for `spell` from `source` to `dest`.
fn strike(
    ctx: &mut HandlerContext<'_>,
    source: &Unit,
    dest: &Unit,
    spell: SpellId,
) -> Result<(), SimError> {
    let Some((spell_ref, amount, crit_bonus)) = damage_of(ctx.data, spell)? else {
        return Ok(());
    };
    let critical = roll_crit(ctx, source, crit_bonus)?;
    let amount = if critical { amount * CRIT_MULTIPLIER } else { amount };
    ctx.emitter
        .emit(damage_event(ctx.now(), source, dest, spell_ref, amount, critical, false));
    Ok(())
}

/// Barbed Shot: focus buff and Thrill of the Hunt on the hunter, a Frenzy
/// stack on the pet.
fn barbed_shot(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(hunter) = caster_of(ctx, event) else {
        return Ok(());
    };
    let now = ctx.now();
    let pet = pet_of(&ctx.state, &hunter).unwrap_or_else(|| Arc::clone(&hunter));

    ctx.emitter
        .emit(aura_event(now, ctx.data, &hunter, &hunter, BARBED_SHOT_BUFF));
    ctx.emitter.emit(aura_event(now, ctx.data, &hunter, &pet, FRENZY));
    ctx.emitter
        .emit(aura_event(now, ctx.data, &hunter, &hunter, THRILL_OF_THE_HUNT));
    Ok(())
}

/// Kill Command: the pet strikes the target. Dire Command may add a Dire
/// Beast hit.
fn kill_command(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(hunter) = caster_of(ctx, event) else {
        return Ok(());
    };
    let Some(target) = event
        .dest
        .and_then(|id| ctx.state.unit(id).cloned())
        .filter(|t| t.is_alive())
    else {
        debug!("{}: Kill Command without a living target", hunter.name);
        return Ok(());
    };

    let striker = pet_of(&ctx.state, &hunter).unwrap_or_else(|| Arc::clone(&hunter));
    strike(ctx, &striker, &target, PET_KILL_COMMAND)?;

    if ctx.rng.roll(DIRE_COMMAND_CHANCE)? {
        debug!("[{}ms] Dire Command proc", ctx.now());
        strike(ctx, &hunter, &target, DIRE_BEAST)?;
    }
    Ok(())
}

/// Multi-Shot: Beast Cleave on the pet
fn multi_shot(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(hunter) = caster_of(ctx, event) else {
        return Ok(());
    };
    let pet = pet_of(&ctx.state, &hunter).unwrap_or_else(|| Arc::clone(&hunter));
    ctx.emitter
        .emit(aura_event(ctx.now(), ctx.data, &hunter, &pet, BEAST_CLEAVE));
    Ok(())
}

fn bestial_wrath(event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<(), SimError> {
    let Some(hunter) = caster_of(ctx, event) else {
        return Ok(());
    };
    ctx.emitter
        .emit(aura_event(ctx.now(), ctx.data, &hunter, &hunter, BESTIAL_WRATH));
    Ok(())
}

// ============================================================================
// Modifiers
// ============================================================================

/// Take `amount` off `spell`'s cooldown. Units without the spell are left alone.
fn reduce_cooldown(rt: &mut dyn ModifierRuntime, spell: SpellId, amount: Millis) -> Result<(), SimError> {
    let now = rt.current_time();
    match rt.spell(spell) {
        Ok(spell) => rt.update_spell(spell.cooldown().reduce(amount, now)),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}

/// Cobra Shot shortens Kill Command. With `killer_cobra`, a Cobra Shot during
/// Bestial Wrath resets it instead.
fn kill_command_cdr(killer_cobra: bool) -> Modifier {
    Modifier::new("kill-command-cdr").on_cast(move |rt, _| {
        if killer_cobra && rt.player()?.aura(BESTIAL_WRATH).is_some() {
            let now = rt.current_time();
            return match rt.spell(KILL_COMMAND) {
                Ok(kc) => {
                    rt.log("Killer Cobra resets Kill Command");
                    rt.update_spell(kc.cooldown().reset(now))
                }
                Err(e) if e.is_not_found() => Ok(()),
                Err(e) => Err(e),
            };
        }
        reduce_cooldown(rt, KILL_COMMAND, COBRA_SHOT_KC_REDUCTION)
    })
}

/// Barbed Shot shortens Bestial Wrath
fn barbed_wrath() -> Modifier {
    Modifier::new("barbed-wrath")
        .on_cast(|rt, _| reduce_cooldown(rt, BESTIAL_WRATH, BARBED_SHOT_BW_REDUCTION))
}

// ============================================================================
// Rotations
// ============================================================================

pub fn single_target_rotation() -> PriorityRotation {
    PriorityRotation::new(
        ST_ROTATION,
        vec![
            PriorityEntry::new(BESTIAL_WRATH),
            PriorityEntry::new(BARBED_SHOT).when(RotationCondition::ChargesAtLeast {
                spell: BARBED_SHOT,
                charges: 2,
            }),
            PriorityEntry::new(BARBED_SHOT).when(RotationCondition::AuraMissing {
                aura: BARBED_SHOT_BUFF,
                on_target: false,
            }),
            PriorityEntry::new(KILL_SHOT).when(RotationCondition::TargetHealthBelow { pct: 0.2 }),
            PriorityEntry::new(KILL_COMMAND),
            PriorityEntry::new(BARBED_SHOT),
            PriorityEntry::new(COBRA_SHOT).when(RotationCondition::PowerAtLeast { amount: 50.0 }),
        ],
    )
}

pub fn pet_rotation() -> PriorityRotation {
    PriorityRotation::new(PET_ROTATION, vec![PriorityEntry::new(PET_CLAW)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::events::Subevent;
    use crate::combat::log::CombatLog;
    use crate::data::InMemoryMetadata;
    use crate::modifier::{run_hooks, ModifierPhase, ScopedRuntime};
    use crate::rng::SimRng;
    use crate::rotation::{Intent, RotationContext};
    use crate::scheduler::SimEvent;
    use crate::specs::composer_for;
    use crate::state::{Aura, Spell, SpellAccessor, UnitId};

    fn data() -> InMemoryMetadata {
        InMemoryMetadata::from_ron(include_str!("../../assets/config/spells.ron"), None).unwrap()
    }

    struct World {
        state: WorldState,
        hunter: UnitId,
        pet: UnitId,
        dummy: UnitId,
    }

    fn world(data: &InMemoryMetadata, with_pet: bool) -> World {
        let spells = [BESTIAL_WRATH, BARBED_SHOT, KILL_COMMAND, COBRA_SHOT, MULTI_SHOT, KILL_SHOT];
        let (state, hunter) = WorldState::new().insert_unit(|id| {
            spells.iter().fold(
                Unit::new(id, "Hunter", UnitKind::Player, 1_000.0).with_power(100.0, 5.0),
                |unit, spell| unit.with_spell(Spell::new(data.load_spell(*spell).unwrap())),
            )
        });
        let (state, pet) = if with_pet {
            state.insert_unit(|id| {
                Unit::new(id, "Cat", UnitKind::Pet, 500.0)
                    .with_spell(Spell::new(data.load_spell(PET_CLAW).unwrap()))
            })
        } else {
            (state, hunter)
        };
        let (state, dummy) = state.insert_unit(|id| Unit::new(id, "Dummy", UnitKind::Enemy, 100_000.0));
        World {
            state,
            hunter,
            pet,
            dummy,
        }
    }

    fn cast_success(w: &World, spell: SpellId) -> CombatLogEvent {
        let hunter = w.state.unit(w.hunter).unwrap();
        let dummy = w.state.unit(w.dummy).unwrap();
        CombatLogEvent::new(
            0,
            hunter,
            Some(dummy.as_ref()),
            Subevent::SpellCastSuccess {
                spell: SpellRef::new(spell, "Cast", Default::default()),
            },
        )
    }

    fn emitted(w: &World, data: &InMemoryMetadata, seed: u64, spell: SpellId) -> Vec<CombatLogEvent> {
        let mut bus = EventBus::new();
        BeastMastery.register_handlers(&mut bus);
        let mut rng = SimRng::from_seed(seed);
        let mut log = CombatLog::default();
        let mut ctx = HandlerContext::new(w.state.clone(), &mut rng, data, &mut log);
        bus.dispatch(&cast_success(w, spell), &mut ctx).unwrap();
        ctx.emitter
            .drain()
            .into_iter()
            .filter_map(|(_, event)| match event {
                SimEvent::CombatLog(event) => Some(event),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_barbed_shot_buffs_hunter_and_pet() {
        let data = data();
        let w = world(&data, true);
        let events = emitted(&w, &data, 1, BARBED_SHOT);
        let hunter_guid = &w.state.unit(w.hunter).unwrap().guid;
        let pet_guid = &w.state.unit(w.pet).unwrap().guid;

        let on = |spell: SpellId| events.iter().find(|e| e.spell_id() == Some(spell)).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(&on(BARBED_SHOT_BUFF).dest_guid, hunter_guid);
        assert_eq!(&on(FRENZY).dest_guid, pet_guid);
        assert_eq!(on(FRENZY).kind(), SubeventKind::SpellAuraApplied);
        assert_eq!(&on(THRILL_OF_THE_HUNT).dest_guid, hunter_guid);
    }

    #[test]
    fn test_frenzy_on_existing_stack_is_a_dose() {
        let data = data();
        let mut w = world(&data, true);
        let pet = w.state.unit(w.pet).unwrap();
        let frenzy = Aura::new(FRENZY, w.hunter, 3, 8_000, 0);
        w.state = w.state.with_unit(pet.with_aura(frenzy)).unwrap();

        let events = emitted(&w, &data, 1, BARBED_SHOT);
        let frenzy = events.iter().find(|e| e.spell_id() == Some(FRENZY)).unwrap();
        assert!(matches!(
            frenzy.payload,
            Subevent::SpellAuraAppliedDose { amount: Some(2), .. }
        ));
    }

    #[test]
    fn test_kill_command_strikes_from_pet() {
        let data = data();
        let w = world(&data, true);
        let events = emitted(&w, &data, 7, KILL_COMMAND);
        let kc = events
            .iter()
            .find(|e| e.spell_id() == Some(PET_KILL_COMMAND))
            .unwrap();
        assert_eq!(kc.source, Some(w.pet));
        assert_eq!(kc.dest, Some(w.dummy));
        assert!(kc.is_damage());
        assert!(kc.amount().unwrap() > 0.0);
    }

    #[test]
    fn test_kill_command_without_pet_uses_hunter() {
        let data = data();
        let w = world(&data, false);
        let events = emitted(&w, &data, 7, KILL_COMMAND);
        let kc = events
            .iter()
            .find(|e| e.spell_id() == Some(PET_KILL_COMMAND))
            .unwrap();
        assert_eq!(kc.source, Some(w.hunter));
    }

    #[test]
    fn test_dire_command_procs_at_roughly_its_chance() {
        let data = data();
        let w = world(&data, true);
        let procs = (0..1_000)
            .filter(|seed| {
                emitted(&w, &data, *seed, KILL_COMMAND)
                    .iter()
                    .any(|e| e.spell_id() == Some(DIRE_BEAST))
            })
            .count();
        assert!((100..200).contains(&procs), "got {} procs", procs);
    }

    #[test]
    fn test_multi_shot_and_bestial_wrath_auras() {
        let data = data();
        let w = world(&data, true);
        let cleave = emitted(&w, &data, 1, MULTI_SHOT);
        assert_eq!(cleave.len(), 1);
        assert_eq!(cleave[0].dest, Some(w.pet));

        let wrath = emitted(&w, &data, 1, BESTIAL_WRATH);
        assert_eq!(wrath[0].dest, Some(w.hunter));
        assert_eq!(wrath[0].spell_id(), Some(BESTIAL_WRATH));
    }

    fn run_on_cast(w: &World, data: &InMemoryMetadata, state: WorldState, spell: SpellId) -> WorldState {
        let composer = composer_for(&BeastMastery);
        let profile = composer.compose_ids(&BeastMastery.default_profiles()).unwrap();
        let mut rng = SimRng::from_seed(1);
        let mut log = CombatLog::default();
        let mut ctx = HandlerContext::new(state, &mut rng, data, &mut log);
        let cast = SpellAccessor::get(&ctx.state, w.hunter, spell).unwrap().spell;
        run_hooks(
            profile.modifiers_for(spell),
            ModifierPhase::OnCast,
            &mut ScopedRuntime::new(&mut ctx, w.hunter),
            &cast,
        )
        .unwrap();
        ctx.state
    }

    #[test]
    fn test_spec_bundle_overrides_class_cdr() {
        let composer = composer_for(&BeastMastery);
        let profile = composer.compose_ids(&BeastMastery.default_profiles()).unwrap();
        assert_eq!(profile.modifier_names(COBRA_SHOT), vec!["kill-command-cdr"]);
        assert_eq!(profile.modifier_names(BARBED_SHOT), vec!["barbed-wrath"]);

        let class_only = composer.compose_ids(&["class-hunter"]).unwrap();
        assert!(class_only.modifier_names(BARBED_SHOT).is_empty());
    }

    #[test]
    fn test_cobra_shot_reduces_kill_command() {
        let data = data();
        let w = world(&data, true);
        let state = SpellAccessor::update(&w.state, w.hunter, KILL_COMMAND, |s| s.cooldown().trigger(7_500, 0)).unwrap();
        let state = run_on_cast(&w, &data, state, COBRA_SHOT);
        let kc = SpellAccessor::get(&state, w.hunter, KILL_COMMAND).unwrap();
        assert_eq!(kc.spell.cooldown_expiry, 6_500);
    }

    #[test]
    fn test_killer_cobra_resets_kill_command_during_bestial_wrath() {
        let data = data();
        let w = world(&data, true);
        let state = SpellAccessor::update(&w.state, w.hunter, KILL_COMMAND, |s| s.cooldown().trigger(7_500, 0)).unwrap();
        let hunter = state.unit(w.hunter).unwrap();
        let state = state
            .with_unit(hunter.with_aura(Aura::new(BESTIAL_WRATH, w.hunter, 1, 15_000, 0)))
            .unwrap();

        let state = run_on_cast(&w, &data, state, COBRA_SHOT);
        assert!(SpellAccessor::get(&state, w.hunter, KILL_COMMAND).unwrap().is_ready);
    }

    #[test]
    fn test_barbed_shot_reduces_bestial_wrath() {
        let data = data();
        let w = world(&data, true);
        let state = SpellAccessor::update(&w.state, w.hunter, BESTIAL_WRATH, |s| s.cooldown().trigger(90_000, 0)).unwrap();
        let state = run_on_cast(&w, &data, state, BARBED_SHOT);
        let bw = SpellAccessor::get(&state, w.hunter, BESTIAL_WRATH).unwrap();
        assert_eq!(bw.spell.cooldown_expiry, 78_000);
    }

    #[test]
    fn test_rotation_opens_with_bestial_wrath_then_barbed_shot() {
        let data = data();
        let w = world(&data, true);
        let rotation = BeastMastery.rotation(ST_ROTATION).unwrap();

        let mut ctx = RotationContext::new(&w.state, w.hunter);
        rotation.evaluate(&mut ctx).unwrap();
        assert!(matches!(ctx.into_intent(), Some(Intent::Cast { spell: BESTIAL_WRATH, .. })));

        let state = SpellAccessor::update(&w.state, w.hunter, BESTIAL_WRATH, |s| s.cooldown().trigger(90_000, 0)).unwrap();
        let mut ctx = RotationContext::new(&state, w.hunter);
        rotation.evaluate(&mut ctx).unwrap();
        assert!(matches!(
            ctx.into_intent(),
            Some(Intent::Cast {
                spell: BARBED_SHOT,
                target: Some(t)
            }) if t == w.dummy
        ));
    }

    #[test]
    fn test_pet_claws_and_defaults_by_kind() {
        let data = data();
        let w = world(&data, true);
        let mut ctx = RotationContext::new(&w.state, w.pet);
        BeastMastery.rotation(PET_ROTATION).unwrap().evaluate(&mut ctx).unwrap();
        assert!(matches!(ctx.into_intent(), Some(Intent::Cast { spell: PET_CLAW, .. })));

        assert_eq!(BeastMastery.default_rotation(UnitKind::Pet), Some(PET_ROTATION));
        assert_eq!(BeastMastery.default_rotation(UnitKind::Enemy), None);
        assert!(BeastMastery.rotation("frost-st").is_none());
    }
}
