//! Tests for combat log events, their JSON shape and log aggregation
//!
//! These tests verify that:
//! - Events serialize with the external field names
//! - GUIDs follow the per-kind shapes
//! - The CombatLog aggregates damage, casts and crits per source

use regex::Regex;

use raidsim::combat::events::{AuraType, CombatLogEvent, SpellRef, Subevent, SubeventKind};
use raidsim::combat::log::CombatLog;
use raidsim::data::{SpellId, SpellSchool};
use raidsim::state::{unit_flags, Unit, UnitKind, WorldState};

fn units() -> (Unit, Unit, Unit) {
    let state = WorldState::new();
    let (state, hunter) = state.insert_unit(|id| Unit::new(id, "Hunter", UnitKind::Player, 100.0));
    let (state, pet) = state.insert_unit(|id| Unit::new(id, "Hati", UnitKind::Pet, 100.0));
    let (state, dummy) = state.insert_unit(|id| Unit::new(id, "Dummy", UnitKind::Enemy, 100.0));
    let get = |id| state.unit(id).map(|u| u.as_ref().clone()).unwrap();
    (get(hunter), get(pet), get(dummy))
}

fn spell(id: u32, name: &str) -> SpellRef {
    SpellRef::new(SpellId(id), name, SpellSchool::Physical)
}

fn damage(source: &Unit, dest: &Unit, name: &str, amount: f64, critical: bool) -> CombatLogEvent {
    CombatLogEvent::new(
        1_000,
        source,
        Some(dest),
        Subevent::SpellDamage {
            spell: spell(1, name),
            amount,
            overkill: 0.0,
            critical,
        },
    )
}

fn cast(source: &Unit, name: &str) -> CombatLogEvent {
    CombatLogEvent::new(0, source, None, Subevent::SpellCastSuccess { spell: spell(2, name) })
}

// =============================================================================
// Event Shape Tests
// =============================================================================

#[test]
fn test_guid_shapes() {
    let (hunter, pet, dummy) = units();
    let player = Regex::new(r"^Player-1-[0-9A-F]{8}$").unwrap();
    let pet_guid = Regex::new(r"^Pet-0-0-0-0-0-[0-9A-F]{10}$").unwrap();
    let creature = Regex::new(r"^Creature-0-0-0-0-\d+-[0-9A-F]{10}$").unwrap();

    assert!(player.is_match(&hunter.guid), "{}", hunter.guid);
    assert!(pet_guid.is_match(&pet.guid), "{}", pet.guid);
    assert!(creature.is_match(&dummy.guid), "{}", dummy.guid);
}

#[test]
fn test_unit_flags_by_kind() {
    let (hunter, pet, dummy) = units();
    assert_eq!(hunter.flags, unit_flags::PLAYER);
    assert_eq!(pet.flags, unit_flags::PET);
    assert_eq!(dummy.flags, unit_flags::ENEMY);
    assert_ne!(pet.flags & unit_flags::AFFILIATION_MINE, 0);
    assert_eq!(dummy.flags & unit_flags::AFFILIATION_MINE, 0);
}

#[test]
fn test_damage_event_json_fields() {
    let (hunter, _, dummy) = units();
    let event = damage(&hunter, &dummy, "Cobra Shot", 820.0, true);
    let json = serde_json::to_value(&event).unwrap();

    assert_eq!(json["timestamp"], 1_000);
    assert_eq!(json["subevent"], "SPELL_DAMAGE");
    assert_eq!(json["sourceGUID"], hunter.guid.as_str());
    assert_eq!(json["destGUID"], dummy.guid.as_str());
    assert_eq!(json["destName"], "Dummy");
    assert_eq!(json["spellName"], "Cobra Shot");
    assert_eq!(json["amount"], 820.0);
    assert_eq!(json["critical"], true);
    assert!(json.get("source").is_none(), "engine handles are not serialized");
}

#[test]
fn test_untargeted_event_has_blank_dest() {
    let (hunter, _, _) = units();
    let json = serde_json::to_value(cast(&hunter, "Bestial Wrath")).unwrap();
    assert_eq!(json["subevent"], "SPELL_CAST_SUCCESS");
    assert_eq!(json["destGUID"], "");
    assert_eq!(json["destFlags"], 0);
}

#[test]
fn test_aura_event_round_trip() {
    let (hunter, pet, _) = units();
    let event = CombatLogEvent::new(
        2_000,
        &hunter,
        Some(&pet),
        Subevent::SpellAuraAppliedDose {
            spell: spell(272790, "Frenzy"),
            aura_type: AuraType::Buff,
            amount: Some(2),
        },
    );
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"subevent\":\"SPELL_AURA_APPLIED_DOSE\""));

    let parsed: CombatLogEvent = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.kind(), SubeventKind::SpellAuraAppliedDose);
    assert_eq!(parsed.spell_id(), Some(SpellId(272790)));
    assert_eq!(parsed.dest_guid, pet.guid);
}

// =============================================================================
// Aggregation Tests
// =============================================================================

#[test]
fn test_damage_by_ability_empty_log() {
    let log = CombatLog::default();
    assert!(log.damage_by_ability("Player-1-00000000").is_empty());
    assert!(log.is_empty());
}

#[test]
fn test_damage_by_ability_single_source() {
    let (hunter, pet, dummy) = units();
    let mut log = CombatLog::default();
    log.record(damage(&hunter, &dummy, "Cobra Shot", 800.0, false));
    log.record(damage(&hunter, &dummy, "Cobra Shot", 1_600.0, true));
    log.record(damage(&hunter, &dummy, "Kill Shot", 2_600.0, false));
    log.record(damage(&pet, &dummy, "Claw", 310.0, false));

    let breakdown = log.damage_by_ability(&hunter.guid);
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown.get("Cobra Shot"), Some(&2_400.0));
    assert_eq!(breakdown.get("Kill Shot"), Some(&2_600.0));
    assert_eq!(log.total_damage_dealt(&hunter.guid), 5_000.0);
    assert_eq!(log.total_damage_dealt(&pet.guid), 310.0);
}

#[test]
fn test_periodic_damage_counts() {
    let (hunter, _, dummy) = units();
    let mut log = CombatLog::default();
    log.record(CombatLogEvent::new(
        2_000,
        &hunter,
        Some(&dummy),
        Subevent::SpellPeriodicDamage {
            spell: spell(217200, "Barbed Shot"),
            amount: 240.0,
            overkill: 0.0,
            critical: false,
        },
    ));
    assert_eq!(log.damage_by_ability(&hunter.guid).get("Barbed Shot"), Some(&240.0));
    assert_eq!(log.hp_changes_only().len(), 1);
}

#[test]
fn test_casts_and_crit_rate() {
    let (hunter, _, dummy) = units();
    let mut log = CombatLog::default();
    log.record(cast(&hunter, "Cobra Shot"));
    log.record(damage(&hunter, &dummy, "Cobra Shot", 800.0, true));
    log.record(cast(&hunter, "Cobra Shot"));
    log.record(damage(&hunter, &dummy, "Cobra Shot", 800.0, false));
    log.record(cast(&hunter, "Kill Command"));
    log.record(damage(&hunter, &dummy, "Kill Command", 1_650.0, false));
    log.record(damage(&hunter, &dummy, "Kill Command", 1_650.0, true));

    assert_eq!(log.casts_by(&hunter.guid), 3);
    assert_eq!(log.crit_rate(&hunter.guid), 0.5);
    assert_eq!(log.crit_rate(&dummy.guid), 0.0, "no hits means no crits");
}

#[test]
fn test_filter_and_recent() {
    let (hunter, _, dummy) = units();
    let mut log = CombatLog::default();
    log.record(cast(&hunter, "A"));
    log.record(damage(&hunter, &dummy, "A", 1.0, false));
    log.record(cast(&hunter, "B"));
    log.record(damage(&hunter, &dummy, "B", 2.0, false));

    assert_eq!(log.filter_by_kind(SubeventKind::SpellCastSuccess).len(), 2);
    let recent = log.recent(2);
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[1].amount(), Some(2.0));

    log.clear();
    assert_eq!(log.len(), 0);
}
