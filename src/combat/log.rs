//! Combat logging
//!
//! Records every dispatched combat-log event for post-run analysis and for
//! the JSON event dump written by the headless runner.

use std::collections::BTreeMap;

use serde::Serialize;

use super::events::{CombatLogEvent, Subevent, SubeventKind};

/// The recorded event stream of one run
#[derive(Debug, Default, Clone, Serialize)]
pub struct CombatLog {
    /// All events in dispatch order
    pub events: Vec<CombatLogEvent>,
}

impl CombatLog {
    /// Clear the log for a new run
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append a dispatched event
    pub fn record(&mut self, event: CombatLogEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get events of one subevent kind
    pub fn filter_by_kind(&self, kind: SubeventKind) -> Vec<&CombatLogEvent> {
        self.events.iter().filter(|e| e.kind() == kind).collect()
    }

    /// Get only HP-changing events (damage and healing)
    pub fn hp_changes_only(&self) -> Vec<&CombatLogEvent> {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e.kind(),
                    SubeventKind::SpellDamage
                        | SubeventKind::SpellPeriodicDamage
                        | SubeventKind::SpellHeal
                        | SubeventKind::SpellPeriodicHeal
                )
            })
            .collect()
    }

    /// Get the last N events
    pub fn recent(&self, count: usize) -> Vec<&CombatLogEvent> {
        self.events.iter().rev().take(count).rev().collect()
    }

    /// Successful casts by the unit with this GUID
    pub fn casts_by(&self, guid: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind() == SubeventKind::SpellCastSuccess && e.source_guid == guid)
            .count()
    }

    /// Damage dealt by the unit with this GUID, direct and periodic
    pub fn total_damage_dealt(&self, guid: &str) -> f64 {
        self.events
            .iter()
            .filter(|e| e.is_damage() && e.source_guid == guid)
            .filter_map(|e| e.amount())
            .sum()
    }

    /// Damage dealt per ability name by the unit with this GUID
    pub fn damage_by_ability(&self, guid: &str) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for event in self.events.iter().filter(|e| e.source_guid == guid) {
            if let Subevent::SpellDamage { spell, amount, .. }
            | Subevent::SpellPeriodicDamage { spell, amount, .. } = &event.payload
            {
                *totals.entry(spell.spell_name.clone()).or_insert(0.0) += amount;
            }
        }
        totals
    }

    /// Crit rate over damage events dealt by this GUID (0 when none)
    pub fn crit_rate(&self, guid: &str) -> f64 {
        let (hits, crits) = self
            .events
            .iter()
            .filter(|e| e.source_guid == guid)
            .fold((0usize, 0usize), |(hits, crits), e| match &e.payload {
                Subevent::SpellDamage { critical, .. } => (hits + 1, crits + usize::from(*critical)),
                _ => (hits, crits),
            });
        if hits == 0 {
            0.0
        } else {
            crits as f64 / hits as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::events::SpellRef;
    use crate::data::{SpellId, SpellSchool};
    use crate::state::{Unit, UnitId, UnitKind};

    fn damage(source: &Unit, dest: &Unit, name: &str, amount: f64, critical: bool) -> CombatLogEvent {
        CombatLogEvent::new(
            0,
            source,
            Some(dest),
            Subevent::SpellDamage {
                spell: SpellRef::new(SpellId(1), name, SpellSchool::Physical),
                amount,
                overkill: 0.0,
                critical,
            },
        )
    }

    #[test]
    fn test_aggregates() {
        let hunter = Unit::new(UnitId::new(0, 0), "Hunter", UnitKind::Player, 1.0);
        let dummy = Unit::new(UnitId::new(1, 0), "Dummy", UnitKind::Enemy, 1.0);
        let mut log = CombatLog::default();
        log.record(damage(&hunter, &dummy, "Cobra Shot", 100.0, false));
        log.record(damage(&hunter, &dummy, "Cobra Shot", 200.0, true));
        log.record(damage(&hunter, &dummy, "Kill Command", 50.0, false));
        log.record(damage(&dummy, &hunter, "Smack", 999.0, false));

        assert_eq!(log.total_damage_dealt(&hunter.guid), 350.0);
        let by_ability = log.damage_by_ability(&hunter.guid);
        assert_eq!(by_ability["Cobra Shot"], 300.0);
        assert_eq!(by_ability["Kill Command"], 50.0);
        assert!((log.crit_rate(&hunter.guid) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(log.hp_changes_only().len(), 4);
        assert_eq!(log.recent(1)[0].source_guid, dummy.guid);

        log.clear();
        assert!(log.is_empty());
    }
}
