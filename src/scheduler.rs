//! Event scheduler
//!
//! Min-heap of future events keyed by `(at, priority, seq)`. Within one
//! timestamp, lower priority runs first and equal priorities run in the order
//! they were scheduled. Cancelled entries stay in the heap as tombstones and
//! are skipped when they reach the top.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashSet};

use crate::combat::events::CombatLogEvent;
use crate::data::SpellId;
use crate::error::SimError;
use crate::state::{ProjectileId, UnitId};
use crate::Millis;

/// One aura tick, identified by the application it belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodicTick {
    pub unit: UnitId,
    pub caster: UnitId,
    pub spell: SpellId,
    /// Ticks from an earlier application of the same aura are dropped
    pub applied_at: Millis,
}

/// Everything the driver can be woken up for.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    CombatLog(CombatLogEvent),
    /// A cast's cast time has elapsed
    CastComplete {
        unit: UnitId,
        spell: SpellId,
        target: Option<UnitId>,
        started_at: Millis,
    },
    PeriodicTick(PeriodicTick),
    ProjectileImpact(ProjectileId),
    /// Remove the aura if it still expires at `expires_at`
    AuraExpire {
        unit: UnitId,
        spell: SpellId,
        expires_at: Millis,
    },
    /// Periodic power regeneration for one unit
    PowerRegen(UnitId),
    /// Run the unit's rotation
    RotationEvaluate(UnitId),
}

impl SimEvent {
    /// Within one timestamp: combat events and ticks, then expirations, then
    /// rotation evaluations.
    pub fn priority(&self) -> u8 {
        match self {
            SimEvent::AuraExpire { .. } => 1,
            SimEvent::RotationEvaluate(_) => 2,
            _ => 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

#[derive(Debug)]
struct Entry {
    at: Millis,
    priority: u8,
    id: EventId,
    event: SimEvent,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.priority, self.id).cmp(&(other.at, other.priority, other.id))
    }
}

#[derive(Debug, Default)]
pub struct EventScheduler {
    heap: BinaryHeap<Reverse<Entry>>,
    cancelled: HashSet<EventId>,
    next_id: u64,
    now: Millis,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time of the last popped event.
    pub fn now(&self) -> Millis {
        self.now
    }

    /// Live (non-cancelled) entries.
    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn schedule(&mut self, at: Millis, event: SimEvent) -> Result<EventId, SimError> {
        if at < self.now {
            return Err(SimError::ScheduleInPast {
                current_time: self.now,
                event_time: at,
            });
        }
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse(Entry {
            at,
            priority: event.priority(),
            id,
            event,
        }));
        Ok(id)
    }

    /// Returns `false` if the event already ran or was cancelled.
    pub fn cancel(&mut self, id: EventId) -> bool {
        let live = self.heap.iter().any(|Reverse(e)| e.id == id);
        live && self.cancelled.insert(id)
    }

    fn drop_tombstones(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if !self.cancelled.remove(&top.id) {
                break;
            }
            self.heap.pop();
        }
    }

    pub fn peek_time(&mut self) -> Option<Millis> {
        self.drop_tombstones();
        self.heap.peek().map(|Reverse(e)| e.at)
    }

    /// Pop the earliest event and advance `now` to its time.
    pub fn pop(&mut self) -> Option<(Millis, SimEvent)> {
        self.drop_tombstones();
        let Reverse(entry) = self.heap.pop()?;
        self.now = entry.at;
        Some((entry.at, entry.event))
    }
}
