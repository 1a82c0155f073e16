//! Combat-log event bus
//!
//! Handlers subscribe with a filter and `{id, phase, priority}` metadata.
//! Dispatching one event runs every matching handler ordered by phase
//! (`Cleanup`, `Core`, `Secondary`, `Post`), then ascending priority, then
//! registration order. The first handler error stops the event.
//!
//! Built-in state mutations sit in `Core` at [`MUTATION_PRIORITY`]. Spec
//! handlers default to [`DEFAULT_PRIORITY`] and therefore see the state as
//! it was before the event was applied.

use smallvec::SmallVec;
use tracing::trace;

use super::events::{CombatLogEvent, SubeventKind};
use super::log::CombatLog;
use crate::data::{MetadataProvider, SpellId};
use crate::error::SimError;
use crate::rng::SimRng;
use crate::scheduler::SimEvent;
use crate::state::WorldState;
use crate::Millis;

/// Priority of the built-in state mutation handlers.
pub const MUTATION_PRIORITY: i32 = 1000;

/// Priority for spec handlers that don't ask for one.
pub const DEFAULT_PRIORITY: i32 = 100;

/// Coarse dispatch bucket. Declaration order is dispatch order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    Cleanup,
    Core,
    Secondary,
    Post,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerMeta {
    pub id: String,
    pub phase: Phase,
    pub priority: i32,
}

impl HandlerMeta {
    /// `Core` phase at the default priority.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phase: Phase::Core,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Which events a handler wants. Empty fields match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub subevent: Option<SubeventKind>,
    pub spell: Option<SpellId>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn subevent(kind: SubeventKind) -> Self {
        Self {
            subevent: Some(kind),
            spell: None,
        }
    }

    pub fn spell(mut self, spell: SpellId) -> Self {
        self.spell = Some(spell);
        self
    }

    pub fn matches(&self, event: &CombatLogEvent) -> bool {
        self.subevent.map_or(true, |k| k == event.kind())
            && self.spell.map_or(true, |s| event.spell_id() == Some(s))
    }
}

/// Follow-up events produced by handlers, with delays relative to the
/// dispatching event's timestamp. The driver schedules them in emission order
/// once the handler chain completes.
#[derive(Debug, Default)]
pub struct Emitter {
    pending: Vec<(Millis, SimEvent)>,
}

impl Emitter {
    pub fn emit(&mut self, event: CombatLogEvent) {
        self.emit_at(0, event);
    }

    pub fn emit_at(&mut self, delay: Millis, event: CombatLogEvent) {
        self.pending.push((delay, SimEvent::CombatLog(event)));
    }

    pub fn schedule(&mut self, delay: Millis, event: SimEvent) {
        self.pending.push((delay, event));
    }

    pub fn pending(&self) -> &[(Millis, SimEvent)] {
        &self.pending
    }

    pub fn drain(&mut self) -> Vec<(Millis, SimEvent)> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Everything a handler may touch.
pub struct HandlerContext<'a> {
    /// Replace with the updated value after each mutation
    pub state: WorldState,
    pub rng: &'a mut SimRng,
    pub data: &'a dyn MetadataProvider,
    pub log: &'a mut CombatLog,
    pub emitter: Emitter,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        state: WorldState,
        rng: &'a mut SimRng,
        data: &'a dyn MetadataProvider,
        log: &'a mut CombatLog,
    ) -> Self {
        Self {
            state,
            rng,
            data,
            log,
            emitter: Emitter::default(),
        }
    }

    pub fn now(&self) -> Millis {
        self.state.current_time()
    }
}

pub type Handler =
    Box<dyn Fn(&CombatLogEvent, &mut HandlerContext<'_>) -> Result<(), SimError> + Send + Sync>;

/// Returned by [`EventBus::subscribe`]; pass back to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

struct Subscription {
    token: SubscriptionToken,
    filter: EventFilter,
    meta: HandlerMeta,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    subscriptions: Vec<Subscription>,
    next_seq: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, filter: EventFilter, meta: HandlerMeta, handler: F) -> SubscriptionToken
    where
        F: Fn(&CombatLogEvent, &mut HandlerContext<'_>) -> Result<(), SimError> + Send + Sync + 'static,
    {
        let token = SubscriptionToken(self.next_seq);
        self.next_seq += 1;
        self.subscriptions.push(Subscription {
            token,
            filter,
            meta,
            handler: Box::new(handler),
        });
        token
    }

    /// Returns `false` if the token was already removed.
    pub fn unsubscribe(&mut self, token: SubscriptionToken) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.token != token);
        self.subscriptions.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Handler ids that would run for `event`, in dispatch order.
    pub fn plan(&self, event: &CombatLogEvent) -> Vec<&str> {
        self.matching(event).iter().map(|s| s.meta.id.as_str()).collect()
    }

    fn matching(&self, event: &CombatLogEvent) -> SmallVec<[&Subscription; 8]> {
        let mut matched: SmallVec<[&Subscription; 8]> = self
            .subscriptions
            .iter()
            .filter(|s| s.filter.matches(event))
            .collect();
        // Tokens are issued in registration order.
        matched.sort_by_key(|s| (s.meta.phase, s.meta.priority, s.token.0));
        matched
    }

    /// Run every matching handler. Returns how many ran.
    pub fn dispatch(&self, event: &CombatLogEvent, ctx: &mut HandlerContext<'_>) -> Result<usize, SimError> {
        let matched = self.matching(event);
        for sub in &matched {
            trace!("{} -> {}", event.kind(), sub.meta.id);
            (sub.handler)(event, &mut *ctx).map_err(|e| SimError::Handler {
                handler_id: sub.meta.id.clone(),
                subevent: event.kind().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(matched.len())
    }
}
