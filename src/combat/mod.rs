//! Combat system
//!
//! Implements the combat-log side of the engine:
//! - Combat-log event records and their JSON shape
//! - The phase/priority ordered event bus
//! - Built-in state mutations for every subevent
//! - The recorded combat log

use tracing::trace;

pub mod bus;
pub mod events;
pub mod log;
pub mod systems;

use bus::{EventBus, EventFilter, HandlerMeta, Phase};

/// Appends every dispatched event to the run's combat log, after all other
/// handlers have seen it.
pub fn register_recorder(bus: &mut EventBus) {
    bus.subscribe(
        EventFilter::all(),
        HandlerMeta::new("log:record").phase(Phase::Post).priority(i32::MAX),
        |event, ctx| {
            trace!("[{}ms] {} {}", event.timestamp, event.kind(), event.source_name);
            ctx.log.record(event.clone());
            Ok(())
        },
    );
}

/// Bus with the built-in mutations and the log recorder registered.
pub fn default_bus() -> EventBus {
    let mut bus = EventBus::new();
    systems::register_state_mutations(&mut bus);
    register_recorder(&mut bus);
    bus
}
