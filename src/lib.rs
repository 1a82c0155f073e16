//! raidsim - Deterministic combat simulation engine
//!
//! A discrete-event simulator for theorycrafting: units cast spells under a
//! rotation, every state change flows through a combat-log event bus, and a
//! seeded RNG makes every run reproducible. Batches of runs execute in
//! parallel and aggregate into DPS statistics.
//!
//! This library exposes the engine modules for testing and reuse.

pub mod cli;
pub mod combat;
pub mod data;
pub mod error;
pub mod headless;
pub mod modifier;
pub mod profile;
pub mod rng;
pub mod rotation;
pub mod scheduler;
pub mod settings;
pub mod sim;
pub mod specs;
pub mod state;

/// Simulated time in milliseconds
pub type Millis = u64;

// Re-export commonly used types
pub use combat::events::{CombatLogEvent, Subevent, SubeventKind};
pub use combat::log::CombatLog;
pub use error::SimError;
pub use headless::HeadlessSimConfig;
pub use sim::{BatchRequest, BatchResponse, Simulation, SimulationConfig, SimulationResult};
