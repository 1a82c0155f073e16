//! Headless mode for batch theorycrafting
//!
//! This module runs simulation batches from a JSON file without any
//! interaction, suitable for scripted comparisons and automated testing.
//!
//! ## Usage
//!
//! ```bash
//! # Run 1000 iterations of a sim
//! cargo run --release -- --config assets/sims/beast_mastery.json --iterations 1000
//! ```
//!
//! ## JSON Configuration
//!
//! ```json
//! {
//!   "spec": "beast-mastery",
//!   "durationSecs": 300,
//!   "iterations": 100,
//!   "characters": [
//!     { "name": "Hunter", "kind": "Player", "maxHealth": 100000, "spells": [193455] },
//!     { "name": "Dummy", "kind": "Enemy", "maxHealth": 10000000 }
//!   ]
//! }
//! ```

pub mod config;
pub mod runner;

pub use config::HeadlessSimConfig;
pub use runner::{run_headless_sim, run_sim, SimOutcome};
