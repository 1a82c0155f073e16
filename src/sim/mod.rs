//! Simulation driver
//!
//! Everything above the combat systems: typed run configuration, the
//! cast lifecycle, the discrete-event loop that ties scheduler, bus and
//! rotations together, and batched execution across cores.

pub mod batch;
pub mod casting;
pub mod config;
pub mod driver;
pub mod results;
pub mod worker;

pub use batch::run_batch;
pub use config::{CharacterDef, SimulationConfig};
pub use driver::Simulation;
pub use results::{BatchRequest, BatchResponse, BatchStats, SampleResult, SimulationResult};
pub use worker::{Worker, WorkerRequest, WorkerResponse, WorkerState};
