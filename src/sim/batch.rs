//! Batched runs
//!
//! Independent iterations of one config, spread across cores with rayon.
//! Iteration `i` is seeded with `base_seed + i`, so a batch is reproducible
//! regardless of how rayon splits it. Failed or aborted iterations are logged
//! and left out of the statistics.

use std::sync::atomic::AtomicBool;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::config::SimulationConfig;
use super::driver::Simulation;
use super::results::{BatchRequest, BatchResponse, BatchStats, SampleResult, SimulationResult};
use crate::data::MetadataProvider;
use crate::error::SimError;
use crate::specs::{composer_for, SpecModule};
use crate::state::UnitKind;

/// Config with the request's duration and rotation applied.
pub fn request_config(config: &SimulationConfig, request: &BatchRequest) -> SimulationConfig {
    let mut config = config.clone();
    if request.duration > 0 {
        config.duration = request.duration;
    }
    if let Some(name) = &request.rotation {
        config.rotation = None;
        for character in config.characters.iter_mut().filter(|c| c.kind == UnitKind::Player) {
            character.rotation = Some(name.clone());
        }
    }
    config
}

/// Run every iteration of `request` and aggregate the completed ones.
pub fn run_batch(
    config: &SimulationConfig,
    request: &BatchRequest,
    data: &dyn MetadataProvider,
    spec: &dyn SpecModule,
    abort: &AtomicBool,
) -> BatchResponse {
    let start = Instant::now();
    let config = request_config(config, request);
    let composer = composer_for(spec);
    let batch_size = request.batch_size.unwrap_or(config.settings.batch_size).max(1);

    info!(
        "Running {} iterations of {}ms (base seed {}, {} per task)",
        request.iterations, config.duration, request.base_seed, batch_size
    );

    let outcomes: Vec<(u32, Result<SimulationResult, SimError>)> = (0..request.iterations)
        .into_par_iter()
        .with_min_len(batch_size)
        .map(|i| {
            let seed = request.base_seed.wrapping_add(u64::from(i));
            let outcome =
                Simulation::new(&config, data, &composer, spec, seed).and_then(|sim| sim.run(abort));
            (i, outcome)
        })
        .collect();

    let mut samples = Vec::with_capacity(outcomes.len());
    for (sim_id, outcome) in outcomes {
        match outcome {
            Ok(result) => samples.push(SampleResult {
                sim_id,
                casts: result.casts,
                duration: result.final_time,
                dps: result.dps,
            }),
            Err(SimError::Aborted) => debug!("Iteration {} aborted", sim_id),
            Err(e) => warn!("Iteration {} failed: {}", sim_id, e),
        }
    }

    let elapsed_ms = start.elapsed().as_millis() as u64;
    let stats = BatchStats::from_samples(&samples, elapsed_ms);
    info!(
        "Completed {}/{} iterations in {}ms ({:.1}/s), mean DPS {:.1}",
        stats.completed_sims, request.iterations, elapsed_ms, stats.throughput, stats.mean_dps
    );
    BatchResponse {
        sample_results: samples,
        stats,
    }
}
