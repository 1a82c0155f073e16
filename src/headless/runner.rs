//! Headless sim execution
//!
//! Loads static data, runs the configured batch and reports the results on
//! stdout and optionally as JSON files.

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

use serde::Serialize;
use tracing::info;

use crate::combat::log::CombatLog;
use crate::data::{InMemoryMetadata, MetadataProvider};
use crate::settings::EngineSettings;
use crate::sim::batch::run_batch;
use crate::sim::driver::Simulation;
use crate::sim::results::{BatchRequest, BatchResponse, SimulationResult};
use crate::specs::{self, composer_for};
use crate::state::unit_flags;

use super::config::HeadlessSimConfig;

/// Result of a headless run
///
/// This struct provides programmatic access to the results for testing and analysis.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    /// Aggregated batch over every iteration
    pub response: BatchResponse,
    /// Full result of the first iteration, events included
    pub first_run: SimulationResult,
}

/// Run the configured batch against already-loaded data.
pub fn run_sim(
    config: &HeadlessSimConfig,
    data: &dyn MetadataProvider,
    settings: EngineSettings,
) -> Result<SimOutcome, String> {
    let spec = specs::lookup(&config.spec).ok_or_else(|| format!("Unknown spec: '{}'", config.spec))?;
    let sim_config = config.to_sim_config(settings);
    sim_config.validate()?;

    let abort = AtomicBool::new(false);
    let request = BatchRequest {
        iterations: config.iterations,
        duration: sim_config.duration,
        rotation: None,
        batch_size: None,
        base_seed: config.seed,
    };
    let response = run_batch(&sim_config, &request, data, spec.as_ref(), &abort);

    // Iteration 0 again with its events kept; same seed, same run
    let composer = composer_for(spec.as_ref());
    let first_run = Simulation::new(&sim_config, data, &composer, spec.as_ref(), config.seed)
        .and_then(|sim| sim.run(&abort))
        .map_err(|e| format!("Simulation failed: {}", e))?;

    Ok(SimOutcome { response, first_run })
}

/// Run a headless sim with the given configuration
pub fn run_headless_sim(config: HeadlessSimConfig) -> Result<SimOutcome, String> {
    let settings = match &config.settings {
        Some(settings) => settings.clone(),
        None => EngineSettings::load(),
    };

    println!("Starting headless simulation...");
    println!("  Spec: {}", config.spec);
    println!(
        "  Characters: {:?}",
        config.characters.iter().map(|c| c.name.as_str()).collect::<Vec<_>>()
    );
    println!("  Duration: {:.0}s", config.duration_secs);
    println!("  Iterations: {} (seed {})", config.iterations, config.seed);

    let data = InMemoryMetadata::load_from_dir(&settings.data_dir)
        .map_err(|e| format!("Failed to load game data: {}", e))?;

    let outcome = run_sim(&config, &data, settings)?;
    info!(
        "First iteration ended at {}ms with {} events",
        outcome.first_run.final_time,
        outcome.first_run.events.len()
    );
    print_summary(&outcome);

    if let Some(path) = &config.output_path {
        write_json(Path::new(path), &outcome.response)?;
        println!("Batch results saved to: {}", path);
    }
    if let Some(path) = &config.events_path {
        write_json(Path::new(path), &outcome.first_run.events)?;
        println!("Combat log saved to: {}", path);
    }

    Ok(outcome)
}

fn print_summary(outcome: &SimOutcome) {
    let stats = &outcome.response.stats;
    println!();
    println!(
        "Completed {} iterations in {}ms ({:.1}/s)",
        stats.completed_sims, stats.elapsed_ms, stats.throughput
    );
    println!(
        "  DPS: mean {:.1}, min {:.1}, max {:.1}",
        stats.mean_dps, stats.min_dps, stats.max_dps
    );
    println!("  Casts: {:.1} per iteration", stats.avg_casts);

    let log = CombatLog {
        events: outcome.first_run.events.clone(),
    };
    let mut friendly: Vec<(&str, &str)> = Vec::new();
    for event in &log.events {
        if event.source_flags & unit_flags::AFFILIATION_MINE != 0
            && !friendly.iter().any(|(guid, _)| *guid == event.source_guid)
        {
            friendly.push((event.source_guid.as_str(), event.source_name.as_str()));
        }
    }

    let duration_secs = outcome.first_run.final_time as f64 / 1000.0;
    for (guid, name) in friendly {
        let breakdown = log.damage_by_ability(guid);
        if breakdown.is_empty() {
            continue;
        }
        println!(
            "\n  {} (first iteration, {} casts, {:.0}% crit)",
            name,
            log.casts_by(guid),
            log.crit_rate(guid) * 100.0
        );
        for (ability, damage) in breakdown {
            let dps = if duration_secs > 0.0 { damage / duration_secs } else { 0.0 };
            println!("    {:<20} {:>10.0} ({:.1} dps)", ability, damage, dps);
        }
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode JSON: {}", e))?;
    fs::write(path, json).map_err(|e| format!("Failed to write {}: {}", path.display(), e))
}
