//! Run and batch results
//!
//! `SimulationResult` is what one run produces. The batch types are the
//! camelCase JSON shapes exchanged with callers that drive many runs.

use serde::{Deserialize, Serialize};

use crate::combat::events::{CombatLogEvent, SubeventKind};
use crate::state::unit_flags;
use crate::Millis;

/// Result of a completed run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Every dispatched combat-log event, in dispatch order
    pub events: Vec<CombatLogEvent>,
    /// World revisions produced during the run
    pub snapshots: u64,
    /// Simulated time the run ended at
    pub final_time: Millis,
    /// Successful casts by player units
    pub casts: u64,
    /// Damage dealt by friendly units (players and their pets)
    pub damage: f64,
    pub dps: f64,
    pub seed: u64,
}

impl SimulationResult {
    pub fn new(events: Vec<CombatLogEvent>, snapshots: u64, final_time: Millis, seed: u64) -> Self {
        let casts = events
            .iter()
            .filter(|e| e.kind() == SubeventKind::SpellCastSuccess)
            .filter(|e| e.source_flags & unit_flags::TYPE_PLAYER != 0)
            .count() as u64;
        let damage: f64 = events
            .iter()
            .filter(|e| e.is_damage() && e.source_flags & unit_flags::AFFILIATION_MINE != 0)
            .filter_map(CombatLogEvent::amount)
            .sum();
        let dps = if final_time > 0 {
            damage * 1000.0 / final_time as f64
        } else {
            0.0
        };
        Self {
            events,
            snapshots,
            final_time,
            casts,
            damage,
            dps,
            seed,
        }
    }
}

// ============================================================================
// Batch protocol
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub iterations: u32,
    /// Encounter length per iteration
    pub duration: Millis,
    /// Built-in rotation for the player; the config's choice when absent
    #[serde(default)]
    pub rotation: Option<String>,
    /// Iterations per rayon task; the engine setting when absent
    #[serde(default)]
    pub batch_size: Option<usize>,
    #[serde(default)]
    pub base_seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResult {
    pub sim_id: u32,
    pub casts: u64,
    /// Simulated duration of this iteration
    pub duration: Millis,
    pub dps: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub avg_casts: f64,
    pub completed_sims: u32,
    /// Wall-clock time for the whole batch
    pub elapsed_ms: u64,
    /// Completed iterations per wall-clock second
    pub throughput: f64,
    pub total_casts: u64,
    pub mean_dps: f64,
    pub min_dps: f64,
    pub max_dps: f64,
}

impl BatchStats {
    /// Aggregate completed samples. Failed iterations never reach here.
    pub fn from_samples(samples: &[SampleResult], elapsed_ms: u64) -> Self {
        if samples.is_empty() {
            return Self {
                elapsed_ms,
                ..Default::default()
            };
        }
        let completed = samples.len();
        let total_casts: u64 = samples.iter().map(|s| s.casts).sum();
        let total_dps: f64 = samples.iter().map(|s| s.dps).sum();
        let min_dps = samples.iter().map(|s| s.dps).fold(f64::INFINITY, f64::min);
        let max_dps = samples.iter().map(|s| s.dps).fold(f64::NEG_INFINITY, f64::max);
        let throughput = if elapsed_ms > 0 {
            completed as f64 * 1000.0 / elapsed_ms as f64
        } else {
            completed as f64
        };

        Self {
            avg_casts: total_casts as f64 / completed as f64,
            completed_sims: completed as u32,
            elapsed_ms,
            throughput,
            total_casts,
            mean_dps: total_dps / completed as f64,
            min_dps,
            max_dps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub sample_results: Vec<SampleResult>,
    pub stats: BatchStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sim_id: u32, casts: u64, dps: f64) -> SampleResult {
        SampleResult {
            sim_id,
            casts,
            duration: 60_000,
            dps,
        }
    }

    #[test]
    fn test_stats_aggregate_samples() {
        let stats = BatchStats::from_samples(&[sample(0, 40, 1_000.0), sample(2, 50, 1_400.0)], 500);
        assert_eq!(stats.completed_sims, 2);
        assert_eq!(stats.total_casts, 90);
        assert_eq!(stats.avg_casts, 45.0);
        assert_eq!(stats.mean_dps, 1_200.0);
        assert_eq!(stats.min_dps, 1_000.0);
        assert_eq!(stats.max_dps, 1_400.0);
        assert_eq!(stats.throughput, 4.0);
    }

    #[test]
    fn test_empty_batch_has_zero_stats() {
        let stats = BatchStats::from_samples(&[], 10);
        assert_eq!(stats.completed_sims, 0);
        assert_eq!(stats.avg_casts, 0.0);
        assert_eq!(stats.elapsed_ms, 10);
    }

    #[test]
    fn test_camel_case_json() {
        let response = BatchResponse {
            sample_results: vec![sample(3, 12, 900.0)],
            stats: BatchStats::from_samples(&[sample(3, 12, 900.0)], 0),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["sampleResults"][0]["simId"], 3);
        assert_eq!(json["stats"]["completedSims"], 1);
        assert_eq!(json["stats"]["avgCasts"], 12.0);

        let request: BatchRequest =
            serde_json::from_str(r#"{"iterations": 10, "duration": 60000, "batchSize": 5}"#).unwrap();
        assert_eq!(request.batch_size, Some(5));
        assert_eq!(request.rotation, None);
        assert_eq!(request.base_seed, 0);
    }
}
