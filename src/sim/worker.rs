//! Batch worker
//!
//! A worker owns one simulation config and runs batches of it on request.
//! Messages are serde-tagged JSON so a host process can drive workers over
//! any line-based transport; in-process, [`Worker`] runs the same message
//! loop on its own thread behind a pair of channels.
//!
//! Protocol:
//! - `{"type": "init", "config": {...}}` → `{"type": "ready"}`
//! - `{"type": "batch", "batchId": 1, "iterations": 100, "baseSeed": 0}` →
//!   `{"type": "batchResult", "batchId": 1, "meanDps": ..., ...}`
//! - any failure → `{"type": "error", "batchId": ..., "message": "..."}`

use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::batch::run_batch;
use super::config::SimulationConfig;
use super::results::BatchRequest;
use crate::data::MetadataProvider;
use crate::specs::SpecModule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerRequest {
    Init {
        config: SimulationConfig,
    },
    Batch {
        batch_id: u64,
        iterations: u32,
        #[serde(default)]
        base_seed: u64,
    },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkerResponse {
    Ready,
    BatchResult {
        batch_id: u64,
        mean_dps: f64,
        min_dps: f64,
        max_dps: f64,
        total_casts: u64,
        /// Completed iterations; failed ones are not counted
        iterations: u32,
    },
    Error {
        batch_id: Option<u64>,
        message: String,
    },
}

/// Message handling without the thread, for hosts that bring their own loop.
pub struct WorkerState {
    data: Arc<dyn MetadataProvider>,
    spec: Arc<dyn SpecModule>,
    config: Option<SimulationConfig>,
}

impl WorkerState {
    pub fn new(data: Arc<dyn MetadataProvider>, spec: Arc<dyn SpecModule>) -> Self {
        Self {
            data,
            spec,
            config: None,
        }
    }

    /// Handle one request. `None` for `shutdown`.
    pub fn handle(&mut self, request: WorkerRequest) -> Option<WorkerResponse> {
        match request {
            WorkerRequest::Init { config } => Some(self.init(config)),
            WorkerRequest::Batch {
                batch_id,
                iterations,
                base_seed,
            } => Some(self.batch(batch_id, iterations, base_seed)),
            WorkerRequest::Shutdown => None,
        }
    }

    /// Handle one JSON request line and encode the response.
    pub fn handle_json(&mut self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<WorkerRequest>(line) {
            Ok(request) => self.handle(request)?,
            Err(e) => WorkerResponse::Error {
                batch_id: None,
                message: format!("invalid request: {}", e),
            },
        };
        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("Failed to encode worker response: {}", e);
                None
            }
        }
    }

    fn init(&mut self, config: SimulationConfig) -> WorkerResponse {
        if config.spec != self.spec.id() {
            return WorkerResponse::Error {
                batch_id: None,
                message: format!("worker runs '{}', config asks for '{}'", self.spec.id(), config.spec),
            };
        }
        if let Err(message) = config.validate() {
            return WorkerResponse::Error {
                batch_id: None,
                message,
            };
        }
        self.config = Some(config);
        WorkerResponse::Ready
    }

    fn batch(&self, batch_id: u64, iterations: u32, base_seed: u64) -> WorkerResponse {
        let Some(config) = &self.config else {
            return WorkerResponse::Error {
                batch_id: Some(batch_id),
                message: "worker not initialized".to_string(),
            };
        };
        let request = BatchRequest {
            iterations,
            duration: config.duration,
            rotation: None,
            batch_size: None,
            base_seed,
        };
        let response = run_batch(
            config,
            &request,
            self.data.as_ref(),
            self.spec.as_ref(),
            &AtomicBool::new(false),
        );
        let stats = response.stats;
        if stats.completed_sims == 0 && iterations > 0 {
            return WorkerResponse::Error {
                batch_id: Some(batch_id),
                message: "every iteration failed".to_string(),
            };
        }
        WorkerResponse::BatchResult {
            batch_id,
            mean_dps: stats.mean_dps,
            min_dps: stats.min_dps,
            max_dps: stats.max_dps,
            total_casts: stats.total_casts,
            iterations: stats.completed_sims,
        }
    }
}

/// A [`WorkerState`] running on its own thread.
pub struct Worker {
    requests: Sender<WorkerRequest>,
    responses: Receiver<WorkerResponse>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn spawn(data: Arc<dyn MetadataProvider>, spec: Arc<dyn SpecModule>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<WorkerRequest>();
        let (response_tx, response_rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let mut state = WorkerState::new(data, spec);
            for request in request_rx {
                let Some(response) = state.handle(request) else {
                    break;
                };
                if response_tx.send(response).is_err() {
                    break;
                }
            }
            debug!("Worker thread exiting");
        });

        Self {
            requests: request_tx,
            responses: response_rx,
            handle: Some(handle),
        }
    }

    /// Send a request and wait for its response. `None` once the worker is gone.
    pub fn call(&self, request: WorkerRequest) -> Option<WorkerResponse> {
        self.requests.send(request).ok()?;
        self.responses.recv().ok()
    }

    pub fn shutdown(mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Worker thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{InMemoryMetadata, SpellEffect, SpellInfo};
    use crate::sim::config::CharacterDef;
    use crate::specs::beast_mastery::BeastMastery;
    use crate::state::UnitKind;

    fn data() -> Arc<dyn MetadataProvider> {
        Arc::new(InMemoryMetadata::new().with_spell(
            SpellInfo::new(16827, "Claw")
                .with_target()
                .with_effect(SpellEffect::Damage { amount: 50.0 }),
        ))
    }

    fn config() -> SimulationConfig {
        SimulationConfig::new(
            "beast-mastery",
            15_000,
            vec![
                CharacterDef::new("Hunter", UnitKind::Player, 1_000.0)
                    .with_spells([16827])
                    .with_rotation("pet-basic"),
                CharacterDef::new("Dummy", UnitKind::Enemy, 1_000_000.0),
            ],
        )
    }

    #[test]
    fn test_batch_before_init_is_an_error() {
        let mut state = WorkerState::new(data(), Arc::new(BeastMastery));
        let response = state.handle(WorkerRequest::Batch {
            batch_id: 4,
            iterations: 2,
            base_seed: 0,
        });
        assert!(matches!(response, Some(WorkerResponse::Error { batch_id: Some(4), .. })));
    }

    #[test]
    fn test_json_round_trip_over_thread() {
        let worker = Worker::spawn(data(), Arc::new(BeastMastery));
        assert_eq!(worker.call(WorkerRequest::Init { config: config() }), Some(WorkerResponse::Ready));

        match worker.call(WorkerRequest::Batch {
            batch_id: 9,
            iterations: 3,
            base_seed: 100,
        }) {
            Some(WorkerResponse::BatchResult {
                batch_id,
                iterations,
                total_casts,
                mean_dps,
                ..
            }) => {
                assert_eq!(batch_id, 9);
                assert_eq!(iterations, 3);
                assert_eq!(total_casts, 33, "11 casts per 15s run");
                assert!(mean_dps > 0.0);
            }
            other => panic!("unexpected response {:?}", other),
        }
        worker.shutdown();
    }

    #[test]
    fn test_handle_json_messages() {
        let mut state = WorkerState::new(data(), Arc::new(BeastMastery));
        let bad = state.handle_json("{\"type\": \"explode\"}").unwrap();
        assert!(bad.contains("\"type\":\"error\""));

        let init = serde_json::to_string(&WorkerRequest::Init { config: config() }).unwrap();
        assert_eq!(state.handle_json(&init).unwrap(), "{\"type\":\"ready\"}");

        let batch = state
            .handle_json(r#"{"type": "batch", "batchId": 1, "iterations": 2}"#)
            .unwrap();
        assert!(batch.contains("\"type\":\"batchResult\""));
        assert!(batch.contains("\"meanDps\""));
        assert!(state.handle_json(r#"{"type": "shutdown"}"#).is_none());
    }

    #[test]
    fn test_init_rejects_other_specs() {
        let mut state = WorkerState::new(data(), Arc::new(BeastMastery));
        let mut other = config();
        other.spec = "frost".into();
        assert!(matches!(state.handle(WorkerRequest::Init { config: other }), Some(WorkerResponse::Error { .. })));
    }
}
