mod config;
mod distribution;
mod engine;
mod error;
mod observations;
mod rng;
mod routing;
mod simulation;
mod stats;
mod types;
mod variates;

pub use config::{
    ArrivalsConfig, CapacityConfig, DesignConfig, DistributionConfig, PolicyConfig, QueueConfig, RoutingConfig,
    SimulationConfig, EXIT,
};
pub use distribution::{normal_quantile, Distribution};
pub use engine::{Customer, Engine, QueueState};
pub use error::ConfigError;
pub use observations::{Observations, OccupancyHistogram, QueueObservations};
pub use rng::{uniform_open, Mt19937, StreamTag};
pub use routing::{Occupancy, Router};
pub use simulation::{NetworkStreams, Simulation};
pub use stats::{
    mean, paired_differences, summarize, QueueStats, QueueSummary, Series, Stats, StatsSummary, Summary,
    SystemStats, SystemSummary,
};
pub use types::{Destination, InputEcho, NetworkModel, QueueEcho, QueueSpec, RoutingPolicy, SimulationDesign};
pub use variates::{batch_size, VariateStream};

use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn config_error(err: ConfigError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn build_simulation(config_json: &str) -> Result<Simulation, JsValue> {
    let config = SimulationConfig::from_json(config_json).map_err(config_error)?;
    Simulation::from_config(&config).map_err(config_error)
}

/// WASM-exposed queueing network simulator
#[wasm_bindgen]
pub struct QueueSimulator {
    sim: Simulation,
}

#[wasm_bindgen]
impl QueueSimulator {
    /// Create a simulator from a JSON configuration
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<QueueSimulator, JsValue> {
        Ok(QueueSimulator {
            sim: build_simulation(config_json)?,
        })
    }

    /// Run every remaining replication
    pub fn run(&mut self) {
        self.sim.run();
    }

    /// Run one replication; false once all have run
    pub fn run_replication(&mut self) -> bool {
        self.sim.run_replication().is_some()
    }

    pub fn completed_runs(&self) -> usize {
        self.sim.completed_runs()
    }

    /// Per-run statistics as JSON
    pub fn get_stats(&self) -> String {
        serde_json::to_string(&self.sim.stats).unwrap_or_default()
    }

    /// Cross-run summary as JSON
    pub fn get_summary(&self) -> String {
        serde_json::to_string(&self.sim.summary()).unwrap_or_default()
    }

    /// Human-readable echo of the inputs as JSON
    pub fn get_inputs(&self) -> String {
        serde_json::to_string(&self.sim.inputs()).unwrap_or_default()
    }

    pub fn get_queue_names(&self) -> js_sys::Array {
        self.sim
            .model
            .queues
            .iter()
            .map(|q| JsValue::from_str(&q.name))
            .collect()
    }
}

/// Run every replication of a configuration and report inputs, summary and per-run stats
#[wasm_bindgen]
pub fn run_simulation(config_json: &str) -> Result<String, JsValue> {
    let mut sim = build_simulation(config_json)?;
    sim.run();

    let report = serde_json::json!({
        "inputs": sim.inputs(),
        "summary": sim.summary(),
        "stats": sim.stats,
    });
    to_json(&report)
}

/// Compare two configurations run by run.
///
/// With the same seed and replication count, both sides see the same random
/// draws wherever their networks agree, so the paired differences (B - A) of
/// the system-level means isolate the effect of the change.
#[wasm_bindgen]
pub fn compare_configs(config_a_json: &str, config_b_json: &str) -> Result<String, JsValue> {
    let config_a = SimulationConfig::from_json(config_a_json)
        .map_err(|e| JsValue::from_str(&format!("Config A: {}", e)))?;
    let config_b = SimulationConfig::from_json(config_b_json)
        .map_err(|e| JsValue::from_str(&format!("Config B: {}", e)))?;

    // Run simulation A
    let mut sim_a = Simulation::from_config(&config_a).map_err(|e| JsValue::from_str(&format!("Config A: {}", e)))?;
    sim_a.run();

    // Run simulation B
    let mut sim_b = Simulation::from_config(&config_b).map_err(|e| JsValue::from_str(&format!("Config B: {}", e)))?;
    sim_b.run();

    let w = paired_differences(&sim_a.stats.system.w, &sim_b.stats.system.w);
    let l = paired_differences(&sim_a.stats.system.l, &sim_b.stats.system.l);

    let comparison = serde_json::json!({
        "config_a": sim_a.summary(),
        "config_b": sim_b.summary(),
        "difference": {
            "w": { "runs": w, "summary": summarize(&w) },
            "l": { "runs": l, "summary": summarize(&l) },
        },
    });
    to_json(&comparison)
}

/// Get default config as JSON
#[wasm_bindgen]
pub fn get_default_config() -> String {
    serde_json::to_string(&SimulationConfig::default()).unwrap_or_default()
}
