use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::Result;
use crate::oracle::OracleConfig;
use crate::simulator::SimulationSettings;

/// Configuration for a learning session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Maximum plies per simulated game before it is scored as a draw
    pub depth_cap: u32,
    /// Simulations per `find_move` call
    pub max_attempts: u32,
    pub memory_path: PathBuf,
    /// Probability of the learner preferring a capture during playouts
    pub capture_bias: f64,
    /// Ranked tactical candidates tried before untried moves
    pub priority_limit: usize,
    /// Trials after which a move with only losses is no longer retried
    pub retry_trial_threshold: u32,
    /// Fixed seed for reproducible runs
    pub seed: Option<u64>,
    pub oracle: OracleConfig,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            depth_cap: 200,
            max_attempts: 50,
            memory_path: PathBuf::from("chess_memory.json"),
            capture_bias: 0.3,
            priority_limit: 5,
            retry_trial_threshold: 3,
            seed: None,
            oracle: OracleConfig::default(),
        }
    }
}

impl LearnerConfig {
    /// Short games and a small budget, for smoke runs
    pub fn quick() -> Self {
        Self {
            depth_cap: 60,
            max_attempts: 10,
            ..Default::default()
        }
    }

    /// Longer search with a stronger, slower opponent
    pub fn thorough() -> Self {
        Self {
            depth_cap: 300,
            max_attempts: 200,
            oracle: OracleConfig {
                skill_level: Some(10),
                move_time_ms: 100,
                ..OracleConfig::default()
            },
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.depth_cap == 0 {
            return Err(crate::validation_error!(
                "depth_cap",
                self.depth_cap,
                "at least 1 ply"
            ));
        }

        if self.max_attempts == 0 {
            return Err(crate::validation_error!(
                "max_attempts",
                self.max_attempts,
                "at least 1 attempt"
            ));
        }

        if !(0.0..=1.0).contains(&self.capture_bias) {
            return Err(crate::validation_error!(
                "capture_bias",
                self.capture_bias,
                "value in [0, 1]"
            ));
        }

        if self.oracle.engine_path.trim().is_empty() {
            return Err(crate::config_error!("oracle.engine_path must not be empty"));
        }

        Ok(())
    }

    /// Load and validate a JSON configuration. Missing fields take defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            crate::config_error!("cannot read config {}: {}", path.display(), e)
        })?;
        let config: LearnerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            depth_cap: self.depth_cap,
            capture_bias: self.capture_bias,
            oracle_budget: self.oracle.move_time(),
        }
    }
}
