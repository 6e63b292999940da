//! TOML configuration parsing for DispatchSim.
//!
//! Defines the configuration schema for a run: cluster layout, global
//! scheduler selection, workload source, and the replica service-time model
//! the run loop uses.

use crate::cluster::{ClusterConfig, ClusterError};
use dispatchsim_schedulers::{Request, SchedulerConfig, SchedulerError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid cluster configuration: {0}")]
    Cluster(#[from] ClusterError),
    #[error("Invalid scheduler configuration: {0}")]
    Scheduler(#[from] SchedulerError),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub simulation: SimulationSection,
    pub cluster: ClusterConfig,
    pub scheduler: SchedulerConfig,
    pub workload: WorkloadConfig,
    #[serde(default)]
    pub execution: ExecutionSection,
}

/// General run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Human-readable name for this run.
    #[serde(default = "default_sim_name")]
    pub name: String,
    /// Seed for every random source that does not carry its own.
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Directory results are persisted under, keyed by configuration hash.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_sim_name() -> String {
    "simulation".to_string()
}

fn default_seed() -> u64 {
    42
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            name: default_sim_name(),
            seed: default_seed(),
            output_dir: None,
        }
    }
}

/// How arrival times are spaced for generated workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalProcess {
    /// Exponential inter-arrival times at `qps`.
    #[default]
    Poisson,
    /// Fixed `1 / qps` spacing.
    Static,
}

/// Request source, tagged by `workload_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "workload_type", rename_all = "snake_case")]
pub enum WorkloadConfig {
    /// Uniform request sizes.
    Synthetic {
        num_requests: u64,
        #[serde(default = "default_qps")]
        qps: f64,
        #[serde(default)]
        arrival_process: ArrivalProcess,
        #[serde(default = "default_min_tokens")]
        min_tokens: u32,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
    },
    /// Zipf-distributed request sizes.
    Zipfian {
        num_requests: u64,
        #[serde(default = "default_qps")]
        qps: f64,
        #[serde(default)]
        arrival_process: ArrivalProcess,
        #[serde(default = "default_min_tokens")]
        min_tokens: u32,
        #[serde(default = "default_max_tokens")]
        max_tokens: u32,
        #[serde(default = "default_zipf_theta")]
        theta: f64,
        #[serde(default)]
        scramble: bool,
        /// Falls back to `simulation.seed`.
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Arrivals and sizes replayed from a JSONL trace.
    Trace {
        path: PathBuf,
        /// Multiplier applied to every arrival time.
        #[serde(default = "default_time_scale")]
        time_scale: f64,
        #[serde(default)]
        max_requests: Option<u64>,
    },
}

fn default_qps() -> f64 {
    10.0
}
fn default_min_tokens() -> u32 {
    64
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_zipf_theta() -> f64 {
    0.99
}
fn default_time_scale() -> f64 {
    1.0
}

impl WorkloadConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkloadConfig::Synthetic { .. } => "synthetic",
            WorkloadConfig::Zipfian { .. } => "zipfian",
            WorkloadConfig::Trace { .. } => "trace",
        }
    }

    /// Check generator parameters without loading any trace file.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            WorkloadConfig::Synthetic {
                qps,
                min_tokens,
                max_tokens,
                ..
            } => validate_generated(*qps, *min_tokens, *max_tokens),
            WorkloadConfig::Zipfian {
                qps,
                min_tokens,
                max_tokens,
                theta,
                ..
            } => {
                validate_generated(*qps, *min_tokens, *max_tokens)?;
                if !(*theta > 0.0 && *theta < 1.0) {
                    return Err(ConfigError::Validation(format!(
                        "zipfian theta must be in (0, 1), got {}",
                        theta
                    )));
                }
                Ok(())
            }
            WorkloadConfig::Trace { time_scale, .. } => {
                if !(time_scale.is_finite() && *time_scale > 0.0) {
                    return Err(ConfigError::Validation(format!(
                        "time_scale must be > 0, got {}",
                        time_scale
                    )));
                }
                Ok(())
            }
        }
    }
}

fn validate_generated(qps: f64, min_tokens: u32, max_tokens: u32) -> Result<(), ConfigError> {
    if !(qps.is_finite() && qps > 0.0) {
        return Err(ConfigError::Validation(format!(
            "qps must be > 0, got {}",
            qps
        )));
    }
    if min_tokens > max_tokens {
        return Err(ConfigError::Validation(format!(
            "min_tokens ({}) must not exceed max_tokens ({})",
            min_tokens, max_tokens
        )));
    }
    Ok(())
}

/// Linear per-replica service-time model used by the run loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSection {
    /// Seconds per prefill token.
    #[serde(default = "default_prefill_time")]
    pub prefill_time_per_token: f64,
    /// Seconds per decode token.
    #[serde(default = "default_decode_time")]
    pub decode_time_per_token: f64,
    /// Fixed seconds added to every request.
    #[serde(default)]
    pub overhead: f64,
}

fn default_prefill_time() -> f64 {
    0.0002
}
fn default_decode_time() -> f64 {
    0.02
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            prefill_time_per_token: default_prefill_time(),
            decode_time_per_token: default_decode_time(),
            overhead: 0.0,
        }
    }
}

impl ExecutionSection {
    /// Seconds a replica spends serving `request` once it starts.
    pub fn service_time(&self, request: &Request) -> f64 {
        self.prefill_time_per_token * request.input_size() as f64
            + self.decode_time_per_token * request.output_size() as f64
            + self.overhead
    }
}

impl SimConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cluster.validate()?;
        self.scheduler.validate()?;
        self.workload.validate()?;

        let exec = &self.execution;
        for (name, value) in [
            ("prefill_time_per_token", exec.prefill_time_per_token),
            ("decode_time_per_token", exec.decode_time_per_token),
            ("overhead", exec.overhead),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "{} must be >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Same configuration with a different scheduler.
    pub fn with_scheduler(&self, scheduler: SchedulerConfig) -> Self {
        Self {
            scheduler,
            ..self.clone()
        }
    }
}
