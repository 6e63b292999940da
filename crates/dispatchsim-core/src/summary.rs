//! Run summary, configuration hashing and result persistence.
//!
//! A run's results are stored under `<output_dir>/<config_hash>/`, so two
//! runs of the same configuration land in the same directory regardless of
//! how the configuration file was laid out.

use crate::cluster::{ClusterConfig, ClusterInfo};
use crate::config::{ExecutionSection, SimConfig, WorkloadConfig};
use crate::hash::fnv1a_64;
use crate::metrics::{RequestRecord, SimulationMetrics};
use dispatchsim_schedulers::SchedulerConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Failed to write results: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize results: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything that determines a run's outcome. Written to
/// `request_config_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub name: String,
    pub seed: u64,
    pub scheduler: SchedulerConfig,
    pub workload: WorkloadConfig,
    pub execution: ExecutionSection,
    pub cluster: ClusterConfig,
}

impl RunSummary {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            name: config.simulation.name.clone(),
            seed: config.simulation.seed,
            scheduler: config.scheduler.clone(),
            workload: config.workload.clone(),
            execution: config.execution.clone(),
            cluster: config.cluster.clone(),
        }
    }

    /// Stable identifier of this configuration.
    pub fn config_hash(&self) -> Result<String, serde_json::Error> {
        Ok(hash_value(&serde_json::to_value(self)?))
    }
}

/// Hex FNV-1a 64 of the canonical encoding of `value`.
pub fn hash_value(value: &Value) -> String {
    format!("{:016x}", fnv1a_64(canonical_json(value).as_bytes()))
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, v) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(v, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Outcome of one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub summary: RunSummary,
    pub cluster: ClusterInfo,
    pub metrics: SimulationMetrics,
    pub records: Vec<RequestRecord>,
}

impl SimulationReport {
    /// Write the run under `<dir>/<config_hash>/` and return that directory.
    ///
    /// Files: `cluster.json`, `request_config_summary.json`, `metrics.json`
    /// and `request_metrics.jsonl` (one record per completed request).
    pub fn persist(&self, dir: &Path) -> Result<PathBuf, PersistError> {
        let run_dir = dir.join(self.summary.config_hash()?);
        std::fs::create_dir_all(&run_dir)?;

        write_json(&run_dir.join("cluster.json"), &self.cluster)?;
        write_json(&run_dir.join("request_config_summary.json"), &self.summary)?;
        write_json(&run_dir.join("metrics.json"), &self.metrics)?;

        let file = std::fs::File::create(run_dir.join("request_metrics.jsonl"))?;
        let mut writer = BufWriter::new(file);
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        info!(dir = %run_dir.display(), records = self.records.len(), "persisted results");
        Ok(run_dir)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistError> {
    let file = std::fs::File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
