//! Metrics collection and aggregation for simulation runs.
//!
//! Tracks per-request timing (scheduling delay, end-to-end time), per-replica
//! load, and the fairness of the resulting distribution across replicas.

use crate::cluster::Cluster;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-request completion record. One line of `request_metrics.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub request_id: u64,
    pub replica_id: u32,
    pub model_name: String,
    pub arrived_at: f64,
    /// When the global scheduler handed the request to its replica.
    pub scheduled_at: f64,
    pub completed_at: f64,
    pub num_prefill_tokens: u32,
    pub num_decode_tokens: u32,
}

impl RequestRecord {
    /// Time spent waiting in the global queue.
    pub fn scheduling_delay(&self) -> f64 {
        self.scheduled_at - self.arrived_at
    }

    /// Arrival to completion.
    pub fn e2e_time(&self) -> f64 {
        self.completed_at - self.arrived_at
    }
}

/// Percentile values for a distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl Percentiles {
    /// Compute percentiles from a slice of values.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self {
                p50: 0.0,
                p75: 0.0,
                p90: 0.0,
                p95: 0.0,
                p99: 0.0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        let n = sorted.len();
        let mean = sorted.iter().sum::<f64>() / n as f64;

        Self {
            p50: percentile_sorted(&sorted, 50.0),
            p75: percentile_sorted(&sorted, 75.0),
            p90: percentile_sorted(&sorted, 90.0),
            p95: percentile_sorted(&sorted, 95.0),
            p99: percentile_sorted(&sorted, 99.0),
            min: sorted[0],
            max: sorted[n - 1],
            mean,
        }
    }
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Load summary for one replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaLoad {
    pub replica_id: u32,
    pub model_name: String,
    pub num_requests: u64,
    pub prefill_tokens: u64,
    pub decode_tokens: u64,
    /// Seconds spent serving requests.
    pub busy_time: f64,
}

/// Aggregated metrics for an entire simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationMetrics {
    /// Scheduler name.
    pub scheduler: String,
    pub num_replicas: u32,
    /// Requests handed to the scheduler.
    pub total_requests: u64,
    pub completed_requests: u64,
    /// Latest completion time in seconds.
    pub makespan: f64,

    // Latency
    pub e2e_time: Percentiles,
    pub scheduling_delay: Percentiles,

    // Throughput
    pub requests_per_sec: f64,
    pub tokens_per_sec: f64,

    // Fairness
    pub load_cv: f64,
    pub jains_fairness_index: f64,
    pub per_replica: Vec<ReplicaLoad>,

    // Custom scheduler metrics
    pub custom_metrics: BTreeMap<String, f64>,
}

impl SimulationMetrics {
    pub fn per_replica_requests(&self) -> Vec<u64> {
        self.per_replica.iter().map(|r| r.num_requests).collect()
    }
}

/// Collector that accumulates per-request records during simulation.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    records: Vec<RequestRecord>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed request.
    pub fn record(&mut self, record: RequestRecord) {
        self.records.push(record);
    }

    /// Number of completed requests recorded.
    pub fn completed_count(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn records(&self) -> &[RequestRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<RequestRecord> {
        self.records
    }

    /// Aggregate all records into a summary.
    ///
    /// `busy_time` is indexed by replica id.
    pub fn aggregate(
        &self,
        scheduler: &str,
        cluster: &Cluster,
        total_requests: u64,
        busy_time: &[f64],
        custom_metrics: HashMap<String, f64>,
    ) -> SimulationMetrics {
        let records = &self.records;

        let e2e_values: Vec<f64> = records.iter().map(|r| r.e2e_time()).collect();
        let delay_values: Vec<f64> = records.iter().map(|r| r.scheduling_delay()).collect();

        let mut per_replica: Vec<ReplicaLoad> = cluster
            .replicas()
            .iter()
            .map(|replica| ReplicaLoad {
                replica_id: replica.id,
                model_name: replica.model_name.clone(),
                num_requests: 0,
                prefill_tokens: 0,
                decode_tokens: 0,
                busy_time: busy_time.get(replica.id as usize).copied().unwrap_or(0.0),
            })
            .collect();
        for r in records {
            let load = &mut per_replica[r.replica_id as usize];
            load.num_requests += 1;
            load.prefill_tokens += r.num_prefill_tokens as u64;
            load.decode_tokens += r.num_decode_tokens as u64;
        }

        let makespan = records
            .iter()
            .map(|r| r.completed_at)
            .fold(0.0, f64::max);
        let completed = records.len() as u64;
        let total_tokens: u64 = per_replica
            .iter()
            .map(|l| l.prefill_tokens + l.decode_tokens)
            .sum();

        let counts: Vec<u64> = per_replica.iter().map(|l| l.num_requests).collect();

        SimulationMetrics {
            scheduler: scheduler.to_string(),
            num_replicas: cluster.num_replicas(),
            total_requests,
            completed_requests: completed,
            makespan,
            e2e_time: Percentiles::from_values(&e2e_values),
            scheduling_delay: Percentiles::from_values(&delay_values),
            requests_per_sec: if makespan > 0.0 {
                completed as f64 / makespan
            } else {
                0.0
            },
            tokens_per_sec: if makespan > 0.0 {
                total_tokens as f64 / makespan
            } else {
                0.0
            },
            load_cv: coefficient_of_variation(&counts),
            jains_fairness_index: jains_fairness_index(&counts),
            per_replica,
            custom_metrics: custom_metrics.into_iter().collect(),
        }
    }
}

/// Coefficient of variation (std / mean).
pub fn coefficient_of_variation(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<u64>() as f64 / n;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values
        .iter()
        .map(|&v| (v as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    variance.sqrt() / mean
}

/// Jain's fairness index: (sum(x_i))^2 / (n * sum(x_i^2)).
pub fn jains_fairness_index(values: &[u64]) -> f64 {
    if values.is_empty() {
        return 1.0;
    }
    let n = values.len() as f64;
    let sum: f64 = values.iter().map(|&v| v as f64).sum();
    let sum_sq: f64 = values.iter().map(|&v| (v as f64).powi(2)).sum();
    if sum_sq == 0.0 {
        return 1.0;
    }
    (sum * sum) / (n * sum_sq)
}

/// Format metrics as a pretty-printed table string.
pub fn format_table(metrics: &SimulationMetrics) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} Results  ", metrics.scheduler)
    ));
    out.push_str(&format!(
        "  Makespan: {:.1}s | Requests: {}/{} completed | Replicas: {}\n",
        metrics.makespan, metrics.completed_requests, metrics.total_requests, metrics.num_replicas
    ));
    out.push_str(&format!("{:-<70}\n", "  Latency  "));
    out.push_str(&format!(
        "  E2E (s)         P50={:>8.3}  P90={:>8.3}  P99={:>8.3}\n",
        metrics.e2e_time.p50, metrics.e2e_time.p90, metrics.e2e_time.p99
    ));
    out.push_str(&format!(
        "  Sched delay (s) P50={:>8.3}  P90={:>8.3}  P99={:>8.3}\n",
        metrics.scheduling_delay.p50, metrics.scheduling_delay.p90, metrics.scheduling_delay.p99
    ));
    out.push_str(&format!("{:-<70}\n", "  Throughput  "));
    out.push_str(&format!(
        "  Requests/sec: {:.2}  Tokens/sec: {:.0}\n",
        metrics.requests_per_sec, metrics.tokens_per_sec,
    ));
    out.push_str(&format!("{:-<70}\n", "  Load  "));
    out.push_str(&format!(
        "  Load CV: {:.3}  Jain's index: {:.4}\n",
        metrics.load_cv, metrics.jains_fairness_index,
    ));
    for load in &metrics.per_replica {
        out.push_str(&format!(
            "  replica {:>3} {:<28} reqs={:>6} prefill={:>9} decode={:>9}\n",
            load.replica_id, load.model_name, load.num_requests, load.prefill_tokens, load.decode_tokens,
        ));
    }
    if !metrics.custom_metrics.is_empty() {
        out.push_str(&format!("{:-<70}\n", "  Scheduler  "));
        for (name, value) in &metrics.custom_metrics {
            out.push_str(&format!("  {}: {:.3}\n", name, value));
        }
    }
    out.push_str(&format!("{:=<70}\n", ""));
    out
}

/// Format a comparison table of multiple scheduler results.
pub fn format_comparison_table(results: &[SimulationMetrics]) -> String {
    if results.is_empty() {
        return String::from("No results to compare.\n");
    }

    let mut out = String::new();
    out.push_str(&format!("\n{:=<90}\n", "  Scheduler Comparison  "));
    out.push_str(&format!(
        "{:<20} {:>9} {:>9} {:>9} {:>9} {:>9} {:>9} {:>8}\n",
        "Scheduler", "E2E p50", "E2E p99", "Delay p50", "Delay p99", "Makespan", "Req/s", "Jain's"
    ));
    out.push_str(&format!("{:-<90}\n", ""));

    for m in results {
        out.push_str(&format!(
            "{:<20} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>9.1} {:>9.2} {:>8.4}\n",
            m.scheduler,
            m.e2e_time.p50,
            m.e2e_time.p99,
            m.scheduling_delay.p50,
            m.scheduling_delay.p99,
            m.makespan,
            m.requests_per_sec,
            m.jains_fairness_index,
        ));
    }
    out.push_str(&format!("{:=<90}\n", ""));
    out
}
