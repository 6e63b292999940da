/// Integration tests for run summaries, configuration hashing and persisted results.
use dispatchsim_core::metrics::{RequestRecord, SimulationMetrics};
use dispatchsim_core::{run_with_requests, ClusterInfo, Request, RunSummary, SimConfig};
use std::io::BufRead;

const CONFIG_A: &str = r#"
[simulation]
name = "persist"
seed = 7

[cluster]
device = "a100"
model_names = ["meta-llama/Llama-2-7b-hf"]
num_replicas = [3]

[scheduler]
scheduler_type = "combined_balanced"
alpha = 1.0
beta = 0.5

[workload]
workload_type = "synthetic"
num_requests = 40
qps = 4
min_tokens = 10
max_tokens = 100
"#;

// Same content, keys and tables in a different order.
const CONFIG_B: &str = r#"
[workload]
max_tokens = 100
min_tokens = 10
qps = 4
num_requests = 40
workload_type = "synthetic"

[scheduler]
beta = 0.5
alpha = 1.0
scheduler_type = "combined_balanced"

[cluster]
num_replicas = [3]
model_names = ["meta-llama/Llama-2-7b-hf"]
device = "a100"

[simulation]
seed = 7
name = "persist"
"#;

fn hash_of(toml: &str) -> String {
    let config = SimConfig::from_str(toml).unwrap();
    RunSummary::from_config(&config).config_hash().unwrap()
}

#[test]
fn test_hash_is_key_order_independent() {
    assert_eq!(hash_of(CONFIG_A), hash_of(CONFIG_B));
}

#[test]
fn test_hash_tracks_scheduler_parameters() {
    let changed = CONFIG_A.replace("beta = 0.5", "beta = 0.25");
    assert_ne!(hash_of(CONFIG_A), hash_of(&changed));
    let other_policy = CONFIG_A.replace(
        "scheduler_type = \"combined_balanced\"\nalpha = 1.0\nbeta = 0.5",
        "scheduler_type = \"lor\"",
    );
    assert_ne!(hash_of(CONFIG_A), hash_of(&other_policy));
}

#[test]
fn test_persist_writes_all_files() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimConfig::from_str(CONFIG_A).unwrap();
    let requests: Vec<Request> = (0..12).map(|i| Request::new(i, i as f64, 50, 5)).collect();
    let report = run_with_requests(&config, requests).unwrap();

    let run_dir = report.persist(dir.path()).unwrap();
    assert_eq!(run_dir, dir.path().join(hash_of(CONFIG_A)));

    let cluster: ClusterInfo =
        serde_json::from_reader(std::fs::File::open(run_dir.join("cluster.json")).unwrap()).unwrap();
    assert_eq!(cluster.replicas.len(), 3);
    assert_eq!(cluster.replicas[2].id, 2);

    let raw: serde_json::Value = serde_json::from_reader(
        std::fs::File::open(run_dir.join("request_config_summary.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(raw["scheduler"]["scheduler_type"], "combined_balanced");
    assert_eq!(raw["workload"]["workload_type"], "synthetic");
    assert_eq!(raw["cluster"]["num_replicas"], serde_json::json!([3]));
    let summary: RunSummary = serde_json::from_value(raw).unwrap();
    assert_eq!(summary, report.summary);

    let metrics: SimulationMetrics =
        serde_json::from_reader(std::fs::File::open(run_dir.join("metrics.json")).unwrap()).unwrap();
    assert_eq!(metrics.completed_requests, 12);
    assert_eq!(metrics.scheduler, "combined_balanced");

    let file = std::fs::File::open(run_dir.join("request_metrics.jsonl")).unwrap();
    let records: Vec<RequestRecord> = std::io::BufReader::new(file)
        .lines()
        .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
        .collect();
    assert_eq!(records, report.records);
}

#[test]
fn test_persist_same_config_reuses_directory() {
    let dir = tempfile::tempdir().unwrap();
    let a = run_with_requests(&SimConfig::from_str(CONFIG_A).unwrap(), Vec::new()).unwrap();
    let b = run_with_requests(&SimConfig::from_str(CONFIG_B).unwrap(), Vec::new()).unwrap();
    assert_eq!(a.persist(dir.path()).unwrap(), b.persist(dir.path()).unwrap());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}
