/// Integration tests for the simulation engine.
use dispatchsim_core::config::ExecutionSection;
use dispatchsim_core::{
    compare_schedulers, run_simulation, run_with_requests, ConfigError, Request, SchedulerConfig,
    SchedulerKind, SimConfig, SimError,
};

fn two_model_config() -> SimConfig {
    SimConfig::from_str(
        r#"
[simulation]
name = "integration-test"
seed = 42

[cluster]
device = "a100"
model_names = ["meta-llama/Llama-2-7b-hf", "meta-llama/Meta-Llama-3-8B"]
num_replicas = [2, 2]

[scheduler]
scheduler_type = "round_robin"

[workload]
workload_type = "zipfian"
num_requests = 200
qps = 8
min_tokens = 16
max_tokens = 1024
theta = 0.99
scramble = true

[execution]
prefill_time_per_token = 0.0001
decode_time_per_token = 0.005
overhead = 0.01
"#,
    )
    .unwrap()
}

fn mixed_workload(n: u64) -> Vec<Request> {
    (0..n)
        .map(|i| {
            let k = (i % 5) as usize;
            Request::new(
                i,
                i as f64 * 0.05,
                [128, 256, 512, 1024, 2048][k],
                [32, 64, 128, 256, 512][k],
            )
        })
        .collect()
}

#[test]
fn test_every_policy_completes_every_request() {
    let config = two_model_config();
    for kind in SchedulerKind::ALL {
        let cfg = config.with_scheduler(SchedulerConfig::with_defaults(kind));
        let report = run_simulation(&cfg).unwrap();
        assert_eq!(report.metrics.scheduler, kind.as_str());
        assert_eq!(report.metrics.total_requests, 200, "{}", kind);
        assert_eq!(report.metrics.completed_requests, 200, "{}", kind);
        assert_eq!(report.records.len(), 200);
        assert_eq!(report.metrics.per_replica_requests().iter().sum::<u64>(), 200);
    }
}

#[test]
fn test_records_are_consistent() {
    let report = run_with_requests(&two_model_config(), mixed_workload(100)).unwrap();
    for r in &report.records {
        assert!(r.scheduled_at >= r.arrived_at);
        assert!(r.completed_at > r.scheduled_at);
        assert!(r.replica_id < 4);
        let expected_model = if r.replica_id < 2 {
            "meta-llama/Llama-2-7b-hf"
        } else {
            "meta-llama/Meta-Llama-3-8B"
        };
        assert_eq!(r.model_name, expected_model);
    }
    let latest = report
        .records
        .iter()
        .map(|r| r.completed_at)
        .fold(0.0, f64::max);
    assert_eq!(report.metrics.makespan, latest);
}

#[test]
fn test_round_robin_spreads_evenly() {
    let report = run_with_requests(&two_model_config(), mixed_workload(100)).unwrap();
    assert_eq!(report.metrics.per_replica_requests(), vec![25, 25, 25, 25]);
    assert!((report.metrics.jains_fairness_index - 1.0).abs() < 1e-9);
    assert_eq!(report.metrics.load_cv, 0.0);
}

#[test]
fn test_immediate_dispatch_has_no_scheduling_delay() {
    // Every policy here assigns on the same pass the request arrives in.
    let config = two_model_config().with_scheduler(SchedulerConfig::Lor);
    let report = run_with_requests(&config, mixed_workload(50)).unwrap();
    assert_eq!(report.metrics.scheduling_delay.max, 0.0);
}

#[test]
fn test_output_balance_beats_round_robin_on_skewed_sizes() {
    let mut config = two_model_config();
    config.execution = ExecutionSection {
        prefill_time_per_token: 0.0,
        decode_time_per_token: 0.01,
        overhead: 0.0,
    };
    // Every fourth request is huge, so round robin piles them on replica 0.
    let requests: Vec<Request> = (0..80)
        .map(|i| Request::new(i, i as f64 * 0.1, 10, if i % 4 == 0 { 500 } else { 5 }))
        .collect();

    let rr = run_with_requests(&config, requests.clone()).unwrap();
    let balanced = run_with_requests(&config.with_scheduler(SchedulerConfig::OutputBalance), requests)
        .unwrap();
    assert!(balanced.metrics.makespan < rr.metrics.makespan);
    assert!(balanced.metrics.e2e_time.p99 < rr.metrics.e2e_time.p99);
}

#[test]
fn test_compare_uses_identical_workload() {
    let config = two_model_config();
    let kinds = [SchedulerConfig::RoundRobin, SchedulerConfig::Lor, SchedulerConfig::InputBalance];
    let reports = compare_schedulers(&config, &kinds).unwrap();
    assert_eq!(reports.len(), 3);
    let names: Vec<&str> = reports.iter().map(|r| r.metrics.scheduler.as_str()).collect();
    assert_eq!(names, vec!["round_robin", "lor", "input_balance"]);

    let tokens = |i: usize| -> u64 {
        reports[i]
            .metrics
            .per_replica
            .iter()
            .map(|l| l.prefill_tokens + l.decode_tokens)
            .sum()
    };
    assert_eq!(tokens(0), tokens(1));
    assert_eq!(tokens(1), tokens(2));
}

#[test]
fn test_seeded_runs_are_reproducible() {
    let config = two_model_config().with_scheduler(SchedulerConfig::Random);
    let a = run_simulation(&config).unwrap();
    let b = run_simulation(&config).unwrap();
    assert_eq!(a.records, b.records);
}

#[test]
fn test_lor_batched_custom_metrics() {
    let config = two_model_config().with_scheduler(SchedulerConfig::LorBatched {
        max_bin_size: 4,
        binning_timeout: 1000.0,
    });
    let report = run_with_requests(&config, mixed_workload(40)).unwrap();
    assert_eq!(report.metrics.custom_metrics.get("bins_opened"), Some(&10.0));
    assert_eq!(report.metrics.custom_metrics.get("outstanding_spread"), Some(&0.0));
}

#[test]
fn test_mismatched_cluster_fails_before_running() {
    let err = SimConfig::from_str(
        r#"
[cluster]
model_names = ["a", "b", "c"]
num_replicas = [1, 1]

[scheduler]
scheduler_type = "lor"

[workload]
workload_type = "synthetic"
num_requests = 10
"#,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Cluster(_)));

    // A config assembled in code skips `from_str`; the run still refuses it.
    let mut config = two_model_config();
    config.cluster.num_replicas.push(3);
    assert!(matches!(
        run_with_requests(&config, Vec::new()),
        Err(SimError::Cluster(_))
    ));
}

#[test]
fn test_invalid_scheduler_parameters_fail_run() {
    let config = two_model_config().with_scheduler(SchedulerConfig::LorBatched {
        max_bin_size: 0,
        binning_timeout: 1.0,
    });
    assert!(matches!(
        run_with_requests(&config, mixed_workload(5)),
        Err(SimError::Scheduler(_))
    ));
}
