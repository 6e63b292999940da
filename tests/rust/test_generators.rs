/// Integration tests for request generators and trace replay.
use dispatchsim_core::config::{ArrivalProcess, WorkloadConfig};
use dispatchsim_core::zipf::ZipfSampler;
use dispatchsim_core::{generator_from_config, load_trace, write_trace, Request, SimConfig};
use proptest::prelude::*;
use std::io::Write;

fn zipfian(num_requests: u64, seed: Option<u64>, scramble: bool) -> WorkloadConfig {
    WorkloadConfig::Zipfian {
        num_requests,
        qps: 20.0,
        arrival_process: ArrivalProcess::Poisson,
        min_tokens: 32,
        max_tokens: 2048,
        theta: 0.99,
        scramble,
        seed,
    }
}

#[test]
fn test_ids_are_dense_and_arrivals_sorted() {
    let workloads = [
        WorkloadConfig::Synthetic {
            num_requests: 300,
            qps: 50.0,
            arrival_process: ArrivalProcess::Poisson,
            min_tokens: 1,
            max_tokens: 100,
        },
        zipfian(300, None, true),
    ];
    for workload in &workloads {
        let requests: Vec<Request> = generator_from_config(workload, 11).unwrap().collect();
        assert_eq!(requests.len(), 300);
        assert_eq!(requests[0].arrived_at(), 0.0);
        for (i, pair) in requests.windows(2).enumerate() {
            assert_eq!(pair[0].id(), i as u64);
            assert!(pair[0].arrived_at() <= pair[1].arrived_at());
        }
    }
}

#[test]
fn test_zipfian_seed_controls_sizes() {
    let sizes = |workload: &WorkloadConfig, sim_seed: u64| -> Vec<(u32, u32)> {
        generator_from_config(workload, sim_seed)
            .unwrap()
            .map(|r| (r.input_size(), r.output_size()))
            .collect()
    };
    // An explicit zipf seed wins over the simulation seed.
    let pinned = zipfian(200, Some(5), false);
    assert_eq!(sizes(&pinned, 1), sizes(&pinned, 2));

    let unpinned = zipfian(200, None, false);
    assert_ne!(sizes(&unpinned, 1), sizes(&unpinned, 2));
}

#[test]
fn test_zipfian_sizes_are_skewed() {
    let requests: Vec<Request> = generator_from_config(&zipfian(5000, Some(1), false), 0)
        .unwrap()
        .collect();
    let at_min = requests.iter().filter(|r| r.input_size() == 32).count();
    // Rank 0 carries roughly 1/zeta(2017, 0.99) ~ 12% of the mass.
    assert!(at_min > 250, "only {} requests at the minimum size", at_min);
}

#[test]
fn test_trace_round_trip_through_workload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");

    let generated: Vec<Request> = generator_from_config(&zipfian(50, Some(3), true), 0)
        .unwrap()
        .collect();
    write_trace(&generated, &path).unwrap();

    let replay = WorkloadConfig::Trace {
        path: path.clone(),
        time_scale: 2.0,
        max_requests: Some(20),
    };
    let replayed: Vec<Request> = generator_from_config(&replay, 0).unwrap().collect();
    assert_eq!(replayed.len(), 20);
    for (orig, again) in generated.iter().zip(&replayed) {
        assert_eq!(again.id(), orig.id());
        assert_eq!(again.arrived_at(), orig.arrived_at() * 2.0);
        assert_eq!(again.size(), orig.size());
    }
}

#[test]
fn test_trace_file_sorted_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unsorted.jsonl");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "# recorded 2024-01-01").unwrap();
    writeln!(file, r#"{{"arrived_at": 3.0, "num_prefill_tokens": 30, "num_decode_tokens": 3}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"arrived_at": 1.0, "num_prefill_tokens": 10, "num_decode_tokens": 1}}"#).unwrap();
    writeln!(file, r#"{{"arrived_at": 1.0, "num_prefill_tokens": 11, "num_decode_tokens": 1}}"#).unwrap();
    drop(file);

    let records = load_trace(&path).unwrap();
    let prefill: Vec<u32> = records.iter().map(|r| r.num_prefill_tokens).collect();
    assert_eq!(prefill, vec![10, 11, 30]);
}

#[test]
fn test_trace_workload_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.jsonl");
    let requests: Vec<Request> = (0..30).map(|i| Request::new(i, i as f64 * 0.5, 100, 20)).collect();
    write_trace(&requests, &path).unwrap();

    let config = SimConfig::from_str(&format!(
        r#"
[cluster]
model_names = ["m"]
num_replicas = [3]

[scheduler]
scheduler_type = "lor_batched"
max_bin_size = 2
binning_timeout = 5.0

[workload]
workload_type = "trace"
path = {:?}
"#,
        path.display().to_string()
    ))
    .unwrap();
    let report = dispatchsim_core::run_simulation(&config).unwrap();
    assert_eq!(report.metrics.completed_requests, 30);
}

proptest! {
    #[test]
    fn prop_zipf_stays_in_range(
        min in 0u32..1000,
        span in 0u32..5000,
        theta_pct in 1u32..100,
        scramble in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let max = min + span;
        let theta = theta_pct as f64 / 100.0;
        let mut a = ZipfSampler::new(min, max, theta, scramble, seed).unwrap();
        let mut b = ZipfSampler::new(min, max, theta, scramble, seed).unwrap();
        for _ in 0..50 {
            let v = a.sample();
            prop_assert!(v >= min && v <= max);
            prop_assert_eq!(v, b.sample());
        }
    }
}
