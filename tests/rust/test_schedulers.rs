/// Integration tests for the global scheduling policies.
use dispatchsim_schedulers::*;
use proptest::prelude::*;

/// Enqueue everything, then call `schedule()` until the queue is empty.
/// Returns `(replica_id, request)` in assignment order.
fn drain(sched: &mut dyn GlobalScheduler, requests: &[Request]) -> Vec<(u32, Request)> {
    for r in requests {
        sched.enqueue(r.clone());
    }
    let mut out = Vec::new();
    while sched.num_pending() > 0 {
        let batch = sched.schedule();
        assert!(!batch.is_empty(), "{} made no progress", sched.name());
        out.extend(batch);
    }
    out
}

fn replicas_of(assignments: &[(u32, Request)]) -> Vec<u32> {
    assignments.iter().map(|(r, _)| *r).collect()
}

fn uniform(n: u64) -> Vec<Request> {
    (0..n).map(|i| Request::new(i, i as f64, 10, 10)).collect()
}

#[test]
fn test_round_robin_four_replicas() {
    let mut sched = RoundRobin::new(4);
    let assignments = drain(&mut sched, &uniform(6));
    assert_eq!(replicas_of(&assignments), vec![0, 1, 2, 3, 0, 1]);
}

#[test]
fn test_lor_alternates_without_completions() {
    let mut sched = LeastOutstanding::new(2);
    let assignments = drain(&mut sched, &uniform(4));
    assert_eq!(replicas_of(&assignments), vec![0, 1, 0, 1]);
}

#[test]
fn test_lor_batched_bins() {
    let mut sched = LorBatched::new(2, 2, 100.0);
    let assignments = drain(&mut sched, &uniform(5));
    assert_eq!(replicas_of(&assignments), vec![0, 0, 1, 1, 0]);
}

#[test]
fn test_lor_follows_completions() {
    let mut sched = LeastOutstanding::new(3);
    drain(&mut sched, &uniform(3));
    sched.on_completion(2).unwrap();
    sched.on_completion(2).unwrap_err();
    let next = drain(&mut sched, &[Request::new(3, 3.0, 1, 1)]);
    assert_eq!(replicas_of(&next), vec![2]);
}

#[test]
fn test_completion_contract_violations() {
    let mut sched = scheduler_by_name("lor", 2, 0).unwrap();
    assert_eq!(
        sched.on_completion(0),
        Err(SchedulerError::NoOutstandingRequests { replica_id: 0 })
    );
    assert_eq!(
        sched.on_completion(7),
        Err(SchedulerError::UnknownReplica {
            replica_id: 7,
            num_replicas: 2
        })
    );

    let mut batched = scheduler_by_name("lor_batched", 2, 0).unwrap();
    assert!(batched.on_completion(1).is_err());

    // Policies without outstanding tracking ignore completions.
    let mut rr = scheduler_by_name("round_robin", 2, 0).unwrap();
    assert!(rr.on_completion(1).is_ok());
}

#[test]
fn test_empty_queue_schedules_nothing() {
    for kind in SchedulerKind::ALL {
        let mut sched = scheduler_from_config(&SchedulerConfig::with_defaults(kind), 3, 1).unwrap();
        assert!(sched.schedule().is_empty(), "{} assigned from empty queue", kind);
    }
}

#[test]
fn test_unknown_kind_is_an_error() {
    assert!(matches!(
        "least_kv".parse::<SchedulerKind>(),
        Err(SchedulerError::UnknownKind(name)) if name == "least_kv"
    ));
    assert!(scheduler_by_name("", 4, 0).is_err());
}

#[test]
fn test_zero_replicas_rejected() {
    assert_eq!(
        scheduler_from_config(&SchedulerConfig::Lor, 0, 0).err(),
        Some(SchedulerError::NoReplicas)
    );
}

#[test]
fn test_input_balance_prefers_light_replica() {
    let requests = vec![
        Request::new(0, 0.0, 1000, 1),
        Request::new(1, 1.0, 10, 1),
        Request::new(2, 2.0, 10, 1),
        Request::new(3, 3.0, 10, 1),
    ];
    let mut sched = BalancedScheduler::input_balance(2);
    let assignments = drain(&mut sched, &requests);
    // Replica 0 takes the big request; everything else fits on replica 1.
    assert_eq!(replicas_of(&assignments), vec![0, 1, 1, 1]);
    assert_eq!(sched.work_by_replica(), vec![1000.0, 30.0]);
}

#[test]
fn test_random_is_reproducible() {
    let requests = uniform(200);
    let a = drain(&mut RandomScheduler::new(5, 9), &requests);
    let b = drain(&mut RandomScheduler::new(5, 9), &requests);
    let c = drain(&mut RandomScheduler::new(5, 10), &requests);
    assert_eq!(replicas_of(&a), replicas_of(&b));
    assert_ne!(replicas_of(&a), replicas_of(&c));
    assert!(replicas_of(&a).iter().all(|&r| r < 5));
}

#[test]
fn test_config_identity_round_trips() {
    let config = SchedulerConfig::CombinedBalanced {
        alpha: 0.5,
        beta: 2.0,
    };
    let sched = scheduler_from_config(&config, 2, 0).unwrap();
    assert_eq!(sched.config(), config);
    assert_eq!(sched.name(), "combined_balanced");
}

fn arb_requests() -> impl Strategy<Value = Vec<Request>> {
    prop::collection::vec((0u32..10_000, 1u32..4096, 1u32..1024), 0..64).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (t, input, output))| Request::new(i as u64, t as f64 / 10.0, input, output))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_conservation(
        requests in arb_requests(),
        replicas in 1u32..8,
        kind_idx in 0usize..SchedulerKind::ALL.len(),
        seed in any::<u64>(),
    ) {
        let kind = SchedulerKind::ALL[kind_idx];
        let mut sched = scheduler_from_config(&SchedulerConfig::with_defaults(kind), replicas, seed).unwrap();
        let assignments = drain(sched.as_mut(), &requests);

        let mut ids: Vec<u64> = assignments.iter().map(|(_, r)| r.id()).collect();
        ids.sort_unstable();
        prop_assert_eq!(ids, (0..requests.len() as u64).collect::<Vec<_>>());
        prop_assert!(assignments.iter().all(|(r, _)| *r < replicas));
    }

    #[test]
    fn prop_arrival_order(
        requests in arb_requests(),
        replicas in 1u32..8,
        kind_idx in 0usize..SchedulerKind::ALL.len(),
    ) {
        let kind = SchedulerKind::ALL[kind_idx];
        let mut sched = scheduler_from_config(&SchedulerConfig::with_defaults(kind), replicas, 0).unwrap();
        let assignments = drain(sched.as_mut(), &requests);
        for pair in assignments.windows(2) {
            prop_assert!(pair[0].1.arrived_at() <= pair[1].1.arrived_at());
        }
    }

    #[test]
    fn prop_round_robin_ignores_sizes(requests in arb_requests(), replicas in 1u32..8) {
        let mut sched = RoundRobin::new(replicas);
        let assignments = drain(&mut sched, &requests);
        for (i, (replica, _)) in assignments.iter().enumerate() {
            prop_assert_eq!(*replica, i as u32 % replicas);
        }
    }

    #[test]
    fn prop_lor_spread_at_most_one(requests in arb_requests(), replicas in 1u32..8) {
        let mut sched = LeastOutstanding::new(replicas);
        for r in requests {
            sched.enqueue(r);
            sched.schedule();
            prop_assert!(sched.outstanding().spread() <= 1);
        }
    }

    #[test]
    fn prop_lor_batched_bin_bounds(
        requests in arb_requests(),
        replicas in 1u32..6,
        max_bin_size in 1u32..6,
        timeout_tenths in 1u32..50,
    ) {
        let timeout = timeout_tenths as f64 / 10.0;
        let mut sched = LorBatched::new(replicas, max_bin_size, timeout);
        for r in &requests {
            sched.enqueue(r.clone());
        }
        let mut bins = 0u64;
        while sched.num_pending() > 0 {
            let before = sched.bins_opened();
            let batch = sched.schedule();
            prop_assert_eq!(batch.len(), 1);
            if sched.bins_opened() > before {
                bins += 1;
            }
            if let Some(bin) = sched.current_bin() {
                prop_assert!(bin.size < max_bin_size);
                prop_assert!(batch[0].1.arrived_at() - bin.start_time < timeout);
                prop_assert_eq!(bin.replica_id, batch[0].0);
            }
        }
        let min_bins = (requests.len() as u64).div_ceil(max_bin_size as u64);
        prop_assert!(bins >= min_bins);
    }

    #[test]
    fn prop_combined_reduces_to_single_metric(requests in arb_requests(), replicas in 1u32..8) {
        let input = drain(&mut BalancedScheduler::input_balance(replicas), &requests);
        let combined_in = drain(&mut BalancedScheduler::combined(replicas, 1.0, 0.0), &requests);
        prop_assert_eq!(replicas_of(&input), replicas_of(&combined_in));

        let output = drain(&mut BalancedScheduler::output_balance(replicas), &requests);
        let combined_out = drain(&mut BalancedScheduler::combined(replicas, 0.0, 1.0), &requests);
        prop_assert_eq!(replicas_of(&output), replicas_of(&combined_out));
    }
}
