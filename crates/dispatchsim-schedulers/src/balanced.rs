//! Work-balancing dispatch: InputBalance, OutputBalance and CombinedBalanced.
//!
//! All three keep a [`WorkHeap`] of accumulated cost per replica and drain the
//! whole pending queue in one pass, greedily sending each request to the
//! replica with the least work so far. This is an online makespan heuristic:
//! O(log R) per request, no lookahead, past assignments are never revisited.

use crate::config::SchedulerConfig;
use crate::request::Request;
use crate::traits::*;
use crate::work_heap::WorkHeap;
use std::collections::HashMap;

/// How a request's size turns into work charged to a replica.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorkMetric {
    /// Charge input (prefill) tokens.
    Input,
    /// Charge output (decode) tokens.
    Output,
    /// Charge `alpha * input + beta * output`.
    Combined { alpha: f64, beta: f64 },
}

impl WorkMetric {
    pub fn cost(&self, request: &Request) -> f64 {
        let input = request.input_size() as f64;
        let output = request.output_size() as f64;
        match *self {
            WorkMetric::Input => input,
            WorkMetric::Output => output,
            WorkMetric::Combined { alpha, beta } => alpha * input + beta * output,
        }
    }
}

/// Greedy least-accumulated-work router.
pub struct BalancedScheduler {
    queue: PendingQueue,
    heap: WorkHeap,
    metric: WorkMetric,
}

impl BalancedScheduler {
    pub fn new(num_replicas: u32, metric: WorkMetric) -> Self {
        assert!(
            num_replicas > 0,
            "BalancedScheduler needs at least one replica"
        );
        if let WorkMetric::Combined { alpha, beta } = metric {
            assert!(
                alpha >= 0.0 && beta >= 0.0,
                "alpha and beta must be >= 0, got {} and {}",
                alpha,
                beta
            );
        }
        Self {
            queue: PendingQueue::new(),
            heap: WorkHeap::new(num_replicas),
            metric,
        }
    }

    pub fn input_balance(num_replicas: u32) -> Self {
        Self::new(num_replicas, WorkMetric::Input)
    }

    pub fn output_balance(num_replicas: u32) -> Self {
        Self::new(num_replicas, WorkMetric::Output)
    }

    pub fn combined(num_replicas: u32, alpha: f64, beta: f64) -> Self {
        Self::new(num_replicas, WorkMetric::Combined { alpha, beta })
    }

    pub fn metric(&self) -> WorkMetric {
        self.metric
    }

    /// Accumulated work indexed by replica id.
    pub fn work_by_replica(&self) -> Vec<f64> {
        self.heap.work_by_replica()
    }
}

impl GlobalScheduler for BalancedScheduler {
    fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    fn pending_mut(&mut self) -> &mut PendingQueue {
        &mut self.queue
    }

    fn schedule(&mut self) -> Vec<Assignment> {
        let metric = self.metric;
        let heap = &mut self.heap;
        self.queue
            .drain_by_arrival()
            .map(|request| {
                let replica_id = heap.charge_least_loaded(metric.cost(&request));
                (replica_id, request)
            })
            .collect()
    }

    fn num_replicas(&self) -> u32 {
        self.heap.len() as u32
    }

    fn config(&self) -> SchedulerConfig {
        match self.metric {
            WorkMetric::Input => SchedulerConfig::InputBalance,
            WorkMetric::Output => SchedulerConfig::OutputBalance,
            WorkMetric::Combined { alpha, beta } => {
                SchedulerConfig::CombinedBalanced { alpha, beta }
            }
        }
    }

    fn custom_metrics(&self) -> HashMap<String, f64> {
        let work = self.heap.work_by_replica();
        let max = work.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min = work.iter().cloned().fold(f64::INFINITY, f64::min);
        let mut m = HashMap::new();
        m.insert("max_replica_work".to_string(), max);
        m.insert("min_replica_work".to_string(), min);
        m.insert("work_spread".to_string(), max - min);
        m
    }
}
