//! Least outstanding requests (LOR) dispatch.
//!
//! Each request goes to the replica with the fewest requests dispatched but
//! not yet reported complete. The count is incremented here on assignment and
//! decremented only through [`GlobalScheduler::on_completion`], which the run
//! loop calls when a replica finishes a request.

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::traits::*;
use std::collections::HashMap;

/// Per-replica outstanding request counters.
///
/// A flat table rather than a heap: completions decrement arbitrary entries,
/// and selection is a linear scan over replica ids.
#[derive(Debug, Clone)]
pub struct OutstandingCounts {
    counts: Vec<u64>,
}

impl OutstandingCounts {
    pub fn new(num_replicas: u32) -> Self {
        Self {
            counts: vec![0; num_replicas as usize],
        }
    }

    /// Replica with the minimum count, lowest id on ties.
    pub fn least_loaded(&self) -> u32 {
        let (idx, _) = self
            .counts
            .iter()
            .enumerate()
            .min_by_key(|&(idx, count)| (*count, idx))
            .expect("outstanding table is never empty");
        idx as u32
    }

    pub fn increment(&mut self, replica_id: u32) {
        self.counts[replica_id as usize] += 1;
    }

    /// Record a completion. Fails instead of going below zero.
    pub fn decrement(&mut self, replica_id: u32) -> Result<(), SchedulerError> {
        check_replica(replica_id, self.counts.len() as u32)?;
        let count = &mut self.counts[replica_id as usize];
        if *count == 0 {
            return Err(SchedulerError::NoOutstandingRequests { replica_id });
        }
        *count -= 1;
        Ok(())
    }

    pub fn get(&self, replica_id: u32) -> u64 {
        self.counts[replica_id as usize]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }

    /// Max minus min outstanding count.
    pub fn spread(&self) -> u64 {
        let max = self.counts.iter().copied().max().unwrap_or(0);
        let min = self.counts.iter().copied().min().unwrap_or(0);
        max - min
    }
}

/// LOR router.
pub struct LeastOutstanding {
    queue: PendingQueue,
    outstanding: OutstandingCounts,
}

impl LeastOutstanding {
    pub fn new(num_replicas: u32) -> Self {
        assert!(num_replicas > 0, "LeastOutstanding needs at least one replica");
        Self {
            queue: PendingQueue::new(),
            outstanding: OutstandingCounts::new(num_replicas),
        }
    }

    pub fn outstanding(&self) -> &OutstandingCounts {
        &self.outstanding
    }
}

impl GlobalScheduler for LeastOutstanding {
    fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    fn pending_mut(&mut self) -> &mut PendingQueue {
        &mut self.queue
    }

    fn schedule(&mut self) -> Vec<Assignment> {
        let outstanding = &mut self.outstanding;
        self.queue
            .drain_by_arrival()
            .map(|request| {
                let chosen = outstanding.least_loaded();
                outstanding.increment(chosen);
                (chosen, request)
            })
            .collect()
    }

    fn on_completion(&mut self, replica_id: u32) -> Result<(), SchedulerError> {
        self.outstanding.decrement(replica_id)
    }

    fn num_replicas(&self) -> u32 {
        self.outstanding.as_slice().len() as u32
    }

    fn config(&self) -> SchedulerConfig {
        SchedulerConfig::Lor
    }

    fn custom_metrics(&self) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert(
            "outstanding_spread".to_string(),
            self.outstanding.spread() as f64,
        );
        m
    }
}
