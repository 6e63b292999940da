//! Batched least outstanding requests dispatch.
//!
//! Consecutive requests are grouped into a bin that all goes to one replica,
//! chosen as the least loaded when the bin opens. A bin closes once it holds
//! `max_bin_size` requests or once the arrival-time span since the bin opened
//! reaches `binning_timeout`. The timeout is measured on request arrival
//! timestamps, not on the simulation clock.
//!
//! Unlike the other policies, one `schedule()` call consumes exactly one
//! pending request.

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::least_outstanding::OutstandingCounts;
use crate::traits::*;
use std::collections::HashMap;
use tracing::trace;

/// The currently open bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub replica_id: u32,
    /// Requests placed so far.
    pub size: u32,
    /// Arrival time of the request that opened the bin.
    pub start_time: f64,
}

/// LOR-Batched router.
pub struct LorBatched {
    queue: PendingQueue,
    max_bin_size: u32,
    binning_timeout: f64,
    /// `None` means the next request opens a new bin.
    current_bin: Option<Bin>,
    pending_counts: OutstandingCounts,
    bins_opened: u64,
}

impl LorBatched {
    pub fn new(num_replicas: u32, max_bin_size: u32, binning_timeout: f64) -> Self {
        assert!(num_replicas > 0, "LorBatched needs at least one replica");
        assert!(max_bin_size > 0, "max_bin_size must be > 0");
        assert!(
            binning_timeout.is_finite() && binning_timeout > 0.0,
            "binning_timeout must be > 0, got {}",
            binning_timeout
        );
        Self {
            queue: PendingQueue::new(),
            max_bin_size,
            binning_timeout,
            current_bin: None,
            pending_counts: OutstandingCounts::new(num_replicas),
            bins_opened: 0,
        }
    }

    pub fn current_bin(&self) -> Option<Bin> {
        self.current_bin
    }

    pub fn pending_counts(&self) -> &OutstandingCounts {
        &self.pending_counts
    }

    pub fn bins_opened(&self) -> u64 {
        self.bins_opened
    }
}

impl GlobalScheduler for LorBatched {
    fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    fn pending_mut(&mut self) -> &mut PendingQueue {
        &mut self.queue
    }

    fn schedule(&mut self) -> Vec<Assignment> {
        let Some(request) = self.queue.pop_earliest() else {
            return Vec::new();
        };

        let mut bin = match self.current_bin {
            Some(bin) => bin,
            None => {
                let replica_id = self.pending_counts.least_loaded();
                self.bins_opened += 1;
                trace!(replica_id, start = request.arrived_at(), "opening bin");
                Bin {
                    replica_id,
                    size: 0,
                    start_time: request.arrived_at(),
                }
            }
        };

        self.pending_counts.increment(bin.replica_id);
        bin.size += 1;

        let at_capacity = bin.size >= self.max_bin_size;
        let timed_out = request.arrived_at() - bin.start_time >= self.binning_timeout;
        self.current_bin = if at_capacity || timed_out {
            None
        } else {
            Some(bin)
        };

        vec![(bin.replica_id, request)]
    }

    fn on_completion(&mut self, replica_id: u32) -> Result<(), SchedulerError> {
        self.pending_counts.decrement(replica_id)
    }

    fn num_replicas(&self) -> u32 {
        self.pending_counts.as_slice().len() as u32
    }

    fn config(&self) -> SchedulerConfig {
        SchedulerConfig::LorBatched {
            max_bin_size: self.max_bin_size,
            binning_timeout: self.binning_timeout,
        }
    }

    fn custom_metrics(&self) -> HashMap<String, f64> {
        let mut m = HashMap::new();
        m.insert("bins_opened".to_string(), self.bins_opened as f64);
        m.insert(
            "outstanding_spread".to_string(),
            self.pending_counts.spread() as f64,
        );
        m
    }
}
