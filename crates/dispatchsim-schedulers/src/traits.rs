//! Global scheduler trait definitions.
//!
//! Every policy implements [`GlobalScheduler`]: requests are pushed in with
//! [`GlobalScheduler::enqueue`] and handed out, bound to a replica id, by
//! [`GlobalScheduler::schedule`]. Policies own their [`PendingQueue`] and any
//! auxiliary load-tracking state; nothing is shared between instances.

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::request::Request;
use std::collections::{HashMap, VecDeque};

/// A scheduling decision: the replica id and the request routed to it.
pub type Assignment = (u32, Request);

/// Requests waiting for a scheduling pass.
///
/// FIFO by enqueue order. Consumers always go through the arrival-sorted
/// accessors, which use a stable sort so same-timestamp requests keep their
/// enqueue order.
#[derive(Debug, Clone, Default)]
pub struct PendingQueue {
    requests: VecDeque<Request>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: Request) {
        self.requests.push_back(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Stable sort by ascending arrival time.
    pub fn sort_by_arrival(&mut self) {
        self.requests
            .make_contiguous()
            .sort_by(|a, b| a.arrived_at().total_cmp(&b.arrived_at()));
    }

    /// Sort, then remove and return the earliest request.
    pub fn pop_earliest(&mut self) -> Option<Request> {
        self.sort_by_arrival();
        self.requests.pop_front()
    }

    /// Sort, then remove every pending request in arrival order.
    pub fn drain_by_arrival(&mut self) -> std::collections::vec_deque::Drain<'_, Request> {
        self.sort_by_arrival();
        self.requests.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Request> {
        self.requests.iter()
    }
}

/// The capability set shared by all global scheduling policies.
///
/// The run loop is the only caller. It never invokes two methods concurrently
/// on the same instance, so implementations are plain single-owner state.
pub trait GlobalScheduler: Send {
    /// The policy's pending queue.
    fn pending(&self) -> &PendingQueue;

    fn pending_mut(&mut self) -> &mut PendingQueue;

    /// Add a request to the pending queue. Never assigns immediately.
    fn enqueue(&mut self, request: Request) {
        self.pending_mut().push(request);
    }

    /// Consume some or all pending requests and decide their replicas.
    ///
    /// Returns an empty list when nothing is pending. Every returned replica id
    /// is in `0..num_replicas()`.
    fn schedule(&mut self) -> Vec<Assignment>;

    /// Called by the run loop when `replica_id` finishes a request.
    ///
    /// Only the LOR family tracks outstanding work; other policies ignore it.
    fn on_completion(&mut self, _replica_id: u32) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn num_pending(&self) -> usize {
        self.pending().len()
    }

    fn num_replicas(&self) -> u32;

    /// Policy name and parameters, used as the run's scheduler identity.
    fn config(&self) -> SchedulerConfig;

    /// Human-readable name for reports.
    fn name(&self) -> &'static str {
        self.config().kind().as_str()
    }

    /// Optional: policy-specific metrics to include in output.
    fn custom_metrics(&self) -> HashMap<String, f64> {
        HashMap::new()
    }
}

/// Check a replica id against the cluster size.
pub fn check_replica(replica_id: u32, num_replicas: u32) -> Result<(), SchedulerError> {
    if replica_id < num_replicas {
        Ok(())
    } else {
        Err(SchedulerError::UnknownReplica {
            replica_id,
            num_replicas,
        })
    }
}
