//! Round-robin dispatch.
//!
//! Cycles through replica ids in order, ignoring request size and replica
//! load. Assignment `i` of a run always lands on replica `i mod R`.

use crate::config::SchedulerConfig;
use crate::traits::*;

/// Round-robin router.
pub struct RoundRobin {
    queue: PendingQueue,
    num_replicas: u32,
    /// Replica that receives the next request.
    next_replica_id: u32,
}

impl RoundRobin {
    pub fn new(num_replicas: u32) -> Self {
        assert!(num_replicas > 0, "RoundRobin needs at least one replica");
        Self {
            queue: PendingQueue::new(),
            num_replicas,
            next_replica_id: 0,
        }
    }

    pub fn next_replica_id(&self) -> u32 {
        self.next_replica_id
    }
}

impl GlobalScheduler for RoundRobin {
    fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    fn pending_mut(&mut self) -> &mut PendingQueue {
        &mut self.queue
    }

    fn schedule(&mut self) -> Vec<Assignment> {
        let num_replicas = self.num_replicas;
        let cursor = &mut self.next_replica_id;
        self.queue
            .drain_by_arrival()
            .map(|request| {
                let chosen = *cursor;
                *cursor = (*cursor + 1) % num_replicas;
                (chosen, request)
            })
            .collect()
    }

    fn num_replicas(&self) -> u32 {
        self.num_replicas
    }

    fn config(&self) -> SchedulerConfig {
        SchedulerConfig::RoundRobin
    }
}
