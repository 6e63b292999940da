//! Uniform random dispatch.
//!
//! The degenerate baseline: each request goes to an independently drawn
//! replica. No load tracking at all.

use crate::config::SchedulerConfig;
use crate::traits::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Random router with a seeded, reproducible RNG.
pub struct RandomScheduler {
    queue: PendingQueue,
    num_replicas: u32,
    rng: ChaCha8Rng,
}

impl RandomScheduler {
    pub fn new(num_replicas: u32, seed: u64) -> Self {
        assert!(num_replicas > 0, "RandomScheduler needs at least one replica");
        Self {
            queue: PendingQueue::new(),
            num_replicas,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl GlobalScheduler for RandomScheduler {
    fn pending(&self) -> &PendingQueue {
        &self.queue
    }

    fn pending_mut(&mut self) -> &mut PendingQueue {
        &mut self.queue
    }

    fn schedule(&mut self) -> Vec<Assignment> {
        let num_replicas = self.num_replicas;
        let rng = &mut self.rng;
        self.queue
            .drain_by_arrival()
            .map(|request| (rng.gen_range(0..num_replicas), request))
            .collect()
    }

    fn num_replicas(&self) -> u32 {
        self.num_replicas
    }

    fn config(&self) -> SchedulerConfig {
        SchedulerConfig::Random
    }
}
