//! Array-backed binary min-heap of accumulated work per replica.
//!
//! Ordered by `(work_done, replica_id)` so equal work resolves to the lowest
//! replica id. Implemented directly over a `Vec` with index-based sifting
//! instead of `std::collections::BinaryHeap` because the float key needs a
//! total order and the tie-break has to be explicit.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Accumulated scheduling cost for one replica.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplicaWork {
    pub replica_id: u32,
    pub work_done: f64,
}

impl ReplicaWork {
    fn heap_cmp(&self, other: &Self) -> Ordering {
        self.work_done
            .total_cmp(&other.work_done)
            .then(self.replica_id.cmp(&other.replica_id))
    }
}

#[derive(Debug, Clone)]
pub struct WorkHeap {
    slots: Vec<ReplicaWork>,
}

impl WorkHeap {
    /// One zero-work entry per replica.
    pub fn new(num_replicas: u32) -> Self {
        let slots = (0..num_replicas)
            .map(|replica_id| ReplicaWork {
                replica_id,
                work_done: 0.0,
            })
            .collect();
        // Ascending ids at equal work already satisfy the heap property.
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The replica with the least accumulated work.
    pub fn peek(&self) -> Option<&ReplicaWork> {
        self.slots.first()
    }

    pub fn push(&mut self, entry: ReplicaWork) {
        self.slots.push(entry);
        let last = self.slots.len() - 1;
        self.sift_up(last);
    }

    pub fn pop(&mut self) -> Option<ReplicaWork> {
        if self.slots.is_empty() {
            return None;
        }
        let top = self.slots.swap_remove(0);
        if !self.slots.is_empty() {
            self.sift_down(0);
        }
        Some(top)
    }

    /// Take the least-loaded replica, charge it `delta`, and reinsert it.
    ///
    /// Returns the replica id that was charged.
    pub fn charge_least_loaded(&mut self, delta: f64) -> u32 {
        let mut top = self
            .pop()
            .expect("work heap holds one entry per replica and is never empty");
        top.work_done += delta;
        self.push(top);
        top.replica_id
    }

    /// Entries in heap (not id) order.
    pub fn iter(&self) -> impl Iterator<Item = &ReplicaWork> {
        self.slots.iter()
    }

    /// Accumulated work indexed by replica id.
    pub fn work_by_replica(&self) -> Vec<f64> {
        let mut work = vec![0.0; self.slots.len()];
        for entry in &self.slots {
            work[entry.replica_id as usize] = entry.work_done;
        }
        work
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.slots[a].heap_cmp(&self.slots[b]) == Ordering::Less
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if !self.less(idx, parent) {
                break;
            }
            self.slots.swap(idx, parent);
            idx = parent;
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.slots.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut smallest = idx;
            if left < len && self.less(left, smallest) {
                smallest = left;
            }
            if right < len && self.less(right, smallest) {
                smallest = right;
            }
            if smallest == idx {
                break;
            }
            self.slots.swap(idx, smallest);
            idx = smallest;
        }
    }

    #[cfg(test)]
    fn is_valid_heap(&self) -> bool {
        (1..self.slots.len()).all(|i| !self.less(i, (i - 1) / 2))
    }
}
