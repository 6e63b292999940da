//! Request entity shared by every scheduling policy.
//!
//! A [`Request`] is created once by a request generator, enqueued exactly once
//! into a global scheduler and bound to exactly one replica by a `schedule()`
//! pass. Everything except the replica binding is immutable after creation.
//! Requests serialize for reporting but are never read back: traces go through
//! their own record type and `Request::new`.

use serde::{Deserialize, Serialize};

/// Size proxies for the cost of a request, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSize {
    /// Prefill (prompt) tokens.
    pub input: u32,
    /// Decode (generated) tokens.
    pub output: u32,
}

impl RequestSize {
    pub fn new(input: u32, output: u32) -> Self {
        Self { input, output }
    }

    pub fn total(&self) -> u64 {
        self.input as u64 + self.output as u64
    }
}

/// A single inference request arriving at the global scheduler.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    id: u64,
    /// Arrival time in simulated seconds.
    arrived_at: f64,
    size: RequestSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    replica_id: Option<u32>,
}

impl Request {
    /// Create an unbound request.
    ///
    /// # Panics
    ///
    /// Panics if `arrived_at` is negative or not finite.
    pub fn new(id: u64, arrived_at: f64, input_size: u32, output_size: u32) -> Self {
        assert!(
            arrived_at.is_finite() && arrived_at >= 0.0,
            "Request {} has invalid arrival time {}",
            id,
            arrived_at
        );
        Self {
            id,
            arrived_at,
            size: RequestSize::new(input_size, output_size),
            replica_id: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn arrived_at(&self) -> f64 {
        self.arrived_at
    }

    pub fn size(&self) -> RequestSize {
        self.size
    }

    pub fn input_size(&self) -> u32 {
        self.size.input
    }

    pub fn output_size(&self) -> u32 {
        self.size.output
    }

    /// Replica this request was dispatched to, if any.
    pub fn replica_id(&self) -> Option<u32> {
        self.replica_id
    }

    /// Bind the request to the replica chosen by the scheduler.
    ///
    /// # Panics
    ///
    /// Panics if the request is already bound. A request is dispatched once.
    pub fn bind_to(&mut self, replica_id: u32) {
        if let Some(existing) = self.replica_id {
            panic!(
                "Request {} already bound to replica {}, cannot rebind to {}",
                self.id, existing, replica_id
            );
        }
        self.replica_id = Some(replica_id);
    }
}
