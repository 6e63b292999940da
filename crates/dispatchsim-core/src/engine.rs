//! Discrete-event simulation engine.
//!
//! The engine maintains a priority queue of [`SimEvent`]s sorted by
//! timestamp, ties broken by insertion order. Each iteration pops the next
//! event, advances the virtual clock, and processes the event, which may
//! schedule further events.
//!
//! Replicas are modelled as FIFO single servers: a dispatched request starts
//! when its replica is free and occupies it for a time linear in its size.

use crate::clock::SimClock;
use crate::cluster::Cluster;
use crate::config::ExecutionSection;
use crate::metrics::{MetricsCollector, RequestRecord, SimulationMetrics};
use dispatchsim_schedulers::{GlobalScheduler, Request};
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, trace};

/// Events in the discrete-event simulation.
#[derive(Debug, Clone)]
pub enum SimEvent {
    /// A new request arrives at the global scheduler.
    RequestArrival(Request),
    /// Run one global scheduling pass.
    GlobalSchedule,
    /// A replica finished serving a request.
    RequestComplete { replica_id: u32, request_id: u64 },
}

/// A timestamped event for the priority queue.
#[derive(Debug, Clone)]
struct TimedEvent {
    time: f64,
    sequence: u64,
    event: SimEvent,
}

impl PartialEq for TimedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl Eq for TimedEvent {}

impl PartialOrd for TimedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedEvent {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // BinaryHeap is a max-heap; we want min-heap
        other
            .time
            .total_cmp(&self.time)
            .then(other.sequence.cmp(&self.sequence))
    }
}

/// Serving state of one replica.
#[derive(Debug, Clone, Default)]
struct ReplicaServer {
    busy_until: f64,
    busy_time: f64,
}

#[derive(Debug, Clone)]
struct InFlight {
    request: Request,
    scheduled_at: f64,
}

/// The main simulation engine.
pub struct SimulationEngine {
    /// Virtual clock.
    pub clock: SimClock,
    /// Event queue (min-heap by time).
    event_queue: BinaryHeap<TimedEvent>,
    /// Sequence counter for tie-breaking.
    sequence: u64,
    cluster: Cluster,
    servers: Vec<ReplicaServer>,
    scheduler: Box<dyn GlobalScheduler>,
    execution: ExecutionSection,
    /// Dispatched requests by id.
    in_flight: HashMap<u64, InFlight>,
    /// Metrics collector.
    pub metrics: MetricsCollector,
    /// Requests handed to the scheduler so far.
    enqueued: u64,
    /// Total events processed.
    pub events_processed: u64,
    /// Number of scheduling passes run.
    pub schedule_passes: u64,
}

impl SimulationEngine {
    /// Create a new engine. The scheduler must be sized for `cluster`.
    pub fn new(
        cluster: Cluster,
        scheduler: Box<dyn GlobalScheduler>,
        execution: ExecutionSection,
    ) -> Self {
        assert_eq!(
            scheduler.num_replicas(),
            cluster.num_replicas(),
            "scheduler and cluster disagree on replica count"
        );
        let servers = vec![ReplicaServer::default(); cluster.num_replicas() as usize];
        Self {
            clock: SimClock::new(),
            event_queue: BinaryHeap::new(),
            sequence: 0,
            cluster,
            servers,
            scheduler,
            execution,
            in_flight: HashMap::new(),
            metrics: MetricsCollector::new(),
            enqueued: 0,
            events_processed: 0,
            schedule_passes: 0,
        }
    }

    /// Schedule an event at a given time.
    pub fn schedule_event(&mut self, time: f64, event: SimEvent) {
        self.event_queue.push(TimedEvent {
            time,
            sequence: self.sequence,
            event,
        });
        self.sequence += 1;
    }

    /// Queue an arrival event for every request.
    pub fn load_requests<I: IntoIterator<Item = Request>>(&mut self, requests: I) {
        for request in requests {
            let arrival = request.arrived_at();
            self.schedule_event(arrival, SimEvent::RequestArrival(request));
        }
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn scheduler(&self) -> &dyn GlobalScheduler {
        self.scheduler.as_ref()
    }

    /// Get the number of pending events.
    pub fn pending_events(&self) -> usize {
        self.event_queue.len()
    }

    /// Run until every event is processed and the scheduler queue is empty.
    pub fn run(&mut self) -> SimulationMetrics {
        loop {
            while let Some(timed_event) = self.event_queue.pop() {
                self.clock.advance_to(timed_event.time);
                self.process_event(timed_event.event);
                self.events_processed += 1;
            }

            let pending = self.scheduler.num_pending();
            if pending == 0 {
                break;
            }
            debug!(pending, "draining scheduler queue at end of stream");
            let now = self.clock.now();
            self.schedule_event(now, SimEvent::GlobalSchedule);
        }

        assert!(self.in_flight.is_empty(), "requests still in flight after drain");
        debug!(
            events = self.events_processed,
            passes = self.schedule_passes,
            "simulation finished"
        );

        let busy_time: Vec<f64> = self.servers.iter().map(|s| s.busy_time).collect();
        self.metrics.aggregate(
            self.scheduler.name(),
            &self.cluster,
            self.enqueued,
            &busy_time,
            self.scheduler.custom_metrics(),
        )
    }

    /// Process a single event.
    fn process_event(&mut self, event: SimEvent) {
        match event {
            SimEvent::RequestArrival(request) => self.handle_arrival(request),
            SimEvent::GlobalSchedule => self.handle_global_schedule(),
            SimEvent::RequestComplete {
                replica_id,
                request_id,
            } => self.handle_request_complete(replica_id, request_id),
        }
    }

    /// Handle a request arrival: enqueue, then schedule at the same instant.
    fn handle_arrival(&mut self, request: Request) {
        trace!(request_id = request.id(), "arrival");
        self.scheduler.enqueue(request);
        self.enqueued += 1;
        let now = self.clock.now();
        self.schedule_event(now, SimEvent::GlobalSchedule);
    }

    /// Handle one scheduling pass: dispatch every assignment it returns.
    fn handle_global_schedule(&mut self) {
        let now = self.clock.now();
        let pending_before = self.scheduler.num_pending();
        let assignments = self.scheduler.schedule();
        self.schedule_passes += 1;

        assert!(
            pending_before == 0 || !assignments.is_empty(),
            "{} made no progress with {} pending requests",
            self.scheduler.name(),
            pending_before
        );

        let num_replicas = self.cluster.num_replicas();
        for (replica_id, mut request) in assignments {
            assert!(
                replica_id < num_replicas,
                "{} assigned request {} to replica {} of {}",
                self.scheduler.name(),
                request.id(),
                replica_id,
                num_replicas
            );
            request.bind_to(replica_id);

            let service = self.execution.service_time(&request);
            let server = &mut self.servers[replica_id as usize];
            let start = now.max(server.busy_until);
            let done = start + service;
            server.busy_until = done;
            server.busy_time += service;

            let request_id = request.id();
            trace!(request_id, replica_id, start, done, "dispatched");
            self.in_flight.insert(
                request_id,
                InFlight {
                    request,
                    scheduled_at: now,
                },
            );
            self.schedule_event(
                done,
                SimEvent::RequestComplete {
                    replica_id,
                    request_id,
                },
            );
        }
    }

    /// Handle request completion.
    fn handle_request_complete(&mut self, replica_id: u32, request_id: u64) {
        let now = self.clock.now();
        let Some(in_flight) = self.in_flight.remove(&request_id) else {
            panic!("completion for unknown request {}", request_id);
        };

        if let Err(e) = self.scheduler.on_completion(replica_id) {
            panic!("{} rejected completion: {}", self.scheduler.name(), e);
        }

        let request = &in_flight.request;
        let model_name = self
            .cluster
            .replica(replica_id)
            .map(|r| r.model_name.clone())
            .unwrap_or_default();
        self.metrics.record(RequestRecord {
            request_id,
            replica_id,
            model_name,
            arrived_at: request.arrived_at(),
            scheduled_at: in_flight.scheduled_at,
            completed_at: now,
            num_prefill_tokens: request.input_size(),
            num_decode_tokens: request.output_size(),
        });
    }
}
