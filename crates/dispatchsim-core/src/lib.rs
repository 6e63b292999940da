//! DispatchSim: discrete-event simulator for global request dispatch across
//! LLM replicas.
//!
//! This crate builds the cluster, produces the request stream, and drives a
//! global scheduler from `dispatchsim-schedulers` through simulated time.
//! Each request is dispatched to exactly one replica and served there.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────┐     ┌───────────┐     ┌──────────────┐
//! │ Generator │────▶│  Engine   │────▶│   Metrics    │
//! │ / Trace   │     │ (Events)  │     │ + Persistence│
//! └───────────┘     └─────┬─────┘     └──────────────┘
//!                         │
//!                 ┌───────┴───────┐
//!                 │    Global     │
//!                 │   Scheduler   │
//!                 └───────┬───────┘
//!                         │
//!           ┌─────────────┼─────────────┐
//!           ▼             ▼             ▼
//!     ┌──────────┐  ┌──────────┐  ┌──────────┐
//!     │Replica 0 │  │Replica 1 │  │Replica N │
//!     └──────────┘  └──────────┘  └──────────┘
//! ```

pub mod clock;
pub mod cluster;
pub mod config;
pub mod engine;
pub mod generator;
pub mod hash;
pub mod metrics;
pub mod replica;
pub mod summary;
pub mod trace;
pub mod zipf;

// Re-export key types for convenience.
pub use clock::SimClock;
pub use cluster::{Cluster, ClusterConfig, ClusterError, ClusterInfo};
pub use config::{ConfigError, SimConfig, WorkloadConfig};
pub use dispatchsim_schedulers::{Request, SchedulerConfig, SchedulerError, SchedulerKind};
pub use engine::{SimEvent, SimulationEngine};
pub use generator::{generator_from_config, GeneratorError};
pub use metrics::{MetricsCollector, RequestRecord, SimulationMetrics};
pub use replica::Replica;
pub use summary::{PersistError, RunSummary, SimulationReport};
pub use trace::{load_trace, write_trace, TraceRecord};

use thiserror::Error;
use tracing::info;

/// Any failure that stops a run before or after simulation.
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Generator(#[from] GeneratorError),
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Run a complete simulation of `config`, generating its workload.
pub fn run_simulation(config: &SimConfig) -> Result<SimulationReport, SimError> {
    let requests = generator_from_config(&config.workload, config.simulation.seed)?;
    run_with_requests(config, requests)
}

/// Run a complete simulation of `config` over an explicit request stream.
pub fn run_with_requests<I>(config: &SimConfig, requests: I) -> Result<SimulationReport, SimError>
where
    I: IntoIterator<Item = Request>,
{
    let cluster = Cluster::new(&config.cluster)?;
    let scheduler = dispatchsim_schedulers::scheduler_from_config(
        &config.scheduler,
        cluster.num_replicas(),
        config.simulation.seed,
    )?;
    info!(
        scheduler = scheduler.name(),
        replicas = cluster.num_replicas(),
        workload = config.workload.kind(),
        "starting simulation"
    );

    let cluster_info = cluster.info();
    let mut engine = SimulationEngine::new(cluster, scheduler, config.execution.clone());
    engine.load_requests(requests);
    let metrics = engine.run();
    let records = std::mem::take(&mut engine.metrics).into_records();

    info!(
        completed = metrics.completed_requests,
        makespan = metrics.makespan,
        "simulation complete"
    );

    Ok(SimulationReport {
        summary: RunSummary::from_config(config),
        cluster: cluster_info,
        metrics,
        records,
    })
}

/// Run every scheduler in `schedulers` on the same generated workload.
pub fn compare_schedulers(
    config: &SimConfig,
    schedulers: &[SchedulerConfig],
) -> Result<Vec<SimulationReport>, SimError> {
    let requests: Vec<Request> =
        generator_from_config(&config.workload, config.simulation.seed)?.collect();
    schedulers
        .iter()
        .map(|scheduler| {
            let cfg = config.with_scheduler(scheduler.clone());
            run_with_requests(&cfg, requests.iter().cloned())
        })
        .collect()
}
