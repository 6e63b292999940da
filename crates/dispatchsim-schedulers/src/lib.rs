//! Global scheduling policies for DispatchSim.
//!
//! This crate provides the [`GlobalScheduler`] trait, the [`Request`] entity it
//! operates on, and the built-in dispatch policies for a multi-replica LLM
//! serving cluster:
//!
//! | Policy | Strategy | Load state |
//! |--------|----------|------------|
//! | [`RandomScheduler`] | Uniform random replica | None |
//! | [`RoundRobin`] | Cycle through replica ids | Cursor |
//! | [`LeastOutstanding`] | Fewest in-flight requests | Flat counter table |
//! | [`LorBatched`] | LOR, re-chosen once per bin | Flat counter table + open bin |
//! | [`BalancedScheduler`] (input) | Least accumulated prefill tokens | Work heap |
//! | [`BalancedScheduler`] (output) | Least accumulated decode tokens | Work heap |
//! | [`BalancedScheduler`] (combined) | Least `alpha*in + beta*out` | Work heap |

pub mod balanced;
pub mod config;
pub mod error;
pub mod least_outstanding;
pub mod lor_batched;
pub mod random;
pub mod request;
pub mod round_robin;
pub mod traits;
pub mod work_heap;

pub use balanced::{BalancedScheduler, WorkMetric};
pub use config::{SchedulerConfig, SchedulerKind};
pub use error::SchedulerError;
pub use least_outstanding::{LeastOutstanding, OutstandingCounts};
pub use lor_batched::LorBatched;
pub use random::RandomScheduler;
pub use request::{Request, RequestSize};
pub use round_robin::RoundRobin;
pub use traits::*;
pub use work_heap::{ReplicaWork, WorkHeap};

use tracing::debug;

/// Build a scheduler from its configuration.
///
/// `seed` only feeds policies that draw random numbers.
pub fn scheduler_from_config(
    config: &SchedulerConfig,
    num_replicas: u32,
    seed: u64,
) -> Result<Box<dyn GlobalScheduler>, SchedulerError> {
    if num_replicas == 0 {
        return Err(SchedulerError::NoReplicas);
    }
    config.validate()?;
    debug!(scheduler = config.kind().as_str(), num_replicas, "building global scheduler");

    let scheduler: Box<dyn GlobalScheduler> = match *config {
        SchedulerConfig::Random => Box::new(RandomScheduler::new(num_replicas, seed)),
        SchedulerConfig::RoundRobin => Box::new(RoundRobin::new(num_replicas)),
        SchedulerConfig::Lor => Box::new(LeastOutstanding::new(num_replicas)),
        SchedulerConfig::LorBatched {
            max_bin_size,
            binning_timeout,
        } => Box::new(LorBatched::new(num_replicas, max_bin_size, binning_timeout)),
        SchedulerConfig::InputBalance => Box::new(BalancedScheduler::input_balance(num_replicas)),
        SchedulerConfig::OutputBalance => {
            Box::new(BalancedScheduler::output_balance(num_replicas))
        }
        SchedulerConfig::CombinedBalanced { alpha, beta } => {
            Box::new(BalancedScheduler::combined(num_replicas, alpha, beta))
        }
    };
    Ok(scheduler)
}

/// Create a scheduler by name with default parameters.
pub fn scheduler_by_name(
    name: &str,
    num_replicas: u32,
    seed: u64,
) -> Result<Box<dyn GlobalScheduler>, SchedulerError> {
    let kind: SchedulerKind = name.parse()?;
    scheduler_from_config(&SchedulerConfig::with_defaults(kind), num_replicas, seed)
}

/// List all available built-in scheduler names.
pub fn available_schedulers() -> Vec<&'static str> {
    SchedulerKind::ALL.iter().map(|k| k.as_str()).collect()
}
