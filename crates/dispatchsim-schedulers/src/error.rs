//! Errors raised while building or driving a global scheduler.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("Unknown scheduler type: {0}")]
    UnknownKind(String),
    #[error("Invalid parameter `{name}` for {scheduler}: {reason}")]
    InvalidParameter {
        scheduler: &'static str,
        name: &'static str,
        reason: String,
    },
    #[error("A global scheduler needs at least one replica")]
    NoReplicas,
    #[error("Replica {replica_id} does not exist (cluster has {num_replicas} replicas)")]
    UnknownReplica { replica_id: u32, num_replicas: u32 },
    #[error("Completion reported for replica {replica_id}, which has no outstanding requests")]
    NoOutstandingRequests { replica_id: u32 },
}
