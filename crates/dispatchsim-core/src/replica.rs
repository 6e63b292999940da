//! Replica handle: one backend serving instance of a model.

use serde::{Deserialize, Serialize};

/// An identified backend worker. Created only by [`crate::Cluster`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    /// Dense id in `0..num_replicas`, assigned in creation order.
    pub id: u32,
    /// Model served by this replica. Reporting only.
    pub model_name: String,
    /// Device type the replica runs on. Reporting only.
    pub device: String,
}

impl Replica {
    pub(crate) fn new(id: u32, model_name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            id,
            model_name: model_name.into(),
            device: device.into(),
        }
    }
}
