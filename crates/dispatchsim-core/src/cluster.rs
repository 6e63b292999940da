//! Cluster: the set of replicas for one simulation run.
//!
//! Built once from the `[cluster]` configuration: an ordered list of model
//! names and a matching ordered list of replica counts. Replica ids are dense
//! (`0..N`) in creation order. No replicas are added or removed mid-run.

use crate::replica::Replica;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Got replica counts for {counts} models but {models} model names were specified")]
    ReplicaCountMismatch { models: usize, counts: usize },
    #[error("Cluster configuration describes zero replicas")]
    Empty,
}

/// Replica layout of a cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Device type shared by all replicas.
    #[serde(default = "default_device")]
    pub device: String,
    /// Model served by each group of replicas.
    pub model_names: Vec<String>,
    /// Number of replicas per entry of `model_names`.
    pub num_replicas: Vec<u32>,
}

fn default_device() -> String {
    "a100".to_string()
}

impl ClusterConfig {
    pub fn new(model_names: Vec<String>, num_replicas: Vec<u32>) -> Self {
        Self {
            device: default_device(),
            model_names,
            num_replicas,
        }
    }

    /// Check the layout without building anything.
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.model_names.len() != self.num_replicas.len() {
            return Err(ClusterError::ReplicaCountMismatch {
                models: self.model_names.len(),
                counts: self.num_replicas.len(),
            });
        }
        if self.total_replicas() == 0 {
            return Err(ClusterError::Empty);
        }
        Ok(())
    }

    pub fn total_replicas(&self) -> u32 {
        self.num_replicas.iter().sum()
    }
}

/// Serialized form written to `cluster.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterInfo {
    pub replicas: Vec<Replica>,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    replicas: Vec<Replica>,
}

impl Cluster {
    /// Build the cluster. Validates the whole layout before creating any replica.
    pub fn new(config: &ClusterConfig) -> Result<Self, ClusterError> {
        config.validate()?;

        let mut replicas = Vec::with_capacity(config.total_replicas() as usize);
        for (model_name, &count) in config.model_names.iter().zip(&config.num_replicas) {
            info!(count, model = %model_name, "creating replicas");
            for _ in 0..count {
                let id = replicas.len() as u32;
                replicas.push(Replica::new(id, model_name.as_str(), config.device.as_str()));
            }
        }
        info!(num_replicas = replicas.len(), "cluster ready");

        Ok(Self { replicas })
    }

    pub fn num_replicas(&self) -> u32 {
        self.replicas.len() as u32
    }

    pub fn replica(&self, id: u32) -> Option<&Replica> {
        self.replicas.get(id as usize)
    }

    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    pub fn replica_ids(&self) -> std::ops::Range<u32> {
        0..self.num_replicas()
    }

    pub fn info(&self) -> ClusterInfo {
        ClusterInfo {
            replicas: self.replicas.clone(),
        }
    }
}
