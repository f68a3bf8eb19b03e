//! # Resource Store
//!
//! Seam between the reconcilers and the Kubernetes API server.
//!
//! Reconcilers re-read objects through [`ResourceStore`] on every pass and
//! write back through it; nothing about object state is cached between passes.
//! Writes carry the `resourceVersion` of the object they were computed from, so
//! a stale write fails with [`ResourceError::Conflict`] and the pass is retried
//! from a fresh read.

mod kubernetes;
mod memory;

pub use kubernetes::KubeResourceStore;
pub use memory::InMemoryResourceStore;

use crate::crd::{MongoDBConfig, MongoDBData};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Declarative store failures
#[derive(Debug, Error)]
pub enum ResourceError {
    /// Optimistic concurrency check failed; re-read and retry
    #[error("{kind} {name} was modified concurrently")]
    Conflict { kind: &'static str, name: String },
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },
    #[error("kubernetes api error: {0}")]
    Api(String),
    #[error("could not serialize {0}")]
    Serialization(String),
}

impl ResourceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ResourceError::Conflict { .. })
    }
}

/// Read and write access to MongoDBConfig and MongoDBData objects
#[async_trait]
pub trait ResourceStore: Send + Sync + fmt::Debug {
    /// Fetch a MongoDBConfig by name, `None` when absent
    async fn get_config(&self, name: &str) -> Result<Option<MongoDBConfig>, ResourceError>;

    /// Fetch a MongoDBData, `None` when absent
    async fn get_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MongoDBData>, ResourceError>;

    async fn list_configs(&self) -> Result<Vec<MongoDBConfig>, ResourceError>;

    /// All MongoDBData objects across namespaces
    async fn list_data(&self) -> Result<Vec<MongoDBData>, ResourceError>;

    /// Write `config.status` through the status subresource
    async fn replace_config_status(
        &self,
        config: &MongoDBConfig,
    ) -> Result<MongoDBConfig, ResourceError>;

    /// Write `data.status` through the status subresource
    async fn replace_data_status(&self, data: &MongoDBData) -> Result<MongoDBData, ResourceError>;

    /// Write the finalizer list of `data`
    async fn replace_data_finalizers(
        &self,
        data: &MongoDBData,
    ) -> Result<MongoDBData, ResourceError>;
}
