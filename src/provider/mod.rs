//! # Document Store Providers
//!
//! Seam between the reconcilers and the MongoDB the documents live in.
//!
//! - [`StoreConnector`] opens a connection for one reconciliation pass
//! - [`DocumentStore`] is the per-pass handle used for record operations
//!
//! Implementations:
//! - `mongo`: official MongoDB driver
//! - `memory`: in-process store with call counters and failure injection

pub mod memory;
pub mod mongo;

pub use self::memory::{InMemoryConnector, InMemoryDocumentStore, OperationLog};
pub use self::mongo::{MongoConnector, MongoDocumentStore};

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Document body as written to and read from the store (without `_id`)
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Database + collection a record lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionRef {
    pub database: String,
    pub collection: String,
}

impl CollectionRef {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Document store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid connection string: {0}")]
    InvalidUri(String),
    #[error("could not connect to mongodb: {0}")]
    Connect(String),
    #[error("could not ping mongodb: {0}")]
    Ping(String),
    #[error("mongodb connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("record '{0}' already exists")]
    DuplicateKey(String),
    #[error("record could not be encoded: {0}")]
    Encoding(String),
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn operation(operation: &'static str, message: impl fmt::Display) -> Self {
        StoreError::Operation {
            operation,
            message: message.to_string(),
        }
    }
}

/// Opens short-lived connections to a document store
#[async_trait]
pub trait StoreConnector: Send + Sync + fmt::Debug {
    /// Create a client for `uri`; the connection is released when the handle is dropped
    async fn connect(
        &self,
        uri: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn DocumentStore>, StoreError>;
}

/// Record operations against one connected store
#[async_trait]
pub trait DocumentStore: Send + Sync + fmt::Debug {
    /// Liveness check against the primary
    async fn ping(&self) -> Result<(), StoreError>;

    /// Insert `record`, under `id` when given; returns the id of the new record
    async fn insert_one(
        &self,
        target: &CollectionRef,
        id: Option<&str>,
        record: &Record,
    ) -> Result<String, StoreError>;

    /// Fetch a record by id, `None` when absent
    async fn find_by_id(
        &self,
        target: &CollectionRef,
        id: &str,
    ) -> Result<Option<Record>, StoreError>;

    /// Replace the body of the record `id`; returns the modified count
    async fn update_by_id(
        &self,
        target: &CollectionRef,
        id: &str,
        record: &Record,
    ) -> Result<u64, StoreError>;

    /// Delete the record `id`; returns `false` when it was already absent
    async fn delete_by_id(&self, target: &CollectionRef, id: &str) -> Result<bool, StoreError>;
}
