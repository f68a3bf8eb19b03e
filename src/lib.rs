//! MongoDB Data Controller Library
//!
//! Reconciles `MongoDBConfig` (connection target) and `MongoDBData` (document)
//! custom resources against MongoDB. Tests are included in the module files
//! and under `tests/`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod provider;
pub mod runtime;
pub mod store;

// Re-export CRD types for convenience
pub use crd::*;
