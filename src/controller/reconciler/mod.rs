//! # Reconcilers
//!
//! Convergence logic for MongoDBConfig and MongoDBData.
//!
//! Both reconcilers take a resource key, re-read the object through the
//! [`ResourceStore`](crate::store::ResourceStore), and express every state
//! transition as a status projection plus a declarative [`ReconcileOutcome`].

mod config;
pub mod document;
pub mod status;
mod types;
pub mod validation;

pub use config::reconcile_config;
pub use document::reconcile_document;
pub use types::{resource_key, ReconcileOutcome, Reconciler, ReconcilerError};
