//! # Reconciler Types
//!
//! Shared context, pass outcomes and errors for both reconcilers.

use crate::config::ControllerConfig;
use crate::controller::backoff::BackoffState;
use crate::controller::resolver::ConnectionResolver;
use crate::observability::events::EventSink;
use crate::provider::StoreConnector;
use crate::store::{ResourceError, ResourceStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Key of the per-resource backoff state: `kind/namespace/name`
///
/// Cluster-scoped kinds use an empty namespace.
pub fn resource_key(kind: &str, namespace: &str, name: &str) -> String {
    format!("{kind}/{namespace}/{name}")
}

/// Reconciler context shared by every pass
#[derive(Debug)]
pub struct Reconciler {
    pub store: Arc<dyn ResourceStore>,
    pub resolver: ConnectionResolver,
    pub events: Arc<dyn EventSink>,
    pub config: ControllerConfig,
    /// Per-resource error backoff, keyed by `kind/namespace/name`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        connector: Arc<dyn StoreConnector>,
        events: Arc<dyn EventSink>,
        config: ControllerConfig,
    ) -> Self {
        let resolver = ConnectionResolver::new(connector, config.connect_timeout());
        Self {
            store,
            resolver,
            events,
            config,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Forget the error history of a resource after a successful pass, or
    /// once the resource is gone
    pub fn reset_backoff(&self, key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Declarative result of one reconciliation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change notification
    Done,
    /// Run another pass right away
    RequeueNow,
    /// Run another pass after the delay
    RequeueAfter(Duration),
}

/// Errors that abort a pass; the error policy decides when to retry
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("could not serialize document payload: {0}")]
    Serialization(String),
    #[error("object has no {0}")]
    MissingObjectKey(&'static str),
}

impl ReconcilerError {
    /// Optimistic concurrency conflict; retry immediately from a fresh read
    pub fn is_conflict(&self) -> bool {
        matches!(self, ReconcilerError::Resource(e) if e.is_conflict())
    }
}
