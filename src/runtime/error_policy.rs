//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loops.

use crate::constants;
use crate::controller::backoff::BackoffState;
use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::observability;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Key of the per-resource backoff state
pub fn backoff_key<K>(obj: &K) -> String
where
    K: Resource<DynamicType = ()>,
{
    resource_key(
        &K::kind(&()),
        &obj.namespace().unwrap_or_default(),
        &obj.name_any(),
    )
}

/// Handle reconciliation errors
///
/// Optimistic concurrency conflicts are retried at once from a fresh read.
/// Everything else backs off per resource with a Fibonacci sequence, so one
/// failing object cannot crowd out the others.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = %name,
        resource.namespace = %namespace,
        error = %error
    );
    let _error_guard = error_span.enter();

    observability::metrics::increment_reconciliation_errors(&kind);

    if error.is_conflict() {
        info!("Write conflict on {} {}, retrying from a fresh read", kind, name);
        observability::metrics::increment_requeues_total("conflict");
        return Action::requeue(Duration::ZERO);
    }

    error!("Reconciliation error for {} {}: {}", kind, name, error);

    let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(backoff_key(obj.as_ref())).or_insert_with(|| {
                BackoffState::new(
                    ctx.config.error_backoff_min_secs,
                    ctx.config.error_backoff_max_secs,
                )
            });
            state.increment_error();
            (state.backoff.next_backoff_seconds(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (constants::DEFAULT_ERROR_BACKOFF_MIN_SECS, 0)
        }
    };

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}, trigger source: error-backoff)",
        backoff_seconds, error_count
    );
    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(Duration::from_secs(backoff_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ControllerConfig;
    use crate::crd::{MongoDBData, MongoDBDataSpec};
    use crate::observability::events::RecordingEventSink;
    use crate::provider::{InMemoryConnector, InMemoryDocumentStore};
    use crate::store::{InMemoryResourceStore, ResourceError};

    fn reconciler() -> Arc<Reconciler> {
        Arc::new(Reconciler::new(
            Arc::new(InMemoryResourceStore::new()),
            Arc::new(InMemoryConnector::new(Arc::new(InMemoryDocumentStore::new()))),
            Arc::new(RecordingEventSink::new()),
            ControllerConfig::default(),
        ))
    }

    fn object() -> Arc<MongoDBData> {
        let mut data = MongoDBData::new("doc", MongoDBDataSpec::default());
        data.metadata.namespace = Some("default".to_string());
        Arc::new(data)
    }

    #[test]
    fn test_backoff_key() {
        assert_eq!(backoff_key(object().as_ref()), "MongoDBData/default/doc");
    }

    #[test]
    fn test_conflict_requeues_immediately() {
        let error = ReconcilerError::Resource(ResourceError::Conflict {
            kind: "MongoDBData",
            name: "doc".to_string(),
        });
        let action = handle_reconciliation_error(object(), &error, reconciler());
        assert_eq!(action, Action::requeue(Duration::ZERO));
    }

    #[test]
    fn test_errors_back_off_per_resource() {
        let ctx = reconciler();
        let error = ReconcilerError::Resource(ResourceError::Api("boom".to_string()));

        let delays: Vec<Action> = (0..3)
            .map(|_| handle_reconciliation_error(object(), &error, Arc::clone(&ctx)))
            .collect();
        assert_eq!(
            delays,
            vec![
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(5)),
                Action::requeue(Duration::from_secs(10)),
            ]
        );

        ctx.reset_backoff(&backoff_key(object().as_ref()));
        let action = handle_reconciliation_error(object(), &error, ctx);
        assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    }
}
