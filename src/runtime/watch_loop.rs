//! # Watch Loop
//!
//! Runs one kube-runtime `Controller` per kind until SIGTERM/SIGINT.

use crate::controller::reconciler::{
    reconcile_config, reconcile_document, ReconcileOutcome, Reconciler, ReconcilerError,
};
use crate::crd::{MongoDBConfig, MongoDBData};
use crate::observability;
use crate::runtime::error_policy::{backoff_key, handle_reconciliation_error};
use anyhow::Result;
use futures::StreamExt;
use kube::{Api, Client};
use kube_runtime::controller::Action;
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Translate a pass outcome into a controller action
pub fn to_action(outcome: ReconcileOutcome) -> Action {
    match outcome {
        ReconcileOutcome::Done => Action::await_change(),
        ReconcileOutcome::RequeueNow => {
            observability::metrics::increment_requeues_total("immediate");
            Action::requeue(Duration::ZERO)
        }
        ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
    }
}

async fn reconcile_config_object(
    obj: Arc<MongoDBConfig>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj
        .metadata
        .name
        .as_deref()
        .ok_or(ReconcilerError::MissingObjectKey("metadata.name"))?;
    let outcome = reconcile_config(&ctx, name).await?;
    ctx.reset_backoff(&backoff_key(obj.as_ref()));
    Ok(to_action(outcome))
}

async fn reconcile_data_object(
    obj: Arc<MongoDBData>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let name = obj
        .metadata
        .name
        .as_deref()
        .ok_or(ReconcilerError::MissingObjectKey("metadata.name"))?;
    let namespace = obj
        .metadata
        .namespace
        .as_deref()
        .ok_or(ReconcilerError::MissingObjectKey("metadata.namespace"))?;
    let outcome = reconcile_document(&ctx, namespace, name).await?;
    ctx.reset_backoff(&backoff_key(obj.as_ref()));
    Ok(to_action(outcome))
}

/// Run both controllers until a shutdown signal arrives
pub async fn run_watch_loop(client: Client, reconciler: Arc<Reconciler>) -> Result<()> {
    let configs: Api<MongoDBConfig> = Api::all(client.clone());
    let documents: Api<MongoDBData> = Api::all(client);

    let config_controller = Controller::new(configs, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            reconcile_config_object,
            handle_reconciliation_error::<MongoDBConfig>,
            Arc::clone(&reconciler),
        )
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(resource.name = %object.name, "MongoDBConfig reconciled"),
                Err(e) => warn!(error = %e, "MongoDBConfig controller error"),
            }
        });

    let data_controller = Controller::new(documents, watcher::Config::default())
        .shutdown_on_signal()
        .run(
            reconcile_data_object,
            handle_reconciliation_error::<MongoDBData>,
            reconciler,
        )
        .for_each(|result| async move {
            match result {
                Ok((object, _)) => debug!(
                    resource.namespace = object.namespace.as_deref().unwrap_or_default(),
                    resource.name = %object.name,
                    "MongoDBData reconciled"
                ),
                Err(e) => warn!(error = %e, "MongoDBData controller error"),
            }
        });

    info!("Watching MongoDBConfig and MongoDBData resources");
    tokio::join!(config_controller, data_controller);
    info!("Controllers stopped");
    Ok(())
}
