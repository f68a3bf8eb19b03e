//! # MongoDBConfig Reconciler
//!
//! Verifies that a connection target is reachable and records the result.
//!
//! 1. Absent object: nothing to do
//! 2. Marked for deletion: nothing to do, no status writes
//! 3. Empty `mongourl`: `NoURLSpecified`, not retried (spec error)
//! 4. Connection failure: `ConnectError` with the driver message, retried
//! 5. Connection succeeds: `Ready`

use super::status::project;
use super::types::{resource_key, ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::ConfigConditionType;
use crate::observability::metrics;
use tracing::{debug, info, info_span, warn, Instrument};

const READY_MESSAGE: &str = "Successfully connected to MongoDB";
const NO_URL_MESSAGE: &str = "spec.mongourl is empty";

/// Reconcile the MongoDBConfig `name`
pub async fn reconcile_config(
    ctx: &Reconciler,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let span = info_span!("reconcile.mongodbconfig", resource.name = name);
    async move {
        metrics::increment_reconciliations("MongoDBConfig");

        let Some(config) = ctx.store.get_config(name).await? else {
            debug!("MongoDBConfig no longer exists, nothing to do");
            ctx.reset_backoff(&resource_key("MongoDBConfig", "", name));
            return Ok(ReconcileOutcome::Done);
        };

        if config.metadata.deletion_timestamp.is_some() {
            debug!("MongoDBConfig is being deleted, skipping");
            return Ok(ReconcileOutcome::Done);
        }

        if config.spec.connection_uri.is_empty() {
            warn!("MongoDBConfig has no connection string");
            project(
                ctx,
                &config,
                ConfigConditionType::NoUrlSpecified,
                false,
                NO_URL_MESSAGE,
            )
            .await?;
            return Ok(ReconcileOutcome::Done);
        }

        match ctx.resolver.resolve(&config.spec.connection_uri).await {
            Ok(store) => {
                // release the connection before touching the status
                drop(store);
                project(ctx, &config, ConfigConditionType::Ready, true, READY_MESSAGE).await?;
                info!("MongoDBConfig is ready");
                Ok(ReconcileOutcome::Done)
            }
            Err(e) => {
                project(
                    ctx,
                    &config,
                    ConfigConditionType::ConnectError,
                    false,
                    &e.to_string(),
                )
                .await?;
                metrics::increment_requeues_total("connect-error");
                Ok(ReconcileOutcome::RequeueAfter(ctx.config.transient_requeue()))
            }
        }
    }
    .instrument(span)
    .await
}
