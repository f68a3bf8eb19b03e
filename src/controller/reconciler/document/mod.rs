//! # MongoDBData Reconciler
//!
//! Drives one MongoDBData towards "exactly one record with this payload exists
//! in `<namespace>.<collection>`", and removes that record before the object is
//! allowed to go away.
//!
//! ## Pass order
//!
//! 1. Marked for deletion: [`finalizer::finalize`]
//! 2. Empty `spec.db`: `Failed`, not retried
//! 3. Referenced MongoDBConfig missing: `Pending`, retried after the dependency delay
//! 4. No state yet: `Pending`, requeued at once
//! 5. Config unusable (no URL or collection): `Pending`, retried after the dependency delay
//! 6. Connection fails: `Failed`, retried after the transient delay
//! 7. Finalizer added, payload serialized, record looked up by its candidate id
//! 8. Record present: update when it differs ([`update`]); absent: insert ([`insert`])
//!
//! ## Record identifiers
//!
//! The candidate id is `status.objectId` when set, otherwise the id derived from
//! `metadata.uid`. Looking the candidate up before inserting makes a pass that
//! crashed between the insert and the status write adopt its own record on
//! re-entry instead of writing a second one.

mod finalizer;
mod insert;
mod update;

use super::status::project;
use super::types::{resource_key, ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::{DocumentPayload, DocumentState, MongoDBConfig, MongoDBData};
use crate::observability::metrics;
use crate::provider::{CollectionRef, Record};
use kube::ResourceExt;
use std::time::Instant;
use tracing::{debug, info_span, Instrument};

/// Outcome of a pass plus the state the object was left in
#[derive(Debug)]
pub(crate) struct Converged {
    outcome: ReconcileOutcome,
    state: Option<DocumentState>,
}

impl Converged {
    fn new(outcome: ReconcileOutcome, data: &MongoDBData) -> Self {
        Self {
            outcome,
            state: data.state(),
        }
    }
}

/// Reconcile the MongoDBData `namespace/name`
pub async fn reconcile_document(
    ctx: &Reconciler,
    namespace: &str,
    name: &str,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let span = info_span!(
        "reconcile.mongodbdata",
        resource.namespace = namespace,
        resource.name = name
    );
    async move {
        let started = Instant::now();
        metrics::increment_reconciliations("MongoDBData");

        let Some(data) = ctx.store.get_data(namespace, name).await? else {
            debug!("MongoDBData no longer exists, nothing to do");
            ctx.reset_backoff(&resource_key("MongoDBData", namespace, name));
            return Ok(ReconcileOutcome::Done);
        };

        let result = converge(ctx, data).await;
        let state = match &result {
            Ok(converged) => converged.state.map_or("", DocumentState::as_str),
            Err(_) => "Error",
        };
        metrics::observe_document_latency(name, state, started.elapsed().as_secs_f64());
        result.map(|converged| converged.outcome)
    }
    .instrument(span)
    .await
}

async fn converge(ctx: &Reconciler, data: MongoDBData) -> Result<Converged, ReconcilerError> {
    if data.is_deleting() {
        return finalizer::finalize(ctx, data).await;
    }

    if data.spec.target_ref.is_empty() {
        let data = project(
            ctx,
            &data,
            DocumentState::Failed,
            false,
            "spec.db must name a MongoDBConfig",
        )
        .await?;
        return Ok(Converged::new(ReconcileOutcome::Done, &data));
    }

    let Some(config) = ctx.store.get_config(&data.spec.target_ref).await? else {
        let message = format!("MongoDBConfig {} does not exist", data.spec.target_ref);
        return dependency_pending(ctx, &data, &message).await;
    };

    if data.state().is_none() {
        let data = project(
            ctx,
            &data,
            DocumentState::Pending,
            false,
            "Waiting for the document to be written",
        )
        .await?;
        return Ok(Converged::new(ReconcileOutcome::RequeueNow, &data));
    }

    if let Some(problem) = unusable_config(&config) {
        return dependency_pending(ctx, &data, &problem).await;
    }

    let store = match ctx.resolver.resolve(&config.spec.connection_uri).await {
        Ok(store) => store,
        Err(e) => return transient_failure(ctx, &data, &e.to_string()).await,
    };

    let data = finalizer::ensure_finalizer(ctx, data).await?;
    let record = to_record(&data.spec.payload)?;
    let collection = collection_for(&data, &config);
    let candidate = data
        .object_id()
        .map(str::to_string)
        .or_else(|| derived_record_id(&data));

    let existing = match &candidate {
        Some(id) => match store.find_by_id(&collection, id).await {
            Ok(found) => found,
            Err(e) => return transient_failure(ctx, &data, &e.to_string()).await,
        },
        None => None,
    };

    match (candidate, existing) {
        (Some(id), Some(stored)) => {
            update::converge_record(ctx, &data, store.as_ref(), &collection, &id, &stored, &record)
                .await
        }
        (candidate, _) => {
            insert::insert_record(
                ctx,
                &data,
                store.as_ref(),
                &collection,
                candidate.as_deref(),
                &record,
            )
            .await
        }
    }
}

/// Record location: database named after the namespace, collection from the config
fn collection_for(data: &MongoDBData, config: &MongoDBConfig) -> CollectionRef {
    CollectionRef::new(
        data.namespace().unwrap_or_default(),
        config.spec.collection_name.as_str(),
    )
}

/// Why a config cannot be used to reach MongoDB, if it cannot
fn unusable_config(config: &MongoDBConfig) -> Option<String> {
    if config.spec.connection_uri.is_empty() {
        Some(format!(
            "MongoDBConfig {} has no connection string",
            config.config_name()
        ))
    } else if config.spec.collection_name.is_empty() {
        Some(format!(
            "MongoDBConfig {} has no collection",
            config.config_name()
        ))
    } else {
        None
    }
}

/// Record id derived from `metadata.uid`: its first 24 hex digits
pub fn derived_record_id(data: &MongoDBData) -> Option<String> {
    let hex: String = data
        .metadata
        .uid
        .as_deref()?
        .chars()
        .filter(|c| *c != '-')
        .collect();
    (hex.len() >= 24 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| hex[..24].to_ascii_lowercase())
}

/// Serialize the payload into the stored record body
pub fn to_record(payload: &DocumentPayload) -> Result<Record, ReconcilerError> {
    match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(record)) => Ok(record),
        Ok(other) => Err(ReconcilerError::Serialization(format!(
            "payload serialized to non-object value {other}"
        ))),
        Err(e) => Err(ReconcilerError::Serialization(e.to_string())),
    }
}

async fn dependency_pending(
    ctx: &Reconciler,
    data: &MongoDBData,
    message: &str,
) -> Result<Converged, ReconcilerError> {
    debug!(reason = message, "MongoDBConfig not usable yet");
    let data = project(ctx, data, DocumentState::Pending, false, message).await?;
    metrics::increment_requeues_total("dependency-missing");
    Ok(Converged::new(
        ReconcileOutcome::RequeueAfter(ctx.config.dependency_requeue()),
        &data,
    ))
}

async fn transient_failure(
    ctx: &Reconciler,
    data: &MongoDBData,
    message: &str,
) -> Result<Converged, ReconcilerError> {
    let data = project(ctx, data, DocumentState::Failed, false, message).await?;
    metrics::increment_requeues_total("transient-failure");
    Ok(Converged::new(
        ReconcileOutcome::RequeueAfter(ctx.config.transient_requeue()),
        &data,
    ))
}

/// Copy of `data` carrying `id` as its record id
fn with_object_id(data: &MongoDBData, id: &str) -> MongoDBData {
    let mut next = data.clone();
    next.status.get_or_insert_with(Default::default).object_id = id.to_string();
    next
}
