//! Finalizer lifecycle.
//!
//! The finalizer marks "a record may exist and must be removed". It is added
//! before the first write and only removed after the record delete succeeded
//! (or the object has no record id at all), so a crash in between leaves it in
//! place and the delete is retried.
//!
//! The record to delete is the same candidate the write path uses: the
//! published `objectId`, else the id derived from `metadata.uid`. A record
//! inserted by a pass whose status write was lost is therefore still found.

use super::{
    collection_for, dependency_pending, derived_record_id, transient_failure, unusable_config,
    Converged,
};
use crate::constants::DATA_FINALIZER;
use crate::controller::reconciler::status::project;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::{DocumentState, MongoDBData};
use kube::ResourceExt;
use tracing::{debug, info};

/// Add the finalizer unless present; returns the object as stored afterwards
pub(super) async fn ensure_finalizer(
    ctx: &Reconciler,
    data: MongoDBData,
) -> Result<MongoDBData, ReconcilerError> {
    if data.has_finalizer(DATA_FINALIZER) {
        return Ok(data);
    }
    let mut next = data;
    next.finalizers_mut().push(DATA_FINALIZER.to_string());
    let stored = ctx.store.replace_data_finalizers(&next).await?;
    debug!("Finalizer added");
    Ok(stored)
}

async fn remove_finalizer(ctx: &Reconciler, data: &MongoDBData) -> Result<(), ReconcilerError> {
    let mut next = data.clone();
    next.finalizers_mut().retain(|f| f != DATA_FINALIZER);
    ctx.store.replace_data_finalizers(&next).await?;
    debug!("Finalizer removed");
    Ok(())
}

/// Deletion branch: delete the record, then release the object
pub(super) async fn finalize(
    ctx: &Reconciler,
    data: MongoDBData,
) -> Result<Converged, ReconcilerError> {
    if !data.has_finalizer(DATA_FINALIZER) {
        return Ok(Converged::new(ReconcileOutcome::Done, &data));
    }

    let Some(id) = data
        .object_id()
        .map(str::to_string)
        .or_else(|| derived_record_id(&data))
    else {
        info!("Object has no record id, releasing it");
        remove_finalizer(ctx, &data).await?;
        return Ok(Converged::new(ReconcileOutcome::Done, &data));
    };

    let Some(config) = ctx.store.get_config(&data.spec.target_ref).await? else {
        let message = format!(
            "MongoDBConfig {} does not exist, cannot delete record {id}",
            data.spec.target_ref
        );
        return dependency_pending(ctx, &data, &message).await;
    };
    if let Some(problem) = unusable_config(&config) {
        return dependency_pending(ctx, &data, &problem).await;
    }

    let store = match ctx.resolver.resolve(&config.spec.connection_uri).await {
        Ok(store) => store,
        Err(e) => return transient_failure(ctx, &data, &e.to_string()).await,
    };
    let collection = collection_for(&data, &config);

    let data = if data.state() == Some(DocumentState::Deleting) {
        data
    } else {
        let message = format!("Deleting record {id} from {} collection", collection.collection);
        project(ctx, &data, DocumentState::Deleting, true, &message).await?
    };

    match store.delete_by_id(&collection, &id).await {
        Ok(true) => info!(record.id = %id, "Deleted MongoDB record"),
        Ok(false) => debug!(record.id = %id, "Record already absent"),
        Err(e) => return transient_failure(ctx, &data, &e.to_string()).await,
    }

    remove_finalizer(ctx, &data).await?;
    Ok(Converged::new(ReconcileOutcome::Done, &data))
}
