//! Insert path: write the record and publish its id.

use super::{transient_failure, with_object_id, Converged};
use crate::controller::reconciler::status::project_onto;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::{DocumentState, MongoDBData};
use crate::provider::{CollectionRef, DocumentStore, Record, StoreError};
use tracing::{info, warn};

pub(super) fn inserted_message(id: &str, collection: &CollectionRef) -> String {
    format!(
        "MongoDBData {id} successfully inserted into {} collection",
        collection.collection
    )
}

/// Insert `record` under `id` (store-assigned when `None`)
pub(super) async fn insert_record(
    ctx: &Reconciler,
    data: &MongoDBData,
    store: &dyn DocumentStore,
    collection: &CollectionRef,
    id: Option<&str>,
    record: &Record,
) -> Result<Converged, ReconcilerError> {
    let (inserted_id, outcome) = match store.insert_one(collection, id, record).await {
        Ok(inserted_id) => (inserted_id, ReconcileOutcome::Done),
        // a record appeared under our id between lookup and insert; adopt it
        // and let the next pass compare its content
        Err(StoreError::DuplicateKey(existing)) => {
            warn!(record.id = %existing, "Record already exists, adopting it");
            (existing, ReconcileOutcome::RequeueNow)
        }
        Err(e) => return transient_failure(ctx, data, &e.to_string()).await,
    };

    info!(record.id = %inserted_id, collection = %collection, "Inserted MongoDB record");
    let data = project_onto(
        ctx,
        data,
        with_object_id(data, &inserted_id),
        DocumentState::Inserted,
        true,
        &inserted_message(&inserted_id, collection),
    )
    .await?;
    Ok(Converged::new(outcome, &data))
}
