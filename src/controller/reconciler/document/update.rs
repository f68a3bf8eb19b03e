//! Update path: bring an existing record in line with the payload.

use super::insert::inserted_message;
use super::{transient_failure, with_object_id, Converged};
use crate::controller::reconciler::status::project_onto;
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::{DocumentState, MongoDBData};
use crate::provider::{CollectionRef, DocumentStore, Record};
use tracing::{debug, info, warn};

const UPDATED_MESSAGE: &str = "Document updated successfully";

/// Converge the stored record `id` towards `record`
///
/// Records are compared structurally; an update is only issued when they
/// differ, and it replaces the whole stored body.
pub(super) async fn converge_record(
    ctx: &Reconciler,
    data: &MongoDBData,
    store: &dyn DocumentStore,
    collection: &CollectionRef,
    id: &str,
    stored: &Record,
    record: &Record,
) -> Result<Converged, ReconcilerError> {
    if stored == record {
        if data.state() == Some(DocumentState::Inserted) && data.object_id() == Some(id) {
            debug!(record.id = id, "Record is in sync");
            return Ok(Converged::new(ReconcileOutcome::Done, data));
        }

        // record written by an earlier pass whose status write never landed
        info!(record.id = id, "Adopting existing record");
        let data = project_onto(
            ctx,
            data,
            with_object_id(data, id),
            DocumentState::Inserted,
            true,
            &inserted_message(id, collection),
        )
        .await?;
        return Ok(Converged::new(ReconcileOutcome::Done, &data));
    }

    let modified = match store.update_by_id(collection, id, record).await {
        Ok(modified) => modified,
        Err(e) => return transient_failure(ctx, data, &e.to_string()).await,
    };
    if modified == 0 {
        // the record disappeared after the lookup; the next pass re-creates it
        warn!(record.id = id, "Record vanished before it could be updated");
        return Ok(Converged::new(ReconcileOutcome::RequeueNow, data));
    }
    info!(record.id = id, modified, "Updated MongoDB record");

    let data = project_onto(
        ctx,
        data,
        with_object_id(data, id),
        DocumentState::Inserted,
        true,
        UPDATED_MESSAGE,
    )
    .await?;
    Ok(Converged::new(ReconcileOutcome::Done, &data))
}
