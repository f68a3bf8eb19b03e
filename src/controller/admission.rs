//! # Admission Review
//!
//! Validating webhook handlers. Each handler converts an `AdmissionReview`
//! into a typed [`Admission`] and answers with an allow/deny review.

use super::reconciler::validation::{
    validate_config_admission, validate_data_admission, Admission, ValidationError,
};
use super::server::ServerState;
use crate::crd::{MongoDBConfig, MongoDBData};
use axum::extract::State;
use axum::Json;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::DynamicObject;
use std::sync::Arc;
use tracing::{info, warn};

/// Typed view of a request; `None` for operations that are always allowed
fn admission_of<K>(
    request: &AdmissionRequest<K>,
) -> Result<Option<Admission<'_, K>>, ValidationError>
where
    K: kube::Resource,
{
    let missing = |what: &str| ValidationError::Internal {
        field: "request",
        message: format!("admission request carries no {what}"),
    };
    let admission = match request.operation {
        Operation::Create => Admission::Create(request.object.as_ref().ok_or_else(|| missing("object"))?),
        Operation::Update => Admission::Update {
            old: request
                .old_object
                .as_ref()
                .ok_or_else(|| missing("oldObject"))?,
            new: request.object.as_ref().ok_or_else(|| missing("object"))?,
        },
        Operation::Delete => {
            Admission::Delete(request.old_object.as_ref().ok_or_else(|| missing("oldObject"))?)
        }
        Operation::Connect => return Ok(None),
    };
    Ok(Some(admission))
}

fn respond<K: kube::Resource>(
    request: &AdmissionRequest<K>,
    kind: &str,
    verdict: Result<(), ValidationError>,
) -> Json<AdmissionReview<DynamicObject>> {
    let response = AdmissionResponse::from(request);
    let response = match verdict {
        Ok(()) => response,
        Err(e) => {
            warn!(kind, name = %request.name, operation = ?request.operation, reason = %e, "Admission denied");
            response.deny(e.to_string())
        }
    };
    Json(response.into_review())
}

/// POST /validate/mongodbconfig
pub async fn validate_config(
    State(state): State<Arc<ServerState>>,
    Json(review): Json<AdmissionReview<MongoDBConfig>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<MongoDBConfig> = match review.try_into() {
        Ok(request) => request,
        Err(e) => return Json(AdmissionResponse::invalid(e.to_string()).into_review()),
    };
    info!(name = %request.name, operation = ?request.operation, "Validating MongoDBConfig");

    let verdict = match admission_of(&request) {
        Ok(Some(admission)) => validate_config_admission(&admission, state.store.as_ref()).await,
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    respond(&request, "MongoDBConfig", verdict)
}

/// POST /validate/mongodbdata
pub async fn validate_data(
    Json(review): Json<AdmissionReview<MongoDBData>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let request: AdmissionRequest<MongoDBData> = match review.try_into() {
        Ok(request) => request,
        Err(e) => return Json(AdmissionResponse::invalid(e.to_string()).into_review()),
    };
    info!(name = %request.name, operation = ?request.operation, "Validating MongoDBData");

    let verdict = match admission_of(&request) {
        Ok(Some(admission)) => validate_data_admission(&admission),
        Ok(None) => Ok(()),
        Err(e) => Err(e),
    };
    respond(&request, "MongoDBData", verdict)
}
