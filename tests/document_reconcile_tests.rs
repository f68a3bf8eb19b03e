//! # MongoDBData Reconciliation Tests
//!
//! Drive the document reconciler against the in-memory resource and document
//! stores and check the converged state of both.
//!
//! These tests verify:
//! - The full create / update / delete lifecycle
//! - Insert idempotence across a lost status write
//! - Update idempotence (no no-op updates)
//! - Record delete strictly before finalizer removal
//! - Dependency and connection failure handling

mod common;

use common::{condition_message, payload, Harness, NAMESPACE};
use mongodb_data_controller::constants::DATA_FINALIZER;
use mongodb_data_controller::controller::backoff::BackoffState;
use mongodb_data_controller::controller::reconciler::document::derived_record_id;
use mongodb_data_controller::controller::reconciler::{
    reconcile_document, resource_key, ReconcileOutcome,
};
use mongodb_data_controller::observability::events::Severity;
use mongodb_data_controller::provider::{CollectionRef, Record};
use mongodb_data_controller::store::ResourceStore;
use mongodb_data_controller::{DocumentState, MongoDBDataStatus};
use std::time::Duration;

fn created_config(h: &Harness) {
    h.resources.create_config("cfg1", "mongodb://valid", "people");
}

/// Create `doc` and run the passes that take it to `Inserted`
async fn inserted_document(h: &Harness) -> String {
    created_config(h);
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", "a@b.com"));

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::RequeueNow);
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Inserted));
    data.object_id().unwrap().to_string()
}

#[tokio::test]
async fn test_end_to_end_lifecycle() {
    let h = Harness::new();
    created_config(&h);
    assert_eq!(h.reconcile_config("cfg1").await.unwrap(), ReconcileOutcome::Done);
    assert!(h.resources.config("cfg1").unwrap().is_ready());

    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", "a@b.com"));
    assert_eq!(h.data("doc").unwrap().state(), None);

    // "" -> Pending
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::RequeueNow);
    assert_eq!(h.data("doc").unwrap().state(), Some(DocumentState::Pending));

    // Pending -> Inserted
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Inserted));
    assert!(data.has_finalizer(DATA_FINALIZER));
    let id = data.object_id().unwrap().to_string();
    assert!(!id.is_empty());

    let records = h.documents.records(&Harness::people());
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, id);
    assert_eq!(records[0].1["lastname"], "Doe");
    assert_eq!(records[0].1["email"], "a@b.com");

    // payload change -> exactly one update
    h.resources
        .update_data_spec(NAMESPACE, "doc", |spec| spec.payload.lastname = "Smith".to_string())
        .unwrap();
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert_eq!(h.documents.update_calls(), 1);
    let record = h.documents.record(&Harness::people(), &id).unwrap();
    assert_eq!(record["lastname"], "Smith");
    assert_eq!(
        condition_message(&h.data("doc").unwrap(), "Inserted").as_deref(),
        Some("Document updated successfully")
    );

    // deletion removes the record, then the finalizer, then the object
    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert!(h.documents.records(&Harness::people()).is_empty());
    assert!(h.data("doc").is_none());

    // a late pass for the removed object is a no-op
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
}

#[tokio::test]
async fn test_record_lives_in_namespace_database() {
    let h = Harness::new();
    h.resources.create_config("cfg1", "mongodb://valid", "people");
    h.resources
        .create_data("team-a", "doc", "cfg1", payload("Doe", ""));

    reconcile_document(&h.reconciler, "team-a", "doc").await.unwrap();
    reconcile_document(&h.reconciler, "team-a", "doc").await.unwrap();

    let target = CollectionRef::new("team-a", "people");
    assert_eq!(h.documents.records(&target).len(), 1);
    assert!(h.documents.records(&Harness::people()).is_empty());
}

#[tokio::test]
async fn test_insert_is_idempotent_when_status_write_is_lost() {
    let h = Harness::new();
    created_config(&h);
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", "a@b.com"));
    h.reconcile_data("doc").await.unwrap();

    // the record is written but the pass dies before the status lands
    h.resources.fail_next_status_writes(1);
    assert!(h.reconcile_data("doc").await.is_err());
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Pending));
    assert_eq!(data.object_id(), None);
    assert_eq!(h.documents.records(&Harness::people()).len(), 1);

    // re-entry adopts the record instead of inserting a second one
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Inserted));
    assert_eq!(data.object_id().map(str::to_string), derived_record_id(&data));
    assert_eq!(h.documents.records(&Harness::people()).len(), 1);
    assert_eq!(h.documents.insert_calls(), 1);
}

#[tokio::test]
async fn test_repeated_passes_do_not_insert_twice() {
    let h = Harness::new();
    let id = inserted_document(&h).await;

    for _ in 0..3 {
        assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    }
    assert_eq!(h.documents.insert_calls(), 1);
    assert_eq!(h.documents.records(&Harness::people()).len(), 1);
    assert_eq!(h.data("doc").unwrap().object_id(), Some(id.as_str()));
}

#[tokio::test]
async fn test_no_update_when_record_matches_payload() {
    let h = Harness::new();
    inserted_document(&h).await;
    let writes_before = h.resources.status_writes();
    let events_before = h.events.events().len();

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    assert_eq!(h.documents.update_calls(), 0);
    assert_eq!(h.resources.status_writes(), writes_before);
    assert_eq!(h.events.events().len(), events_before);
}

#[tokio::test]
async fn test_update_replaces_removed_fields() {
    let h = Harness::new();
    let id = inserted_document(&h).await;

    h.resources
        .update_data_spec(NAMESPACE, "doc", |spec| spec.payload.email = String::new())
        .unwrap();
    h.reconcile_data("doc").await.unwrap();

    let record = h.documents.record(&Harness::people(), &id).unwrap();
    assert!(!record.contains_key("email"));

    h.reconcile_data("doc").await.unwrap();
    assert_eq!(h.documents.update_calls(), 1);
}

#[tokio::test]
async fn test_vanished_record_is_recreated_under_same_id() {
    let h = Harness::new();
    let id = inserted_document(&h).await;
    h.documents.remove(&Harness::people(), &id);

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    assert!(h.documents.record(&Harness::people(), &id).is_some());
    assert_eq!(h.data("doc").unwrap().object_id(), Some(id.as_str()));
    assert_eq!(h.documents.insert_calls(), 2);
}

#[tokio::test]
async fn test_missing_config_retries_after_20s() {
    let h = Harness::new();
    h.resources
        .create_data(NAMESPACE, "doc", "missing-cfg", payload("Doe", ""));

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(20)));
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Pending));
    assert!(condition_message(&data, "Pending")
        .unwrap()
        .contains("missing-cfg"));
    assert_eq!(h.connector.connect_calls(), 0);
}

#[tokio::test]
async fn test_unchanged_projection_is_not_written_again() {
    let h = Harness::new();
    h.resources
        .create_data(NAMESPACE, "doc", "missing-cfg", payload("Doe", ""));

    h.reconcile_data("doc").await.unwrap();
    let writes = h.resources.status_writes();
    let events = h.events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warning);
    assert_eq!(events[0].reason, "Pending");

    h.reconcile_data("doc").await.unwrap();
    assert_eq!(h.resources.status_writes(), writes);
    assert_eq!(h.events.events().len(), 1);
}

#[tokio::test]
async fn test_config_appearing_later_unblocks_document() {
    let h = Harness::new();
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    h.reconcile_data("doc").await.unwrap();
    assert_eq!(h.data("doc").unwrap().state(), Some(DocumentState::Pending));

    created_config(&h);
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert_eq!(h.data("doc").unwrap().state(), Some(DocumentState::Inserted));
}

#[tokio::test]
async fn test_unreachable_store_fails_and_retries_after_30s() {
    let h = Harness::new();
    h.resources.create_config("cfg1", "mongodb://down", "people");
    h.connector.set_unreachable("mongodb://down", true);
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    h.reconcile_data("doc").await.unwrap();

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(30)));
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Failed));
    assert!(!data.has_finalizer(DATA_FINALIZER));

    // Failed is retryable
    h.connector.set_unreachable("mongodb://down", false);
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert_eq!(h.data("doc").unwrap().state(), Some(DocumentState::Inserted));
}

#[tokio::test]
async fn test_insert_failure_marks_failed() {
    let h = Harness::new();
    created_config(&h);
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    h.reconcile_data("doc").await.unwrap();
    h.documents.set_fail_inserts(true);

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(30)));
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Failed));
    assert_eq!(data.object_id(), None);
    assert!(condition_message(&data, "Failed")
        .unwrap()
        .contains("injected insert failure"));
}

#[tokio::test]
async fn test_config_without_collection_keeps_document_pending() {
    let h = Harness::new();
    h.resources.create_config("cfg1", "mongodb://valid", "");
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    h.reconcile_data("doc").await.unwrap();

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(20)));
    assert_eq!(h.data("doc").unwrap().state(), Some(DocumentState::Pending));
    assert_eq!(h.documents.insert_calls(), 0);
}

#[tokio::test]
async fn test_empty_target_ref_fails_without_retry() {
    let h = Harness::new();
    h.resources
        .create_data(NAMESPACE, "doc", "", payload("Doe", ""));

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(h.data("doc").unwrap().state(), Some(DocumentState::Failed));
}

fn seed_inserted_with_id(h: &Harness, id: &str) {
    created_config(h);
    let mut data = h
        .resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    data.status = Some(MongoDBDataStatus {
        state: Some(DocumentState::Inserted),
        object_id: id.to_string(),
        conditions: vec![],
    });
    data.metadata.finalizers = Some(vec![DATA_FINALIZER.to_string()]);
    h.resources.put_data(data);

    let mut record = Record::new();
    record.insert("lastname".to_string(), "Doe".into());
    h.documents.put(&Harness::people(), id, record);
}

#[tokio::test]
async fn test_record_deleted_before_finalizer_removed() {
    let h = Harness::new();
    seed_inserted_with_id(&h, "abc123");
    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    let deleted = h.log.position("delete:abc123").unwrap();
    let released = h
        .log
        .position(&format!("finalizer-removed:default/doc:{DATA_FINALIZER}"))
        .unwrap();
    assert!(deleted < released);
    assert!(h.documents.record(&Harness::people(), "abc123").is_none());
    assert!(h.data("doc").is_none());
}

#[tokio::test]
async fn test_failed_delete_keeps_finalizer() {
    let h = Harness::new();
    seed_inserted_with_id(&h, "abc123");
    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();
    h.documents.set_fail_deletes(true);

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(30)));
    assert_eq!(h.documents.delete_calls(), 1);
    let data = h.data("doc").unwrap();
    assert!(data.has_finalizer(DATA_FINALIZER));
    assert_eq!(data.state(), Some(DocumentState::Failed));
    assert!(h.documents.record(&Harness::people(), "abc123").is_some());

    // the next pass completes the deletion
    h.documents.set_fail_deletes(false);
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert!(h.data("doc").is_none());
    assert!(h.documents.record(&Harness::people(), "abc123").is_none());
}

#[tokio::test]
async fn test_delete_tolerates_absent_record() {
    let h = Harness::new();
    seed_inserted_with_id(&h, "abc123");
    h.documents.remove(&Harness::people(), "abc123");
    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);
    assert!(h.data("doc").is_none());
}

#[tokio::test]
async fn test_delete_without_record_id_skips_store() {
    let h = Harness::new();
    created_config(&h);
    let mut data = h
        .resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    data.metadata.uid = None;
    data.metadata.finalizers = Some(vec![DATA_FINALIZER.to_string()]);
    h.resources.put_data(data);
    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    assert!(h.data("doc").is_none());
    assert_eq!(h.connector.connect_calls(), 0);
    assert_eq!(h.documents.delete_calls(), 0);
}

#[tokio::test]
async fn test_delete_with_missing_config_keeps_finalizer() {
    let h = Harness::new();
    seed_inserted_with_id(&h, "abc123");
    h.resources.delete_config("cfg1");
    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(20)));
    let data = h.data("doc").unwrap();
    assert!(data.has_finalizer(DATA_FINALIZER));
    assert_eq!(data.state(), Some(DocumentState::Pending));
}

#[tokio::test]
async fn test_stale_status_write_surfaces_conflict() {
    let h = Harness::new();
    created_config(&h);
    let stale = h
        .resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    h.resources
        .update_data_spec(NAMESPACE, "doc", |spec| spec.payload.lastname = "Smith".to_string())
        .unwrap();

    let mut next = stale;
    next.status = Some(MongoDBDataStatus::default());
    let err = h.resources.replace_data_status(&next).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_delete_after_lost_status_write_removes_record() {
    let h = Harness::new();
    created_config(&h);
    h.resources
        .create_data(NAMESPACE, "doc", "cfg1", payload("Doe", ""));
    h.reconcile_data("doc").await.unwrap();

    // insert lands, its status write does not
    h.resources.fail_next_status_writes(1);
    assert!(h.reconcile_data("doc").await.is_err());
    let data = h.data("doc").unwrap();
    assert_eq!(data.object_id(), None);
    assert!(data.has_finalizer(DATA_FINALIZER));
    let id = derived_record_id(&data).unwrap();
    assert!(h.documents.record(&Harness::people(), &id).is_some());

    h.resources.mark_data_deleted(NAMESPACE, "doc").unwrap();
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    assert_eq!(h.documents.delete_calls(), 1);
    assert!(h.documents.records(&Harness::people()).is_empty());
    assert!(h.data("doc").is_none());
    let deleted = h.log.position(&format!("delete:{id}")).unwrap();
    let released = h
        .log
        .position(&format!("finalizer-removed:default/doc:{DATA_FINALIZER}"))
        .unwrap();
    assert!(deleted < released);
}

#[tokio::test]
async fn test_failed_update_is_retried_on_update_path() {
    let h = Harness::new();
    let id = inserted_document(&h).await;

    h.resources
        .update_data_spec(NAMESPACE, "doc", |spec| spec.payload.lastname = "Smith".to_string())
        .unwrap();
    h.documents.set_fail_updates(true);

    let outcome = h.reconcile_data("doc").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::RequeueAfter(Duration::from_secs(30)));
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Failed));
    assert_eq!(data.object_id(), Some(id.as_str()));
    assert!(condition_message(&data, "Failed")
        .unwrap()
        .contains("injected update failure"));
    assert_eq!(
        h.documents.record(&Harness::people(), &id).unwrap()["lastname"],
        "Doe"
    );

    h.documents.set_fail_updates(false);
    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    // one failed attempt plus one successful replace
    assert_eq!(h.documents.update_calls(), 2);
    assert_eq!(h.documents.insert_calls(), 1);
    let data = h.data("doc").unwrap();
    assert_eq!(data.state(), Some(DocumentState::Inserted));
    assert_eq!(data.object_id(), Some(id.as_str()));
    assert_eq!(
        h.documents.record(&Harness::people(), &id).unwrap()["lastname"],
        "Smith"
    );
}

#[tokio::test]
async fn test_removed_object_clears_error_backoff() {
    let h = Harness::new();
    let key = resource_key("MongoDBData", NAMESPACE, "doc");
    h.reconciler
        .backoff_states
        .lock()
        .unwrap()
        .insert(key.clone(), BackoffState::new(5, 300));

    assert_eq!(h.reconcile_data("doc").await.unwrap(), ReconcileOutcome::Done);

    assert!(!h.reconciler.backoff_states.lock().unwrap().contains_key(&key));
}
