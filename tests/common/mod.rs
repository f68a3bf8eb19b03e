//! Shared harness: both reconcilers wired to in-memory collaborators.

#![allow(dead_code, reason = "not every test file uses every helper")]

use mongodb_data_controller::config::ControllerConfig;
use mongodb_data_controller::controller::reconciler::{
    reconcile_config, reconcile_document, ReconcileOutcome, Reconciler, ReconcilerError,
};
use mongodb_data_controller::crd::status::find_condition;
use mongodb_data_controller::observability::events::{EventSink, RecordingEventSink};
use mongodb_data_controller::provider::{
    CollectionRef, InMemoryConnector, InMemoryDocumentStore, OperationLog, StoreConnector,
};
use mongodb_data_controller::store::{InMemoryResourceStore, ResourceStore};
use mongodb_data_controller::{DocumentPayload, MongoDBData};
use std::sync::Arc;

pub const NAMESPACE: &str = "default";

pub struct Harness {
    pub log: OperationLog,
    pub resources: Arc<InMemoryResourceStore>,
    pub documents: Arc<InMemoryDocumentStore>,
    pub connector: Arc<InMemoryConnector>,
    pub events: Arc<RecordingEventSink>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        let log = OperationLog::new();
        let resources = Arc::new(InMemoryResourceStore::with_log(log.clone()));
        let documents = Arc::new(InMemoryDocumentStore::with_log(log.clone()));
        let connector = Arc::new(InMemoryConnector::new(Arc::clone(&documents)));
        let events = Arc::new(RecordingEventSink::new());
        let reconciler = Reconciler::new(
            Arc::clone(&resources) as Arc<dyn ResourceStore>,
            Arc::clone(&connector) as Arc<dyn StoreConnector>,
            Arc::clone(&events) as Arc<dyn EventSink>,
            ControllerConfig::default(),
        );
        Self {
            log,
            resources,
            documents,
            connector,
            events,
            reconciler,
        }
    }

    pub async fn reconcile_config(&self, name: &str) -> Result<ReconcileOutcome, ReconcilerError> {
        reconcile_config(&self.reconciler, name).await
    }

    pub async fn reconcile_data(&self, name: &str) -> Result<ReconcileOutcome, ReconcilerError> {
        reconcile_document(&self.reconciler, NAMESPACE, name).await
    }

    pub fn data(&self, name: &str) -> Option<MongoDBData> {
        self.resources.data(NAMESPACE, name)
    }

    pub fn people() -> CollectionRef {
        CollectionRef::new(NAMESPACE, "people")
    }
}

pub fn payload(lastname: &str, email: &str) -> DocumentPayload {
    DocumentPayload {
        lastname: lastname.to_string(),
        email: email.to_string(),
        ..Default::default()
    }
}

/// Message of the condition keyed by `reason`
pub fn condition_message(data: &MongoDBData, reason: &str) -> Option<String> {
    find_condition(&data.status.as_ref()?.conditions, reason).map(|c| c.message.clone())
}
