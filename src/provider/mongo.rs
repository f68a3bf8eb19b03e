//! # MongoDB Provider
//!
//! [`StoreConnector`] and [`DocumentStore`] backed by the official MongoDB driver.
//!
//! Records are addressed by hex `ObjectId`; ids that are not valid ObjectIds
//! are stored as plain string `_id` values. Updates replace the whole stored
//! body so fields removed from the resource payload disappear from MongoDB too.

use super::{CollectionRef, DocumentStore, Record, StoreConnector, StoreError};
use crate::constants::CONTROLLER_NAME;
use crate::observability::metrics;
use async_trait::async_trait;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, ReadPreference, SelectionCriteria};
use mongodb::{Client, Collection};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info_span, Instrument};

/// MongoDB duplicate key error code
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Connector creating a fresh driver client per reconciliation pass
#[derive(Debug, Default, Clone)]
pub struct MongoConnector;

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(
        &self,
        uri: &str,
        timeout: Duration,
    ) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| StoreError::InvalidUri(e.to_string()))?;
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);
        options.app_name = Some(CONTROLLER_NAME.to_string());

        let client = Client::with_options(options).map_err(|e| StoreError::Connect(e.to_string()))?;
        Ok(Arc::new(MongoDocumentStore { client }))
    }
}

/// Connected MongoDB handle
#[derive(Debug, Clone)]
pub struct MongoDocumentStore {
    client: Client,
}

impl MongoDocumentStore {
    fn collection(&self, target: &CollectionRef) -> Collection<Document> {
        self.client
            .database(&target.database)
            .collection::<Document>(&target.collection)
    }
}

/// `_id` value for an opaque record id
fn record_id(id: &str) -> Bson {
    ObjectId::parse_str(id).map_or_else(|_| Bson::String(id.to_string()), Bson::ObjectId)
}

fn to_document(record: &Record) -> Result<Document, StoreError> {
    mongodb::bson::to_document(record).map_err(|e| StoreError::Encoding(e.to_string()))
}

/// Convert a stored document into a [`Record`], dropping `_id`
fn to_record(mut document: Document) -> Result<Record, StoreError> {
    document.remove("_id");
    match Bson::Document(document).into_relaxed_extjson() {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(StoreError::Encoding(format!(
            "stored document decoded to non-object value {other}"
        ))),
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    matches!(
        error.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .selection_criteria(SelectionCriteria::ReadPreference(ReadPreference::Primary))
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Ping(e.to_string()))
    }

    async fn insert_one(
        &self,
        target: &CollectionRef,
        id: Option<&str>,
        record: &Record,
    ) -> Result<String, StoreError> {
        let span = info_span!("mongodb.insert_one", collection = %target, record.id = id);
        async move {
            let mut document = to_document(record)?;
            if let Some(id) = id {
                document.insert("_id", record_id(id));
            }

            match self.collection(target).insert_one(document).await {
                Ok(result) => {
                    let inserted = match result.inserted_id {
                        Bson::ObjectId(oid) => oid.to_hex(),
                        Bson::String(id) => id,
                        other => other.to_string(),
                    };
                    metrics::increment_store_operations("insert", "success");
                    Ok(inserted)
                }
                Err(e) if is_duplicate_key(&e) => {
                    metrics::increment_store_operations("insert", "duplicate");
                    Err(StoreError::DuplicateKey(id.unwrap_or_default().to_string()))
                }
                Err(e) => {
                    metrics::increment_store_operations("insert", "error");
                    Err(StoreError::operation("insert", e))
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn find_by_id(
        &self,
        target: &CollectionRef,
        id: &str,
    ) -> Result<Option<Record>, StoreError> {
        let found = self
            .collection(target)
            .find_one(doc! { "_id": record_id(id) })
            .await
            .map_err(|e| {
                metrics::increment_store_operations("find", "error");
                StoreError::operation("find", e)
            })?;
        metrics::increment_store_operations("find", "success");
        found.map(to_record).transpose()
    }

    async fn update_by_id(
        &self,
        target: &CollectionRef,
        id: &str,
        record: &Record,
    ) -> Result<u64, StoreError> {
        let result = self
            .collection(target)
            .replace_one(doc! { "_id": record_id(id) }, to_document(record)?)
            .await
            .map_err(|e| {
                metrics::increment_store_operations("update", "error");
                StoreError::operation("update", e)
            })?;
        metrics::increment_store_operations("update", "success");
        Ok(result.modified_count)
    }

    async fn delete_by_id(&self, target: &CollectionRef, id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection(target)
            .delete_one(doc! { "_id": record_id(id) })
            .await
            .map_err(|e| {
                metrics::increment_store_operations("delete", "error");
                StoreError::operation("delete", e)
            })?;
        metrics::increment_store_operations("delete", "success");
        if result.deleted_count == 0 {
            debug!("Record {} already absent from {}", id, target);
        }
        Ok(result.deleted_count > 0)
    }
}
