//! # MongoDBData
//!
//! Namespaced document resource. Each MongoDBData owns exactly one record in
//! the collection of the MongoDBConfig it references; the record lives in the
//! database named after the resource's namespace.

use super::status::Condition;
use kube::{CustomResource, ResourceExt};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// MongoDBData Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: mongo.snappcloud.io/v1
/// kind: MongoDBData
/// metadata:
///   name: john-doe
///   namespace: default
/// spec:
///   db: people-db
///   data:
///     firstname: John
///     lastname: Doe
///     email: john@example.com
///     age: 42
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[kube(
    kind = "MongoDBData",
    group = "mongo.snappcloud.io",
    version = "v1",
    namespaced,
    status = "MongoDBDataStatus",
    shortname = "mdbd",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"DB", "type":"string", "jsonPath":".spec.db"}, {"name":"ObjectID", "type":"string", "jsonPath":".status.objectId"}"#
)]
pub struct MongoDBDataSpec {
    /// Name of the MongoDBConfig this document is written through (immutable)
    #[serde(default, rename = "db")]
    pub target_ref: String,
    /// Document body
    #[serde(default, rename = "data")]
    pub payload: DocumentPayload,
}

/// Document body stored in MongoDB
///
/// Empty fields are omitted from the stored record.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, JsonSchema)]
pub struct DocumentPayload {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub firstname: String,
    /// Required, must be non-empty
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub lastname: String,
    /// Optional, validated e-mail address
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u8>,
}

/// Lifecycle state of a MongoDBData resource, also used as condition reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum DocumentState {
    Pending,
    Inserted,
    Deleting,
    Failed,
}

impl DocumentState {
    pub fn as_str(self) -> &'static str {
        match self {
            DocumentState::Pending => "Pending",
            DocumentState::Inserted => "Inserted",
            DocumentState::Deleting => "Deleting",
            DocumentState::Failed => "Failed",
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for DocumentState {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("DocumentState")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        super::string_enum_schema(
            &["Pending", "Inserted", "Deleting", "Failed"],
            "Lifecycle state of the MongoDB document.",
        )
    }
}

/// Status of the MongoDBData resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBDataStatus {
    /// Current lifecycle state; absent until the first reconciliation
    #[serde(default)]
    pub state: Option<DocumentState>,
    /// Identifier of the MongoDB record (hex ObjectId), empty until inserted
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_id: String,
    /// Conditions keyed by reason code
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl MongoDBData {
    pub fn state(&self) -> Option<DocumentState> {
        self.status.as_ref().and_then(|s| s.state)
    }

    /// Stored record id, `None` when nothing was inserted yet
    pub fn object_id(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.object_id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }

    /// `namespace/name`, used in log lines and admission messages
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.namespace().unwrap_or_default(),
            self.name_any()
        )
    }
}
