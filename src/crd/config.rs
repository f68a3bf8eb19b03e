//! # MongoDBConfig
//!
//! Cluster-scoped connection target: a MongoDB connection string and the
//! collection MongoDBData documents are written to.

use super::status::Condition;
use kube::CustomResource;
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// MongoDBConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: mongo.snappcloud.io/v1
/// kind: MongoDBConfig
/// metadata:
///   name: people-db
/// spec:
///   mongourl: mongodb://mongo.databases.svc:27017
///   collection: people
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, PartialEq, JsonSchema)]
#[kube(
    kind = "MongoDBConfig",
    group = "mongo.snappcloud.io",
    version = "v1",
    status = "MongoDBConfigStatus",
    shortname = "mdbc",
    printcolumn = r#"{"name":"Ready", "type":"boolean", "jsonPath":".status.ready"}, {"name":"Status", "type":"string", "jsonPath":".status.lastConditionType"}, {"name":"Collection", "type":"string", "jsonPath":".spec.collection"}"#
)]
pub struct MongoDBConfigSpec {
    /// MongoDB connection string (`mongodb://` or `mongodb+srv://`)
    #[serde(default, rename = "mongourl")]
    pub connection_uri: String,
    /// Collection MongoDBData documents are stored in
    #[serde(default, rename = "collection")]
    pub collection_name: String,
}

/// Reason codes recorded on a MongoDBConfig
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ConfigConditionType {
    /// The last connection attempt succeeded
    Ready,
    /// spec.mongourl is empty
    #[serde(rename = "NoURLSpecified")]
    NoUrlSpecified,
    /// The last connection attempt failed
    ConnectError,
}

impl ConfigConditionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfigConditionType::Ready => "Ready",
            ConfigConditionType::NoUrlSpecified => "NoURLSpecified",
            ConfigConditionType::ConnectError => "ConnectError",
        }
    }
}

impl fmt::Display for ConfigConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl JsonSchema for ConfigConditionType {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("ConfigConditionType")
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        super::string_enum_schema(
            &["Ready", "NoURLSpecified", "ConnectError"],
            "Reason code of the most recent MongoDBConfig condition.",
        )
    }
}

/// Status of the MongoDBConfig resource
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MongoDBConfigStatus {
    /// True iff the most recent connection attempt succeeded
    #[serde(default)]
    pub ready: bool,
    /// Reason code of the most recent projection
    #[serde(default)]
    pub last_condition_type: Option<ConfigConditionType>,
    /// Conditions keyed by reason code
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl MongoDBConfig {
    /// Name of the config (cluster-scoped, so the name is the whole key)
    pub fn config_name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn is_ready(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.ready)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_spec_uses_wire_field_names() {
        let spec: MongoDBConfigSpec = serde_json::from_value(serde_json::json!({
            "mongourl": "mongodb://localhost:27017",
            "collection": "people"
        }))
        .unwrap();
        assert_eq!(spec.connection_uri, "mongodb://localhost:27017");
        assert_eq!(spec.collection_name, "people");
    }

    #[test]
    fn test_status_serializes_condition_type() {
        let status = MongoDBConfigStatus {
            ready: false,
            last_condition_type: Some(ConfigConditionType::NoUrlSpecified),
            conditions: vec![],
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["lastConditionType"], "NoURLSpecified");
        assert_eq!(value["ready"], false);
    }

    #[test]
    fn test_crd_is_cluster_scoped() {
        let crd = MongoDBConfig::crd();
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.group, "mongo.snappcloud.io");
    }
}
