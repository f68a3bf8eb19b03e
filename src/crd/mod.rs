//! # Custom Resource Definitions
//!
//! CRD types for the MongoDB Data Controller.
//!
//! - [`MongoDBConfig`]: cluster-scoped connection target (MongoDB URL + collection)
//! - [`MongoDBData`]: namespaced document that must exist in the referenced collection
//!
//! Both kinds share the reason-keyed [`Condition`] list defined in [`status`].

mod config;
mod data;
pub mod status;

pub use config::{ConfigConditionType, MongoDBConfig, MongoDBConfigSpec, MongoDBConfigStatus};
pub use data::{DocumentPayload, DocumentState, MongoDBData, MongoDBDataSpec, MongoDBDataStatus};
pub use status::{set_status_condition, Condition};

/// API group shared by both kinds
pub const API_GROUP: &str = "mongo.snappcloud.io";

/// Produce a structural string-enum schema
///
/// kube rejects the `anyOf`/`$ref` shapes schemars emits for optional enums,
/// so enum-typed status fields carry a plain `{"type": "string", "enum": [..]}`.
pub(crate) fn string_enum_schema(values: &[&str], description: &str) -> schemars::Schema {
    schemars::json_schema!({
        "type": "string",
        "enum": values,
        "description": description,
    })
}
