//! # Validation
//!
//! Admission-time checks for MongoDBConfig and MongoDBData.
//!
//! Reconcilers do not rely on these having run; they re-check the fields they
//! cannot work without.

use crate::crd::{MongoDBConfig, MongoDBConfigSpec, MongoDBData, MongoDBDataSpec};
use crate::store::ResourceStore;
use kube::ResourceExt;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Connection string grammar: scheme, optional credentials, host list (or
/// encoded socket path), optional database, optional `key=value` options
const CONNECTION_STRING_PATTERN: &str = r#"^mongodb(?:\+srv)?://(?:[^:@/]+(?::[^@]*)?@)?[^/?,]+(?:,[^/?,]+)*(?:/[^/."*<>:|?]*)?(?:\?[^=&]+=[^&]*(?:&[^=&]+=[^&]*)*)?$"#;

const EMAIL_PATTERN: &str = r"^[\w.-]+@([\w-]+\.)+[\w-]{2,4}$";

/// Admission request for one object, with the old version where one exists
#[derive(Debug, Clone, Copy)]
pub enum Admission<'a, K> {
    Create(&'a K),
    Update { old: &'a K, new: &'a K },
    Delete(&'a K),
}

/// Field-level rejection
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: Invalid value: {value:?}: {message}")]
    Invalid {
        field: &'static str,
        value: String,
        message: &'static str,
    },
    #[error("{field}: Forbidden: {message}")]
    Forbidden { field: &'static str, message: String },
    #[error("{field}: Internal error: {message}")]
    Internal { field: &'static str, message: String },
}

fn invalid(field: &'static str, value: &str, message: &'static str) -> ValidationError {
    ValidationError::Invalid {
        field,
        value: value.to_string(),
        message,
    }
}

fn matches(pattern: &str, value: &str) -> Result<bool, ValidationError> {
    let regex = Regex::new(pattern).map_err(|e| ValidationError::Internal {
        field: "spec",
        message: format!("Failed to compile regex: {e}"),
    })?;
    Ok(regex.is_match(value))
}

/// Validate a MongoDBConfig spec; the collection is checked first
pub fn validate_config_spec(spec: &MongoDBConfigSpec) -> Result<(), ValidationError> {
    if spec.collection_name.is_empty() {
        return Err(invalid(
            "spec.collection",
            &spec.collection_name,
            "collection must be specified",
        ));
    }

    if spec.connection_uri.is_empty() {
        return Err(invalid(
            "spec.mongourl",
            &spec.connection_uri,
            "mongourl must be specified",
        ));
    }

    if !matches(CONNECTION_STRING_PATTERN, &spec.connection_uri)? {
        return Err(invalid(
            "spec.mongourl",
            &spec.connection_uri,
            "mongourl must be a valid connection string url",
        ));
    }

    Ok(())
}

/// Validate a MongoDBData spec
pub fn validate_data_spec(spec: &MongoDBDataSpec) -> Result<(), ValidationError> {
    if spec.target_ref.is_empty() {
        return Err(invalid("spec.db", &spec.target_ref, "db cannot be empty"));
    }

    if spec.payload.lastname.is_empty() {
        return Err(invalid(
            "spec.data.lastname",
            &spec.payload.lastname,
            "lastname cannot be empty",
        ));
    }

    let email = &spec.payload.email;
    if !email.is_empty() && !matches(EMAIL_PATTERN, email)? {
        return Err(invalid("spec.data.email", email, "email is not valid"));
    }

    Ok(())
}

/// Admission check for MongoDBData; `spec.db` is immutable
pub fn validate_data_admission(admission: &Admission<'_, MongoDBData>) -> Result<(), ValidationError> {
    match admission {
        Admission::Create(new) => validate_data_spec(&new.spec),
        Admission::Update { old, new } => {
            if new.spec.target_ref.is_empty() {
                return Err(invalid("spec.db", "", "db cannot be empty"));
            }
            if new.spec.target_ref != old.spec.target_ref {
                return Err(ValidationError::Forbidden {
                    field: "spec.db",
                    message: "cannot have a change on db field".to_string(),
                });
            }
            validate_data_spec(&new.spec)
        }
        Admission::Delete(_) => Ok(()),
    }
}

/// Admission check for MongoDBConfig
///
/// Deletion is refused while any MongoDBData still references the config.
pub async fn validate_config_admission(
    admission: &Admission<'_, MongoDBConfig>,
    store: &dyn ResourceStore,
) -> Result<(), ValidationError> {
    match admission {
        Admission::Create(new) | Admission::Update { new, .. } => validate_config_spec(&new.spec),
        Admission::Delete(old) => {
            let name = old.name_any();
            let documents = store
                .list_data()
                .await
                .map_err(|e| ValidationError::Internal {
                    field: "spec.db",
                    message: e.to_string(),
                })?;

            match documents.iter().find(|d| d.spec.target_ref == name) {
                Some(document) => {
                    let user = document.key();
                    debug!(config = %name, referenced_by = %user, "Refusing MongoDBConfig deletion");
                    Err(ValidationError::Forbidden {
                        field: "spec.db",
                        message: format!(
                            "{user} is using MongoDBConfig/{name} resource, consider removing {user} first"
                        ),
                    })
                }
                None => Ok(()),
            }
        }
    }
}
