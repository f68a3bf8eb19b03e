//! # In-Memory Resource Store
//!
//! Process-local [`ResourceStore`] emulating the API server behaviour the
//! reconcilers depend on: `resourceVersion` checks on every write,
//! `metadata.generation` bumps on spec changes, deletion marking, and removal
//! of a marked object once its last finalizer is gone.

use super::{ResourceError, ResourceStore};
use crate::crd::{DocumentPayload, MongoDBConfig, MongoDBConfigSpec, MongoDBData, MongoDBDataSpec};
use crate::provider::OperationLog;
use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

type DataKey = (String, String);

#[derive(Debug, Default)]
struct Objects {
    configs: BTreeMap<String, MongoDBConfig>,
    data: BTreeMap<DataKey, MongoDBData>,
}

/// In-memory store
#[derive(Debug, Default)]
pub struct InMemoryResourceStore {
    objects: Mutex<Objects>,
    next_version: AtomicU64,
    fail_status_writes: AtomicUsize,
    status_writes: AtomicUsize,
    log: Option<OperationLog>,
}

fn data_key(namespace: &str, name: &str) -> DataKey {
    (namespace.to_string(), name.to_string())
}

fn conflict(kind: &'static str, name: &str) -> ResourceError {
    ResourceError::Conflict {
        kind,
        name: name.to_string(),
    }
}

fn not_found(kind: &'static str, name: &str) -> ResourceError {
    ResourceError::NotFound {
        kind,
        name: name.to_string(),
    }
}

fn now() -> Result<Time, ResourceError> {
    serde_json::from_value(serde_json::Value::String(chrono::Utc::now().to_rfc3339()))
        .map_err(|e| ResourceError::Serialization(e.to_string()))
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_log(log: OperationLog) -> Self {
        Self {
            log: Some(log),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_version(&self) -> String {
        (self.next_version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn uid(&self) -> String {
        let n = self.next_version.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:08x}-0000-4000-8000-{n:012x}")
    }

    fn take_injected_failure(&self) -> bool {
        self.fail_status_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Make the next `count` status writes fail with an API error
    pub fn fail_next_status_writes(&self, count: usize) {
        self.fail_status_writes.store(count, Ordering::SeqCst);
    }

    /// Number of status writes that reached the store (successful or conflicting)
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    /// Create a MongoDBConfig without status
    pub fn create_config(&self, name: &str, connection_uri: &str, collection: &str) -> MongoDBConfig {
        let mut config = MongoDBConfig::new(
            name,
            MongoDBConfigSpec {
                connection_uri: connection_uri.to_string(),
                collection_name: collection.to_string(),
            },
        );
        config.metadata.uid = Some(self.uid());
        config.metadata.generation = Some(1);
        config.metadata.resource_version = Some(self.next_version());
        self.lock()
            .configs
            .insert(name.to_string(), config.clone());
        config
    }

    pub fn delete_config(&self, name: &str) -> Option<MongoDBConfig> {
        self.lock().configs.remove(name)
    }

    /// Create a MongoDBData without status or finalizers
    pub fn create_data(
        &self,
        namespace: &str,
        name: &str,
        target_ref: &str,
        payload: DocumentPayload,
    ) -> MongoDBData {
        let mut data = MongoDBData::new(
            name,
            MongoDBDataSpec {
                target_ref: target_ref.to_string(),
                payload,
            },
        );
        data.metadata.namespace = Some(namespace.to_string());
        data.metadata.uid = Some(self.uid());
        data.metadata.generation = Some(1);
        data.metadata.resource_version = Some(self.next_version());
        self.lock()
            .data
            .insert(data_key(namespace, name), data.clone());
        data
    }

    /// Store an object as given, e.g. to seed a status or strip the uid
    pub fn put_data(&self, mut data: MongoDBData) -> MongoDBData {
        data.metadata.resource_version = Some(self.next_version());
        let key = data_key(&data.namespace().unwrap_or_default(), &data.name_any());
        self.lock().data.insert(key, data.clone());
        data
    }

    /// Edit the spec of a MongoDBData, bumping its generation
    pub fn update_data_spec(
        &self,
        namespace: &str,
        name: &str,
        edit: impl FnOnce(&mut MongoDBDataSpec),
    ) -> Result<MongoDBData, ResourceError> {
        let version = self.next_version();
        let mut objects = self.lock();
        let data = objects
            .data
            .get_mut(&data_key(namespace, name))
            .ok_or_else(|| not_found("MongoDBData", name))?;
        edit(&mut data.spec);
        data.metadata.generation = Some(data.metadata.generation.unwrap_or(0) + 1);
        data.metadata.resource_version = Some(version);
        Ok(data.clone())
    }

    /// Request deletion: removed at once without finalizers, marked otherwise
    pub fn mark_data_deleted(&self, namespace: &str, name: &str) -> Result<(), ResourceError> {
        let timestamp = now()?;
        let version = self.next_version();
        let key = data_key(namespace, name);
        let mut objects = self.lock();
        let data = objects
            .data
            .get_mut(&key)
            .ok_or_else(|| not_found("MongoDBData", name))?;
        if data.finalizers().is_empty() {
            objects.data.remove(&key);
        } else if data.metadata.deletion_timestamp.is_none() {
            data.metadata.deletion_timestamp = Some(timestamp);
            data.metadata.resource_version = Some(version);
        }
        Ok(())
    }

    /// Mark a MongoDBConfig for deletion, held back by a foreign finalizer
    pub fn mark_config_deleted(&self, name: &str, finalizer: &str) -> Result<(), ResourceError> {
        let timestamp = now()?;
        let version = self.next_version();
        let mut objects = self.lock();
        let config = objects
            .configs
            .get_mut(name)
            .ok_or_else(|| not_found("MongoDBConfig", name))?;
        config
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(finalizer.to_string());
        config.metadata.deletion_timestamp = Some(timestamp);
        config.metadata.resource_version = Some(version);
        Ok(())
    }

    pub fn config(&self, name: &str) -> Option<MongoDBConfig> {
        self.lock().configs.get(name).cloned()
    }

    pub fn data(&self, namespace: &str, name: &str) -> Option<MongoDBData> {
        self.lock().data.get(&data_key(namespace, name)).cloned()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get_config(&self, name: &str) -> Result<Option<MongoDBConfig>, ResourceError> {
        Ok(self.config(name))
    }

    async fn get_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MongoDBData>, ResourceError> {
        Ok(self.data(namespace, name))
    }

    async fn list_configs(&self) -> Result<Vec<MongoDBConfig>, ResourceError> {
        Ok(self.lock().configs.values().cloned().collect())
    }

    async fn list_data(&self) -> Result<Vec<MongoDBData>, ResourceError> {
        Ok(self.lock().data.values().cloned().collect())
    }

    async fn replace_config_status(
        &self,
        config: &MongoDBConfig,
    ) -> Result<MongoDBConfig, ResourceError> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        if self.take_injected_failure() {
            return Err(ResourceError::Api("injected status write failure".to_string()));
        }

        let name = config.name_any();
        let version = self.next_version();
        let mut objects = self.lock();
        let stored = objects
            .configs
            .get_mut(&name)
            .ok_or_else(|| not_found("MongoDBConfig", &name))?;
        if stored.metadata.resource_version != config.metadata.resource_version {
            return Err(conflict("MongoDBConfig", &name));
        }
        stored.status.clone_from(&config.status);
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn replace_data_status(&self, data: &MongoDBData) -> Result<MongoDBData, ResourceError> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        if self.take_injected_failure() {
            return Err(ResourceError::Api("injected status write failure".to_string()));
        }

        let name = data.name_any();
        let version = self.next_version();
        let mut objects = self.lock();
        let stored = objects
            .data
            .get_mut(&data_key(&data.namespace().unwrap_or_default(), &name))
            .ok_or_else(|| not_found("MongoDBData", &name))?;
        if stored.metadata.resource_version != data.metadata.resource_version {
            return Err(conflict("MongoDBData", &name));
        }
        stored.status.clone_from(&data.status);
        stored.metadata.resource_version = Some(version);
        Ok(stored.clone())
    }

    async fn replace_data_finalizers(
        &self,
        data: &MongoDBData,
    ) -> Result<MongoDBData, ResourceError> {
        let name = data.name_any();
        let key = data_key(&data.namespace().unwrap_or_default(), &name);
        let version = self.next_version();
        let mut objects = self.lock();
        let stored = objects
            .data
            .get_mut(&key)
            .ok_or_else(|| not_found("MongoDBData", &name))?;
        if stored.metadata.resource_version != data.metadata.resource_version {
            return Err(conflict("MongoDBData", &name));
        }

        let removed = stored
            .finalizers()
            .iter()
            .filter(|f| !data.finalizers().contains(*f))
            .cloned()
            .collect::<Vec<_>>();
        stored.metadata.finalizers = data.metadata.finalizers.clone();
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();

        if updated.metadata.deletion_timestamp.is_some() && updated.finalizers().is_empty() {
            objects.data.remove(&key);
        }
        drop(objects);

        if let Some(log) = &self.log {
            for finalizer in removed {
                log.record(format!("finalizer-removed:{}:{}", data.key(), finalizer));
            }
        }
        Ok(updated)
    }
}
