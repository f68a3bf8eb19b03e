//! # Kubernetes Resource Store
//!
//! [`ResourceStore`] backed by kube `Api<K>` handles.
//!
//! Status and finalizer writes are merge patches that include
//! `metadata.resourceVersion`; the API server rejects them with 409 when the
//! object moved on since it was read.

use super::{ResourceError, ResourceStore};
use crate::constants::CONTROLLER_NAME;
use crate::crd::{MongoDBConfig, MongoDBData};
use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, ResourceExt};
use serde_json::json;

fn map_kube_error(kind: &'static str, name: &str, error: kube::Error) -> ResourceError {
    match error {
        kube::Error::Api(response) if response.code == 409 => ResourceError::Conflict {
            kind,
            name: name.to_string(),
        },
        kube::Error::Api(response) if response.code == 404 => ResourceError::NotFound {
            kind,
            name: name.to_string(),
        },
        kube::Error::SerdeError(e) => ResourceError::Serialization(e.to_string()),
        other => ResourceError::Api(other.to_string()),
    }
}

/// Kubernetes-backed store
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl std::fmt::Debug for KubeResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeResourceStore").finish_non_exhaustive()
    }
}

impl KubeResourceStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn configs(&self) -> Api<MongoDBConfig> {
        Api::all(self.client.clone())
    }

    fn data(&self, namespace: &str) -> Api<MongoDBData> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get_config(&self, name: &str) -> Result<Option<MongoDBConfig>, ResourceError> {
        self.configs()
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error("MongoDBConfig", name, e))
    }

    async fn get_data(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<MongoDBData>, ResourceError> {
        self.data(namespace)
            .get_opt(name)
            .await
            .map_err(|e| map_kube_error("MongoDBData", name, e))
    }

    async fn list_configs(&self) -> Result<Vec<MongoDBConfig>, ResourceError> {
        let list = self
            .configs()
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error("MongoDBConfig", "*", e))?;
        Ok(list.items)
    }

    async fn list_data(&self) -> Result<Vec<MongoDBData>, ResourceError> {
        let api: Api<MongoDBData> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| map_kube_error("MongoDBData", "*", e))?;
        Ok(list.items)
    }

    async fn replace_config_status(
        &self,
        config: &MongoDBConfig,
    ) -> Result<MongoDBConfig, ResourceError> {
        let name = config.name_any();
        let patch = json!({
            "metadata": { "resourceVersion": config.resource_version() },
            "status": config.status,
        });
        self.configs()
            .patch_status(&name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error("MongoDBConfig", &name, e))
    }

    async fn replace_data_status(&self, data: &MongoDBData) -> Result<MongoDBData, ResourceError> {
        let name = data.name_any();
        let namespace = data.namespace().unwrap_or_default();
        let patch = json!({
            "metadata": { "resourceVersion": data.resource_version() },
            "status": data.status,
        });
        self.data(&namespace)
            .patch_status(&name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error("MongoDBData", &name, e))
    }

    async fn replace_data_finalizers(
        &self,
        data: &MongoDBData,
    ) -> Result<MongoDBData, ResourceError> {
        let name = data.name_any();
        let namespace = data.namespace().unwrap_or_default();
        let patch = json!({
            "metadata": {
                "resourceVersion": data.resource_version(),
                "finalizers": data.finalizers(),
            },
        });
        self.data(&namespace)
            .patch(&name, &PatchParams::apply(CONTROLLER_NAME), &Patch::Merge(&patch))
            .await
            .map_err(|e| map_kube_error("MongoDBData", &name, e))
    }
}
