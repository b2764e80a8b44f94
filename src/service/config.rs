//! Instance configuration reconciler
//!
//! Mirrors an instance's GitLab configuration repository into ConfigMaps:
//! one per directory group of the [`ConfigTree`](crate::config_tree::ConfigTree),
//! named `<uid>` for the root and `<uid>-<directory>` otherwise.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use tracing::{debug, info, warn};

use super::{
    check_api, ensure_namespace, failed, ok, require_namespace, InstanceLocks, Rejection, Reply,
};
use crate::config_tree::{build_tree, resolve_project, Files};
use crate::gitlab::RepositoryApi;
use crate::instance::{config_map_name, owns_config_map, require_instance};
use crate::kube_client::ClusterApi;
use crate::proto::{InstanceRequest, ServiceResponse};

const ASSETS_NOT_FOUND: &str = "Cannot find corresponding gitlab assets";
const CREATE_FAILED: &str = "Failed to create ConfigMap";
const UPDATE_FAILED: &str = "Error while updating configmap!";
const LIST_FAILED: &str = "Could not retrieve list of ConfigMaps in namespace";

/// Split file contents into `data` (UTF-8) and `binaryData` (everything else)
fn split_contents(files: &Files) -> (BTreeMap<String, String>, Option<BTreeMap<String, ByteString>>) {
    let mut data = BTreeMap::new();
    let mut binary = BTreeMap::new();
    for (name, content) in files {
        match std::str::from_utf8(content) {
            Ok(text) => {
                data.insert(name.clone(), text.to_string());
            }
            Err(_) => {
                binary.insert(name.clone(), ByteString(content.clone()));
            }
        }
    }
    (data, (!binary.is_empty()).then_some(binary))
}

/// Build a new ConfigMap holding `files`
pub fn config_map_object(namespace: &str, name: &str, files: &Files) -> ConfigMap {
    let (data, binary_data) = split_contents(files);
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(data),
        binary_data,
        ..Default::default()
    }
}

/// Reconciles ConfigMaps from the configuration repository
pub struct ConfigReconciler {
    cluster: Arc<dyn ClusterApi>,
    repository: Arc<dyn RepositoryApi>,
    locks: InstanceLocks,
}

impl ConfigReconciler {
    /// Create a reconciler over the given cluster and repository
    pub fn new(cluster: Arc<dyn ClusterApi>, repository: Arc<dyn RepositoryApi>) -> Self {
        Self {
            cluster,
            repository,
            locks: InstanceLocks::default(),
        }
    }

    /// Create or update every ConfigMap of the instance from its repository.
    ///
    /// Directory groups are written root first, then by name. The first
    /// failing group aborts the call; groups written before it are kept.
    pub async fn create_or_replace(&self, request: InstanceRequest) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;
        let namespace = instance.namespace.as_str();
        let uid = instance.uid.as_str();
        let _guard = self.locks.lock(namespace, uid).await;

        let project_id = resolve_project(self.repository.as_ref(), &instance.domain, uid)
            .await
            .map_err(|e| {
                debug!(%namespace, %uid, domain = %instance.domain, error = %e, "no configuration project");
                failed(ASSETS_NOT_FOUND, e)
            })?;

        ensure_namespace(self.cluster.as_ref(), namespace).await?;

        let tree = build_tree(self.repository.as_ref(), project_id)
            .await
            .map_err(|e| failed(CREATE_FAILED, e))?;

        for (directory, files) in tree.iter() {
            let name = config_map_name(uid, directory);
            self.apply(namespace, &name, files).await?;
        }

        info!(%namespace, %uid, config_maps = tree.len(), "reconciled instance configuration");
        Ok(ok("ConfigMap created successfully"))
    }

    async fn apply(
        &self,
        namespace: &str,
        name: &str,
        files: &Files,
    ) -> Result<(), Rejection<ServiceResponse>> {
        let existing = self
            .cluster
            .get_config_map(namespace, name)
            .await
            .map_err(|e| {
                warn!(%namespace, config_map = %name, error = %e, "ConfigMap lookup failed");
                failed(CREATE_FAILED, e)
            })?;

        match existing {
            None => {
                let config_map = config_map_object(namespace, name, files);
                self.cluster
                    .create_config_map(namespace, &config_map)
                    .await
                    .map_err(|e| {
                        warn!(%namespace, config_map = %name, error = %e, "ConfigMap creation failed");
                        failed(CREATE_FAILED, e)
                    })?;
                debug!(%namespace, config_map = %name, files = files.len(), "created ConfigMap");
            }
            Some(mut config_map) => {
                // Keep the fetched metadata so the write is conditional on resourceVersion
                let (data, binary_data) = split_contents(files);
                config_map.data = Some(data);
                config_map.binary_data = binary_data;
                self.cluster
                    .replace_config_map(namespace, &config_map)
                    .await
                    .map_err(|e| {
                        warn!(%namespace, config_map = %name, error = %e, "ConfigMap update failed");
                        failed(UPDATE_FAILED, e)
                    })?;
                debug!(%namespace, config_map = %name, files = files.len(), "updated ConfigMap");
            }
        }
        Ok(())
    }

    /// Delete every ConfigMap owned by the instance.
    ///
    /// Deletion is best effort: individual failures are logged and skipped,
    /// and finding nothing to delete is success.
    pub async fn delete_if_exists(&self, request: InstanceRequest) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;
        let namespace = instance.namespace.as_str();
        let uid = instance.uid.as_str();
        let _guard = self.locks.lock(namespace, uid).await;

        require_namespace(self.cluster.as_ref(), namespace).await?;

        let config_maps = match self.cluster.list_config_maps(namespace).await {
            Ok(config_maps) => config_maps,
            Err(e) => {
                warn!(%namespace, %uid, error = %e, "ConfigMap listing failed, nothing deleted");
                return Ok(ok(LIST_FAILED));
            }
        };

        let mut deleted = 0usize;
        for name in config_maps
            .iter()
            .filter_map(|cm| cm.metadata.name.as_deref())
            .filter(|name| owns_config_map(uid, name))
        {
            match self.cluster.delete_config_map(namespace, name).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(%namespace, config_map = %name, error = %e, "ConfigMap deletion failed, skipping")
                }
            }
        }

        info!(%namespace, %uid, deleted, "deleted instance ConfigMaps");
        Ok(ok("ConfigMaps deleted successfully"))
    }
}
