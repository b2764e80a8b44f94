//! Kubernetes access for the janitor services
//!
//! Every service talks to the cluster through [`ClusterApi`] so tests can
//! substitute a mock while production uses [`KubeClusterApi`] over a shared
//! `kube::Client`. Lookups return `Ok(None)` when the API server answers 404
//! and an error for anything else; callers decide what absence means.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Pod, Secret, Service};
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, LogParams, ObjectMeta, Patch, PatchParams, PostParams};
use kube::Client;
use serde::Serialize;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// Trait abstracting the Kubernetes operations the janitor needs
///
/// All calls are single attempts; there is no retry at this layer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Get a namespace by name
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Create a namespace, attaching the annotations when there are any
    ///
    /// Fails with a 409 if the namespace already exists.
    async fn create_namespace(
        &self,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), Error>;

    /// Get a ConfigMap
    async fn get_config_map(&self, namespace: &str, name: &str)
        -> Result<Option<ConfigMap>, Error>;

    /// Create a ConfigMap
    async fn create_config_map(&self, namespace: &str, config_map: &ConfigMap)
        -> Result<(), Error>;

    /// Replace an existing ConfigMap
    ///
    /// The object's `resourceVersion`, when set, makes the write conditional.
    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error>;

    /// List every ConfigMap in a namespace
    async fn list_config_maps(&self, namespace: &str) -> Result<Vec<ConfigMap>, Error>;

    /// Delete a ConfigMap
    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get a Secret
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error>;

    /// Merge-patch the given keys into a Secret's `data`, leaving other keys alone
    async fn patch_secret_data(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, ByteString>,
    ) -> Result<(), Error>;

    /// Delete a Secret
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get a Deployment
    async fn get_deployment(&self, namespace: &str, name: &str)
        -> Result<Option<Deployment>, Error>;

    /// Get a StatefulSet
    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error>;

    /// Get a Service
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error>;

    /// List every Pod in a namespace, in API server order
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, Error>;

    /// Get a Pod
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error>;

    /// Fetch the logs of a Pod, optionally for one container
    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<String>,
    ) -> Result<String, Error>;
}

/// Merge patch body touching only `data`
#[derive(Debug, Serialize)]
struct SecretDataPatch {
    data: BTreeMap<String, ByteString>,
}

/// Build the Namespace object sent on creation
pub fn namespace_object(name: &str, annotations: BTreeMap<String, String>) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: (!annotations.is_empty()).then_some(annotations),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Real Kubernetes client implementation
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    /// Create a new KubeClusterApi wrapping the given kube Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, namespace: &str) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn create_namespace(
        &self,
        name: &str,
        annotations: BTreeMap<String, String>,
    ) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let namespace = namespace_object(name, annotations);
        api.create(&PostParams::default(), &namespace).await?;
        debug!(namespace = %name, "created namespace");
        Ok(())
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        let api: Api<ConfigMap> = self.namespaced(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error> {
        let api: Api<ConfigMap> = self.namespaced(namespace);
        api.create(&PostParams::default(), config_map).await?;
        Ok(())
    }

    async fn replace_config_map(
        &self,
        namespace: &str,
        config_map: &ConfigMap,
    ) -> Result<(), Error> {
        let name = config_map
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| Error::invalid_request("ConfigMap has no name"))?;
        let api: Api<ConfigMap> = self.namespaced(namespace);
        api.replace(name, &PostParams::default(), config_map).await?;
        Ok(())
    }

    async fn list_config_maps(&self, namespace: &str) -> Result<Vec<ConfigMap>, Error> {
        let api: Api<ConfigMap> = self.namespaced(namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<ConfigMap> = self.namespaced(namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = self.namespaced(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error> {
        let api: Api<Secret> = self.namespaced(namespace);
        api.create(&PostParams::default(), secret).await?;
        Ok(())
    }

    async fn patch_secret_data(
        &self,
        namespace: &str,
        name: &str,
        data: BTreeMap<String, ByteString>,
    ) -> Result<(), Error> {
        let api: Api<Secret> = self.namespaced(namespace);
        let patch = SecretDataPatch { data };
        api.patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<Secret> = self.namespaced(namespace);
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn get_deployment(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Deployment>, Error> {
        let api: Api<Deployment> = self.namespaced(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_stateful_set(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<StatefulSet>, Error> {
        let api: Api<StatefulSet> = self.namespaced(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, Error> {
        let api: Api<Service> = self.namespaced(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, Error> {
        let api: Api<Pod> = self.namespaced(namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, Error> {
        let api: Api<Pod> = self.namespaced(namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        name: &str,
        container: Option<String>,
    ) -> Result<String, Error> {
        let api: Api<Pod> = self.namespaced(namespace);
        let params = LogParams {
            container,
            ..Default::default()
        };
        Ok(api.logs(name, &params).await?)
    }
}
