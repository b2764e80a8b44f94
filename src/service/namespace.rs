//! Namespace provisioning

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::{check_api, failed, ok, Reply};
use crate::kube_client::ClusterApi;
use crate::proto::{NamespaceRequest, ServiceResponse};
use crate::Error;

/// Creates namespaces on request
pub struct NamespaceProvisioner {
    cluster: Arc<dyn ClusterApi>,
}

impl NamespaceProvisioner {
    /// Provisioner over a shared cluster client
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Create a namespace with the given annotations.
    ///
    /// Unlike the reconcilers this is not get-then-create: an existing
    /// namespace comes back as a `FAILED` conflict.
    pub async fn create_namespace(&self, request: NamespaceRequest) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        if request.namespace.is_empty() {
            return Err(Error::invalid_request("namespace name is empty").into());
        }
        let namespace = request.namespace.as_str();
        let annotations: BTreeMap<String, String> = request.annotations.into_iter().collect();

        self.cluster
            .create_namespace(namespace, annotations)
            .await
            .map_err(|e| {
                warn!(%namespace, error = %e, "namespace creation failed");
                failed("Failed to create namespace", e)
            })?;

        info!(%namespace, "created namespace");
        Ok(ok("Namespace created successfully"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kube_client::MockClusterApi;
    use crate::proto::Status;
    use crate::service::test_support::*;
    use std::collections::HashMap;

    fn request(annotations: HashMap<String, String>) -> NamespaceRequest {
        NamespaceRequest {
            api: "v1".to_string(),
            namespace: "tenant-a".to_string(),
            annotations,
        }
    }

    #[tokio::test]
    async fn story_namespace_is_created_with_annotations() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_namespace()
            .withf(|name, annotations| {
                name == "tenant-a"
                    && annotations.get("scheduler.alpha.kubernetes.io/node-selector")
                        == Some(&"pool=tenants".to_string())
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let response = NamespaceProvisioner::new(Arc::new(cluster))
            .create_namespace(request(HashMap::from([(
                "scheduler.alpha.kubernetes.io/node-selector".to_string(),
                "pool=tenants".to_string(),
            )])))
            .await
            .unwrap();

        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.message, "Namespace created successfully");
    }

    #[tokio::test]
    async fn story_empty_annotations_are_passed_as_none() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_namespace()
            .withf(|_, annotations| annotations.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));

        let response = NamespaceProvisioner::new(Arc::new(cluster))
            .create_namespace(request(HashMap::new()))
            .await
            .unwrap();
        assert_eq!(response.status(), Status::Ok);
    }

    #[tokio::test]
    async fn story_existing_namespace_is_a_surfaced_conflict() {
        let mut cluster = MockClusterApi::new();
        cluster
            .expect_create_namespace()
            .returning(|_, _| Err(api_error(409)));

        let rejection = NamespaceProvisioner::new(Arc::new(cluster))
            .create_namespace(request(HashMap::new()))
            .await
            .unwrap_err();

        let body = rejection.response.unwrap();
        assert_eq!(body.status(), Status::Failed);
        assert_eq!(body.message, "Failed to create namespace");
        assert_eq!(rejection.error.code(), tonic::Code::AlreadyExists);
    }

    #[tokio::test]
    async fn story_empty_name_is_invalid() {
        let mut bad = request(HashMap::new());
        bad.namespace.clear();

        let rejection = NamespaceProvisioner::new(Arc::new(MockClusterApi::new()))
            .create_namespace(bad)
            .await
            .unwrap_err();
        assert!(rejection.response.is_none());
        assert_eq!(rejection.error.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn story_unsupported_api_version_has_no_body() {
        let mut bad = request(HashMap::new());
        bad.api = "v2".to_string();

        let rejection = NamespaceProvisioner::new(Arc::new(MockClusterApi::new()))
            .create_namespace(bad)
            .await
            .unwrap_err();
        assert!(rejection.response.is_none());
        assert_eq!(rejection.error.code(), tonic::Code::Unimplemented);
    }
}
