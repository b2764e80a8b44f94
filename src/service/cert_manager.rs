//! TLS Secret cleanup
//!
//! cert-manager provisions `<uid>-tls` for an instance's ingress; the
//! janitor only removes it when the instance goes away.

use std::sync::Arc;

use super::{check_api, delete_secret_if_exists, require_namespace, Reply};
use crate::instance::{require_instance, tls_secret_name};
use crate::kube_client::ClusterApi;
use crate::proto::{InstanceRequest, ServiceResponse};

/// Deletes instance TLS Secrets
pub struct CertificateCleanup {
    cluster: Arc<dyn ClusterApi>,
}

impl CertificateCleanup {
    /// Cleanup over a shared cluster client
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Delete the TLS Secret if it exists
    pub async fn delete_if_exists(&self, request: InstanceRequest) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;

        require_namespace(self.cluster.as_ref(), &instance.namespace).await?;
        delete_secret_if_exists(
            self.cluster.as_ref(),
            &instance.namespace,
            &tls_secret_name(&instance.uid),
        )
        .await
    }
}
