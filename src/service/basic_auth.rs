//! Basic-auth credential reconciler
//!
//! Keeps one Secret per instance, `<uid>-auth`, whose `auth` key holds an
//! htpasswd line for the client-supplied credentials. Every write draws a
//! new salt, so re-submitting the same credentials still rotates the stored
//! bytes. Plaintext passwords and hashes never reach the logs.

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use tracing::{info, warn};

use super::{
    check_api, delete_secret_if_exists, ensure_namespace, failed, ok, require_namespace,
    InstanceLocks, Reply,
};
use crate::htpasswd::htpasswd_line;
use crate::instance::{auth_secret_name, require_instance};
use crate::kube_client::ClusterApi;
use crate::proto::{Credentials, InstanceCredentialsRequest, InstanceRequest, ServiceResponse};
use crate::Error;

/// Key of the htpasswd line inside the Secret
pub const AUTH_KEY: &str = "auth";

/// Secret `data` for the given credentials, freshly salted
fn auth_data(credentials: &Credentials) -> BTreeMap<String, ByteString> {
    let line = htpasswd_line(&credentials.user, &credentials.password);
    BTreeMap::from([(AUTH_KEY.to_string(), ByteString(line.into_bytes()))])
}

fn auth_secret(namespace: &str, name: &str, credentials: &Credentials) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        data: Some(auth_data(credentials)),
        type_: Some("Opaque".to_string()),
        ..Default::default()
    }
}

/// Reconciles the htpasswd Secret of an instance
pub struct CredentialReconciler {
    cluster: Arc<dyn ClusterApi>,
    locks: InstanceLocks,
}

impl CredentialReconciler {
    /// Reconciler over a shared cluster client
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self {
            cluster,
            locks: InstanceLocks::default(),
        }
    }

    /// Create the auth Secret, or overwrite its `auth` key when it exists
    pub async fn create_or_replace(
        &self,
        request: InstanceCredentialsRequest,
    ) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.instance)?;
        let credentials = request
            .credentials
            .ok_or_else(|| Error::invalid_request("request carries no credentials"))?;
        let namespace = instance.namespace.as_str();
        let uid = instance.uid.as_str();
        let _guard = self.locks.lock(namespace, uid).await;

        ensure_namespace(self.cluster.as_ref(), namespace).await?;

        let name = auth_secret_name(uid);
        let existing = self
            .cluster
            .get_secret(namespace, &name)
            .await
            .map_err(|e| {
                warn!(%namespace, secret = %name, error = %e, "secret lookup failed");
                failed("Error while preparing secret!", e)
            })?;

        if existing.is_none() {
            let secret = auth_secret(namespace, &name, &credentials);
            self.cluster
                .create_secret(namespace, &secret)
                .await
                .map_err(|e| {
                    warn!(%namespace, secret = %name, error = %e, "secret creation failed");
                    failed("Error while creating secret!", e)
                })?;
            info!(%namespace, secret = %name, "created basic-auth secret");
            return Ok(ok("Secret created successfully"));
        }

        self.cluster
            .patch_secret_data(namespace, &name, auth_data(&credentials))
            .await
            .map_err(|e| {
                warn!(%namespace, secret = %name, error = %e, "secret patch failed");
                failed("Error while patching secret!", e)
            })?;
        info!(%namespace, secret = %name, "rotated basic-auth secret");
        Ok(ok("Secret updated successfully"))
    }

    /// Delete the auth Secret if it exists
    pub async fn delete_if_exists(&self, request: InstanceRequest) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;
        let _guard = self.locks.lock(&instance.namespace, &instance.uid).await;

        require_namespace(self.cluster.as_ref(), &instance.namespace).await?;
        delete_secret_if_exists(
            self.cluster.as_ref(),
            &instance.namespace,
            &auth_secret_name(&instance.uid),
        )
        .await
    }
}
