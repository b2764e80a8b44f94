//! Service address lookups
//!
//! Answers with an `InfoServiceResponse`, whose `info` carries the result:
//! the load-balancer IP of the instance Service, or its name.

use std::sync::Arc;

use k8s_openapi::api::core::v1::Service;
use tracing::{debug, warn};

use super::{check_api, failed, failed_response, ok, require_namespace, Rejection, Reply};
use crate::instance::require_instance;
use crate::kube_client::ClusterApi;
use crate::proto::{InfoServiceResponse, InstanceRequest};
use crate::Error;

const SERVICE_NOT_FOUND: &str = "Service not found!";

/// Resolves facts about the instance Service
pub struct InformationResolver {
    cluster: Arc<dyn ClusterApi>,
}

/// First load-balancer ingress IP of a Service.
///
/// `Err` carries the message for a Service without ingress or without IP.
fn ingress_ip(service: &Service) -> Result<&str, &'static str> {
    let ingress = service
        .status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_deref())
        .unwrap_or_default();

    let first = ingress.first().ok_or("Service ingress not found!")?;
    match first.ip.as_deref() {
        Some(ip) if !ip.is_empty() => Ok(ip),
        _ => Err("Ip not found!"),
    }
}

impl InformationResolver {
    /// Resolver over a shared cluster client
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    async fn service(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Service, Rejection<InfoServiceResponse>> {
        match self.cluster.get_service(namespace, name).await {
            Ok(Some(service)) => Ok(service),
            Ok(None) => Err(failed(
                SERVICE_NOT_FOUND,
                Error::not_found(format!("service {name} in namespace {namespace}")),
            )),
            Err(e) => {
                warn!(%namespace, service = %name, error = %e, "service lookup failed");
                Err(failed(SERVICE_NOT_FOUND, e))
            }
        }
    }

    /// Load-balancer IP of the Service named after the instance.
    ///
    /// Only the first ingress entry counts. A Service that has no address yet
    /// is `FAILED` without an error, so callers can retry.
    pub async fn retrieve_service_ip(&self, request: InstanceRequest) -> Reply<InfoServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;

        require_namespace(self.cluster.as_ref(), &instance.namespace).await?;
        let service = self.service(&instance.namespace, &instance.uid).await?;

        match ingress_ip(&service) {
            Ok(ip) => {
                debug!(namespace = %instance.namespace, service = %instance.uid, %ip, "resolved service ip");
                let mut response: InfoServiceResponse = ok("");
                response.info = ip.to_string();
                Ok(response)
            }
            Err(message) => {
                debug!(namespace = %instance.namespace, service = %instance.uid, reason = message, "service has no address yet");
                Ok(failed_response(message))
            }
        }
    }

    /// Whether the Service named after the instance exists; `info` is its name
    pub async fn check_service_exists(&self, request: InstanceRequest) -> Reply<InfoServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;

        require_namespace(self.cluster.as_ref(), &instance.namespace).await?;
        let service = self.service(&instance.namespace, &instance.uid).await?;

        let mut response: InfoServiceResponse = ok("");
        response.info = service.metadata.name.unwrap_or(instance.uid);
        Ok(response)
    }
}
