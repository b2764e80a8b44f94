//! Instance pods and their logs

use std::sync::Arc;

use k8s_openapi::api::core::v1::Pod;
use tracing::{debug, warn};

use super::{check_api, failed, ok, require_namespace, Reply};
use crate::instance::{has_instance_prefix, require_instance};
use crate::kube_client::ClusterApi;
use crate::proto::{InstanceRequest, PodInfo, PodListResponse, PodLogsResponse, PodRequest};
use crate::Error;

fn pod_info(pod: &Pod) -> PodInfo {
    PodInfo {
        name: pod.metadata.name.clone().unwrap_or_default(),
        phase: pod
            .status
            .as_ref()
            .and_then(|s| s.phase.clone())
            .unwrap_or_default(),
        container: pod
            .spec
            .as_ref()
            .and_then(|s| s.containers.first())
            .map(|c| c.name.clone())
            .unwrap_or_default(),
    }
}

/// Lists instance pods and reads their logs
pub struct PodInspector {
    cluster: Arc<dyn ClusterApi>,
}

impl PodInspector {
    /// Inspector over a shared cluster client
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Pods whose name starts with `<uid>-`, in API server order
    pub async fn retrieve_pod_list(&self, request: InstanceRequest) -> Reply<PodListResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;
        let namespace = instance.namespace.as_str();

        require_namespace(self.cluster.as_ref(), namespace).await?;

        let pods = self.cluster.list_pods(namespace).await.map_err(|e| {
            warn!(%namespace, error = %e, "pod listing failed");
            failed("Failed to list pods", e)
        })?;

        let pods: Vec<PodInfo> = pods
            .iter()
            .filter(|pod| {
                pod.metadata
                    .name
                    .as_deref()
                    .is_some_and(|name| has_instance_prefix(&instance.uid, name))
            })
            .map(pod_info)
            .collect();

        debug!(%namespace, uid = %instance.uid, pods = pods.len(), "listed instance pods");
        let mut response: PodListResponse = ok(format!("Found {} pods", pods.len()));
        response.pods = pods;
        Ok(response)
    }

    /// Log lines of one pod, optionally of one container
    pub async fn retrieve_pod_logs(&self, request: PodRequest) -> Reply<PodLogsResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;
        let target = request
            .pod
            .filter(|pod| !pod.name.is_empty())
            .ok_or_else(|| Error::invalid_request("request names no pod"))?;
        let namespace = instance.namespace.as_str();
        let name = target.name.as_str();

        require_namespace(self.cluster.as_ref(), namespace).await?;

        match self.cluster.get_pod(namespace, name).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                return Err(failed(
                    "Pod not found!",
                    Error::not_found(format!("pod {name} in namespace {namespace}")),
                ))
            }
            Err(e) => {
                warn!(%namespace, pod = %name, error = %e, "pod lookup failed");
                return Err(failed("Pod not found!", e));
            }
        }

        let container = (!target.container.is_empty()).then(|| target.container.clone());
        let logs = self
            .cluster
            .pod_logs(namespace, name, container)
            .await
            .map_err(|e| {
                warn!(%namespace, pod = %name, error = %e, "log retrieval failed");
                failed("Failed to retrieve pod logs", e)
            })?;

        let lines: Vec<String> = logs.lines().map(str::to_string).collect();
        debug!(%namespace, pod = %name, lines = lines.len(), "retrieved pod logs");
        let mut response: PodLogsResponse = ok("Logs retrieved successfully");
        response.lines = lines;
        Ok(response)
    }
}
