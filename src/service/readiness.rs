//! Instance readiness
//!
//! An instance runs either as a Deployment or as a StatefulSet named after
//! its uid. [`ReadinessProber`] asks an ordered list of [`WorkloadProbe`]s
//! for replica counts; the first probe that finds its workload decides the
//! answer. Nothing is polled: callers re-invoke until the status is `OK`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{check_api, failed, ok, pending, require_namespace, Reply};
use crate::instance::require_instance;
use crate::kube_client::ClusterApi;
use crate::proto::{InstanceRequest, ServiceResponse};
use crate::Error;

/// Message when no probe finds its workload
pub const NO_WORKLOAD: &str = "Neither Deployment nor StatefulSet found!";

/// Desired and ready replica counts of a workload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplicaCounts {
    /// `spec.replicas`, defaulting to 1 like the API server
    pub desired: i32,
    /// `status.readyReplicas`, defaulting to 0
    pub ready: i32,
}

impl ReplicaCounts {
    /// Counts from optional spec and status fields
    pub fn from_fields(desired: Option<i32>, ready: Option<i32>) -> Self {
        Self {
            desired: desired.unwrap_or(1),
            ready: ready.unwrap_or(0),
        }
    }

    /// Whether every desired replica is ready
    pub fn is_ready(&self) -> bool {
        self.desired == self.ready
    }
}

/// One kind of workload an instance may run as
#[async_trait]
pub trait WorkloadProbe: Send + Sync {
    /// Kind name used in logs
    fn kind(&self) -> &'static str;

    /// Message reported when the workload is ready
    fn ready_message(&self) -> &'static str;

    /// Message reported while replicas are still coming up
    fn waiting_message(&self) -> &'static str;

    /// Replica counts of the workload, or `None` when it does not exist
    async fn replicas(
        &self,
        cluster: &dyn ClusterApi,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReplicaCounts>, Error>;
}

/// Probe for `apps/v1` Deployments
pub struct DeploymentProbe;

#[async_trait]
impl WorkloadProbe for DeploymentProbe {
    fn kind(&self) -> &'static str {
        "Deployment"
    }

    fn ready_message(&self) -> &'static str {
        "Deployment is ready"
    }

    fn waiting_message(&self) -> &'static str {
        "Waiting for deployment"
    }

    async fn replicas(
        &self,
        cluster: &dyn ClusterApi,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReplicaCounts>, Error> {
        Ok(cluster.get_deployment(namespace, name).await?.map(|d| {
            ReplicaCounts::from_fields(
                d.spec.and_then(|s| s.replicas),
                d.status.and_then(|s| s.ready_replicas),
            )
        }))
    }
}

/// Probe for `apps/v1` StatefulSets
pub struct StatefulSetProbe;

#[async_trait]
impl WorkloadProbe for StatefulSetProbe {
    fn kind(&self) -> &'static str {
        "StatefulSet"
    }

    fn ready_message(&self) -> &'static str {
        "StatefulSet is ready"
    }

    fn waiting_message(&self) -> &'static str {
        "Waiting for statefulset"
    }

    async fn replicas(
        &self,
        cluster: &dyn ClusterApi,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ReplicaCounts>, Error> {
        Ok(cluster.get_stateful_set(namespace, name).await?.map(|s| {
            ReplicaCounts::from_fields(
                s.spec.and_then(|s| s.replicas),
                s.status.and_then(|s| s.ready_replicas),
            )
        }))
    }
}

/// Reports whether an instance's workload is ready
pub struct ReadinessProber {
    cluster: Arc<dyn ClusterApi>,
    probes: Vec<Box<dyn WorkloadProbe>>,
}

impl ReadinessProber {
    /// Prober checking the Deployment first, then the StatefulSet
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self::with_probes(
            cluster,
            vec![Box::new(DeploymentProbe), Box::new(StatefulSetProbe)],
        )
    }

    /// Prober with a custom probe order
    pub fn with_probes(cluster: Arc<dyn ClusterApi>, probes: Vec<Box<dyn WorkloadProbe>>) -> Self {
        Self { cluster, probes }
    }

    /// `OK` when ready, `PENDING` while replicas come up, `FAILED` without a workload
    pub async fn check_if_ready(&self, request: InstanceRequest) -> Reply<ServiceResponse> {
        check_api(&request.api)?;
        let instance = require_instance(request.deployment)?;
        let namespace = instance.namespace.as_str();
        let uid = instance.uid.as_str();

        require_namespace(self.cluster.as_ref(), namespace).await?;

        for probe in &self.probes {
            let counts = probe
                .replicas(self.cluster.as_ref(), namespace, uid)
                .await
                .map_err(|e| {
                    warn!(%namespace, %uid, kind = probe.kind(), error = %e, "workload lookup failed");
                    failed(format!("Failed to read {}", probe.kind()), e)
                })?;

            if let Some(counts) = counts {
                debug!(
                    %namespace,
                    %uid,
                    kind = probe.kind(),
                    desired = counts.desired,
                    ready = counts.ready,
                    "probed workload"
                );
                return Ok(if counts.is_ready() {
                    ok(probe.ready_message())
                } else {
                    pending(probe.waiting_message())
                });
            }
        }

        Err(failed(
            NO_WORKLOAD,
            Error::not_found(format!("no workload named {uid} in namespace {namespace}")),
        ))
    }
}
