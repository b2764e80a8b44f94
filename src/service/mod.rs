//! Instance reconciliation and readiness services
//!
//! Each component here implements one gRPC service's operations as plain
//! async methods. They share the same shape:
//!
//! 1. API version gate
//! 2. namespace precondition (created by "create" operations, required by the rest)
//! 3. one domain transformation plus cluster and repository calls
//! 4. a response envelope with `OK`, `FAILED` or `PENDING`
//!
//! Failures carry two signals: the error and, usually, a `FAILED` body the
//! caller can display. [`Rejection`] holds both; the version gate and
//! malformed requests produce a rejection without a body.

pub mod basic_auth;
pub mod cert_manager;
pub mod config;
pub mod information;
pub mod namespace;
pub mod pod;
pub mod readiness;

pub use basic_auth::CredentialReconciler;
pub use cert_manager::CertificateCleanup;
pub use config::ConfigReconciler;
pub use information::InformationResolver;
pub use namespace::NamespaceProvisioner;
pub use pod::PodInspector;
pub use readiness::ReadinessProber;

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::kube_client::ClusterApi;
use crate::proto::{
    InfoServiceResponse, PodListResponse, PodLogsResponse, ServiceResponse, Status,
};
use crate::{Error, API_VERSION};

/// Message when the instance namespace is missing or cannot be created
pub const NAMESPACE_NOT_FOUND: &str = "Namespace not found";

/// A failed operation: the error, and the response body when there is one
#[derive(Debug)]
pub struct Rejection<R> {
    /// Body to hand back alongside the error; `None` for rejected requests
    pub response: Option<R>,
    /// What went wrong
    pub error: Error,
}

impl<R> Rejection<R> {
    /// Rejection without a response body
    pub fn bare(error: Error) -> Self {
        Self {
            response: None,
            error,
        }
    }

    /// Rejection carrying a response body
    pub fn with_response(response: R, error: Error) -> Self {
        Self {
            response: Some(response),
            error,
        }
    }
}

impl<R> From<Error> for Rejection<R> {
    fn from(error: Error) -> Self {
        Self::bare(error)
    }
}

/// Outcome of a service operation
pub type Reply<R> = std::result::Result<R, Rejection<R>>;

/// Response messages sharing the `api`/`status`/`message` envelope
pub trait Envelope: Sized {
    /// Envelope with the given status and message, every other field empty
    fn envelope(status: Status, message: String) -> Self;
}

impl Envelope for ServiceResponse {
    fn envelope(status: Status, message: String) -> Self {
        Self {
            api: API_VERSION.to_string(),
            status: status as i32,
            message,
        }
    }
}

impl Envelope for InfoServiceResponse {
    fn envelope(status: Status, message: String) -> Self {
        Self {
            api: API_VERSION.to_string(),
            status: status as i32,
            message,
            info: String::new(),
        }
    }
}

impl Envelope for PodListResponse {
    fn envelope(status: Status, message: String) -> Self {
        Self {
            api: API_VERSION.to_string(),
            status: status as i32,
            message,
            pods: Vec::new(),
        }
    }
}

impl Envelope for PodLogsResponse {
    fn envelope(status: Status, message: String) -> Self {
        Self {
            api: API_VERSION.to_string(),
            status: status as i32,
            message,
            lines: Vec::new(),
        }
    }
}

/// `OK` response
pub fn ok<R: Envelope>(message: impl Into<String>) -> R {
    R::envelope(Status::Ok, message.into())
}

/// `PENDING` response
pub fn pending<R: Envelope>(message: impl Into<String>) -> R {
    R::envelope(Status::Pending, message.into())
}

/// `FAILED` response with no error attached
pub fn failed_response<R: Envelope>(message: impl Into<String>) -> R {
    R::envelope(Status::Failed, message.into())
}

/// `FAILED` response paired with the error that caused it
pub fn failed<R: Envelope>(message: impl Into<String>, error: Error) -> Rejection<R> {
    Rejection::with_response(failed_response(message), error)
}

/// Reject requests declaring an API version other than ours.
///
/// An empty version is accepted.
pub fn check_api(requested: &str) -> Result<(), Error> {
    if requested.is_empty() || requested == API_VERSION {
        return Ok(());
    }
    Err(Error::UnsupportedApi {
        implemented: API_VERSION.to_string(),
        requested: requested.to_string(),
    })
}

/// Fail with `FAILED` "Namespace not found" unless `namespace` exists
pub async fn require_namespace<R: Envelope>(
    cluster: &dyn ClusterApi,
    namespace: &str,
) -> Result<(), Rejection<R>> {
    match cluster.get_namespace(namespace).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(failed(
            NAMESPACE_NOT_FOUND,
            Error::not_found(format!("namespace {namespace}")),
        )),
        Err(e) => {
            warn!(%namespace, error = %e, "namespace lookup failed");
            Err(failed(NAMESPACE_NOT_FOUND, e))
        }
    }
}

/// Create `namespace` when it does not exist yet
pub async fn ensure_namespace<R: Envelope>(
    cluster: &dyn ClusterApi,
    namespace: &str,
) -> Result<(), Rejection<R>> {
    match cluster.get_namespace(namespace).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => {
            debug!(%namespace, "creating missing namespace");
            cluster
                .create_namespace(namespace, BTreeMap::new())
                .await
                .map_err(|e| {
                    warn!(%namespace, error = %e, "namespace creation failed");
                    failed(NAMESPACE_NOT_FOUND, e)
                })
        }
        Err(e) => {
            warn!(%namespace, error = %e, "namespace lookup failed");
            Err(failed(NAMESPACE_NOT_FOUND, e))
        }
    }
}

/// Delete a Secret if present; absence is success
pub(crate) async fn delete_secret_if_exists(
    cluster: &dyn ClusterApi,
    namespace: &str,
    name: &str,
) -> Reply<ServiceResponse> {
    match cluster.get_secret(namespace, name).await {
        Ok(None) => {
            debug!(%namespace, secret = %name, "secret already absent");
            Ok(ok("Secret does not exist"))
        }
        Ok(Some(_)) => match cluster.delete_secret(namespace, name).await {
            Ok(()) => {
                debug!(%namespace, secret = %name, "deleted secret");
                Ok(ok("Secret deleted successfully"))
            }
            Err(e) => {
                warn!(%namespace, secret = %name, error = %e, "secret deletion failed");
                Err(failed("Error while removing secret!", e))
            }
        },
        Err(e) => {
            warn!(%namespace, secret = %name, error = %e, "secret lookup failed");
            Err(failed("Error while removing secret!", e))
        }
    }
}

/// Per-instance write locks keyed by `namespace/uid`
///
/// Serializes reconciliations of one instance inside this process. An entry
/// lives only while someone holds or waits for its lock.
#[derive(Debug, Default)]
pub struct InstanceLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InstanceLocks {
    /// Wait for and take the lock of one instance
    pub async fn lock(&self, namespace: &str, uid: &str) -> InstanceGuard<'_> {
        let key = format!("{namespace}/{uid}");
        let lock = self.locks.entry(key.clone()).or_default().clone();
        InstanceGuard {
            locks: &self.locks,
            key,
            guard: Some(lock.lock_owned().await),
        }
    }
}

/// Held lock of one instance; releasing it evicts the entry once unused
#[derive(Debug)]
pub struct InstanceGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InstanceGuard<'_> {
    fn drop(&mut self) {
        // Release first so our own Arc no longer counts.
        self.guard.take();
        // Waiters hold clones, and `lock` clones under the shard lock.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
