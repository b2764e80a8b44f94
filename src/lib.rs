//! Janitor - instance reconciliation and readiness for deployed applications
//!
//! The janitor keeps the cluster-side artifacts of an application instance in
//! line with two sources of truth: the instance's GitLab configuration
//! repository and credentials supplied by the caller. It is driven over gRPC
//! by the platform orchestrator and holds no state between calls; the
//! cluster and the repository are the only durable stores.
//!
//! # Modules
//!
//! - [`service`] - The seven gRPC services as plain async components
//! - [`config_tree`] - GitLab project resolution and repository tree walking
//! - [`htpasswd`] - APR1-MD5 htpasswd hashing for basic-auth Secrets
//! - [`instance`] - Naming of resources derived from an instance uid
//! - [`kube_client`] - Kubernetes access behind the [`kube_client::ClusterApi`] trait
//! - [`gitlab`] - GitLab access behind the [`gitlab::RepositoryApi`] trait
//! - [`server`] - tonic bindings and the gRPC listener
//! - [`proto`] - Generated protobuf and gRPC code
//! - [`config`] - Command-line and environment configuration
//! - [`telemetry`] - Tracing subscriber setup
//! - [`error`] - Error types

#![deny(missing_docs)]

pub mod config;
pub mod config_tree;
pub mod error;
pub mod gitlab;
pub mod htpasswd;
pub mod instance;
pub mod kube_client;
pub mod proto;
pub mod server;
pub mod service;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API version implemented by every service
///
/// Requests declaring any other non-empty version are rejected.
pub const API_VERSION: &str = "v1";
