//! gRPC protocol definitions for the janitor services
//!
//! This module contains the generated Protobuf and gRPC code for the seven
//! services the janitor exposes to the platform orchestrator:
//!
//! - `ConfigService`: ConfigMaps built from the instance's GitLab repository
//! - `BasicAuthService`: htpasswd Secret for the instance
//! - `CertManagerService`: cleanup of the instance TLS Secret
//! - `ReadinessService`: Deployment / StatefulSet readiness
//! - `InformationService`: Service load-balancer address and existence
//! - `PodService`: instance pods and their logs
//! - `NamespaceService`: namespace provisioning
//!
//! # Example
//!
//! ```ignore
//! use janitor::proto::readiness_service_client::ReadinessServiceClient;
//! use janitor::proto::{Instance, InstanceRequest};
//!
//! let mut client = ReadinessServiceClient::connect("http://janitor:9000").await?;
//! let response = client
//!     .check_if_ready(InstanceRequest {
//!         api: "v1".to_string(),
//!         deployment: Some(Instance {
//!             namespace: "tenant-a".to_string(),
//!             uid: "grafana-42".to_string(),
//!             domain: "tenant-a".to_string(),
//!         }),
//!     })
//!     .await?;
//! ```

#![allow(missing_docs)] // Generated code doesn't have docs

/// Generated protobuf and gRPC code for the janitor protocol
pub mod janitor {
    /// Version 1 of the janitor protocol
    pub mod v1 {
        tonic::include_proto!("janitor.v1");
    }
}

// Re-export commonly used types at the module level for convenience
pub use janitor::v1::*;
