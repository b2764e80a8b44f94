//! gRPC server for the janitor services
//!
//! Binds the generated tonic service traits to the reconcilers in
//! [`crate::service`]. A [`Rejection`] becomes a gRPC status whose code comes
//! from the error; when the rejection carries a `FAILED` body, the body is
//! protobuf-encoded into the status details so clients still get both.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic::{Request, Response};
use tracing::{info, instrument};

use crate::gitlab::RepositoryApi;
use crate::kube_client::ClusterApi;
use crate::proto::basic_auth_service_server::{BasicAuthService, BasicAuthServiceServer};
use crate::proto::cert_manager_service_server::{CertManagerService, CertManagerServiceServer};
use crate::proto::config_service_server::{ConfigService, ConfigServiceServer};
use crate::proto::information_service_server::{InformationService, InformationServiceServer};
use crate::proto::namespace_service_server::{NamespaceService, NamespaceServiceServer};
use crate::proto::pod_service_server::{PodService, PodServiceServer};
use crate::proto::readiness_service_server::{ReadinessService, ReadinessServiceServer};
use crate::proto::{
    InfoServiceResponse, InstanceCredentialsRequest, InstanceRequest, NamespaceRequest,
    PodListResponse, PodLogsResponse, PodRequest, ServiceResponse,
};
use crate::service::{
    CertificateCleanup, ConfigReconciler, CredentialReconciler, InformationResolver,
    NamespaceProvisioner, PodInspector, ReadinessProber, Rejection, Reply,
};
use crate::Error;

type GrpcResult<R> = Result<Response<R>, tonic::Status>;

impl<R: Message> From<Rejection<R>> for tonic::Status {
    fn from(rejection: Rejection<R>) -> Self {
        let Rejection { response, error } = rejection;
        match response {
            Some(body) => tonic::Status::with_details(
                error.code(),
                error.to_string(),
                Bytes::from(body.encode_to_vec()),
            ),
            None => error.into(),
        }
    }
}

fn respond<R: Message>(reply: Reply<R>) -> GrpcResult<R> {
    reply.map(Response::new).map_err(tonic::Status::from)
}

#[tonic::async_trait]
impl ConfigService for ConfigReconciler {
    #[instrument(skip(self, request))]
    async fn create_or_replace(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(ConfigReconciler::create_or_replace(self, request.into_inner()).await)
    }

    #[instrument(skip(self, request))]
    async fn delete_if_exists(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(ConfigReconciler::delete_if_exists(self, request.into_inner()).await)
    }
}

#[tonic::async_trait]
impl BasicAuthService for CredentialReconciler {
    #[instrument(skip(self, request))]
    async fn create_or_replace(
        &self,
        request: Request<InstanceCredentialsRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(CredentialReconciler::create_or_replace(self, request.into_inner()).await)
    }

    #[instrument(skip(self, request))]
    async fn delete_if_exists(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(CredentialReconciler::delete_if_exists(self, request.into_inner()).await)
    }
}

#[tonic::async_trait]
impl CertManagerService for CertificateCleanup {
    #[instrument(skip(self, request))]
    async fn delete_if_exists(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(CertificateCleanup::delete_if_exists(self, request.into_inner()).await)
    }
}

#[tonic::async_trait]
impl ReadinessService for ReadinessProber {
    #[instrument(skip(self, request))]
    async fn check_if_ready(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(ReadinessProber::check_if_ready(self, request.into_inner()).await)
    }
}

#[tonic::async_trait]
impl InformationService for InformationResolver {
    #[instrument(skip(self, request))]
    async fn retrieve_service_ip(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<InfoServiceResponse> {
        respond(InformationResolver::retrieve_service_ip(self, request.into_inner()).await)
    }

    #[instrument(skip(self, request))]
    async fn check_service_exists(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<InfoServiceResponse> {
        respond(InformationResolver::check_service_exists(self, request.into_inner()).await)
    }
}

#[tonic::async_trait]
impl PodService for PodInspector {
    #[instrument(skip(self, request))]
    async fn retrieve_pod_list(
        &self,
        request: Request<InstanceRequest>,
    ) -> GrpcResult<PodListResponse> {
        respond(PodInspector::retrieve_pod_list(self, request.into_inner()).await)
    }

    #[instrument(skip(self, request))]
    async fn retrieve_pod_logs(
        &self,
        request: Request<PodRequest>,
    ) -> GrpcResult<PodLogsResponse> {
        respond(PodInspector::retrieve_pod_logs(self, request.into_inner()).await)
    }
}

#[tonic::async_trait]
impl NamespaceService for NamespaceProvisioner {
    #[instrument(skip(self, request))]
    async fn create_namespace(
        &self,
        request: Request<NamespaceRequest>,
    ) -> GrpcResult<ServiceResponse> {
        respond(NamespaceProvisioner::create_namespace(self, request.into_inner()).await)
    }
}

/// Every janitor service, ready to be served
pub struct Services {
    config: ConfigReconciler,
    basic_auth: CredentialReconciler,
    cert_manager: CertificateCleanup,
    readiness: ReadinessProber,
    information: InformationResolver,
    pod: PodInspector,
    namespace: NamespaceProvisioner,
}

impl Services {
    /// Build all services over shared cluster and repository clients
    pub fn new(cluster: Arc<dyn ClusterApi>, repository: Arc<dyn RepositoryApi>) -> Self {
        Self {
            config: ConfigReconciler::new(cluster.clone(), repository),
            basic_auth: CredentialReconciler::new(cluster.clone()),
            cert_manager: CertificateCleanup::new(cluster.clone()),
            readiness: ReadinessProber::new(cluster.clone()),
            information: InformationResolver::new(cluster.clone()),
            pod: PodInspector::new(cluster.clone()),
            namespace: NamespaceProvisioner::new(cluster),
        }
    }

    fn router(self) -> Router {
        Server::builder()
            .add_service(ConfigServiceServer::new(self.config))
            .add_service(BasicAuthServiceServer::new(self.basic_auth))
            .add_service(CertManagerServiceServer::new(self.cert_manager))
            .add_service(ReadinessServiceServer::new(self.readiness))
            .add_service(InformationServiceServer::new(self.information))
            .add_service(PodServiceServer::new(self.pod))
            .add_service(NamespaceServiceServer::new(self.namespace))
    }

    /// Serve plaintext gRPC on `addr` until `shutdown` resolves.
    ///
    /// In-flight calls are drained before returning.
    pub async fn serve<F>(self, addr: SocketAddr, shutdown: F) -> Result<(), Error>
    where
        F: Future<Output = ()>,
    {
        info!(%addr, "starting janitor gRPC server");
        self.router().serve_with_shutdown(addr, shutdown).await?;
        info!("janitor gRPC server stopped");
        Ok(())
    }
}
