//! Namespace provisioning against a real API server

use std::collections::HashMap;

use k8s_openapi::api::core::v1::Namespace;
use kube::Api;

use janitor::proto::{NamespaceRequest, Status};
use janitor::service::NamespaceProvisioner;

use super::helpers::{cluster, delete_namespace, unique_name};

/// Story: a fresh namespace is created with its annotations, and asking again
/// reports the conflict instead of pretending success
#[tokio::test]
#[ignore]
async fn story_namespace_is_created_once() {
    let (client, api) = cluster().await;
    let name = unique_name("janitor-ns");
    let provisioner = NamespaceProvisioner::new(api);

    let request = NamespaceRequest {
        api: "v1".to_string(),
        namespace: name.clone(),
        annotations: HashMap::from([("team".to_string(), "platform".to_string())]),
    };

    let created = provisioner
        .create_namespace(request.clone())
        .await
        .expect("first create should succeed");
    assert_eq!(created.status(), Status::Ok);

    let namespace = Api::<Namespace>::all(client.clone())
        .get(&name)
        .await
        .expect("namespace should exist");
    let annotations = namespace.metadata.annotations.unwrap_or_default();
    assert_eq!(annotations.get("team").map(String::as_str), Some("platform"));

    let conflict = provisioner
        .create_namespace(request)
        .await
        .expect_err("second create should conflict");
    let body = conflict.response.expect("conflict carries a body");
    assert_eq!(body.status(), Status::Failed);
    assert_eq!(conflict.error.code(), tonic::Code::AlreadyExists);

    delete_namespace(&client, &name).await;
}
