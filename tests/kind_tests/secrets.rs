//! Basic-auth Secret lifecycle against a real API server

use k8s_openapi::api::core::v1::Secret;
use kube::Api;

use janitor::proto::{Credentials, InstanceCredentialsRequest, InstanceRequest, Status};
use janitor::service::CredentialReconciler;

use super::helpers::{cluster, delete_namespace, instance, unique_name};

async fn stored_auth(client: &kube::Client, namespace: &str, name: &str) -> Vec<u8> {
    let secret = Api::<Secret>::namespaced(client.clone(), namespace)
        .get(name)
        .await
        .expect("secret should exist");
    secret
        .data
        .and_then(|mut data| data.remove("auth"))
        .map(|bytes| bytes.0)
        .expect("secret should carry an auth key")
}

/// Story: credentials become an htpasswd Secret, re-submitting them rotates
/// the hash, and deleting twice is harmless
#[tokio::test]
#[ignore]
async fn story_basic_auth_secret_lifecycle() {
    let (client, api) = cluster().await;
    let namespace = unique_name("janitor-auth");
    let reconciler = CredentialReconciler::new(api);

    let request = InstanceCredentialsRequest {
        api: "v1".to_string(),
        instance: Some(instance(&namespace, "grafana-1")),
        credentials: Some(Credentials {
            user: "admin".to_string(),
            password: "s3cret".to_string(),
        }),
    };

    let created = reconciler
        .create_or_replace(request.clone())
        .await
        .expect("create should succeed");
    assert_eq!(created.status(), Status::Ok);
    let first = stored_auth(&client, &namespace, "grafana-1-auth").await;
    assert!(String::from_utf8_lossy(&first).starts_with("admin:$apr1$"));

    let updated = reconciler
        .create_or_replace(request)
        .await
        .expect("update should succeed");
    assert_eq!(updated.status(), Status::Ok);
    let second = stored_auth(&client, &namespace, "grafana-1-auth").await;
    assert_ne!(first, second, "every write draws a new salt");

    let delete = InstanceRequest {
        api: "v1".to_string(),
        deployment: Some(instance(&namespace, "grafana-1")),
    };
    let removed = reconciler
        .delete_if_exists(delete.clone())
        .await
        .expect("delete should succeed");
    assert_eq!(removed.message, "Secret deleted successfully");

    let again = reconciler
        .delete_if_exists(delete)
        .await
        .expect("second delete should succeed");
    assert_eq!(again.message, "Secret does not exist");

    delete_namespace(&client, &namespace).await;
}
