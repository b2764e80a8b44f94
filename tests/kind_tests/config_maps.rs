//! Configuration ConfigMaps against a real API server

use std::sync::Arc;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ListParams;
use kube::Api;

use janitor::proto::{InstanceRequest, Status};
use janitor::service::ConfigReconciler;

use super::helpers::{cluster, delete_namespace, instance, unique_name, StaticRepository};

/// Story: a repository with a root file and one directory becomes two
/// ConfigMaps, reapplying keeps them, and cleanup removes exactly those
#[tokio::test]
#[ignore]
async fn story_repository_becomes_config_maps() {
    let (client, api) = cluster().await;
    let namespace = unique_name("janitor-config");
    let repository = Arc::new(StaticRepository::new(
        "grafana-1",
        &[
            ("grafana.ini", "[server]\nhttp_port = 3000\n"),
            ("dashboards/home.json", "{\"title\": \"Home\"}"),
        ],
    ));
    let reconciler = ConfigReconciler::new(api, repository);
    let request = InstanceRequest {
        api: "v1".to_string(),
        deployment: Some(instance(&namespace, "grafana-1")),
    };

    let created = reconciler
        .create_or_replace(request.clone())
        .await
        .expect("create should succeed");
    assert_eq!(created.status(), Status::Ok);

    let config_maps = Api::<ConfigMap>::namespaced(client.clone(), &namespace);
    let root = config_maps.get("grafana-1").await.expect("root ConfigMap");
    assert!(root.data.unwrap_or_default().contains_key("grafana.ini"));
    let dashboards = config_maps
        .get("grafana-1-dashboards")
        .await
        .expect("directory ConfigMap");
    assert!(dashboards.data.unwrap_or_default().contains_key("home.json"));

    let replaced = reconciler
        .create_or_replace(request.clone())
        .await
        .expect("replace should succeed");
    assert_eq!(replaced.message, "ConfigMap created successfully");

    let removed = reconciler
        .delete_if_exists(request)
        .await
        .expect("delete should succeed");
    assert_eq!(removed.status(), Status::Ok);

    let remaining = config_maps
        .list(&ListParams::default())
        .await
        .expect("list should succeed");
    assert!(remaining
        .items
        .iter()
        .filter_map(|cm| cm.metadata.name.as_deref())
        .all(|name| !name.starts_with("grafana-1")));

    delete_namespace(&client, &namespace).await;
}
