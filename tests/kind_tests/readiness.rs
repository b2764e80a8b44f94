//! Workload readiness against a real API server

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{Container, Namespace, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use kube::api::{ObjectMeta, PostParams};
use kube::Api;

use janitor::proto::{InstanceRequest, Status};
use janitor::service::ReadinessProber;

use super::helpers::{cluster, delete_namespace, instance, unique_name};

fn scaled_down_deployment(name: &str) -> Deployment {
    let labels = BTreeMap::from([("app".to_string(), name.to_string())]);
    Deployment {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(0),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![Container {
                        name: "app".to_string(),
                        image: Some("nginx:alpine".to_string()),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Story: an instance without workloads is a failure, and a Deployment scaled
/// to zero counts as ready
#[tokio::test]
#[ignore]
async fn story_readiness_follows_workloads() {
    let (client, api) = cluster().await;
    let namespace = unique_name("janitor-ready");
    Api::<Namespace>::all(client.clone())
        .create(
            &PostParams::default(),
            &Namespace {
                metadata: ObjectMeta {
                    name: Some(namespace.clone()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .expect("namespace should be created");

    let prober = ReadinessProber::new(api);
    let request = InstanceRequest {
        api: "v1".to_string(),
        deployment: Some(instance(&namespace, "web-1")),
    };

    let missing = prober
        .check_if_ready(request.clone())
        .await
        .expect_err("no workload exists yet");
    assert_eq!(
        missing.response.expect("failure carries a body").status(),
        Status::Failed
    );

    Api::<Deployment>::namespaced(client.clone(), &namespace)
        .create(&PostParams::default(), &scaled_down_deployment("web-1"))
        .await
        .expect("deployment should be created");

    let ready = prober
        .check_if_ready(request)
        .await
        .expect("deployment should be found");
    assert_eq!(ready.status(), Status::Ok);

    delete_namespace(&client, &namespace).await;
}
