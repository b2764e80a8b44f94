//! Shared fixtures for the cluster tests

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::api::{Api, DeleteParams};
use kube::Client;
use rand::Rng;

use janitor::gitlab::{Group, Project, RepositoryApi, TreeNode, TreeNodeKind, TreeOptions};
use janitor::kube_client::{ClusterApi, KubeClusterApi};
use janitor::proto::Instance;
use janitor::Error;

/// Connect to the cluster from the current kubeconfig
pub async fn cluster() -> (Client, Arc<dyn ClusterApi>) {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let client = Client::try_default()
        .await
        .expect("a Kubernetes cluster must be reachable");
    let api: Arc<dyn ClusterApi> = Arc::new(KubeClusterApi::new(client.clone()));
    (client, api)
}

/// A namespace name nobody else uses
pub fn unique_name(prefix: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(10_000..100_000);
    format!("{prefix}-{suffix}")
}

/// Instance living in `namespace`
pub fn instance(namespace: &str, uid: &str) -> Instance {
    Instance {
        namespace: namespace.to_string(),
        uid: uid.to_string(),
        domain: "tenant-a".to_string(),
    }
}

/// Delete a namespace created by a test
pub async fn delete_namespace(client: &Client, name: &str) {
    let api: Api<Namespace> = Api::all(client.clone());
    let _ = api.delete(name, &DeleteParams::default()).await;
}

/// In-memory repository: group `tenant-a`, project `uid`, files by path
pub struct StaticRepository {
    uid: String,
    files: BTreeMap<String, Vec<u8>>,
}

impl StaticRepository {
    pub fn new(uid: &str, files: &[(&str, &str)]) -> Self {
        Self {
            uid: uid.to_string(),
            files: files
                .iter()
                .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
                .collect(),
        }
    }

    fn node(path: &str, kind: TreeNodeKind) -> TreeNode {
        TreeNode {
            id: path.to_string(),
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            kind,
            path: path.to_string(),
            mode: String::new(),
        }
    }

    fn directories(&self) -> Vec<String> {
        let mut dirs: Vec<String> = self
            .files
            .keys()
            .filter_map(|path| path.rsplit_once('/').map(|(dir, _)| dir.to_string()))
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

#[async_trait]
impl RepositoryApi for StaticRepository {
    async fn search_groups(&self, search: &str) -> Result<Vec<Group>, Error> {
        Ok((search == "tenant-a")
            .then(|| Group {
                id: 1,
                name: "tenant-a".to_string(),
                full_path: "tenant-a".to_string(),
            })
            .into_iter()
            .collect())
    }

    async fn list_group_projects(&self, _group_id: u64) -> Result<Vec<Project>, Error> {
        Ok(vec![Project {
            id: 2,
            name: self.uid.clone(),
            path_with_namespace: format!("tenant-a/{}", self.uid),
        }])
    }

    async fn list_tree(&self, _project_id: u64, options: TreeOptions) -> Result<Vec<TreeNode>, Error> {
        let prefix = options.path.map(|p| format!("{p}/")).unwrap_or_default();
        let in_scope = |path: &str| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| options.recursive || !rest.contains('/'))
        };

        let mut nodes: Vec<TreeNode> = self
            .directories()
            .iter()
            .filter(|dir| in_scope(dir))
            .map(|dir| Self::node(dir, TreeNodeKind::Tree))
            .collect();
        nodes.extend(
            self.files
                .keys()
                .filter(|path| in_scope(path))
                .map(|path| Self::node(path, TreeNodeKind::Blob)),
        );
        Ok(nodes)
    }

    async fn raw_file(&self, _project_id: u64, path: &str, _reference: &str) -> Result<Vec<u8>, Error> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::repository(format!("no file {path}")))
    }
}
