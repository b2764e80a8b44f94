//! Configuration tree mapping
//!
//! Resolves the GitLab project backing an instance and turns its repository
//! tree into a [`ConfigTree`]: files at the repository root are grouped under
//! `""`, files below each directory are grouped under the directory's name.
//! Each group later becomes one ConfigMap.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::gitlab::{RepositoryApi, TreeNode, TreeOptions};
use crate::Error;

/// Reference every configuration file is read from
pub const CONFIG_REFERENCE: &str = "master";

/// Message when the domain does not resolve to exactly one group
pub const GROUP_NOT_FOUND: &str = "Gitlab Group for given domain does not exist";

/// Message when the group holds no project named after the instance
pub const PROJECT_NOT_FOUND: &str = "Project containing config not found on Gitlab";

/// Message when a tree listing fails
pub const TREE_LISTING_FAILED: &str = "Error while listing repository tree";

/// Message when a file download fails
pub const FILE_READ_FAILED: &str = "Error while reading file from Gitlab!";

/// Files of one directory, by file name
pub type Files = BTreeMap<String, Vec<u8>>;

/// Repository contents grouped by directory name; the root is `""`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfigTree {
    directories: BTreeMap<String, Files>,
}

impl ConfigTree {
    /// Files stored directly in the repository root
    pub fn root(&self) -> Option<&Files> {
        self.directories.get("")
    }

    /// Files grouped under `name`
    pub fn directory(&self, name: &str) -> Option<&Files> {
        self.directories.get(name)
    }

    /// Groups in order: root first, then directories lexicographically
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Files)> {
        self.directories.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.directories.len()
    }

    /// Whether the tree has no groups at all
    pub fn is_empty(&self) -> bool {
        self.directories.is_empty()
    }

    fn insert(&mut self, directory: String, files: Files) {
        // Directories sharing a base name at different depths collapse into one
        // group; the last one listed wins.
        self.directories.insert(directory, files);
    }
}

/// Find the id of the project named `uid` in the group matching `domain`.
pub async fn resolve_project(
    repository: &dyn RepositoryApi,
    domain: &str,
    uid: &str,
) -> Result<u64, Error> {
    let groups = match repository.search_groups(domain).await {
        Ok(groups) => groups,
        Err(e) => {
            warn!(%domain, error = %e, "group search failed");
            return Err(Error::not_found(GROUP_NOT_FOUND));
        }
    };
    let [group] = groups.as_slice() else {
        debug!(%domain, matches = groups.len(), "domain does not resolve to one group");
        return Err(Error::not_found(GROUP_NOT_FOUND));
    };

    let projects = match repository.list_group_projects(group.id).await {
        Ok(projects) => projects,
        Err(e) => {
            warn!(%domain, group_id = group.id, error = %e, "project listing failed");
            return Err(Error::not_found(PROJECT_NOT_FOUND));
        }
    };

    projects
        .iter()
        .find(|p| p.name == uid)
        .map(|p| p.id)
        .ok_or_else(|| Error::not_found(PROJECT_NOT_FOUND))
}

/// Read the whole repository of `project_id` into a [`ConfigTree`].
///
/// Any listing or download failure aborts the build.
pub async fn build_tree(repository: &dyn RepositoryApi, project_id: u64) -> Result<ConfigTree, Error> {
    let mut tree = ConfigTree::default();

    let root = list(repository, project_id, TreeOptions::root(CONFIG_REFERENCE)).await?;
    tree.insert(String::new(), fetch_blobs(repository, project_id, &root).await?);

    let everything = list(
        repository,
        project_id,
        TreeOptions::recursive(None, CONFIG_REFERENCE),
    )
    .await?;

    for directory in everything.iter().filter(|node| node.is_tree()) {
        let nodes = list(
            repository,
            project_id,
            TreeOptions::recursive(Some(&directory.path), CONFIG_REFERENCE),
        )
        .await?;
        let files = fetch_blobs(repository, project_id, &nodes).await?;
        tree.insert(directory.name.clone(), files);
    }

    debug!(project_id, groups = tree.len(), "built configuration tree");
    Ok(tree)
}

async fn list(
    repository: &dyn RepositoryApi,
    project_id: u64,
    options: TreeOptions,
) -> Result<Vec<TreeNode>, Error> {
    repository
        .list_tree(project_id, options.clone())
        .await
        .map_err(|e| {
            warn!(project_id, path = ?options.path, error = %e, "tree listing failed");
            Error::internal(TREE_LISTING_FAILED)
        })
}

async fn fetch_blobs(
    repository: &dyn RepositoryApi,
    project_id: u64,
    nodes: &[TreeNode],
) -> Result<Files, Error> {
    let mut files = Files::new();
    for node in nodes.iter().filter(|node| node.is_blob()) {
        let content = repository
            .raw_file(project_id, &node.path, CONFIG_REFERENCE)
            .await
            .map_err(|e| {
                warn!(project_id, path = %node.path, error = %e, "file download failed");
                Error::internal(FILE_READ_FAILED)
            })?;
        files.insert(node.name.clone(), content);
    }
    Ok(files)
}
