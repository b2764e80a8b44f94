//! GitLab access for the configuration repository
//!
//! Instance configuration lives in a GitLab project named after the instance
//! uid, inside a group named after the instance domain. The janitor only
//! reads: group search, group project listing, tree listing and raw file
//! download. [`RepositoryApi`] is the seam; [`GitlabClient`] talks to the
//! GitLab REST v4 API.

mod client;

pub use client::GitlabClient;

use async_trait::async_trait;
use serde::Deserialize;

#[cfg(test)]
use mockall::automock;

use crate::Error;

/// A GitLab group (only the fields we use)
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Group {
    /// Numeric group id
    pub id: u64,
    /// Display name, matched against the instance domain
    pub name: String,
    /// Path including parent groups
    #[serde(default)]
    pub full_path: String,
}

/// A GitLab project (only the fields we use)
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// Numeric project id
    pub id: u64,
    /// Project name, matched against the instance uid
    pub name: String,
    /// `group/project` path
    #[serde(default)]
    pub path_with_namespace: String,
}

/// Kind of a repository tree entry
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TreeNodeKind {
    /// Regular file
    Blob,
    /// Directory
    Tree,
    /// Submodule
    Commit,
    /// Anything GitLab may add later
    #[serde(other)]
    Other,
}

/// One entry of a repository tree listing
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct TreeNode {
    /// Object SHA
    pub id: String,
    /// Base name of the entry
    pub name: String,
    /// Entry kind, `type` on the wire
    #[serde(rename = "type")]
    pub kind: TreeNodeKind,
    /// Path from the repository root
    pub path: String,
    /// Git file mode such as `100644`
    #[serde(default)]
    pub mode: String,
}

impl TreeNode {
    /// Whether this entry is a regular file
    pub fn is_blob(&self) -> bool {
        self.kind == TreeNodeKind::Blob
    }

    /// Whether this entry is a directory
    pub fn is_tree(&self) -> bool {
        self.kind == TreeNodeKind::Tree
    }
}

/// Options for a tree listing
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeOptions {
    /// Directory to list; `None` lists the repository root
    pub path: Option<String>,
    /// Descend into subdirectories
    pub recursive: bool,
    /// Branch, tag or commit; `None` uses the default branch
    pub reference: Option<String>,
}

impl TreeOptions {
    /// Root listing, non-recursive
    pub fn root(reference: &str) -> Self {
        Self {
            path: None,
            recursive: false,
            reference: Some(reference.to_string()),
        }
    }

    /// Recursive listing from `path` (the root when `None`)
    pub fn recursive(path: Option<&str>, reference: &str) -> Self {
        Self {
            path: path.map(str::to_string),
            recursive: true,
            reference: Some(reference.to_string()),
        }
    }
}

/// Trait abstracting the GitLab operations the janitor needs
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RepositoryApi: Send + Sync {
    /// Search groups whose name or path matches `search`
    async fn search_groups(&self, search: &str) -> Result<Vec<Group>, Error>;

    /// List all projects of a group
    async fn list_group_projects(&self, group_id: u64) -> Result<Vec<Project>, Error>;

    /// List repository tree entries
    async fn list_tree(&self, project_id: u64, options: TreeOptions)
        -> Result<Vec<TreeNode>, Error>;

    /// Download a file's raw bytes at the given reference
    async fn raw_file(&self, project_id: u64, path: &str, reference: &str)
        -> Result<Vec<u8>, Error>;
}
