//! GitLab REST v4 client
//!
//! Authenticates with a private token and follows GitLab's header based
//! pagination (`X-Next-Page`) so listings are complete regardless of size.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::{Group, Project, RepositoryApi, TreeNode, TreeOptions};
use crate::Error;

/// Page size requested from list endpoints (GitLab's maximum)
const PER_PAGE: &str = "100";

/// Header carrying the private token
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// Header carrying the next page number; empty on the last page
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// GitLab API client
#[derive(Clone, Debug)]
pub struct GitlabClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GitlabClient {
    /// Create a client for the API rooted at `base_url` (e.g. `https://gitlab.example.com/api/v4`)
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self, Error> {
        let base_url = Url::parse(base_url)
            .map_err(|e| Error::config(format!("invalid GitLab URL '{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "GitLab URL '{base_url}' cannot be used as a base"
            )));
        }

        let mut token_value = HeaderValue::from_str(token)
            .map_err(|_| Error::config("GitLab token contains invalid characters"))?;
        token_value.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token_value);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { http, base_url })
    }

    /// Build an endpoint URL from path segments; each segment is percent-encoded
    /// on its own, so file paths containing `/` become a single segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// GET every page of a list endpoint
    async fn get_all<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut page = 1u32;

        loop {
            trace!(%url, page, "fetching GitLab page");
            let page_param = page.to_string();
            let response = self
                .http
                .get(url.clone())
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page_param.as_str())])
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                return Err(Error::repository(format!("GET {url} returned HTTP {status}")));
            }

            let next_page = next_page(response.headers());
            let mut batch: Vec<T> = response.json().await?;
            items.append(&mut batch);

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Parse the `X-Next-Page` header; absent or empty means this was the last page
fn next_page(headers: &HeaderMap) -> Option<u32> {
    headers
        .get(NEXT_PAGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

#[async_trait]
impl RepositoryApi for GitlabClient {
    async fn search_groups(&self, search: &str) -> Result<Vec<Group>, Error> {
        let url = self.endpoint(&["groups"]);
        self.get_all(url, &[("search", search.to_string())]).await
    }

    async fn list_group_projects(&self, group_id: u64) -> Result<Vec<Project>, Error> {
        let url = self.endpoint(&["groups", &group_id.to_string(), "projects"]);
        self.get_all(url, &[]).await
    }

    async fn list_tree(
        &self,
        project_id: u64,
        options: TreeOptions,
    ) -> Result<Vec<TreeNode>, Error> {
        let url = self.endpoint(&["projects", &project_id.to_string(), "repository", "tree"]);

        let mut query = vec![("recursive", options.recursive.to_string())];
        if let Some(path) = options.path {
            query.push(("path", path));
        }
        if let Some(reference) = options.reference {
            query.push(("ref", reference));
        }

        let nodes: Vec<TreeNode> = self.get_all(url, &query).await?;
        debug!(project_id, entries = nodes.len(), "listed repository tree");
        Ok(nodes)
    }

    async fn raw_file(
        &self,
        project_id: u64,
        path: &str,
        reference: &str,
    ) -> Result<Vec<u8>, Error> {
        let url = self.endpoint(&[
            "projects",
            &project_id.to_string(),
            "repository",
            "files",
            path,
            "raw",
        ]);

        let response = self
            .http
            .get(url.clone())
            .query(&[("ref", reference)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::repository(format!("GET {url} returned HTTP {status}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}
