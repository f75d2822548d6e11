//! HTTP client for the n8n REST API.
//!
//! Responses are `{ "data": T }` envelopes. Every public call is
//! best-effort: failures are logged at debug level and surface as `None` or
//! `false`.

use super::cache::TtlCache;
use crate::config::Config;
use crate::error::{N8nTreeError, Result};
use crate::tree::{HomeProject, TreeItem};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::time::Duration;

/// `parentFolderId` filter value for a project's root level.
pub const ROOT_FOLDER_FILTER: &str = "0";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Guards folder path walks against cycles in bad data.
const MAX_FOLDER_DEPTH: usize = 32;

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentFolderRef {
    pub id: String,
}

/// Folder as returned by the single-folder endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderDetails {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub parent_folder: Option<ParentFolderRef>,
}

impl FolderDetails {
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_folder_id
            .as_deref()
            .or_else(|| self.parent_folder.as_ref().map(|p| p.id.as_str()))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkflowDetails {
    #[serde(default)]
    home_project: Option<HomeProject>,
}

/// n8n REST client with folder path and workflow project caches.
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
    folder_paths: TtlCache<String, Vec<FolderDetails>>,
    workflow_projects: TtlCache<String, String>,
}

impl ApiClient {
    pub fn new(base_url: &str, auth_cookie: Option<&str>, cache_ttl: Duration) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| N8nTreeError::config(format!("base_url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(N8nTreeError::config(format!(
                "base_url {base_url:?} cannot be a base URL"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = auth_cookie {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| N8nTreeError::config(format!("auth_cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base,
            folder_paths: TtlCache::new(cache_ttl),
            workflow_projects: TtlCache::new(cache_ttl),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.base_url,
            config.auth_cookie.as_deref(),
            config.cache_ttl,
        )
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(N8nTreeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let envelope: Envelope<T> = response.json().await?;
        Ok(envelope.data)
    }

    async fn patch(&self, url: Url, body: &Value) -> Result<()> {
        let response = self.http.patch(url.clone()).json(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(N8nTreeError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }

    /// Lists one level of the tree: folders and workflows directly under
    /// `parent_folder_id` (`None` = project root).
    ///
    /// Items that do not parse as a folder or workflow are skipped.
    pub async fn list_tree_items(
        &self,
        project_id: Option<&str>,
        parent_folder_id: Option<&str>,
    ) -> Option<Vec<TreeItem>> {
        let mut filter = json!({
            "parentFolderId": parent_folder_id.unwrap_or(ROOT_FOLDER_FILTER),
        });
        if let Some(project_id) = project_id {
            filter["projectId"] = Value::String(project_id.to_string());
        }

        let mut url = self.endpoint(&["rest", "workflows"]);
        url.query_pairs_mut()
            .append_pair("includeFolders", "true")
            .append_pair("filter", &filter.to_string());

        let raw: Vec<Value> = log_failure("list tree items", self.get_data(url).await)?;
        let items = raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<TreeItem>(value) {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unrecognized tree item");
                    None
                }
            })
            .collect();
        Some(items)
    }

    /// Fetches one folder, through the project route when the project is
    /// known.
    pub async fn get_folder(
        &self,
        project_id: Option<&str>,
        folder_id: &str,
    ) -> Option<FolderDetails> {
        let url = match project_id {
            Some(project_id) => self.endpoint(&["rest", "projects", project_id, "folders", folder_id]),
            None => self.endpoint(&["rest", "folders", folder_id]),
        };
        log_failure("get folder", self.get_data(url).await)
    }

    /// Root-to-leaf chain of folders ending at `folder_id`.
    pub async fn folder_path(
        &self,
        project_id: Option<&str>,
        folder_id: &str,
    ) -> Option<Vec<FolderDetails>> {
        let cache_key = format!("{}:{}", project_id.unwrap_or_default(), folder_id);
        if let Some(path) = self.folder_paths.get(&cache_key) {
            return Some(path);
        }

        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(folder_id.to_string());

        while let Some(id) = next {
            if path.len() >= MAX_FOLDER_DEPTH || !seen.insert(id.clone()) {
                tracing::debug!(folder = %folder_id, "Folder parent chain loops or is too deep");
                return None;
            }
            let folder = self.get_folder(project_id, &id).await?;
            next = folder.parent_id().map(str::to_string);
            path.push(folder);
        }

        path.reverse();
        self.folder_paths.insert(cache_key, path.clone());
        Some(path)
    }

    /// Project that owns a workflow.
    pub async fn workflow_project_id(&self, workflow_id: &str) -> Option<String> {
        let key = workflow_id.to_string();
        if let Some(project_id) = self.workflow_projects.get(&key) {
            return Some(project_id);
        }

        let url = self.endpoint(&["rest", "workflows", workflow_id]);
        let details: WorkflowDetails = log_failure("get workflow", self.get_data(url).await)?;
        let project_id = details.home_project?.id;
        self.workflow_projects.insert(key, project_id.clone());
        Some(project_id)
    }

    /// Moves a workflow into `folder_id` (`None` = project root).
    pub async fn move_workflow(
        &self,
        workflow_id: &str,
        folder_id: Option<&str>,
        version_id: &str,
    ) -> bool {
        let url = self.endpoint(&["rest", "workflows", workflow_id]);
        let body = json!({
            "parentFolderId": folder_id,
            "versionId": version_id,
        });

        let moved = log_failure("move workflow", self.patch(url, &body).await).is_some();
        if moved {
            tracing::info!(workflow = %workflow_id, folder = ?folder_id, "Workflow moved");
        }
        moved
    }

    pub fn clear_caches(&self) {
        self.folder_paths.clear();
        self.workflow_projects.clear();
    }
}

fn log_failure<T>(operation: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(operation, error = %e, "API call failed");
            None
        }
    }
}
