//! Folder/workflow items as returned by the n8n REST API.

use serde::{Deserialize, Serialize};

/// Project a workflow belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeProject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub project_type: Option<String>,
}

/// A folder node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub workflow_count: u32,
    #[serde(default)]
    pub sub_folder_count: u32,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
}

/// A workflow leaf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub parent_folder_id: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub home_project: Option<HomeProject>,
}

/// Resource discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Folder,
    Workflow,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Workflow => "workflow",
        }
    }
}

/// One entry of the mirrored tree.
///
/// On the wire, `"resource": "folder"` selects a folder; a missing
/// `resource` or `"workflow"` selects a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawItem", into = "RawItem")]
pub enum TreeItem {
    Folder(Folder),
    Workflow(Workflow),
}

impl TreeItem {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Folder(_) => ResourceKind::Folder,
            Self::Workflow(_) => ResourceKind::Workflow,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Folder(f) => &f.id,
            Self::Workflow(w) => &w.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Folder(f) => &f.name,
            Self::Workflow(w) => &w.name,
        }
    }

    pub fn parent_folder_id(&self) -> Option<&str> {
        match self {
            Self::Folder(f) => f.parent_folder_id.as_deref(),
            Self::Workflow(w) => w.parent_folder_id.as_deref(),
        }
    }

    /// Identity key, `resource:id`.
    pub fn key(&self) -> String {
        item_key(self.kind(), self.id())
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }

    pub fn as_folder(&self) -> Option<&Folder> {
        match self {
            Self::Folder(f) => Some(f),
            Self::Workflow(_) => None,
        }
    }

    pub fn as_workflow(&self) -> Option<&Workflow> {
        match self {
            Self::Workflow(w) => Some(w),
            Self::Folder(_) => None,
        }
    }
}

impl From<Folder> for TreeItem {
    fn from(folder: Folder) -> Self {
        Self::Folder(folder)
    }
}

impl From<Workflow> for TreeItem {
    fn from(workflow: Workflow) -> Self {
        Self::Workflow(workflow)
    }
}

/// Builds the `resource:id` identity key.
pub fn item_key(kind: ResourceKind, id: &str) -> String {
    format!("{}:{}", kind.as_str(), id)
}

/// Flat wire shape shared by both variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resource: Option<String>,
    id: String,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workflow_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub_folder_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    home_project: Option<HomeProject>,
}

impl TryFrom<RawItem> for TreeItem {
    type Error = String;

    fn try_from(raw: RawItem) -> Result<Self, Self::Error> {
        match raw.resource.as_deref() {
            Some("folder") => Ok(Self::Folder(Folder {
                id: raw.id,
                name: raw.name,
                workflow_count: raw.workflow_count.unwrap_or(0),
                sub_folder_count: raw.sub_folder_count.unwrap_or(0),
                parent_folder_id: raw.parent_folder_id,
            })),
            None | Some("workflow") => Ok(Self::Workflow(Workflow {
                id: raw.id,
                name: raw.name,
                parent_folder_id: raw.parent_folder_id,
                version_id: raw.version_id,
                home_project: raw.home_project,
            })),
            Some(other) => Err(format!("unknown resource type {other:?}")),
        }
    }
}

impl From<TreeItem> for RawItem {
    fn from(item: TreeItem) -> Self {
        match item {
            TreeItem::Folder(f) => RawItem {
                resource: Some("folder".to_string()),
                id: f.id,
                name: f.name,
                parent_folder_id: f.parent_folder_id,
                workflow_count: Some(f.workflow_count),
                sub_folder_count: Some(f.sub_folder_count),
                ..Default::default()
            },
            TreeItem::Workflow(w) => RawItem {
                resource: Some("workflow".to_string()),
                id: w.id,
                name: w.name,
                parent_folder_id: w.parent_folder_id,
                version_id: w.version_id,
                home_project: w.home_project,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_folder_from_api_json() {
        let item: TreeItem = serde_json::from_value(json!({
            "resource": "folder",
            "id": "f1",
            "name": "Sales",
            "workflowCount": 3,
            "subFolderCount": 1,
            "parentFolderId": null,
            "createdAt": "2025-01-01T00:00:00.000Z"
        }))
        .unwrap();

        assert_eq!(
            item,
            TreeItem::Folder(Folder {
                id: "f1".to_string(),
                name: "Sales".to_string(),
                workflow_count: 3,
                sub_folder_count: 1,
                parent_folder_id: None,
            })
        );
        assert_eq!(item.key(), "folder:f1");
    }

    #[test]
    fn test_missing_resource_is_workflow() {
        let item: TreeItem = serde_json::from_value(json!({
            "id": "w1",
            "name": "Sync CRM",
            "parentFolderId": "f1",
            "versionId": "v9",
            "homeProject": { "id": "p1", "name": "Team", "type": "team" },
            "active": true
        }))
        .unwrap();

        let workflow = item.as_workflow().unwrap();
        assert_eq!(workflow.version_id.as_deref(), Some("v9"));
        assert_eq!(workflow.home_project.as_ref().unwrap().id, "p1");
        assert_eq!(item.parent_folder_id(), Some("f1"));
        assert_eq!(item.key(), "workflow:w1");
    }

    #[test]
    fn test_unknown_resource_rejected() {
        let result: Result<TreeItem, _> =
            serde_json::from_value(json!({ "resource": "credential", "id": "c", "name": "x" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_serializes_with_resource_tag() {
        let item = TreeItem::Workflow(Workflow {
            id: "w1".to_string(),
            name: "A".to_string(),
            parent_folder_id: None,
            version_id: None,
            home_project: None,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json, json!({ "resource": "workflow", "id": "w1", "name": "A" }));
    }
}
