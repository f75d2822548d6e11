//! Tree source backed by the REST client.

use super::client::ApiClient;
use crate::tree::{ExpandedFolders, TreeItem, TreeSource};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Lists a project's root level plus the contents of every expanded folder.
///
/// Collapsed folders are not descended into, so their children never reach
/// the mirror.
pub struct ProjectTreeSource {
    client: Arc<ApiClient>,
    project_id: Option<String>,
    expanded: ExpandedFolders,
}

impl ProjectTreeSource {
    pub fn new(client: Arc<ApiClient>, project_id: Option<String>, expanded: ExpandedFolders) -> Self {
        Self {
            client,
            project_id,
            expanded,
        }
    }
}

#[async_trait]
impl TreeSource for ProjectTreeSource {
    async fn fetch_items(&self) -> Option<Vec<TreeItem>> {
        let expanded: HashSet<String> = self.expanded.expanded_ids().into_iter().collect();
        let mut visited = HashSet::new();
        let mut queue: VecDeque<Option<String>> = VecDeque::from([None]);
        let mut items = Vec::new();

        while let Some(parent) = queue.pop_front() {
            let level = self
                .client
                .list_tree_items(self.project_id.as_deref(), parent.as_deref())
                .await?;

            for mut item in level {
                if let Some(parent) = &parent {
                    fill_parent(&mut item, parent);
                }
                if let TreeItem::Folder(folder) = &item {
                    if expanded.contains(&folder.id) && visited.insert(folder.id.clone()) {
                        queue.push_back(Some(folder.id.clone()));
                    }
                }
                items.push(item);
            }
        }

        tracing::trace!(count = items.len(), "Fetched tree items");
        Some(items)
    }
}

/// Items listed under a folder sometimes omit `parentFolderId`.
fn fill_parent(item: &mut TreeItem, parent: &str) {
    let slot = match item {
        TreeItem::Folder(f) => &mut f.parent_folder_id,
        TreeItem::Workflow(w) => &mut w.parent_folder_id,
    };
    if slot.is_none() {
        *slot = Some(parent.to_string());
    }
}
