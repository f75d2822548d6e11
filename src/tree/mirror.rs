//! In-memory mirror of the remote tree.

use super::diff::{compute_diff, TreeDiff};
use super::types::TreeItem;
use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

const UPDATE_CHANNEL_CAPACITY: usize = 64;

/// Last known snapshot plus a broadcast of every non-empty diff.
pub struct TreeMirror {
    items: RwLock<Vec<TreeItem>>,
    last_updated: RwLock<Option<DateTime<Utc>>>,
    updates: broadcast::Sender<TreeDiff>,
}

impl Default for TreeMirror {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeMirror {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            items: RwLock::new(Vec::new()),
            last_updated: RwLock::new(None),
            updates,
        }
    }

    /// Replaces the snapshot with `items` and returns what changed.
    ///
    /// Non-empty diffs are published to subscribers.
    pub fn apply(&self, items: Vec<TreeItem>) -> TreeDiff {
        let diff = {
            let mut current = self.items.write().unwrap_or_else(PoisonError::into_inner);
            let diff = compute_diff(&current, &items);
            *current = items;
            diff
        };
        *self
            .last_updated
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());

        if diff.has_differences() {
            tracing::debug!(
                added = diff.added.len(),
                removed = diff.removed.len(),
                modified = diff.modified.len(),
                "Tree changed"
            );
            // No subscribers is fine.
            let _ = self.updates.send(diff.clone());
        }
        diff
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeDiff> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> Vec<TreeItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        *self
            .last_updated
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up an item by identity key.
    pub fn get(&self, key: &str) -> Option<TreeItem> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|item| item.key() == key)
            .cloned()
    }

    /// Direct children of `parent` (`None` = root): folders first, then
    /// workflows, each by case-insensitive name.
    pub fn children_of(&self, parent: Option<&str>) -> Vec<TreeItem> {
        let mut children: Vec<TreeItem> = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|item| item.parent_folder_id() == parent)
            .cloned()
            .collect();
        children.sort_by(|a, b| {
            b.is_folder()
                .cmp(&a.is_folder())
                .then_with(|| a.name().to_lowercase().cmp(&b.name().to_lowercase()))
        });
        children
    }
}
