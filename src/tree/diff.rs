//! Snapshot diffing for the mirrored tree.

use super::types::TreeItem;
use serde::Serialize;
use std::collections::HashMap;

/// Added/removed/modified partition between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeDiff {
    pub added: Vec<TreeItem>,
    /// Ids of items that disappeared.
    pub removed: Vec<String>,
    /// `resource:id` keys of the same items, parallel to `removed`. Tells a
    /// folder and a workflow sharing an id apart.
    pub removed_keys: Vec<String>,
    pub modified: Vec<TreeItem>,
}

impl TreeDiff {
    pub fn has_differences(&self) -> bool {
        !self.added.is_empty() || !self.removed.is_empty() || !self.modified.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_differences()
    }
}

/// Key → item map in first-insertion order, later duplicates replacing the
/// value in place.
struct Keyed<'a> {
    order: Vec<String>,
    items: HashMap<String, &'a TreeItem>,
}

impl<'a> Keyed<'a> {
    fn new(items: &'a [TreeItem]) -> Self {
        let mut order = Vec::with_capacity(items.len());
        let mut map = HashMap::with_capacity(items.len());
        for item in items {
            let key = item.key();
            if map.insert(key.clone(), item).is_none() {
                order.push(key);
            }
        }
        Self { order, items: map }
    }

    fn iter(&self) -> impl Iterator<Item = (&String, &'a TreeItem)> + '_ {
        self.order.iter().map(move |k| (k, self.items[k]))
    }
}

/// Whether two items with the same key differ in a tracked field.
///
/// Tracked: name, parent folder, and for folders the two counts.
pub fn is_modified(old: &TreeItem, new: &TreeItem) -> bool {
    if old.name() != new.name() || old.parent_folder_id() != new.parent_folder_id() {
        return true;
    }
    match (old, new) {
        (TreeItem::Folder(a), TreeItem::Folder(b)) => {
            a.workflow_count != b.workflow_count || a.sub_folder_count != b.sub_folder_count
        }
        _ => false,
    }
}

/// Computes the diff from `old` to `new`.
///
/// `added` and `modified` follow the order of `new`; `removed` follows the
/// order of `old`.
pub fn compute_diff(old: &[TreeItem], new: &[TreeItem]) -> TreeDiff {
    let old_map = Keyed::new(old);
    let new_map = Keyed::new(new);
    let mut diff = TreeDiff::default();

    for (key, item) in new_map.iter() {
        match old_map.items.get(key) {
            None => diff.added.push(item.clone()),
            Some(previous) if is_modified(previous, item) => diff.modified.push(item.clone()),
            Some(_) => {}
        }
    }

    for (key, item) in old_map.iter() {
        if !new_map.items.contains_key(key) {
            diff.removed.push(item.id().to_string());
            diff.removed_keys.push(key.clone());
        }
    }

    diff
}
