//! Persisted expand/collapse state of sidebar folders.
//!
//! Stored as one JSON object (`{"<folderId>": true, ...}`) under
//! [`EXPANDED_STORAGE_KEY`]. Collapsed folders have no entry.

use crate::storage::KeyValueStore;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Storage key of the expanded-folder map.
pub const EXPANDED_STORAGE_KEY: &str = "n8ntree-expanded";

/// Expanded-folder set backed by a key-value store.
///
/// Clones share one write lock, so their read-modify-write updates of the
/// stored map do not overwrite each other.
#[derive(Clone)]
pub struct ExpandedFolders {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl ExpandedFolders {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn writer(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Reads the stored map. Missing, unreadable or non-object values read
    /// as empty.
    fn load(&self) -> Map<String, Value> {
        let raw = match self.store.get_item(EXPANDED_STORAGE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Map::new(),
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read expanded folders");
                return Map::new();
            }
        };
        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                tracing::debug!("Expanded folder state is not an object, ignoring");
                Map::new()
            }
            Err(e) => {
                tracing::debug!(error = %e, "Expanded folder state is not valid JSON, ignoring");
                Map::new()
            }
        }
    }

    fn save(&self, map: &Map<String, Value>) -> bool {
        let encoded = match serde_json::to_string(map) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to encode expanded folders");
                return false;
            }
        };
        match self.store.set_item(EXPANDED_STORAGE_KEY, &encoded) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to persist expanded folders");
                false
            }
        }
    }

    pub fn is_folder_expanded(&self, folder_id: &str) -> bool {
        self.load()
            .get(folder_id)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Records the state. Collapsing deletes the entry instead of storing
    /// `false`. Returns false if the state could not be persisted.
    pub fn set_folder_expanded(&self, folder_id: &str, expanded: bool) -> bool {
        let _write = self.writer();
        self.store_state(folder_id, expanded)
    }

    fn store_state(&self, folder_id: &str, expanded: bool) -> bool {
        let mut map = self.load();
        if expanded {
            map.insert(folder_id.to_string(), Value::Bool(true));
        } else {
            map.remove(folder_id);
        }
        self.save(&map)
    }

    /// Flips the state and returns the stored value: the new one, or the
    /// old one if the flip could not be persisted.
    pub fn toggle_folder(&self, folder_id: &str) -> bool {
        let _write = self.writer();
        let current = self.is_folder_expanded(folder_id);
        if self.store_state(folder_id, !current) {
            !current
        } else {
            tracing::debug!(folder = folder_id, "Folder toggle not persisted");
            current
        }
    }

    /// Ids of all expanded folders, sorted.
    pub fn expanded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .load()
            .into_iter()
            .filter(|(_, v)| v.as_bool() == Some(true))
            .map(|(k, _)| k)
            .collect();
        ids.sort();
        ids
    }

    pub fn collapse_all(&self) -> bool {
        let _write = self.writer();
        match self.store.remove_item(EXPANDED_STORAGE_KEY) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "Failed to clear expanded folders");
                false
            }
        }
    }
}
