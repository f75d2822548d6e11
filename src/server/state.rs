//! Shared application state for the HTTP server.

use crate::dom::HostPage;
use crate::sidebar::Sidebar;
use crate::storage::LocalStorage;
use crate::tree::{ExpandedFolders, TreeDiff, TreeMirror, TreeSync};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sync: Arc<TreeSync>,
    pub expanded: ExpandedFolders,
    pub sidebar: Arc<Sidebar>,
    /// Input posted to `/api/activity` is dispatched here.
    pub page: HostPage,
    pub storage: LocalStorage,
}

impl AppState {
    pub fn new(
        sync: Arc<TreeSync>,
        expanded: ExpandedFolders,
        sidebar: Arc<Sidebar>,
        page: HostPage,
        storage: LocalStorage,
    ) -> Self {
        Self {
            sync,
            expanded,
            sidebar,
            page,
            storage,
        }
    }

    pub fn mirror(&self) -> &Arc<TreeMirror> {
        self.sync.mirror()
    }

    /// Subscribe to tree diffs.
    pub fn subscribe(&self) -> broadcast::Receiver<TreeDiff> {
        self.mirror().subscribe()
    }
}
