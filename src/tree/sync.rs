//! Refresh loop glue: fetch the remote tree, diff it into the mirror.

use super::diff::TreeDiff;
use super::mirror::TreeMirror;
use super::types::TreeItem;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Anything that can produce the current item list.
///
/// `None` means the fetch failed; the mirror keeps its previous snapshot.
#[async_trait]
pub trait TreeSource: Send + Sync {
    async fn fetch_items(&self) -> Option<Vec<TreeItem>>;
}

/// Pairs a [`TreeSource`] with a [`TreeMirror`].
pub struct TreeSync {
    source: Arc<dyn TreeSource>,
    mirror: Arc<TreeMirror>,
    in_flight: Mutex<()>,
}

impl TreeSync {
    pub fn new(source: Arc<dyn TreeSource>, mirror: Arc<TreeMirror>) -> Self {
        Self {
            source,
            mirror,
            in_flight: Mutex::new(()),
        }
    }

    pub fn mirror(&self) -> &Arc<TreeMirror> {
        &self.mirror
    }

    /// Fetches and applies one snapshot.
    ///
    /// Returns `None` if the fetch failed or another refresh is running.
    pub async fn refresh(&self) -> Option<TreeDiff> {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::trace!("Refresh already in progress, skipping");
            return None;
        };

        let Some(items) = self.source.fetch_items().await else {
            tracing::debug!("Tree fetch failed, keeping previous snapshot");
            return None;
        };
        Some(self.mirror.apply(items))
    }

    /// Runs [`TreeSync::refresh`] on a new task. Suitable as a poll callback.
    pub fn spawn_refresh(self: &Arc<Self>) {
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            sync.refresh().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::types::Folder;
    use std::sync::Mutex as StdMutex;

    struct ScriptedSource {
        responses: StdMutex<Vec<Option<Vec<TreeItem>>>>,
    }

    #[async_trait]
    impl TreeSource for ScriptedSource {
        async fn fetch_items(&self) -> Option<Vec<TreeItem>> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                None
            } else {
                responses.remove(0)
            }
        }
    }

    fn folder(id: &str, count: u32) -> TreeItem {
        TreeItem::Folder(Folder {
            id: id.to_string(),
            name: id.to_uppercase(),
            workflow_count: count,
            sub_folder_count: 0,
            parent_folder_id: None,
        })
    }

    fn sync_with(responses: Vec<Option<Vec<TreeItem>>>) -> Arc<TreeSync> {
        let source = Arc::new(ScriptedSource {
            responses: StdMutex::new(responses),
        });
        Arc::new(TreeSync::new(source, Arc::new(TreeMirror::new())))
    }

    #[tokio::test]
    async fn test_refresh_applies_diffs() {
        let sync = sync_with(vec![
            Some(vec![folder("a", 0)]),
            Some(vec![folder("a", 1), folder("b", 0)]),
        ]);

        let first = sync.refresh().await.unwrap();
        assert_eq!(first.added.len(), 1);

        let second = sync.refresh().await.unwrap();
        assert_eq!(second.added.len(), 1);
        assert_eq!(second.modified.len(), 1);
        assert_eq!(sync.mirror().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_snapshot() {
        let sync = sync_with(vec![Some(vec![folder("a", 0)]), None]);

        sync.refresh().await.unwrap();
        assert!(sync.refresh().await.is_none());
        assert_eq!(sync.mirror().snapshot(), vec![folder("a", 0)]);
    }

    #[tokio::test]
    async fn test_spawn_refresh_publishes() {
        let sync = sync_with(vec![Some(vec![folder("a", 0)])]);
        let mut rx = sync.mirror().subscribe();

        sync.spawn_refresh();
        let diff = rx.recv().await.unwrap();
        assert_eq!(diff.added, vec![folder("a", 0)]);
    }

    struct GatedSource {
        gate: tokio::sync::Notify,
        fetches: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl TreeSource for GatedSource {
        async fn fetch_items(&self) -> Option<Vec<TreeItem>> {
            self.fetches
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.gate.notified().await;
            Some(vec![folder("a", 0)])
        }
    }

    #[tokio::test]
    async fn test_refresh_skipped_while_one_is_in_flight() {
        let source = Arc::new(GatedSource {
            gate: tokio::sync::Notify::new(),
            fetches: std::sync::atomic::AtomicUsize::new(0),
        });
        let sync = Arc::new(TreeSync::new(
            Arc::clone(&source) as Arc<dyn TreeSource>,
            Arc::new(TreeMirror::new()),
        ));

        let running = Arc::clone(&sync);
        let first = tokio::spawn(async move { running.refresh().await });
        while source.fetches.load(std::sync::atomic::Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }

        assert!(sync.refresh().await.is_none());
        assert_eq!(source.fetches.load(std::sync::atomic::Ordering::SeqCst), 1);

        source.gate.notify_one();
        let diff = first.await.unwrap().unwrap();
        assert_eq!(diff.added, vec![folder("a", 0)]);
    }
}
