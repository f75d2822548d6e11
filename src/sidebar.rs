//! Renders the mirrored tree into the host page.
//!
//! The tree lives in a `div#n8ntree-root` container appended under the host
//! sidebar. The host app re-renders its sidebar freely, so a mutation
//! monitor watches for the container being dropped and mounts it again.

use crate::dom::{
    find_element_by_class_pattern, find_element_by_selectors, retry_until, ElementSpec, HostPage,
    MutationRecord, NodeId, SelectorList,
};
use crate::monitor::{Monitor, MutationMonitor};
use crate::tree::{ExpandedFolders, TreeDiff, TreeItem, TreeMirror};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Element id of the mounted container.
pub const CONTAINER_ID: &str = "n8ntree-root";

/// Attribute carrying a row's `resource:id` key.
pub const TREE_KEY_ATTR: &str = "data-tree-key";

const MAX_RENDER_DEPTH: usize = 32;

static ROW_SELECTOR: Lazy<Option<SelectorList>> =
    Lazy::new(|| match SelectorList::parse(&format!("[{TREE_KEY_ATTR}]")) {
        Ok(selector) => Some(selector),
        Err(e) => {
            tracing::warn!(error = %e, "Row selector rejected");
            None
        }
    });

/// Where and how persistently to look for the host sidebar.
#[derive(Debug, Clone)]
pub struct SidebarConfig {
    /// Tried in order before the class patterns.
    pub anchor_selectors: Vec<String>,
    /// Class name fragments of the host's hashed sidebar classes.
    pub anchor_class_patterns: Vec<String>,
    pub mount_attempts: u32,
    pub mount_delay: Duration,
}

impl Default for SidebarConfig {
    fn default() -> Self {
        Self {
            anchor_selectors: vec![
                "#sidebar".to_string(),
                "[data-test-id=\"main-sidebar\"]".to_string(),
                "aside.sidebar".to_string(),
            ],
            anchor_class_patterns: vec!["_sideMenu".to_string(), "_sidebar".to_string()],
            mount_attempts: 20,
            mount_delay: Duration::from_millis(500),
        }
    }
}

/// One rendered row, as read back from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRow {
    pub key: String,
    pub name: String,
    pub depth: usize,
    /// Folders only.
    pub expanded: Option<bool>,
}

pub struct Sidebar {
    page: HostPage,
    mirror: Arc<TreeMirror>,
    expanded: ExpandedFolders,
    config: SidebarConfig,
    container: Mutex<Option<NodeId>>,
    mounting: AtomicBool,
    /// Serializes clear-and-append so concurrent renders cannot interleave rows.
    render_lock: Mutex<()>,
    renders: AtomicU64,
    remount: MutationMonitor,
}

impl Sidebar {
    pub fn new(
        page: HostPage,
        mirror: Arc<TreeMirror>,
        expanded: ExpandedFolders,
        config: SidebarConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Sidebar>| {
            let weak = weak.clone();
            let remount = MutationMonitor::new(page.clone(), move |records| {
                if let Some(sidebar) = weak.upgrade() {
                    sidebar.on_mutations(records);
                }
            });
            Self {
                page,
                mirror,
                expanded,
                config,
                container: Mutex::new(None),
                mounting: AtomicBool::new(false),
                render_lock: Mutex::new(()),
                renders: AtomicU64::new(0),
                remount,
            }
        })
    }

    fn container_slot(&self) -> MutexGuard<'_, Option<NodeId>> {
        self.container.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The mounted container, if it is still attached to the page.
    pub fn container(&self) -> Option<NodeId> {
        let container = (*self.container_slot())?;
        self.page
            .read(|doc| doc.is_connected(container))
            .then_some(container)
    }

    pub fn is_mounted(&self) -> bool {
        self.container().is_some()
    }

    /// Number of full renders so far.
    pub fn render_count(&self) -> u64 {
        self.renders.load(Ordering::Relaxed)
    }

    fn locate_anchor(&self) -> Option<NodeId> {
        self.page.read(|doc| {
            let body = doc.body();
            find_element_by_selectors(doc, body, &self.config.anchor_selectors).or_else(|| {
                find_element_by_class_pattern(doc, body, &self.config.anchor_class_patterns)
            })
        })
    }

    /// Waits for the host sidebar, mounts the container and starts watching
    /// for it being dropped. Returns false if no anchor showed up.
    pub async fn mount(&self) -> bool {
        let found = retry_until(self.config.mount_attempts, self.config.mount_delay, || {
            self.locate_anchor()
        })
        .await;
        if found.is_none() {
            tracing::debug!("Sidebar anchor not found, giving up");
            return false;
        }

        let mounted = self.ensure_mounted().is_some();
        if mounted {
            self.remount.start();
        }
        mounted
    }

    /// Mounts the container if it is missing and renders into it.
    pub fn ensure_mounted(&self) -> Option<NodeId> {
        if let Some(container) = self.container() {
            return Some(container);
        }
        if self.mounting.swap(true, Ordering::AcqRel) {
            return None;
        }

        let mounted = self.locate_anchor().and_then(|anchor| {
            self.page
                .append_child(anchor, ElementSpec::new("div").id(CONTAINER_ID))
        });
        if let Some(container) = mounted {
            *self.container_slot() = Some(container);
            tracing::debug!(container = container.index(), "Sidebar container mounted");
        }
        self.mounting.store(false, Ordering::Release);

        if mounted.is_some() {
            self.render();
        }
        mounted
    }

    fn on_mutations(&self, records: &[MutationRecord]) {
        if self.mounting.load(Ordering::Acquire) {
            return;
        }
        let removed_any = records.iter().any(|r| !r.removed_nodes.is_empty());
        if removed_any && !self.is_mounted() {
            tracing::debug!("Sidebar container dropped by host, remounting");
            self.ensure_mounted();
        }
    }

    /// Stops watching and removes the container.
    pub fn unmount(&self) {
        self.remount.stop();
        let container = self.container_slot().take();
        if let Some(container) = container {
            self.page.remove(container);
        }
    }

    /// Replaces the container's rows with the current mirror contents.
    ///
    /// Returns false when nothing is mounted.
    pub fn render(&self) -> bool {
        let Some(container) = self.container() else {
            return false;
        };
        let expanded: HashSet<String> = self.expanded.expanded_ids().into_iter().collect();

        // Held inside the batch only, so it is released before observers run.
        self.page.batch(|page| {
            let _render = self
                .render_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            page.clear_children(container);
            let mut visited = HashSet::new();
            self.render_level(page, container, None, 0, &expanded, &mut visited);
        });
        self.renders.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(items = self.mirror.len(), "Sidebar rendered");
        true
    }

    fn render_level(
        &self,
        page: &HostPage,
        container: NodeId,
        parent: Option<&str>,
        depth: usize,
        expanded: &HashSet<String>,
        visited: &mut HashSet<String>,
    ) {
        if depth >= MAX_RENDER_DEPTH {
            return;
        }
        for item in self.mirror.children_of(parent) {
            let mut row = ElementSpec::new("div")
                .class("n8ntree-row")
                .attr(TREE_KEY_ATTR, item.key())
                .attr("data-depth", depth.to_string())
                .text(item.name());

            let open = match &item {
                TreeItem::Folder(folder) => {
                    let open = expanded.contains(&folder.id);
                    row = row.attr("data-expanded", open.to_string());
                    open && visited.insert(folder.id.clone())
                }
                TreeItem::Workflow(_) => false,
            };
            page.append_child(container, row);

            if open {
                self.render_level(page, container, Some(item.id()), depth + 1, expanded, visited);
            }
        }
    }

    /// Re-renders for a non-empty diff. Returns whether it rendered.
    pub fn apply_diff(&self, diff: &TreeDiff) -> bool {
        if !diff.has_differences() {
            return false;
        }
        self.render()
    }

    /// Re-renders on every diff the mirror publishes.
    pub fn spawn_diff_listener(self: &Arc<Self>) -> JoinHandle<()> {
        let sidebar = Arc::clone(self);
        let mut updates = self.mirror.subscribe();
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(diff) => {
                        sidebar.apply_diff(&diff);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Sidebar lagged behind tree updates");
                        sidebar.render();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Rows currently in the container, in document order.
    pub fn rendered_rows(&self) -> Vec<RenderedRow> {
        let Some(container) = self.container() else {
            return Vec::new();
        };
        let Some(selector) = ROW_SELECTOR.as_ref() else {
            return Vec::new();
        };
        self.page.read(|doc| {
            doc.select_all(container, selector)
                .into_iter()
                .filter_map(|row| {
                    Some(RenderedRow {
                        key: doc.attribute(row, TREE_KEY_ATTR)?.to_string(),
                        name: doc.text(row).to_string(),
                        depth: doc
                            .attribute(row, "data-depth")
                            .and_then(|d| d.parse().ok())
                            .unwrap_or(0),
                        expanded: doc.attribute(row, "data-expanded").map(|v| v == "true"),
                    })
                })
                .collect()
        })
    }

    /// Flips a folder and re-renders.
    pub fn toggle_folder(&self, folder_id: &str) -> bool {
        let expanded = self.expanded.toggle_folder(folder_id);
        self.render();
        expanded
    }
}

impl Drop for Sidebar {
    fn drop(&mut self) {
        self.remount.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use crate::tree::{Folder, Workflow};

    fn folder(id: &str, name: &str, parent: Option<&str>) -> TreeItem {
        TreeItem::Folder(Folder {
            id: id.to_string(),
            name: name.to_string(),
            workflow_count: 0,
            sub_folder_count: 0,
            parent_folder_id: parent.map(str::to_string),
        })
    }

    fn workflow(id: &str, name: &str, parent: Option<&str>) -> TreeItem {
        TreeItem::Workflow(Workflow {
            id: id.to_string(),
            name: name.to_string(),
            parent_folder_id: parent.map(str::to_string),
            version_id: None,
            home_project: None,
        })
    }

    struct Fixture {
        page: HostPage,
        anchor: NodeId,
        mirror: Arc<TreeMirror>,
        expanded: ExpandedFolders,
        sidebar: Arc<Sidebar>,
    }

    fn fixture() -> Fixture {
        let page = HostPage::new();
        let anchor = page
            .append_child(page.body(), ElementSpec::new("aside").id("sidebar"))
            .unwrap();
        let mirror = Arc::new(TreeMirror::new());
        mirror.apply(vec![
            folder("f1", "Sales", None),
            folder("f2", "Archive", None),
            workflow("w1", "Top", None),
            workflow("w2", "Nested", Some("f1")),
            workflow("w3", "Hidden", Some("f2")),
        ]);
        let expanded = ExpandedFolders::new(Arc::new(LocalStorage::open_in_memory().unwrap()));
        let sidebar = Sidebar::new(
            page.clone(),
            Arc::clone(&mirror),
            expanded.clone(),
            SidebarConfig::default(),
        );
        Fixture {
            page,
            anchor,
            mirror,
            expanded,
            sidebar,
        }
    }

    fn keys(sidebar: &Sidebar) -> Vec<String> {
        sidebar.rendered_rows().into_iter().map(|r| r.key).collect()
    }

    #[tokio::test]
    async fn test_mount_renders_collapsed_tree() {
        let fx = fixture();
        assert!(fx.sidebar.mount().await);

        let container = fx.sidebar.container().unwrap();
        fx.page.read(|doc| {
            assert_eq!(doc.parent(container), Some(fx.anchor));
            assert_eq!(doc.attribute(container, "id"), Some(CONTAINER_ID));
        });
        assert_eq!(keys(&fx.sidebar), vec!["folder:f2", "folder:f1", "workflow:w1"]);
    }

    #[tokio::test]
    async fn test_expanded_folder_children_rendered() {
        let fx = fixture();
        fx.expanded.set_folder_expanded("f1", true);
        fx.sidebar.mount().await;

        let rows = fx.sidebar.rendered_rows();
        assert_eq!(
            rows.iter().map(|r| r.key.as_str()).collect::<Vec<_>>(),
            vec!["folder:f2", "folder:f1", "workflow:w2", "workflow:w1"]
        );
        let nested = rows.iter().find(|r| r.key == "workflow:w2").unwrap();
        assert_eq!(nested.depth, 1);
        assert_eq!(nested.name, "Nested");
        assert_eq!(rows[1].expanded, Some(true));
        assert_eq!(rows[0].expanded, Some(false));
        assert_eq!(rows[3].expanded, None);
    }

    #[tokio::test]
    async fn test_toggle_folder_rerenders() {
        let fx = fixture();
        fx.sidebar.mount().await;

        assert!(fx.sidebar.toggle_folder("f2"));
        assert!(keys(&fx.sidebar).contains(&"workflow:w3".to_string()));
        assert!(!fx.sidebar.toggle_folder("f2"));
        assert!(!keys(&fx.sidebar).contains(&"workflow:w3".to_string()));
    }

    #[tokio::test]
    async fn test_remounts_after_host_drops_container() {
        let fx = fixture();
        fx.sidebar.mount().await;
        let first = fx.sidebar.container().unwrap();

        fx.page.clear_children(fx.anchor);

        let second = fx.sidebar.container().unwrap();
        assert_ne!(first, second);
        fx.page
            .read(|doc| assert_eq!(doc.parent(second), Some(fx.anchor)));
        assert_eq!(keys(&fx.sidebar).len(), 3);
    }

    #[tokio::test]
    async fn test_unmount_stops_remounting() {
        let fx = fixture();
        fx.sidebar.mount().await;
        let observers = fx.page.observer_count();

        fx.sidebar.unmount();
        assert!(!fx.sidebar.is_mounted());
        assert_eq!(fx.page.observer_count(), observers - 1);
    }

    #[tokio::test]
    async fn test_apply_diff_skips_empty() {
        let fx = fixture();
        fx.sidebar.mount().await;
        let renders = fx.sidebar.render_count();

        assert!(!fx.sidebar.apply_diff(&TreeDiff::default()));
        assert_eq!(fx.sidebar.render_count(), renders);

        let diff = fx.mirror.apply(vec![folder("f1", "Sales", None)]);
        assert!(fx.sidebar.apply_diff(&diff));
        assert_eq!(fx.sidebar.render_count(), renders + 1);
        assert_eq!(keys(&fx.sidebar), vec!["folder:f1"]);
    }

    #[tokio::test]
    async fn test_diff_listener_follows_mirror() {
        let fx = fixture();
        fx.sidebar.mount().await;
        let listener = fx.sidebar.spawn_diff_listener();

        fx.mirror.apply(vec![workflow("w9", "New", None)]);
        for _ in 0..10 {
            if keys(&fx.sidebar) == vec!["workflow:w9"] {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(keys(&fx.sidebar), vec!["workflow:w9"]);
        listener.abort();
    }

    #[tokio::test]
    async fn test_class_pattern_anchor() {
        let page = HostPage::new();
        let anchor = page
            .append_child(page.body(), ElementSpec::new("div").class("_sideMenu_x7f2a"))
            .unwrap();
        let sidebar = Sidebar::new(
            page.clone(),
            Arc::new(TreeMirror::new()),
            ExpandedFolders::new(Arc::new(LocalStorage::open_in_memory().unwrap())),
            SidebarConfig::default(),
        );

        assert!(sidebar.mount().await);
        let container = sidebar.container().unwrap();
        page.read(|doc| assert_eq!(doc.parent(container), Some(anchor)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_waits_for_late_anchor() {
        let fx = fixture();
        fx.page.remove(fx.anchor);

        let page = fx.page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1200)).await;
            page.append_child(page.body(), ElementSpec::new("aside").id("sidebar"));
        });

        assert!(fx.sidebar.mount().await);
        assert!(fx.sidebar.is_mounted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_waits_for_late_class_pattern_anchor() {
        let page = HostPage::new();
        let sidebar = Sidebar::new(
            page.clone(),
            Arc::new(TreeMirror::new()),
            ExpandedFolders::new(Arc::new(LocalStorage::open_in_memory().unwrap())),
            SidebarConfig {
                mount_attempts: 5,
                mount_delay: Duration::from_millis(100),
                ..SidebarConfig::default()
            },
        );

        let late = page.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            late.append_child(late.body(), ElementSpec::new("nav").class("_sideMenu_x9"));
        });

        assert!(sidebar.mount().await);
        let container = sidebar.container().unwrap();
        page.read(|doc| {
            let anchor = doc.parent(container).unwrap();
            assert_eq!(doc.tag(anchor), "nav");
        });
    }

    #[tokio::test]
    async fn test_concurrent_renders_do_not_duplicate_rows() {
        let fx = fixture();
        fx.mirror.apply(
            (0..50)
                .map(|i| folder(&format!("f{i}"), &format!("Folder {i}"), None))
                .collect(),
        );
        assert!(fx.sidebar.ensure_mounted().is_some());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let sidebar = Arc::clone(&fx.sidebar);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        sidebar.render();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let rows = fx.sidebar.rendered_rows();
        assert_eq!(rows.len(), 50);
        let unique: HashSet<&str> = rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(unique.len(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_gives_up_without_anchor() {
        let fx = fixture();
        fx.page.remove(fx.anchor);

        assert!(!fx.sidebar.mount().await);
        assert!(!fx.sidebar.is_mounted());
        assert_eq!(fx.page.observer_count(), 0);
    }
}
