//! Mutation-observer based monitoring of the host page.

use super::{lock, Monitor};
use crate::dom::{HostPage, MutationRecord, NodeId, ObserverCallback, ObserverId, ObserverInit};
use std::sync::{Arc, Mutex};

/// Delivers batched mutation records for a target node to a callback.
///
/// The target defaults to the page body and the options to
/// `{ childList: true, subtree: true }`.
pub struct MutationMonitor {
    page: HostPage,
    target: Option<NodeId>,
    init: ObserverInit,
    callback: ObserverCallback,
    observer: Mutex<Option<ObserverId>>,
}

impl MutationMonitor {
    pub fn new<F>(page: HostPage, callback: F) -> Self
    where
        F: Fn(&[MutationRecord]) + Send + Sync + 'static,
    {
        Self {
            page,
            target: None,
            init: ObserverInit::child_list_subtree(),
            callback: Arc::new(callback),
            observer: Mutex::new(None),
        }
    }

    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_init(mut self, init: ObserverInit) -> Self {
        self.init = init;
        self
    }

    /// The currently registered observer, if running.
    pub fn observer_id(&self) -> Option<ObserverId> {
        *lock(&self.observer)
    }
}

impl Monitor for MutationMonitor {
    fn start(&self) {
        let mut observer = lock(&self.observer);
        if observer.is_some() {
            return;
        }

        let target = self.target.unwrap_or_else(|| self.page.body());
        match self
            .page
            .observe(target, self.init.clone(), Arc::clone(&self.callback))
        {
            Ok(id) => {
                *observer = Some(id);
                tracing::debug!(target = target.index(), "Mutation monitor started");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Mutation monitor could not observe target");
            }
        }
    }

    fn stop(&self) {
        if let Some(id) = lock(&self.observer).take() {
            self.page.disconnect(id);
            tracing::debug!("Mutation monitor stopped");
        }
    }

    fn is_running(&self) -> bool {
        lock(&self.observer).is_some()
    }
}

impl Drop for MutationMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementSpec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_double_start_registers_one_observer() {
        let page = HostPage::new();
        let batches = Arc::new(AtomicUsize::new(0));
        let b = Arc::clone(&batches);
        let monitor = MutationMonitor::new(page.clone(), move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        monitor.start();
        monitor.start();
        assert_eq!(page.observer_count(), 1);

        page.append_child(page.body(), ElementSpec::new("div"));
        assert_eq!(batches.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_restart_yields_fresh_observer() {
        let page = HostPage::new();
        let monitor = MutationMonitor::new(page.clone(), |_| {});

        monitor.start();
        let first = monitor.observer_id().unwrap();
        monitor.stop();
        assert!(!monitor.is_running());
        assert_eq!(page.observer_count(), 0);

        monitor.start();
        let second = monitor.observer_id().unwrap();
        assert_ne!(first, second);
        assert_eq!(page.observer_count(), 1);
    }

    #[test]
    fn test_stop_when_stopped_is_noop() {
        let page = HostPage::new();
        let monitor = MutationMonitor::new(page.clone(), |_| {});
        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_custom_target_and_init() {
        let page = HostPage::new();
        let panel = page.append_child(page.body(), ElementSpec::new("div")).unwrap();
        let other = page.append_child(page.body(), ElementSpec::new("div")).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        let monitor = MutationMonitor::new(page.clone(), move |records| {
            s.lock().unwrap().extend(records.iter().cloned());
        })
        .with_target(panel)
        .with_init(ObserverInit {
            attributes: true,
            ..Default::default()
        });
        monitor.start();

        page.set_attribute(other, "class", "x");
        page.append_child(panel, ElementSpec::new("span"));
        page.set_attribute(panel, "class", "open");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].target, panel);
    }

    #[test]
    fn test_invalid_init_stays_stopped() {
        let page = HostPage::new();
        let monitor = MutationMonitor::new(page.clone(), |_| {}).with_init(ObserverInit::default());
        monitor.start();
        assert!(!monitor.is_running());
        assert_eq!(page.observer_count(), 0);
    }

    #[test]
    fn test_drop_disconnects() {
        let page = HostPage::new();
        {
            let monitor = MutationMonitor::new(page.clone(), |_| {});
            monitor.start();
            assert_eq!(page.observer_count(), 1);
        }
        assert_eq!(page.observer_count(), 0);
    }
}
