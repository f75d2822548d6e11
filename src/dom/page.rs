//! Observable host page: a shared [`Document`] plus mutation observers and
//! an input event stream.
//!
//! Mutations are queued per interested observer at the moment they happen
//! and delivered after the mutating call (or the outermost [`HostPage::batch`])
//! returns. Delivery never nests: mutations made by an observer callback are
//! delivered in the next round of the same delivery loop.

use super::document::{Document, ElementSpec, NodeId};
use crate::error::{N8nTreeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Kind of change described by a [`MutationRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// One observed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub attribute_name: Option<String>,
    /// Only populated when the observer asked for old values.
    pub old_value: Option<String>,
}

impl MutationRecord {
    fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added_nodes: added,
            removed_nodes: removed,
            attribute_name: None,
            old_value: None,
        }
    }
}

/// Options for [`HostPage::observe`], mirroring `MutationObserverInit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverInit {
    pub child_list: bool,
    pub attributes: bool,
    pub character_data: bool,
    pub subtree: bool,
    pub attribute_filter: Option<Vec<String>>,
    pub attribute_old_value: bool,
    pub character_data_old_value: bool,
}

impl ObserverInit {
    /// `{ childList: true, subtree: true }`.
    pub fn child_list_subtree() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Default::default()
        }
    }

    /// Applies the implicit `attributes`/`characterData` rules and rejects
    /// options that select no mutation kind.
    pub fn normalized(mut self) -> Result<Self> {
        if self.attribute_filter.is_some() || self.attribute_old_value {
            self.attributes = true;
        }
        if self.character_data_old_value {
            self.character_data = true;
        }
        if !(self.child_list || self.attributes || self.character_data) {
            return Err(N8nTreeError::InvalidObserverInit);
        }
        Ok(self)
    }

    fn wants(&self, record: &MutationRecord) -> bool {
        match record.kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::CharacterData => self.character_data,
            MutationKind::Attributes => {
                self.attributes
                    && match (&self.attribute_filter, &record.attribute_name) {
                        (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                        _ => true,
                    }
            }
        }
    }

    fn keeps_old_value(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::Attributes => self.attribute_old_value,
            MutationKind::CharacterData => self.character_data_old_value,
            MutationKind::ChildList => false,
        }
    }
}

/// User input seen on the host page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    MouseMove { x: i32, y: i32 },
    KeyDown { key: String },
    Click { x: i32, y: i32 },
}

/// Identifier of a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Observer callback; receives one batch of records per delivery.
pub type ObserverCallback = Arc<dyn Fn(&[MutationRecord]) + Send + Sync>;

struct Registration {
    id: ObserverId,
    target: NodeId,
    init: ObserverInit,
    callback: ObserverCallback,
}

struct PageState {
    doc: Document,
    observers: Vec<Registration>,
    queues: BTreeMap<ObserverId, Vec<MutationRecord>>,
    next_observer: u64,
    batch_depth: usize,
    delivering: bool,
}

impl PageState {
    fn enqueue(&mut self, record: MutationRecord) {
        for reg in &self.observers {
            let in_scope = record.target == reg.target
                || (reg.init.subtree && self.doc.contains(reg.target, record.target));
            if !in_scope || !reg.init.wants(&record) {
                continue;
            }
            let mut copy = record.clone();
            if !reg.init.keeps_old_value(copy.kind) {
                copy.old_value = None;
            }
            self.queues.entry(reg.id).or_default().push(copy);
        }
    }
}

const INPUT_CHANNEL_CAPACITY: usize = 256;

/// Shared, cloneable handle to the host page.
#[derive(Clone)]
pub struct HostPage {
    state: Arc<Mutex<PageState>>,
    input_tx: broadcast::Sender<InputEvent>,
}

impl Default for HostPage {
    fn default() -> Self {
        Self::new()
    }
}

impl HostPage {
    pub fn new() -> Self {
        Self::with_document(Document::new())
    }

    pub fn with_document(doc: Document) -> Self {
        let (input_tx, _) = broadcast::channel(INPUT_CHANNEL_CAPACITY);
        Self {
            state: Arc::new(Mutex::new(PageState {
                doc,
                observers: Vec::new(),
                queues: BTreeMap::new(),
                next_observer: 0,
                batch_depth: 0,
                delivering: false,
            })),
            input_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` with read access to the document.
    ///
    /// Must not call back into the page from inside `f`.
    pub fn read<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.lock().doc)
    }

    pub fn body(&self) -> NodeId {
        self.lock().doc.body()
    }

    pub fn root(&self) -> NodeId {
        self.lock().doc.root()
    }

    pub fn query_selector(&self, root: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.read(|doc| doc.query_selector(root, selector))
    }

    // === Mutations ===

    /// Appends a new subtree under `parent`. `None` if `parent` is unknown.
    pub fn append_child(&self, parent: NodeId, spec: ElementSpec) -> Option<NodeId> {
        let id = {
            let mut state = self.lock();
            if !state.doc.has_node(parent) {
                return None;
            }
            let id = state.doc.append(parent, spec);
            state.enqueue(MutationRecord::child_list(parent, vec![id], Vec::new()));
            id
        };
        self.deliver();
        Some(id)
    }

    /// Detaches `node` from its parent. Returns false if it was not attached.
    pub fn remove(&self, node: NodeId) -> bool {
        let removed = {
            let mut state = self.lock();
            if !state.doc.has_node(node) {
                return false;
            }
            match state.doc.detach(node) {
                Some(parent) => {
                    state.enqueue(MutationRecord::child_list(parent, Vec::new(), vec![node]));
                    true
                }
                None => false,
            }
        };
        if removed {
            self.deliver();
        }
        removed
    }

    /// Removes every child of `parent`, producing one record.
    pub fn clear_children(&self, parent: NodeId) {
        {
            let mut state = self.lock();
            if !state.doc.has_node(parent) {
                return;
            }
            let children = state.doc.children(parent).to_vec();
            if children.is_empty() {
                return;
            }
            for child in &children {
                state.doc.detach(*child);
            }
            state.enqueue(MutationRecord::child_list(parent, Vec::new(), children));
        }
        self.deliver();
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        {
            let mut state = self.lock();
            if !state.doc.has_node(node) {
                return;
            }
            let old = state.doc.set_attribute(node, name, value);
            state.enqueue(MutationRecord {
                kind: MutationKind::Attributes,
                target: node,
                added_nodes: Vec::new(),
                removed_nodes: Vec::new(),
                attribute_name: Some(name.to_ascii_lowercase()),
                old_value: old,
            });
        }
        self.deliver();
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        {
            let mut state = self.lock();
            if !state.doc.has_node(node) {
                return;
            }
            let Some(old) = state.doc.remove_attribute(node, name) else {
                return;
            };
            state.enqueue(MutationRecord {
                kind: MutationKind::Attributes,
                target: node,
                added_nodes: Vec::new(),
                removed_nodes: Vec::new(),
                attribute_name: Some(name.to_ascii_lowercase()),
                old_value: Some(old),
            });
        }
        self.deliver();
    }

    pub fn set_text(&self, node: NodeId, text: &str) {
        {
            let mut state = self.lock();
            if !state.doc.has_node(node) {
                return;
            }
            let old = state.doc.set_text(node, text);
            state.enqueue(MutationRecord {
                kind: MutationKind::CharacterData,
                target: node,
                added_nodes: Vec::new(),
                removed_nodes: Vec::new(),
                attribute_name: None,
                old_value: Some(old),
            });
        }
        self.deliver();
    }

    /// Runs `f`, holding back delivery until the outermost batch ends so
    /// observers see its mutations as one batch.
    pub fn batch<R>(&self, f: impl FnOnce(&HostPage) -> R) -> R {
        struct BatchGuard<'a>(&'a HostPage);
        impl Drop for BatchGuard<'_> {
            fn drop(&mut self) {
                let mut state = self.0.lock();
                state.batch_depth = state.batch_depth.saturating_sub(1);
            }
        }

        self.lock().batch_depth += 1;
        let result = {
            let _guard = BatchGuard(self);
            f(self)
        };
        self.deliver();
        result
    }

    fn deliver(&self) {
        struct DeliveryGuard<'a> {
            page: &'a HostPage,
            armed: bool,
        }
        impl Drop for DeliveryGuard<'_> {
            fn drop(&mut self) {
                // Only reached early when a callback panicked.
                if self.armed {
                    self.page.lock().delivering = false;
                }
            }
        }

        {
            let mut state = self.lock();
            if state.delivering || state.batch_depth > 0 {
                return;
            }
            state.delivering = true;
        }
        let mut guard = DeliveryGuard {
            page: self,
            armed: true,
        };

        loop {
            let work: Vec<(ObserverCallback, Vec<MutationRecord>)> = {
                let mut state = self.lock();
                let PageState {
                    observers, queues, ..
                } = &mut *state;
                let work: Vec<_> = observers
                    .iter()
                    .filter_map(|reg| {
                        queues
                            .remove(&reg.id)
                            .filter(|records| !records.is_empty())
                            .map(|records| (Arc::clone(&reg.callback), records))
                    })
                    .collect();
                // Cleared under the same lock that saw the queues empty, so a
                // concurrent enqueue either lands in this round or delivers
                // itself.
                if work.is_empty() {
                    state.delivering = false;
                }
                work
            };
            if work.is_empty() {
                guard.armed = false;
                break;
            }
            for (callback, records) in work {
                callback(&records);
            }
        }
    }

    // === Observers ===

    /// Registers an observer on `target`.
    pub fn observe(
        &self,
        target: NodeId,
        init: ObserverInit,
        callback: ObserverCallback,
    ) -> Result<ObserverId> {
        let init = init.normalized()?;
        let mut state = self.lock();
        let id = ObserverId(state.next_observer);
        state.next_observer += 1;
        state.observers.push(Registration {
            id,
            target,
            init,
            callback,
        });
        tracing::trace!(observer = id.0, target = target.index(), "Observer registered");
        Ok(id)
    }

    /// Unregisters an observer and drops its undelivered records.
    pub fn disconnect(&self, id: ObserverId) -> bool {
        let mut state = self.lock();
        state.queues.remove(&id);
        let before = state.observers.len();
        state.observers.retain(|r| r.id != id);
        before != state.observers.len()
    }

    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    // === Input ===

    /// Publishes an input event. Events with no listener are dropped.
    pub fn dispatch_input(&self, event: InputEvent) {
        let _ = self.input_tx.send(event);
    }

    pub fn subscribe_input(&self) -> broadcast::Receiver<InputEvent> {
        self.input_tx.subscribe()
    }

    pub fn input_sender(&self) -> broadcast::Sender<InputEvent> {
        self.input_tx.clone()
    }
}
