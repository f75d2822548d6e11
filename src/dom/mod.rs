//! Host page model.
//!
//! An element tree with mutation observers and an input event stream, plus
//! the locator helpers used to find anchors in it.

pub mod document;
pub mod locator;
pub mod page;
pub mod selector;

pub use document::{Document, ElementSpec, NodeId};
pub use locator::{
    find_element_by_class_pattern, find_element_by_selectors, retry_until, wait_for_element,
};
pub use page::{
    HostPage, InputEvent, MutationKind, MutationRecord, ObserverCallback, ObserverId,
    ObserverInit,
};
pub use selector::SelectorList;
