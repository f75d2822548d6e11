//! Folder/workflow tree: item types, snapshot diffing, the in-memory
//! mirror and persisted expand state.

pub mod diff;
pub mod expanded;
pub mod mirror;
pub mod sync;
pub mod types;

pub use diff::{compute_diff, is_modified, TreeDiff};
pub use expanded::{ExpandedFolders, EXPANDED_STORAGE_KEY};
pub use mirror::TreeMirror;
pub use sync::{TreeSource, TreeSync};
pub use types::{item_key, Folder, HomeProject, ResourceKind, TreeItem, Workflow};
