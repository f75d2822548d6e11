//! n8n REST collaborator: HTTP client, TTL caches and the tree source.

pub mod cache;
pub mod client;
pub mod source;

pub use cache::TtlCache;
pub use client::{ApiClient, FolderDetails, ROOT_FOLDER_FILTER};
pub use source::ProjectTreeSource;
