//! Unified error type.
//!
//! Best-effort operations (network calls, DOM lookups) swallow these and
//! log at debug level; startup and storage plumbing propagate them with `?`.

use std::io;
use thiserror::Error;

/// n8ntree error type.
#[derive(Debug, Error)]
pub enum N8nTreeError {
    /// File system errors (database directory creation etc.).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Local storage errors.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON encode/decode errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level HTTP failures.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx responses from the remote API.
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Selector strings the host-page model cannot parse.
    #[error("Invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    /// Observer options that select no mutation kind.
    #[error("Observer init must enable child_list, attributes or character_data")]
    InvalidObserverInit,

    /// Configuration values that fail to parse.
    #[error("Config error: {0}")]
    Config(String),
}

/// n8ntree result alias.
pub type Result<T> = std::result::Result<T, N8nTreeError>;

impl N8nTreeError {
    pub fn selector(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Selector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
