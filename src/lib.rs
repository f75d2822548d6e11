//! n8ntree - folder tree mirror for n8n.
//!
//! Keeps an in-memory mirror of a project's folder/workflow tree in sync
//! with the n8n REST API, renders it into a host page model and serves it
//! to a sidebar front-end over HTTP and WebSocket.

pub mod api;
pub mod config;
pub mod dom;
pub mod error;
pub mod monitor;
pub mod server;
pub mod sidebar;
pub mod storage;
pub mod timing;
pub mod tree;

pub use error::{N8nTreeError, Result};
