//! HTTP server module for API and WebSocket endpoints.
//!
//! Exposes the mirrored tree to a sidebar front-end: REST snapshots, folder
//! state, manual refresh, activity reporting and a WebSocket diff stream.

pub mod routes;
pub mod state;
pub mod ws;

use crate::error::Result;
use crate::server::routes::{activity, config, folders, health, refresh, tree};
use crate::server::state::AppState;
use crate::server::ws::ws_handler;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};

/// Default server port.
pub const DEFAULT_PORT: u16 = 13235;

/// Builds the router with all routes and an open CORS policy.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Tree API
        .route("/api/tree", get(tree::get_tree))
        .route("/api/tree/:folder_id/children", get(tree::get_children))
        .route("/api/sidebar", get(tree::get_sidebar))
        .route("/api/folders/:id/expanded", put(folders::set_expanded))
        .route("/api/refresh", post(refresh::refresh))
        .route("/api/activity", post(activity::post_activity))
        // Config API
        .route("/api/config", get(config::get_config))
        // WebSocket
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Binds `127.0.0.1:port` and serves on a background task.
///
/// Binding errors are returned; errors after that are logged.
pub async fn start_server(state: AppState, port: u16) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).await?;
    let addr = listener.local_addr()?;
    let app = build_router(state);

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "HTTP server stopped");
        }
    });

    tracing::info!("HTTP server listening on http://{}", addr);
    Ok((addr, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{ElementSpec, HostPage, InputEvent};
    use crate::sidebar::{Sidebar, SidebarConfig};
    use crate::storage::LocalStorage;
    use crate::tree::{ExpandedFolders, Folder, TreeItem, TreeMirror, TreeSource, TreeSync, Workflow};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct FixedSource(Vec<TreeItem>);

    #[async_trait]
    impl TreeSource for FixedSource {
        async fn fetch_items(&self) -> Option<Vec<TreeItem>> {
            Some(self.0.clone())
        }
    }

    fn items() -> Vec<TreeItem> {
        vec![
            TreeItem::Folder(Folder {
                id: "f1".to_string(),
                name: "Sales".to_string(),
                workflow_count: 1,
                sub_folder_count: 0,
                parent_folder_id: None,
            }),
            TreeItem::Workflow(Workflow {
                id: "w1".to_string(),
                name: "Lead intake".to_string(),
                parent_folder_id: Some("f1".to_string()),
                version_id: Some("v1".to_string()),
                home_project: None,
            }),
        ]
    }

    async fn spawn_app() -> (String, AppState) {
        let storage = LocalStorage::open_in_memory().unwrap();
        let expanded = ExpandedFolders::new(Arc::new(storage.clone()));
        let mirror = Arc::new(TreeMirror::new());
        let sync = Arc::new(TreeSync::new(Arc::new(FixedSource(items())), Arc::clone(&mirror)));
        let page = HostPage::new();
        page.append_child(page.body(), ElementSpec::new("aside").id("sidebar"));
        let sidebar = Sidebar::new(page.clone(), mirror, expanded.clone(), SidebarConfig::default());
        sidebar.mount().await;

        let state = AppState::new(sync, expanded, sidebar, page, storage);
        let (addr, _handle) = start_server(state.clone(), 0).await.unwrap();
        (format!("http://{addr}"), state)
    }

    #[tokio::test]
    async fn test_health() {
        let (base, _state) = spawn_app().await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["items"], 0);
        assert_eq!(body["mounted"], true);
    }

    #[tokio::test]
    async fn test_refresh_then_tree() {
        let (base, _state) = spawn_app().await;
        let client = reqwest::Client::new();

        let body: Value = client
            .post(format!("{base}/api/refresh"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["refreshed"], true);
        assert_eq!(body["diff"]["added"].as_array().unwrap().len(), 2);

        let tree: Value = client
            .get(format!("{base}/api/tree"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(tree["items"].as_array().unwrap().len(), 2);
        assert_eq!(tree["expanded"], json!([]));

        let children: Value = client
            .get(format!("{base}/api/tree/f1/children"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(children[0]["id"], "w1");
        assert_eq!(children[0]["resource"], "workflow");

        let roots: Value = client
            .get(format!("{base}/api/tree/root/children"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(roots[0]["id"], "f1");
    }

    #[tokio::test]
    async fn test_set_expanded_persists_and_renders() {
        let (base, state) = spawn_app().await;
        let client = reqwest::Client::new();
        state.sync.refresh().await.unwrap();

        let response = client
            .put(format!("{base}/api/folders/f1/expanded"))
            .json(&json!({ "expanded": true }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert!(state.expanded.is_folder_expanded("f1"));

        let rows: Value = client
            .get(format!("{base}/api/sidebar"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let keys: Vec<&str> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["folder:f1", "workflow:w1"]);

        client
            .put(format!("{base}/api/folders/f1/expanded"))
            .json(&json!({ "expanded": false }))
            .send()
            .await
            .unwrap();
        assert!(!state.expanded.is_folder_expanded("f1"));
    }

    #[tokio::test]
    async fn test_activity_reaches_input_subscribers() {
        let (base, state) = spawn_app().await;
        let mut input = state.page.subscribe_input();

        let response = reqwest::Client::new()
            .post(format!("{base}/api/activity"))
            .json(&json!({ "type": "key_down", "key": "k" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);
        assert_eq!(
            input.recv().await.unwrap(),
            InputEvent::KeyDown {
                key: "k".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_config_lists_seeded_settings() {
        let (base, _state) = spawn_app().await;
        let body: Value = reqwest::get(format!("{base}/api/config"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let keys: Vec<&str> = body["settings"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["key"].as_str().unwrap())
            .collect();
        assert!(keys.contains(&"poll_fast_ms"));
        assert!(keys.contains(&"server_port"));
    }
}
