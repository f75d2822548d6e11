//! n8ntree - n8n folder tree mirror daemon.
//!
//! Polls the n8n REST API (fast while the user is active, slow when idle),
//! keeps the tree mirror current and serves it on localhost.

use n8ntree::api::{ApiClient, ProjectTreeSource};
use n8ntree::config::Config;
use n8ntree::dom::{ElementSpec, HostPage};
use n8ntree::monitor::{AdaptiveConfig, AdaptivePollMonitor, Monitor};
use n8ntree::server::{start_server, state::AppState};
use n8ntree::sidebar::{Sidebar, SidebarConfig};
use n8ntree::storage::LocalStorage;
use n8ntree::tree::{ExpandedFolders, TreeMirror, TreeSync};
use std::sync::Arc;
use tokio::sync::Notify;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("n8ntree=info")),
        )
        .init();

    let storage = LocalStorage::open()?;
    let config = Config::load(&storage)?;
    tracing::info!(
        base_url = %config.base_url,
        project = ?config.project_id,
        "Configuration ready"
    );

    let expanded = ExpandedFolders::new(Arc::new(storage.clone()));
    let client = Arc::new(ApiClient::from_config(&config)?);
    let source = Arc::new(ProjectTreeSource::new(
        client,
        config.project_id.clone(),
        expanded.clone(),
    ));
    let mirror = Arc::new(TreeMirror::new());
    let sync = Arc::new(TreeSync::new(source, Arc::clone(&mirror)));

    // Headless shell for the sidebar to mount into.
    let page = HostPage::new();
    page.append_child(page.body(), ElementSpec::new("aside").id("sidebar"));
    let sidebar = Sidebar::new(
        page.clone(),
        Arc::clone(&mirror),
        expanded.clone(),
        SidebarConfig::default(),
    );
    if !sidebar.mount().await {
        tracing::warn!("Sidebar could not be mounted");
    }
    let diff_listener = sidebar.spawn_diff_listener();

    let state = AppState::new(
        Arc::clone(&sync),
        expanded,
        Arc::clone(&sidebar),
        page.clone(),
        storage,
    );
    let (addr, server) = start_server(state, config.server_port).await?;

    let poll_sync = Arc::clone(&sync);
    let monitor = AdaptivePollMonitor::new(
        AdaptiveConfig::from(&config),
        page.input_sender(),
        move || poll_sync.spawn_refresh(),
    );
    monitor.start();

    let shutdown = Arc::new(Notify::new());
    let shutdown_ctrlc = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        shutdown_ctrlc.notify_one();
    })?;

    tracing::info!(api = %format!("http://{addr}"), "n8ntree running, press Ctrl+C to quit");
    shutdown.notified().await;

    tracing::info!("Shutting down");
    monitor.stop();
    sidebar.unmount();
    diff_listener.abort();
    server.abort();
    Ok(())
}
