//! Tree snapshot endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::server::state::AppState;
use crate::sidebar::RenderedRow;
use crate::tree::TreeItem;

#[derive(Serialize)]
pub struct TreeResponse {
    pub items: Vec<TreeItem>,
    pub expanded: Vec<String>,
    pub last_updated: Option<String>,
}

/// GET /api/tree - Full snapshot plus expanded folder ids.
pub async fn get_tree(State(state): State<Arc<AppState>>) -> Json<TreeResponse> {
    let mirror = state.mirror();
    Json(TreeResponse {
        items: mirror.snapshot(),
        expanded: state.expanded.expanded_ids(),
        last_updated: mirror.last_updated().map(|t| t.to_rfc3339()),
    })
}

/// GET /api/tree/:folder_id/children - Direct children, folders first.
///
/// `root` lists the top level.
pub async fn get_children(
    State(state): State<Arc<AppState>>,
    Path(folder_id): Path<String>,
) -> Json<Vec<TreeItem>> {
    let parent = (folder_id != "root").then_some(folder_id.as_str());
    Json(state.mirror().children_of(parent))
}

/// GET /api/sidebar - Rows as currently rendered in the page.
pub async fn get_sidebar(State(state): State<Arc<AppState>>) -> Json<Vec<RenderedRow>> {
    Json(state.sidebar.rendered_rows())
}
