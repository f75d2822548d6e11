//! Folder expand/collapse endpoint.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::server::state::AppState;

#[derive(Deserialize)]
pub struct ExpandedRequest {
    pub expanded: bool,
}

#[derive(Serialize)]
pub struct ExpandedResponse {
    pub id: String,
    pub expanded: bool,
}

/// PUT /api/folders/:id/expanded - Persist a folder's state.
///
/// Expanding widens what the next refresh fetches, so one is kicked off.
pub async fn set_expanded(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ExpandedRequest>,
) -> Result<Json<ExpandedResponse>, StatusCode> {
    if !state.expanded.set_folder_expanded(&id, body.expanded) {
        tracing::error!(folder = %id, "Failed to persist folder state");
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    state.sidebar.render();
    if body.expanded {
        state.sync.spawn_refresh();
    }

    Ok(Json(ExpandedResponse {
        id,
        expanded: body.expanded,
    }))
}
