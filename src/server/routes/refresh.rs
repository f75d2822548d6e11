//! Manual refresh endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::server::state::AppState;
use crate::tree::TreeDiff;

#[derive(Serialize)]
pub struct RefreshResponse {
    /// False when the fetch failed or another refresh was running.
    pub refreshed: bool,
    pub diff: Option<TreeDiff>,
}

/// POST /api/refresh - Fetch now and return what changed.
pub async fn refresh(State(state): State<Arc<AppState>>) -> Json<RefreshResponse> {
    let diff = state.sync.refresh().await;
    Json(RefreshResponse {
        refreshed: diff.is_some(),
        diff,
    })
}
