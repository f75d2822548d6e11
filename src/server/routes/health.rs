//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::server::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub items: usize,
    pub mounted: bool,
    pub last_updated: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let mirror = state.mirror();
    Json(HealthResponse {
        status: "ok",
        items: mirror.len(),
        mounted: state.sidebar.is_mounted(),
        last_updated: mirror.last_updated().map(|t| t.to_rfc3339()),
    })
}
