//! User activity endpoint.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::dom::InputEvent;
use crate::server::state::AppState;

/// POST /api/activity - Report an input event from the front-end.
///
/// Body: `{"type": "mouse_move", "x": 1, "y": 2}`, `{"type": "key_down",
/// "key": "a"}` or `{"type": "click", "x": 1, "y": 2}`.
pub async fn post_activity(
    State(state): State<Arc<AppState>>,
    Json(event): Json<InputEvent>,
) -> StatusCode {
    state.page.dispatch_input(event);
    StatusCode::ACCEPTED
}
