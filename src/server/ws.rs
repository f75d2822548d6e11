//! WebSocket handler for real-time tree updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::server::state::AppState;
use crate::tree::TreeDiff;

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Builds a `{"type", "data", "timestamp"}` message.
pub fn envelope<T: Serialize>(kind: &str, data: &T) -> Option<String> {
    let message = serde_json::json!({
        "type": kind,
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    serde_json::to_string(&message).ok()
}

/// Handles an individual WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before taking the snapshot so no diff falls in between.
    let mut rx = state.subscribe();

    if let Some(initial) = initial_state(&state) {
        if sender.send(Message::Text(initial)).await.is_err() {
            return;
        }
    }

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = next_message(&mut rx, || initial_state(&state)).await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    tracing::debug!("WebSocket connection closed");
}

/// Next message for a client: the diff envelope, or a fresh snapshot after
/// the client fell behind and diffs were dropped. `None` once the mirror is
/// gone.
async fn next_message(
    rx: &mut broadcast::Receiver<TreeDiff>,
    snapshot: impl Fn() -> Option<String>,
) -> Option<String> {
    loop {
        let msg = match rx.recv().await {
            Ok(diff) => envelope("tree_diff", &diff),
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "WebSocket client lagged, resending snapshot");
                snapshot()
            }
            Err(RecvError::Closed) => return None,
        };
        if msg.is_some() {
            return msg;
        }
    }
}

fn initial_state(state: &AppState) -> Option<String> {
    envelope(
        "tree_snapshot",
        &serde_json::json!({
            "items": state.mirror().snapshot(),
            "expanded": state.expanded.expanded_ids(),
        }),
    )
}
