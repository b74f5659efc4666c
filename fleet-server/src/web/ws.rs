//! WebSocket feed. Every connected viewer gets the full fleet snapshot on
//! connect and again after each change.
//!
//! Frames are JSON text: `{"event":"aircraftData","data":[...]}`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;

use fleet_core::AircraftRecord;

use crate::web::AppState;

/// Event name carried by every snapshot frame.
pub const SNAPSHOT_EVENT: &str = "aircraftData";

pub fn snapshot_message(aircraft: &[AircraftRecord]) -> serde_json::Result<String> {
    serde_json::to_string(&json!({
        "event": SNAPSHOT_EVENT,
        "data": aircraft,
    }))
}

/// GET /ws — upgrade to a snapshot stream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.gateway.connect(state.store());
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            snapshot = subscription.recv() => {
                let Some(snapshot) = snapshot else { break };
                let text = match snapshot_message(&snapshot) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!("failed to encode snapshot: {e}");
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Viewers don't send anything meaningful.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    tracing::debug!(subscriber = %subscription.id(), "websocket closed");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
