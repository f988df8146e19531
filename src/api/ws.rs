//! WebSocket progress stream
//!
//! Forwards engine progress events to connected subscribers as JSON
//! `{"type": ..., "data": ...}` messages. Subscribers are read-only; any
//! inbound messages are drained and ignored. A subscriber that falls behind
//! the broadcast buffer misses the skipped events and keeps receiving from
//! the current position.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::AppState;

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.progress.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(payload) => payload,
                            Err(e) => {
                                debug!(error = %e, "Failed to serialize progress event");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Progress subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            inbound = receiver.next() => {
                match inbound {
                    // Subscribers don't have to send anything; drop whatever
                    // arrives and notice disconnects
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}
