//! `WebSocket` handler for per-world snapshot streaming.
//!
//! Clients connect to `GET /topic/worlds/{slug}` and receive every
//! committed [`WorldBroadcast`](reign_types::WorldBroadcast) for that world
//! as a JSON text frame. All sessions share one hub receiver each and drop
//! envelopes for other topics.
//!
//! If a client falls behind, lagged messages are skipped and the client
//! resumes from the most recent snapshot. Every payload is a full
//! snapshot, so nothing needs replaying.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use reign_core::topic_for;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Upgrade to a `WebSocket` streaming the world's snapshots.
///
/// # Route
///
/// `GET /topic/worlds/{slug}`
pub async fn world_topic(
    ws: WebSocketUpgrade,
    Path(slug): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    state.worlds.world_by_slug(&slug)?;
    let topic = topic_for(&slug);
    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, topic)))
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, topic: String) {
    debug!(topic = %topic, "WebSocket client subscribed");

    let mut rx = state.subscribe();

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if envelope.topic != topic {
                            continue;
                        }
                        let json = match serde_json::to_string(envelope.payload.as_ref()) {
                            Ok(j) => j,
                            Err(e) => {
                                warn!(topic = %topic, error = %e, "Failed to serialize world broadcast");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!(topic = %topic, "WebSocket client disconnected (send failed)");
                            return;
                        }
                    }
                    Err(RecvError::Lagged(n)) => {
                        debug!(topic = %topic, skipped = n, "WebSocket client lagged, skipping ahead");
                    }
                    Err(RecvError::Closed) => {
                        debug!(topic = %topic, "Broadcast hub closed, shutting down WebSocket");
                        return;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(topic = %topic, "WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(topic = %topic, "WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(topic = %topic, error = %e, "WebSocket error");
                        return;
                    }
                    // Clients have nothing to say on a topic.
                    _ => {}
                }
            }
        }
    }
}
