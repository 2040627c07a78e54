//! WebSocket push channel.
//!
//! Every connected client receives the engine output of all sessions as JSON
//! text frames, or only one session's output when it connects with
//! `/ws?session_id=<id>`. Nothing is expected from the client; connects and
//! disconnects are only logged.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use coedit_core::PushEvent;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct PushQuery {
    session_id: Option<String>,
}

/// Axum handler for the `/ws` route.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<PushQuery>,
) -> Response {
    let events = state.push.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events, query.session_id))
}

/// Whether `event` should be delivered to a client subscribed to `filter`
pub fn wants(filter: Option<&str>, event: &PushEvent) -> bool {
    filter.is_none_or(|id| id == event.session_id)
}

async fn handle_socket(
    socket: WebSocket,
    mut events: broadcast::Receiver<PushEvent>,
    filter: Option<String>,
) {
    info!(session_filter = ?filter, "Client connected");
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !wants(filter.as_deref(), &event) {
                        continue;
                    }
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(error = %e, "Failed to encode push event");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Push client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "WebSocket receive error");
                    break;
                }
            },
        }
    }

    info!(session_filter = ?filter, "Client disconnected");
}
