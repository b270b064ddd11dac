//! WebSocket bridge from the in-process `EventBus` to an external UI
//! client, one socket per stream id.
//!
//! Grounded on the teacher's own `websocket_handler`/`handle_socket` in
//! `main.rs`: a `WebSocketUpgrade` extractor, a `tokio::select!` loop
//! forwarding broadcast events to the socket on one arm and draining
//! client-sent pings on the other, with a plain-text/JSON ping handled
//! the same way. The teacher's firehose (one global `signal_broadcast`
//! every socket subscribes to and filters client-side) becomes a direct
//! per-`stream_id` subscription here since `EventBus` is already keyed
//! that way - no client-side filtering needed.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::app_state::AppState;
use crate::classifier::publish_connection_state;
use crate::error::QueryError;
use crate::models::StreamId;

pub async fn stream_ws(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Response {
    let stream_id: StreamId = match id
        .parse()
        .map_err(|_| QueryError::InvalidArgument(format!("invalid stream id: {id}")))
    {
        Ok(id) => id,
        Err(err) => return err.into_response(),
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, stream_id))
}

async fn handle_socket(mut socket: WebSocket, state: AppState, stream_id: StreamId) {
    let mut subscriber = state.events.subscribe(stream_id);
    publish_connection_state(&state, stream_id, true);

    loop {
        tokio::select! {
            event = subscriber.recv() => {
                let Some(event) = event else { break };
                let msg = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_string());
                if socket.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let is_ping = text == "ping"
                            || serde_json::from_str::<serde_json::Value>(&text)
                                .ok()
                                .and_then(|v| v.get("type").and_then(|t| t.as_str().map(str::to_string)))
                                .as_deref()
                                == Some("ping");
                        if is_ping && socket.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(stream_id, error = %e, "websocket recv error");
                        break;
                    }
                }
            }
        }
    }

    publish_connection_state(&state, stream_id, false);
}
