// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator WebSocket.
//!
//! Handshake: `GET /ws?operator_id=<id>&token=<operator token>`.
//!
//! Client -> Server (JSON):
//! ```json
//! {"action": "set_availability", "available": false}
//! {"action": "ping"}
//! ```
//!
//! Server -> Client: [`OperatorEvent`] frames, e.g.
//! ```json
//! {"event": "queue_update", "data": {"change": "created", "session": {...}}}
//! ```
//! A `disconnect` event is followed by a close frame.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use switchboard_presence::{OperatorEvent, OperatorIdentity};

use crate::server::AppState;

/// Per-connection outbound buffer. A full buffer counts as a failed delivery.
const OUTBOUND_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub operator_id: String,
    #[serde(default)]
    pub token: Option<String>,
}

/// Message from an operator client.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum WsIncoming {
    SetAvailability { available: bool },
    Ping,
}

/// WebSocket upgrade handler. Authenticates before upgrading.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    if !state.auth.operator_token_matches(params.token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let operator = match state.operators.find_operator(&params.operator_id).await {
        Ok(Some(op)) if op.active => op,
        Ok(Some(_)) => return StatusCode::FORBIDDEN.into_response(),
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => return crate::error::ApiError(e).into_response(),
    };
    let identity = OperatorIdentity::from(&operator);
    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Runs one operator connection until either side closes it.
///
/// The sender task forwards presence events to the socket; the receiver
/// task applies client actions. When one finishes the other is aborted and
/// the connection is removed from the presence registry.
async fn handle_socket(socket: WebSocket, state: AppState, identity: OperatorIdentity) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = uuid::Uuid::new_v4().to_string();

    let (tx, mut rx) = mpsc::channel::<OperatorEvent>(OUTBOUND_BUFFER);
    state.presence.register(&connection_id, identity, tx);

    let mut send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let is_disconnect = matches!(event, OperatorEvent::Disconnect { .. });
            if ws_sender
                .send(Message::Text(event.to_json().into()))
                .await
                .is_err()
            {
                break;
            }
            if is_disconnect {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    });

    let presence = state.presence.clone();
    let conn_id = connection_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    let text_str: &str = &text;
                    match serde_json::from_str::<WsIncoming>(text_str) {
                        Ok(WsIncoming::SetAvailability { available }) => {
                            presence.set_availability(&conn_id, available);
                        }
                        Ok(WsIncoming::Ping) => {
                            presence.touch(&conn_id);
                        }
                        Err(e) => {
                            tracing::warn!(connection_id = %conn_id, "invalid WebSocket message: {e}");
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {
                    presence.touch(&conn_id);
                }
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    // No-op if a forced disconnect already removed it.
    state.presence.remove(&connection_id);
}
