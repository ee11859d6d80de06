// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket handler feeding the pub/sub bridge.
//!
//! Client -> Server frames are `ClientFrame` JSON (SUBSCRIBE / UNSUBSCRIBE /
//! DISPATCH). Server -> Client frames are whatever the bridge pushes: control
//! frames and `ServiceNotification` payloads.
//!
//! The authenticated user id arrives from the upstream auth layer via the
//! `user` query parameter; authorization itself is outside this service.

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

use courier_core::protocol::ClientFrame;
use courier_core::types::{ConnectionId, UserId};

use crate::server::GatewayState;

/// Handshake query parameters.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Shared-secret token (checked against the gateway auth config).
    #[serde(default)]
    token: Option<String>,
    /// Authenticated user id, set by the upstream middleware.
    #[serde(default)]
    user: Option<String>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<GatewayState>,
) -> Response {
    if !state.auth.allows(query.token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.user))
}

/// Handle one WebSocket connection.
///
/// Spawns a sender task forwarding bridge pushes to the socket, then reads
/// frames until the client disconnects. The bridge owns all subscription
/// state; this function only decodes and forwards.
async fn handle_socket(socket: WebSocket, state: GatewayState, user: Option<String>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let connection_id = ConnectionId(uuid::Uuid::new_v4().to_string());

    let (tx, mut rx) = mpsc::channel::<String>(64);
    state
        .bridge
        .connect(connection_id.clone(), user.map(UserId), tx)
        .await;

    let sender_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_receiver.next().await {
        match message {
            Message::Text(text) => {
                let text_str: &str = &text;
                let frame: ClientFrame = match serde_json::from_str(text_str) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(error = %e, connection = %connection_id, "invalid frame dropped");
                        continue;
                    }
                };
                state.bridge.handle_frame(&connection_id, frame).await;
            }
            Message::Close(_) => break,
            _ => {} // Ignore binary; ping/pong handled by the ws layer.
        }
    }

    state.bridge.disconnect(&connection_id);
    sender_task.abort();
}
