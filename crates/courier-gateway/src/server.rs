// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum: the WebSocket endpoint plus an
//! unauthenticated health route.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use tower_http::cors::CorsLayer;

use courier_core::error::CourierError;
use courier_realtime::PubSubBridge;

use crate::auth::AuthConfig;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// The bridge owning all live connections.
    pub bridge: Arc<PubSubBridge>,
    /// Handshake auth configuration.
    pub auth: AuthConfig,
}

/// Gateway server configuration (mirrors `ServerConfig` from courier-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Start the gateway server. Serves:
/// - GET /ws      (WebSocket upgrade; auth via query params)
/// - GET /health  (unauthenticated)
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), CourierError> {
    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(get_health))
        .with_state(state)
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CourierError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| CourierError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    Ok(())
}

async fn get_health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "connections": state.bridge.connection_count(),
    }))
}
