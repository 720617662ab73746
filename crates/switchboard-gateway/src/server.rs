// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use switchboard_core::{OperatorDirectory, SwitchboardError};
use switchboard_presence::PresenceRegistry;
use switchboard_queue::AssignmentEngine;
use switchboard_router::EventRouter;
use switchboard_storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{AuthConfig, operator_auth};
use crate::handlers;
use crate::ws;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<EventRouter>,
    pub assignment: Arc<AssignmentEngine>,
    pub presence: Arc<PresenceRegistry>,
    pub operators: Arc<dyn OperatorDirectory>,
    pub storage: Arc<SqliteStorage>,
    pub auth: AuthConfig,
    /// Process start time for uptime reporting.
    pub started_at: std::time::Instant,
}

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Builds the application router.
///
/// - `GET /health` (public)
/// - `POST /webhook` (webhook token, if configured)
/// - `GET /ws` (operator token checked during the handshake)
/// - `/v1/...` operator actions (bearer operator token)
pub fn build_router(state: AppState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/webhook", post(handlers::post_webhook))
        .route("/ws", get(ws::ws_handler))
        .with_state(state.clone());

    let operator_routes = Router::new()
        .route("/v1/sessions/next", post(handlers::claim_next))
        .route("/v1/sessions/{id}", get(handlers::get_session))
        .route("/v1/sessions/{id}/messages", get(handlers::get_session_messages))
        .route("/v1/sessions/{id}/claim", post(handlers::claim))
        .route("/v1/sessions/{id}/transfer", post(handlers::transfer))
        .route("/v1/sessions/{id}/complete", post(handlers::complete))
        .route("/v1/sessions/{id}/cancel", post(handlers::cancel))
        .route("/v1/conversations", post(handlers::start_conversation))
        .route("/v1/operators/{id}/queue", get(handlers::operator_queue))
        .route("/v1/operators/{id}/disconnect", post(handlers::disconnect_operator))
        .route("/v1/presence", get(handlers::get_presence))
        .route_layer(axum_middleware::from_fn_with_state(auth_state, operator_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(operator_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serves the gateway until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), SwitchboardError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| SwitchboardError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("gateway server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_debug() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3100,
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("127.0.0.1"));
    }
}
