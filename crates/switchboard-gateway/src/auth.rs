// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared-secret checks for webhook intake and operator endpoints.
//!
//! - Webhooks: when a webhook token is configured, the request must carry it
//!   in the `x-webhook-token` header or a `token` query parameter.
//! - Operator endpoints: `Authorization: Bearer <operator token>` plus an
//!   `x-operator-id` header naming the acting operator. With no operator
//!   token configured every request is rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

/// Header naming the operator performing an action.
pub const OPERATOR_ID_HEADER: &str = "x-operator-id";

/// Header carrying the webhook shared secret.
pub const WEBHOOK_TOKEN_HEADER: &str = "x-webhook-token";

#[derive(Clone, Default)]
pub struct AuthConfig {
    /// Secret expected on webhook intake. `None` leaves intake open.
    pub webhook_token: Option<String>,
    /// Bearer token for operator endpoints and WebSocket handshakes.
    pub operator_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("webhook_token", &self.webhook_token.as_ref().map(|_| "[redacted]"))
            .field("operator_token", &self.operator_token.as_ref().map(|_| "[redacted]"))
            .finish()
    }
}

/// Extracts `token=<value>` from a raw query string.
pub fn query_token(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == "token")
        .map(|(_, v)| v)
}

impl AuthConfig {
    /// True if a webhook request with these headers and query is accepted.
    pub fn webhook_allowed(&self, headers: &HeaderMap, query: Option<&str>) -> bool {
        let Some(expected) = self.webhook_token.as_deref() else {
            return true;
        };
        let header = headers
            .get(WEBHOOK_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok());
        header == Some(expected) || query_token(query) == Some(expected)
    }

    /// True if `token` matches the operator token. Always false when none is configured.
    pub fn operator_token_matches(&self, token: Option<&str>) -> bool {
        match (self.operator_token.as_deref(), token) {
            (Some(expected), Some(given)) => expected == given,
            _ => false,
        }
    }
}

/// Middleware guarding operator endpoints with the bearer token.
pub async fn operator_auth(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.operator_token.is_none() {
        tracing::error!("no operator token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }
    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if auth.operator_token_matches(token) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
