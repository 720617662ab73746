// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers.

use axum::{
    Json,
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{HeaderMap, StatusCode, Uri, request::Parts},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use switchboard_core::{
    HealthStatus, MessageStore, Session, StoredMessage, SwitchboardError, Tabulation,
};
use switchboard_presence::PresenceRecord;
use switchboard_router::WebhookEnvelope;

use crate::auth::OPERATOR_ID_HEADER;
use crate::error::{ApiError, ErrorResponse};
use crate::server::AppState;

/// The operator performing a request, from the `x-operator-id` header.
#[derive(Debug, Clone)]
pub struct OperatorId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for OperatorId {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(OPERATOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| OperatorId(v.to_string()))
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: format!("missing {OPERATOR_ID_HEADER} header"),
                        reason: None,
                    }),
                )
            })
    }
}

/// Acknowledgement returned to the chat gateway for every webhook.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub ok: bool,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// POST /webhook
///
/// Always acknowledges with 200 unless storage failed, in which case 503
/// asks the gateway to redeliver. Redelivery is safe.
pub async fn post_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    if !state.auth.webhook_allowed(&headers, uri.query()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body is not a valid envelope");
            return Json(WebhookAck {
                ok: false,
                outcome: "malformed",
                detail: Some(e.to_string()),
            })
            .into_response();
        }
    };

    let event = envelope.event.clone();
    match state.router.route(envelope).await {
        Ok(outcome) => {
            tracing::debug!(event = %event, outcome = outcome.label(), "webhook handled");
            let detail = match &outcome {
                switchboard_router::RouteOutcome::Malformed { reason } => Some(reason.clone()),
                _ => None,
            };
            Json(WebhookAck {
                ok: outcome.is_success(),
                outcome: outcome.label(),
                detail,
            })
            .into_response()
        }
        Err(e @ SwitchboardError::Storage { .. }) => {
            tracing::error!(event = %event, error = %e, "webhook failed on storage, requesting redelivery");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(WebhookAck {
                    ok: false,
                    outcome: "retry",
                    detail: Some(e.to_string()),
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(event = %event, error = %e, "webhook handling failed");
            Json(WebhookAck {
                ok: false,
                outcome: "failed",
                detail: Some(e.to_string()),
            })
            .into_response()
        }
    }
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub operators_online: usize,
    pub connections: usize,
    pub uptime_secs: u64,
    pub version: &'static str,
}

/// GET /health
pub async fn get_health(State(state): State<AppState>) -> Response {
    let (status, detail, code) = match state.storage.health_check().await {
        HealthStatus::Healthy => ("healthy", None, StatusCode::OK),
        HealthStatus::Degraded(d) => ("degraded", Some(d), StatusCode::OK),
        HealthStatus::Unhealthy(d) => ("unhealthy", Some(d), StatusCode::SERVICE_UNAVAILABLE),
    };
    let body = HealthResponse {
        status,
        detail,
        operators_online: state.presence.online_operators().len(),
        connections: state.presence.connection_count(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    };
    (code, Json(body)).into_response()
}

/// GET /v1/sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.assignment.sessions().get(&id).await?))
}

/// GET /v1/sessions/{id}/messages
pub async fn get_session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StoredMessage>>, ApiError> {
    state.assignment.sessions().get(&id).await?;
    Ok(Json(state.storage.messages_for_session(&id).await?))
}

/// POST /v1/sessions/{id}/claim
pub async fn claim(
    State(state): State<AppState>,
    OperatorId(operator): OperatorId,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.assignment.claim(&id, &operator).await?))
}

#[derive(Debug, Serialize)]
pub struct ClaimNextResponse {
    pub session: Option<Session>,
}

/// POST /v1/sessions/next
pub async fn claim_next(
    State(state): State<AppState>,
    OperatorId(operator): OperatorId,
) -> Result<Json<ClaimNextResponse>, ApiError> {
    let session = state.assignment.claim_next(&operator).await?;
    Ok(Json(ClaimNextResponse { session }))
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub target_operator: String,
}

/// POST /v1/sessions/{id}/transfer
pub async fn transfer(
    State(state): State<AppState>,
    OperatorId(operator): OperatorId,
    Path(id): Path<String>,
    Json(body): Json<TransferRequest>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(
        state
            .assignment
            .transfer(&id, &operator, &body.target_operator)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub outcome: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub session: Session,
    pub tabulation: Tabulation,
}

/// POST /v1/sessions/{id}/complete
pub async fn complete(
    State(state): State<AppState>,
    OperatorId(operator): OperatorId,
    Path(id): Path<String>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<CompleteResponse>, ApiError> {
    let (session, tabulation) = state
        .assignment
        .complete(&id, &operator, &body.outcome, body.notes.as_deref())
        .await?;
    Ok(Json(CompleteResponse {
        session,
        tabulation,
    }))
}

/// POST /v1/sessions/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    OperatorId(operator): OperatorId,
    Path(id): Path<String>,
) -> Result<Json<Session>, ApiError> {
    Ok(Json(state.assignment.cancel(&id, &operator).await?))
}

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub instance: String,
    pub address: String,
    pub text: String,
}

/// POST /v1/conversations
pub async fn start_conversation(
    State(state): State<AppState>,
    OperatorId(operator): OperatorId,
    Json(body): Json<StartConversationRequest>,
) -> Result<(StatusCode, Json<Session>), ApiError> {
    let session = state
        .assignment
        .start_outbound(&operator, &body.instance, &body.address, &body.text)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Debug, Serialize)]
pub struct OperatorQueueResponse {
    pub in_service: Vec<Session>,
    pub waiting: Vec<Session>,
}

/// GET /v1/operators/{id}/queue
pub async fn operator_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OperatorQueueResponse>, ApiError> {
    let sessions = state.assignment.sessions();
    Ok(Json(OperatorQueueResponse {
        in_service: sessions.in_service_for(&id).await?,
        waiting: sessions.waiting_for_operator(&id).await?,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DisconnectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub dropped: usize,
}

/// POST /v1/operators/{id}/disconnect
pub async fn disconnect_operator(
    State(state): State<AppState>,
    OperatorId(caller): OperatorId,
    Path(id): Path<String>,
    body: Bytes,
) -> Json<DisconnectResponse> {
    // The body is optional; an empty or unparsable one means no reason given.
    let reason = serde_json::from_slice::<DisconnectRequest>(&body)
        .ok()
        .and_then(|b| b.reason)
        .unwrap_or_else(|| format!("disconnected by {caller}"));
    let dropped = state.presence.force_disconnect(&id, &reason);
    Json(DisconnectResponse { dropped })
}

/// GET /v1/presence
pub async fn get_presence(State(state): State<AppState>) -> Json<Vec<PresenceRecord>> {
    Json(state.presence.snapshot())
}
