// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping of engine errors onto HTTP responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use switchboard_core::SwitchboardError;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Stable rejection reason for invalid transitions (e.g. `already_assigned`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// A [`SwitchboardError`] returned from a handler.
#[derive(Debug)]
pub struct ApiError(pub SwitchboardError);

impl From<SwitchboardError> for ApiError {
    fn from(e: SwitchboardError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            SwitchboardError::InvalidTransition { .. } => StatusCode::CONFLICT,
            SwitchboardError::NotFound { .. } => StatusCode::NOT_FOUND,
            SwitchboardError::MalformedEvent(_) => StatusCode::BAD_REQUEST,
            SwitchboardError::Gateway { .. } => StatusCode::BAD_GATEWAY,
            SwitchboardError::Storage { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SwitchboardError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            SwitchboardError::Config(_) | SwitchboardError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self.0, status = %status, "request failed");
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            reason: self.0.rejection().map(|r| r.reason()),
        };
        (status, Json(body)).into_response()
    }
}
