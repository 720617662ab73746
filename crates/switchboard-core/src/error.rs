// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard routing engine.

use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Why the session state machine refused a transition.
///
/// Each variant renders as a stable snake_case reason string so operator
/// clients can branch on it (e.g. retry a claim on `not_waiting` but give up
/// on `already_assigned`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Rejection {
    /// Claim attempted on a session that is not in `waiting`.
    NotWaiting,
    /// Hand-off attempted on a session that is not in `bot`.
    NotInBot,
    /// Claim attempted on a session that already has an assignee.
    AlreadyAssigned,
    /// Caller is not the operator currently assigned to the session.
    NotAssignee,
    /// Transfer or completion attempted on a session that is not in `service`.
    NotInService,
    /// The session is `completed` or `cancelled`.
    Terminal,
    /// Cancellation attempted from a state other than `bot` or `waiting`.
    NotCancellable,
    /// Hand-off attempted while an operator is still assigned.
    AssignedOperatorPresent,
    /// The customer already has a non-terminal session.
    OpenSessionExists,
    /// Completion attempted without a tabulation outcome code.
    MissingOutcome,
    /// Transfer target equals the current assignee.
    SameOperator,
    /// Target operator exists but is not active.
    OperatorInactive,
    /// Operator choice ordinal is out of range for the presented list.
    InvalidChoice,
}

impl Rejection {
    /// The stable reason string reported to callers.
    pub fn reason(self) -> &'static str {
        self.into()
    }
}

/// The primary error type used across all Switchboard crates.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Chat-gateway collaborator errors (HTTP failure, unexpected response).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced session, operator, or customer does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The state machine forbids the requested change.
    #[error("invalid transition for session {session_id}: {reason}")]
    InvalidTransition {
        session_id: String,
        reason: Rejection,
    },

    /// An inbound webhook payload is missing required fields.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Shorthand for a [`SwitchboardError::InvalidTransition`].
    pub fn rejected(session_id: impl Into<String>, reason: Rejection) -> Self {
        Self::InvalidTransition {
            session_id: session_id.into(),
            reason,
        }
    }

    /// Shorthand for a [`SwitchboardError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Returns the rejection reason if this is an invalid-transition error.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::InvalidTransition { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
