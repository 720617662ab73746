// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session persistence with row-level conditional updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SwitchboardError;
use crate::types::{Session, SessionStatus};

/// The prior state a conditional update expects to observe.
///
/// `version` changes on every write, so two transitions that keep the same
/// status (a route racing a payload refresh) still conflict. Status and
/// assignee are carried for logging and as a second guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorState {
    pub status: SessionStatus,
    pub assigned_operator: Option<String>,
    pub version: i64,
}

impl PriorState {
    /// The prior state as observed on a loaded session.
    pub fn of(session: &Session) -> Self {
        Self {
            status: session.status,
            assigned_operator: session.assigned_operator.clone(),
            version: session.version,
        }
    }
}

/// Canonical store of session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts a new session.
    async fn create_session(&self, session: &Session) -> Result<(), SwitchboardError>;

    /// Loads a session by id.
    async fn get_session(&self, id: &str) -> Result<Option<Session>, SwitchboardError>;

    /// Finds the single non-terminal session for a customer address.
    async fn find_open_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Session>, SwitchboardError>;

    /// Returns the open session for the candidate's address, inserting the
    /// candidate if there is none. The boolean is true when a row was created.
    ///
    /// Lookup and insert happen atomically so duplicate webhook deliveries
    /// cannot open two sessions for one customer.
    async fn open_session_if_absent(
        &self,
        candidate: &Session,
    ) -> Result<(Session, bool), SwitchboardError>;

    /// Writes `session` only if the stored row still matches `prior`, and
    /// bumps the stored version to `prior.version + 1`.
    ///
    /// Returns false when the row changed underneath the caller (or does not
    /// exist); the caller decides how to report that.
    async fn update_session(
        &self,
        session: &Session,
        prior: &PriorState,
    ) -> Result<bool, SwitchboardError>;

    /// Waiting sessions where the operator is the requested operator or the supervisor.
    async fn list_waiting_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Vec<Session>, SwitchboardError>;

    /// Waiting sessions in a department with no requested operator, oldest first.
    async fn list_waiting_unrequested(
        &self,
        department: &str,
    ) -> Result<Vec<Session>, SwitchboardError>;

    /// Sessions in service assigned to the operator.
    async fn list_in_service_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Vec<Session>, SwitchboardError>;

    /// Sessions in `status` whose stage started before `cutoff`, oldest first.
    ///
    /// The stage start is `created_at` for `bot` and the hand-off time
    /// (falling back to `created_at`) for `waiting`.
    async fn list_stale(
        &self,
        status: SessionStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, SwitchboardError>;
}
