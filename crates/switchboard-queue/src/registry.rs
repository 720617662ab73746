// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session registry: state transitions over a [`SessionStore`].
//!
//! Every transition follows the same discipline: read the row, run the pure
//! transition from [`crate::machine`], then write conditionally on the row
//! version that was read. If the write loses a race the row is
//! re-read and the transition re-evaluated, so a caller either succeeds or
//! receives the rejection that applies to the state that actually won.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use switchboard_core::{
    BotPayload, CancelReason, PriorState, Rejection, Session, SessionStatus, SessionStore,
    SwitchboardError,
};
use tracing::{debug, info};

use crate::machine;

/// Attempts before giving up on a row that keeps changing underneath us.
const CONFLICT_RETRIES: usize = 3;

pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Loads a session or fails with [`SwitchboardError::NotFound`].
    pub async fn get(&self, id: &str) -> Result<Session, SwitchboardError> {
        self.store
            .get_session(id)
            .await?
            .ok_or_else(|| SwitchboardError::not_found("session", id))
    }

    pub async fn find_open(&self, address: &str) -> Result<Option<Session>, SwitchboardError> {
        self.store.find_open_by_address(address).await
    }

    /// Returns the open session for the candidate's address, inserting the
    /// candidate (an inbound `bot` session) if there is none. The flag is
    /// true when the candidate was inserted.
    pub async fn open_inbound(
        &self,
        candidate: Session,
    ) -> Result<(Session, bool), SwitchboardError> {
        let (session, created) = self.store.open_session_if_absent(&candidate).await?;
        if created {
            info!(
                session_id = %session.id,
                address = %session.address,
                instance = %session.instance,
                "inbound session created"
            );
        }
        Ok((session, created))
    }

    /// Creates an operator-initiated session already in `service`.
    ///
    /// Fails with `open_session_exists` if the customer has an open session.
    pub async fn open_outbound(&self, candidate: Session) -> Result<Session, SwitchboardError> {
        let (session, created) = self.store.open_session_if_absent(&candidate).await?;
        if !created {
            return Err(SwitchboardError::rejected(
                session.id,
                Rejection::OpenSessionExists,
            ));
        }
        info!(
            session_id = %session.id,
            address = %session.address,
            operator_id = ?session.assigned_operator,
            "outbound session created"
        );
        Ok(session)
    }

    /// Applies a transition under the conditional-update discipline.
    pub async fn apply<F>(&self, id: &str, transition: F) -> Result<Session, SwitchboardError>
    where
        F: Fn(&Session) -> Result<Session, Rejection> + Send + Sync,
    {
        for _ in 0..CONFLICT_RETRIES {
            let current = self.get(id).await?;
            let mut next = transition(&current).map_err(|reason| {
                debug!(session_id = id, status = %current.status, %reason, "transition rejected");
                SwitchboardError::rejected(id, reason)
            })?;
            debug_assert!(next.invariants_hold(), "transition broke session invariants");
            if self
                .store
                .update_session(&next, &PriorState::of(&current))
                .await?
            {
                next.version = current.version + 1;
                debug!(session_id = id, from = %current.status, to = %next.status, "session updated");
                return Ok(next);
            }
            debug!(session_id = id, "conditional update lost a race, re-reading");
        }
        Err(SwitchboardError::Internal(format!(
            "session {id} kept changing during update"
        )))
    }

    pub async fn hand_off(
        &self,
        id: &str,
        department: Option<&str>,
    ) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| machine::hand_off(s, department, Utc::now()))
            .await
    }

    pub async fn resume_bot(&self, id: &str) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| machine::resume_bot(s, Utc::now())).await
    }

    pub async fn route(
        &self,
        id: &str,
        requested: Option<&str>,
        supervisor: Option<&str>,
        original: Option<&str>,
    ) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| {
            machine::route(s, requested, supervisor, original, Utc::now())
        })
        .await
    }

    pub async fn await_choice(&self, id: &str) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| machine::await_choice(s, Utc::now())).await
    }

    pub async fn claim(&self, id: &str, operator_id: &str) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| machine::claim(s, operator_id, Utc::now()))
            .await
    }

    pub async fn transfer(
        &self,
        id: &str,
        caller: &str,
        target: &str,
    ) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| machine::transfer(s, caller, target, Utc::now()))
            .await
    }

    pub async fn complete(
        &self,
        id: &str,
        caller: &str,
        outcome: &str,
    ) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| machine::complete(s, caller, outcome, Utc::now()))
            .await
    }

    pub async fn cancel(
        &self,
        id: &str,
        reason: CancelReason,
    ) -> Result<Session, SwitchboardError> {
        let session = self
            .apply(id, |s| machine::cancel(s, reason, Utc::now()))
            .await?;
        info!(session_id = id, %reason, "session cancelled");
        Ok(session)
    }

    /// Replaces the bot-stage payload on an open session. Status is unchanged.
    pub async fn refresh_payload(
        &self,
        id: &str,
        payload: &BotPayload,
    ) -> Result<Session, SwitchboardError> {
        self.apply(id, |s| {
            if s.status.is_terminal() {
                return Err(Rejection::Terminal);
            }
            let mut next = s.clone();
            next.bot_payload = payload.clone();
            next.updated_at = Utc::now();
            Ok(next)
        })
        .await
    }

    pub async fn waiting_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Vec<Session>, SwitchboardError> {
        self.store.list_waiting_for_operator(operator_id).await
    }

    pub async fn waiting_unrequested(
        &self,
        department: &str,
    ) -> Result<Vec<Session>, SwitchboardError> {
        self.store.list_waiting_unrequested(department).await
    }

    pub async fn in_service_for(
        &self,
        operator_id: &str,
    ) -> Result<Vec<Session>, SwitchboardError> {
        self.store.list_in_service_for_operator(operator_id).await
    }

    /// Sessions in `status` whose stage began before `cutoff`.
    pub async fn stale(
        &self,
        status: SessionStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, SwitchboardError> {
        self.store.list_stale(status, cutoff).await
    }
}
