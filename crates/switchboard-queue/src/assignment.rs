// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assignment and transfer engine.
//!
//! Decides who a waiting session is routed to when the customer picks an
//! operator, and carries out the operator-facing actions: claim, claim next,
//! transfer, complete, cancel, and starting an outbound conversation.
//!
//! Customer notices, upstream bot-session changes, and broadcasts are side
//! effects. They run through [`best_effort`] after the session write has
//! committed and never undo it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use switchboard_core::{
    BotStatus, CancelReason, ChatGateway, CustomerDirectory, Operator, OperatorDirectory,
    Rejection, Session, SessionStatus, SwitchboardError, Tabulation, TabulationStore,
    best_effort,
};
use switchboard_presence::{OperatorEvent, PresenceRegistry, QueueChange};

use crate::announce::announce;
use crate::notices::Notices;
use crate::registry::SessionRegistry;

/// Where a customer's operator choice ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentOutcome {
    /// The chosen operator is online and has been asked to claim.
    Requested { operator_id: String },
    /// The chosen operator is offline; their online supervisor was asked instead.
    FallbackToSupervisor {
        supervisor_id: String,
        original_operator_id: String,
    },
    /// Nobody suitable is online. The customer was asked to wait.
    Waiting {
        requested_operator_id: Option<String>,
        supervisor_id: Option<String>,
    },
}

pub struct AssignmentEngine {
    sessions: Arc<SessionRegistry>,
    operators: Arc<dyn OperatorDirectory>,
    customers: Arc<dyn CustomerDirectory>,
    tabulations: Arc<dyn TabulationStore>,
    gateway: Arc<dyn ChatGateway>,
    presence: Arc<PresenceRegistry>,
    notices: Notices,
}

impl AssignmentEngine {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        operators: Arc<dyn OperatorDirectory>,
        customers: Arc<dyn CustomerDirectory>,
        tabulations: Arc<dyn TabulationStore>,
        gateway: Arc<dyn ChatGateway>,
        presence: Arc<PresenceRegistry>,
        notices: Notices,
    ) -> Self {
        Self {
            sessions,
            operators,
            customers,
            tabulations,
            gateway,
            presence,
            notices,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    /// Active operators of a department sorted by name, with the department
    /// supervisor appended when not already listed.
    pub async fn eligible_operators(
        &self,
        department: &str,
    ) -> Result<Vec<Operator>, SwitchboardError> {
        let mut operators: Vec<Operator> = self
            .operators
            .operators_in_department(department)
            .await?
            .into_iter()
            .filter(|op| op.active)
            .collect();
        operators.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });

        if let Some(supervisor) = self.operators.department_supervisor(department).await? {
            if supervisor.active && !operators.iter().any(|op| op.id == supervisor.id) {
                operators.push(supervisor);
            }
        }
        Ok(operators)
    }

    /// Sends the operator menu to the customer of a waiting session and marks
    /// the session as expecting a numeric choice.
    ///
    /// Sessions without a department, or whose department has no eligible
    /// operators, are returned unchanged.
    pub async fn offer_operator_menu(&self, session: &Session) -> Result<Session, SwitchboardError> {
        let Some(department) = session.department.as_deref() else {
            return Ok(session.clone());
        };
        let operators = self.eligible_operators(department).await?;
        if operators.is_empty() {
            return Ok(session.clone());
        }

        let updated = self.sessions.await_choice(&session.id).await?;
        let menu = self.notices.operator_menu(department, &operators);
        best_effort(
            "send_operator_menu",
            self.gateway.send_text(&session.instance, &session.address, &menu),
        )
        .await;
        Ok(updated)
    }

    /// Resolves a customer's 1-based menu choice and routes the session.
    pub async fn choose_operator(
        &self,
        session_id: &str,
        ordinal: usize,
    ) -> Result<AssignmentOutcome, SwitchboardError> {
        let session = self.sessions.get(session_id).await?;
        if session.status.is_terminal() {
            return Err(SwitchboardError::rejected(session_id, Rejection::Terminal));
        }
        if session.status != SessionStatus::Waiting {
            return Err(SwitchboardError::rejected(session_id, Rejection::NotWaiting));
        }
        let department = session
            .department
            .clone()
            .ok_or_else(|| SwitchboardError::rejected(session_id, Rejection::InvalidChoice))?;

        let operators = self.eligible_operators(&department).await?;
        let chosen = ordinal
            .checked_sub(1)
            .and_then(|i| operators.get(i))
            .cloned()
            .ok_or_else(|| SwitchboardError::rejected(session_id, Rejection::InvalidChoice))?;

        let supervisor = self.operators.department_supervisor(&department).await?;
        let supervisor_id = supervisor.as_ref().map(|s| s.id.as_str());
        let chosen_online = self.presence.is_online(&chosen.id);
        let supervisor_online = supervisor_id.is_some_and(|id| self.presence.is_online(id));

        let (routed, outcome, notice) = if chosen_online {
            let routed = self
                .sessions
                .route(session_id, Some(&chosen.id), supervisor_id, None)
                .await?;
            let outcome = AssignmentOutcome::Requested {
                operator_id: chosen.id.clone(),
            };
            (routed, outcome, self.notices.assigned(&chosen.name))
        } else if supervisor_id == Some(chosen.id.as_str()) {
            let routed = self
                .sessions
                .route(session_id, None, Some(&chosen.id), None)
                .await?;
            let outcome = AssignmentOutcome::Waiting {
                requested_operator_id: None,
                supervisor_id: Some(chosen.id.clone()),
            };
            (routed, outcome, self.notices.wait(&chosen.name))
        } else if let (Some(sup), true) = (supervisor.as_ref(), supervisor_online) {
            let routed = self
                .sessions
                .route(session_id, Some(&sup.id), Some(&sup.id), Some(&chosen.id))
                .await?;
            let outcome = AssignmentOutcome::FallbackToSupervisor {
                supervisor_id: sup.id.clone(),
                original_operator_id: chosen.id.clone(),
            };
            (routed, outcome, self.notices.assigned(&sup.name))
        } else {
            let routed = self
                .sessions
                .route(session_id, Some(&chosen.id), supervisor_id, None)
                .await?;
            let outcome = AssignmentOutcome::Waiting {
                requested_operator_id: Some(chosen.id.clone()),
                supervisor_id: supervisor_id.map(str::to_string),
            };
            (routed, outcome, self.notices.wait(&chosen.name))
        };

        info!(session_id, operator_id = %chosen.id, outcome = ?outcome, "operator choice resolved");

        if let Some(target) = routed.requested_operator.as_deref() {
            self.presence.to_operator(
                target,
                OperatorEvent::queue_update(QueueChange::OperatorRequested, &routed),
            );
        }
        announce(&self.presence, QueueChange::OperatorRequested, &routed);
        best_effort(
            "notify_customer_choice",
            self.gateway
                .send_text(&routed.instance, &routed.address, &notice),
        )
        .await;

        Ok(outcome)
    }

    async fn active_operator(&self, operator_id: &str) -> Result<Operator, SwitchboardError> {
        let operator = self
            .operators
            .find_operator(operator_id)
            .await?
            .ok_or_else(|| SwitchboardError::not_found("operator", operator_id))?;
        if !operator.active {
            return Err(SwitchboardError::rejected(
                operator_id,
                Rejection::OperatorInactive,
            ));
        }
        Ok(operator)
    }

    /// `waiting → service` for the given operator.
    pub async fn claim(
        &self,
        session_id: &str,
        operator_id: &str,
    ) -> Result<Session, SwitchboardError> {
        self.active_operator(operator_id).await?;
        let session = self.sessions.claim(session_id, operator_id).await?;
        info!(session_id, operator_id, "session claimed");
        self.presence
            .set_current_session(operator_id, Some(session_id));
        announce(&self.presence, QueueChange::Claimed, &session);
        Ok(session)
    }

    /// Claims the oldest waiting session the operator is eligible for.
    ///
    /// Eligible sessions are those requesting the operator, those they
    /// supervise, and unrequested sessions of their department. Sessions lost
    /// to a concurrent claim are skipped.
    pub async fn claim_next(
        &self,
        operator_id: &str,
    ) -> Result<Option<Session>, SwitchboardError> {
        let operator = self.active_operator(operator_id).await?;
        let mut candidates = self.sessions.waiting_for_operator(operator_id).await?;
        for session in self.sessions.waiting_unrequested(&operator.department).await? {
            if !candidates.iter().any(|c| c.id == session.id) {
                candidates.push(session);
            }
        }
        candidates.sort_by_key(|s| s.bot_completed_at.unwrap_or(s.created_at));

        for candidate in candidates {
            match self.claim(&candidate.id, operator_id).await {
                Ok(session) => return Ok(Some(session)),
                Err(e) if e.rejection().is_some() => {
                    info!(session_id = %candidate.id, operator_id, error = %e, "candidate taken, trying next");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Moves a service session from the caller to another active operator.
    pub async fn transfer(
        &self,
        session_id: &str,
        caller: &str,
        target: &str,
    ) -> Result<Session, SwitchboardError> {
        let target_operator = self.active_operator(target).await?;
        let session = self.sessions.transfer(session_id, caller, target).await?;
        info!(session_id, from = caller, to = target, "session transferred");

        self.presence.set_current_session(caller, None);
        self.presence.set_current_session(target, Some(session_id));
        let text = self.notices.transfer(&target_operator.name);
        best_effort(
            "notify_customer_transfer",
            self.gateway.send_text(&session.instance, &session.address, &text),
        )
        .await;
        self.presence
            .to_all(OperatorEvent::queue_update(QueueChange::Transferred, &session));
        Ok(session)
    }

    /// Completes a service session and records its tabulation.
    pub async fn complete(
        &self,
        session_id: &str,
        caller: &str,
        outcome: &str,
        notes: Option<&str>,
    ) -> Result<(Session, Tabulation), SwitchboardError> {
        let session = self.sessions.complete(session_id, caller, outcome).await?;
        let tabulation = Tabulation {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            operator_id: caller.to_string(),
            outcome: outcome.trim().to_string(),
            notes: notes.map(str::to_string),
            created_at: Utc::now(),
        };
        if let Err(e) = self.tabulations.create_tabulation(&tabulation).await {
            warn!(session_id, error = %e, "session completed but tabulation was not recorded");
            return Err(e);
        }
        info!(session_id, operator_id = caller, outcome, "session completed");

        self.presence.set_current_session(caller, None);
        announce(&self.presence, QueueChange::Completed, &session);
        Ok((session, tabulation))
    }

    /// Cancels a `bot` or `waiting` session on an operator's request.
    pub async fn cancel(
        &self,
        session_id: &str,
        operator_id: &str,
    ) -> Result<Session, SwitchboardError> {
        self.active_operator(operator_id).await?;
        let session = self
            .sessions
            .cancel(session_id, CancelReason::OperatorCancel)
            .await?;
        best_effort(
            "close_bot_session",
            self.gateway
                .change_bot_status(&session.instance, &session.address, BotStatus::Closed),
        )
        .await;
        announce(&self.presence, QueueChange::Cancelled, &session);
        Ok(session)
    }

    /// Starts an operator-initiated conversation.
    ///
    /// The opening text is the primary effect: if the gateway rejects it, no
    /// session is created and the error is returned.
    pub async fn start_outbound(
        &self,
        operator_id: &str,
        instance: &str,
        address: &str,
        text: &str,
    ) -> Result<Session, SwitchboardError> {
        let operator = self.active_operator(operator_id).await?;
        if let Some(open) = self.sessions.find_open(address).await? {
            return Err(SwitchboardError::rejected(
                open.id,
                Rejection::OpenSessionExists,
            ));
        }
        let customer = self.customers.find_or_create_customer(address, None).await?;

        let message_id = self.gateway.send_text(instance, address, text).await?;

        let candidate = Session::new_outbound(
            instance,
            &customer.id,
            address,
            operator_id,
            Some(&operator.department),
            Utc::now(),
        );
        let session = self.sessions.open_outbound(candidate).await?;
        info!(
            session_id = %session.id,
            operator_id,
            address,
            message_id = %message_id,
            "outbound conversation started"
        );
        self.presence
            .set_current_session(operator_id, Some(&session.id));
        announce(&self.presence, QueueChange::Created, &session);
        Ok(session)
    }
}
