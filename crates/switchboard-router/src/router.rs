// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook event dispatch.
//!
//! [`EventRouter::route`] parses a gateway envelope into a [`ParsedEvent`]
//! and hands it to the handler for its kind. Every handler is idempotent
//! under redelivery: messages are keyed by gateway id and session creation
//! goes through the registry's find-or-insert.
//!
//! New-message precedence:
//! 1. group addresses bypass the queue entirely and go to everyone;
//! 2. the open session is looked up or created;
//! 3. a numeric reply to the operator menu is resolved as a choice;
//! 4. the message is broadcast to the assignee, else the department.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use switchboard_core::{
    BotPayload, BotStatus, ChatGateway, CustomerDirectory, MessageStatus, MessageStore, MetaKey,
    Rejection, Session, SessionStatus, StoredMessage, SwitchboardError, best_effort,
};
use switchboard_presence::{
    DeliveryReport, NotificationLevel, OperatorEvent, PresenceRegistry, QueueChange,
};
use switchboard_queue::{AssignmentEngine, AssignmentOutcome, SessionRegistry, announce};

use crate::event::{BotEvent, MessageEnvelope, ParsedEvent, WebhookEnvelope, parse_event};

/// Result of routing one webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Event kind the router does not handle.
    Ignored { kind: String },
    /// Payload was missing required fields and was dropped.
    Malformed { reason: String },
    /// A message with this gateway id was already recorded.
    Duplicate { gateway_id: String },
    /// A one-to-one message was stored and broadcast.
    MessageRecorded {
        session_id: Option<String>,
        created_session: bool,
        delivery: DeliveryReport,
    },
    /// A group message was stored and broadcast to everyone.
    GroupMessage { delivery: DeliveryReport },
    /// A numeric reply was resolved against the operator menu.
    OperatorChosen {
        session_id: String,
        outcome: AssignmentOutcome,
        delivery: DeliveryReport,
    },
    StatusUpdated { gateway_id: String, found: bool },
    /// Advisory broadcast only (connection or group events).
    Notified { delivery: DeliveryReport },
    /// Bot-session event applied. `change` is set when the status moved.
    BotSessionRefreshed {
        session_id: Option<String>,
        change: Option<QueueChange>,
    },
    /// Outgoing message confirmation. `new` is false when it was already stored.
    Sent { gateway_id: String, new: bool },
}

impl RouteOutcome {
    /// False only for dropped malformed events.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Malformed { .. })
    }

    /// Short snake_case name of the outcome, for acknowledgements and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored { .. } => "ignored",
            Self::Malformed { .. } => "malformed",
            Self::Duplicate { .. } => "duplicate",
            Self::MessageRecorded { .. } => "message_recorded",
            Self::GroupMessage { .. } => "group_message",
            Self::OperatorChosen { .. } => "operator_chosen",
            Self::StatusUpdated { .. } => "status_updated",
            Self::Notified { .. } => "notified",
            Self::BotSessionRefreshed { .. } => "bot_session_refreshed",
            Self::Sent { .. } => "sent",
        }
    }
}

/// Dispatches gateway webhooks onto the session registry and broadcast layer.
pub struct EventRouter {
    assignment: Arc<AssignmentEngine>,
    messages: Arc<dyn MessageStore>,
    customers: Arc<dyn CustomerDirectory>,
    gateway: Arc<dyn ChatGateway>,
    presence: Arc<PresenceRegistry>,
    /// Gateway instance name to the bot id used for live snapshot lookups.
    bot_ids: HashMap<String, String>,
}

impl EventRouter {
    pub fn new(
        assignment: Arc<AssignmentEngine>,
        messages: Arc<dyn MessageStore>,
        customers: Arc<dyn CustomerDirectory>,
        gateway: Arc<dyn ChatGateway>,
        presence: Arc<PresenceRegistry>,
    ) -> Self {
        Self {
            assignment,
            messages,
            customers,
            gateway,
            presence,
            bot_ids: HashMap::new(),
        }
    }

    /// Registers the bot id used to fetch live snapshots for an instance.
    pub fn with_bot(mut self, instance: impl Into<String>, bot_id: impl Into<String>) -> Self {
        self.bot_ids.insert(instance.into(), bot_id.into());
        self
    }

    fn sessions(&self) -> &SessionRegistry {
        self.assignment.sessions()
    }

    /// Routes one webhook envelope.
    ///
    /// Malformed payloads and unknown kinds are reported as outcomes, not
    /// errors. An `Err` means a storage or directory failure; redelivery of
    /// the same event is safe.
    pub async fn route(&self, envelope: WebhookEnvelope) -> Result<RouteOutcome, SwitchboardError> {
        let kind = envelope.event.clone();
        let parsed = match parse_event(envelope) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => {
                debug!(event = %kind, "ignoring unhandled event kind");
                return Ok(RouteOutcome::Ignored { kind });
            }
            Err(SwitchboardError::MalformedEvent(reason)) => {
                warn!(event = %kind, %reason, "dropping malformed webhook event");
                return Ok(RouteOutcome::Malformed { reason });
            }
            Err(e) => return Err(e),
        };

        debug!(event = %kind, instance = %parsed.instance(), "routing webhook event");
        match parsed {
            ParsedEvent::NewMessage { instance, message } => {
                self.on_new_message(&instance, message).await
            }
            ParsedEvent::MessageStatus {
                gateway_id, status, ..
            } => {
                let found = self.messages.update_status(&gateway_id, status).await?;
                if !found {
                    debug!(gateway_id = %gateway_id, %status, "status update for unknown message");
                }
                Ok(RouteOutcome::StatusUpdated { gateway_id, found })
            }
            ParsedEvent::Connection { instance, state } => {
                let level = if state.eq_ignore_ascii_case("open") {
                    NotificationLevel::Info
                } else {
                    NotificationLevel::Warning
                };
                info!(instance = %instance, state = %state, "gateway connection state changed");
                let delivery = self.presence.to_all(OperatorEvent::SystemNotification {
                    level,
                    message: format!("instance {instance} connection is {state}"),
                    instance: Some(instance),
                });
                Ok(RouteOutcome::Notified { delivery })
            }
            ParsedEvent::Group {
                instance,
                kind,
                payload,
            } => {
                let delivery = self.presence.to_all(OperatorEvent::WebhookEvent {
                    instance,
                    kind,
                    payload,
                });
                Ok(RouteOutcome::Notified { delivery })
            }
            ParsedEvent::BotSession { instance, event } => {
                self.on_bot_session(&instance, event).await
            }
            ParsedEvent::SendConfirmation { instance, message } => {
                self.on_send_confirmation(&instance, message).await
            }
        }
    }

    fn stored(
        instance: &str,
        message: &MessageEnvelope,
        session_id: Option<&str>,
        status: MessageStatus,
    ) -> StoredMessage {
        StoredMessage {
            gateway_id: message.gateway_id.clone(),
            instance: instance.to_string(),
            address: message.address.clone(),
            session_id: session_id.map(str::to_string),
            from_me: message.from_me,
            body: message.body.clone(),
            push_name: message.push_name.clone(),
            status,
            sent_at: message.sent_at,
            recorded_at: Utc::now(),
        }
    }

    /// Service sessions go to their assignee; everything else goes to the
    /// session's department, the default department, or everyone.
    fn deliver_message(&self, session: Option<&Session>, message: StoredMessage) -> DeliveryReport {
        let session_status = session.map(|s| s.status);
        let event = OperatorEvent::Message {
            message,
            session_status,
        };
        if let Some(s) = session {
            if s.status == SessionStatus::Service {
                if let Some(operator) = s.assigned_operator.as_deref() {
                    return self.presence.to_operator(operator, event);
                }
            }
        }
        let department = session
            .and_then(|s| s.department.as_deref())
            .or_else(|| self.assignment.notices().default_department());
        match department {
            Some(dept) => self.presence.to_department(dept, event),
            None => self.presence.to_all(event),
        }
    }

    async fn on_new_message(
        &self,
        instance: &str,
        message: MessageEnvelope,
    ) -> Result<RouteOutcome, SwitchboardError> {
        if message.is_group() {
            let stored = Self::stored(instance, &message, None, MessageStatus::Delivered);
            if !self.messages.record_if_absent(&stored).await? {
                return Ok(RouteOutcome::Duplicate {
                    gateway_id: message.gateway_id,
                });
            }
            let delivery = self.presence.to_all(OperatorEvent::Message {
                message: stored,
                session_status: None,
            });
            return Ok(RouteOutcome::GroupMessage { delivery });
        }

        // Operator messages echoed by the gateway never open a session.
        if message.from_me {
            let session = self.sessions().find_open(&message.address).await?;
            let stored = Self::stored(
                instance,
                &message,
                session.as_ref().map(|s| s.id.as_str()),
                MessageStatus::Sent,
            );
            if !self.messages.record_if_absent(&stored).await? {
                return Ok(RouteOutcome::Duplicate {
                    gateway_id: message.gateway_id,
                });
            }
            let delivery = self.deliver_message(session.as_ref(), stored);
            return Ok(RouteOutcome::MessageRecorded {
                session_id: session.map(|s| s.id),
                created_session: false,
                delivery,
            });
        }

        // A redelivered message must not reopen a session that has since closed.
        if self.messages.get_message(&message.gateway_id).await?.is_some() {
            debug!(gateway_id = %message.gateway_id, "duplicate message delivery");
            return Ok(RouteOutcome::Duplicate {
                gateway_id: message.gateway_id,
            });
        }

        let customer = self
            .customers
            .find_or_create_customer(&message.address, message.push_name.as_deref())
            .await?;
        let mut candidate =
            Session::new_inbound(instance, &customer.id, &message.address, Utc::now());
        candidate
            .metadata
            .set(MetaKey::SourceMessageId, message.gateway_id.as_str())?;
        if let Some(name) = message.push_name.as_deref() {
            candidate.metadata.set(MetaKey::PushName, name)?;
        }
        let (session, created) = self.sessions().open_inbound(candidate).await?;
        if created {
            announce(&self.presence, QueueChange::Created, &session);
        }

        // Concurrent deliveries of one message share the session above; only
        // one of them records the message.
        let stored = Self::stored(instance, &message, Some(&session.id), MessageStatus::Delivered);
        if !self.messages.record_if_absent(&stored).await? {
            debug!(gateway_id = %message.gateway_id, session_id = %session.id, "duplicate message delivery");
            return Ok(RouteOutcome::Duplicate {
                gateway_id: message.gateway_id,
            });
        }

        if let Some(ordinal) = menu_choice(&session, &message.body) {
            match self.assignment.choose_operator(&session.id, ordinal).await {
                Ok(outcome) => {
                    let current = self.sessions().get(&session.id).await?;
                    let delivery = self.deliver_message(Some(&current), stored);
                    return Ok(RouteOutcome::OperatorChosen {
                        session_id: session.id,
                        outcome,
                        delivery,
                    });
                }
                Err(e) if e.rejection() == Some(Rejection::InvalidChoice) => {
                    info!(session_id = %session.id, ordinal, "operator choice out of range, re-sending menu");
                    best_effort(
                        "resend_operator_menu",
                        self.assignment.offer_operator_menu(&session),
                    )
                    .await;
                }
                Err(e) if e.rejection().is_some() => {
                    info!(session_id = %session.id, error = %e, "operator choice not applicable");
                }
                Err(e) => return Err(e),
            }
        }

        let delivery = self.deliver_message(Some(&session), stored);
        Ok(RouteOutcome::MessageRecorded {
            session_id: Some(session.id),
            created_session: created,
            delivery,
        })
    }

    /// Fetches the live upstream snapshot for `address`, falling back to the
    /// data carried by the event when the lookup fails or finds nothing.
    async fn bot_payload(&self, instance: &str, event: &BotEvent) -> BotPayload {
        let mut payload = BotPayload {
            bot_session_id: None,
            bot_status: Some(event.status),
            bot_url: event.url.clone(),
            variables: event.variables.clone(),
            updated_at: Some(Utc::now()),
        };
        let Some(bot_id) = self.bot_ids.get(instance) else {
            return payload;
        };
        let snapshots = best_effort(
            "fetch_bot_sessions",
            self.gateway.list_bot_sessions(instance, bot_id),
        )
        .await
        .unwrap_or_default();
        if let Some(live) = snapshots.iter().find(|s| s.remote_jid == event.address) {
            let mut from_live = BotPayload::from_snapshot(live);
            // The event's status is newer than a snapshot taken around it.
            from_live.bot_status = Some(event.status);
            for (key, value) in payload.variables {
                from_live.variables.entry(key).or_insert(value);
            }
            payload = from_live;
        }
        payload
    }

    async fn on_bot_session(
        &self,
        instance: &str,
        event: BotEvent,
    ) -> Result<RouteOutcome, SwitchboardError> {
        let Some(session) = self.sessions().find_open(&event.address).await? else {
            debug!(address = %event.address, status = %event.status, "bot event without open session");
            return Ok(RouteOutcome::BotSessionRefreshed {
                session_id: None,
                change: None,
            });
        };

        let payload = self.bot_payload(instance, &event).await;
        let session = match self.sessions().refresh_payload(&session.id, &payload).await {
            Ok(s) => s,
            Err(e) if e.rejection().is_some() => {
                debug!(session_id = %session.id, error = %e, "session closed before bot refresh");
                return Ok(RouteOutcome::BotSessionRefreshed {
                    session_id: Some(session.id),
                    change: None,
                });
            }
            Err(e) => return Err(e),
        };

        let (session, change) = match (event.status, session.status) {
            (BotStatus::Closed | BotStatus::Paused, SessionStatus::Bot) => {
                self.hand_off(session, &payload).await?
            }
            (BotStatus::Opened, SessionStatus::Waiting) if session.assigned_operator.is_none() => {
                self.return_to_bot(session).await?
            }
            (status, current) => {
                debug!(session_id = %session.id, %status, %current, "bot payload refreshed");
                (session, None)
            }
        };
        Ok(RouteOutcome::BotSessionRefreshed {
            session_id: Some(session.id),
            change,
        })
    }

    async fn hand_off(
        &self,
        session: Session,
        payload: &BotPayload,
    ) -> Result<(Session, Option<QueueChange>), SwitchboardError> {
        let department = payload
            .department()
            .or_else(|| self.assignment.notices().default_department())
            .map(str::to_string);
        let waiting = match self.sessions().hand_off(&session.id, department.as_deref()).await {
            Ok(s) => s,
            Err(e) if e.rejection().is_some() => {
                debug!(session_id = %session.id, error = %e, "hand-off no longer applicable");
                return Ok((session, None));
            }
            Err(e) => return Err(e),
        };
        info!(session_id = %waiting.id, department = ?waiting.department, "session handed off to operators");
        announce(&self.presence, QueueChange::HandedOff, &waiting);
        let offered = best_effort(
            "offer_operator_menu",
            self.assignment.offer_operator_menu(&waiting),
        )
        .await;
        let waiting = offered.unwrap_or(waiting);
        Ok((waiting, Some(QueueChange::HandedOff)))
    }

    async fn return_to_bot(
        &self,
        session: Session,
    ) -> Result<(Session, Option<QueueChange>), SwitchboardError> {
        match self.sessions().resume_bot(&session.id).await {
            Ok(resumed) => {
                info!(session_id = %resumed.id, "session returned to bot");
                announce(&self.presence, QueueChange::ReturnedToBot, &resumed);
                Ok((resumed, Some(QueueChange::ReturnedToBot)))
            }
            Err(e) if e.rejection().is_some() => {
                debug!(session_id = %session.id, error = %e, "return to bot no longer applicable");
                Ok((session, None))
            }
            Err(e) => Err(e),
        }
    }

    async fn on_send_confirmation(
        &self,
        instance: &str,
        message: MessageEnvelope,
    ) -> Result<RouteOutcome, SwitchboardError> {
        let session = if message.is_group() {
            None
        } else {
            self.sessions().find_open(&message.address).await?
        };
        let stored = Self::stored(
            instance,
            &message,
            session.as_ref().map(|s| s.id.as_str()),
            MessageStatus::Sent,
        );
        let new = self.messages.record_if_absent(&stored).await?;
        if new {
            self.deliver_message(session.as_ref(), stored);
        } else {
            self.messages
                .update_status(&message.gateway_id, MessageStatus::Sent)
                .await?;
        }
        Ok(RouteOutcome::Sent {
            gateway_id: message.gateway_id,
            new,
        })
    }
}

/// A customer reply counts as a menu choice only while the session is
/// waiting for one and the body is a bare positive number.
fn menu_choice(session: &Session, body: &str) -> Option<usize> {
    if session.status != SessionStatus::Waiting || !session.metadata.awaiting_operator_choice() {
        return None;
    }
    body.trim().parse::<usize>().ok().filter(|n| *n > 0)
}
