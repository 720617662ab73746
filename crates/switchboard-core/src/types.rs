// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session registry, router, presence layer, and reaper.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::metadata::{BotPayload, SessionMetadata};

/// Suffix that identifies a group conversation address.
pub const GROUP_ADDRESS_SUFFIX: &str = "@g.us";

/// Returns true if the address belongs to a group conversation.
pub fn is_group_address(address: &str) -> bool {
    address.ends_with(GROUP_ADDRESS_SUFFIX)
}

/// Lifecycle state of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Automated-assistant handling before human hand-off.
    Bot,
    /// Handed off, waiting for an operator to claim it.
    Waiting,
    /// Claimed by an operator.
    Service,
    /// Closed by the assigned operator with a tabulation.
    Completed,
    /// Cancelled by the reaper or an operator.
    Cancelled,
}

impl SessionStatus {
    /// Non-terminal states, in lifecycle order.
    pub const OPEN: [SessionStatus; 3] = [Self::Bot, Self::Waiting, Self::Service];

    /// Returns true for `completed` and `cancelled`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Who started the conversation. Immutable after creation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Reason recorded on a cancelled session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancelReason {
    /// Upstream bot session went idle past the cutoff.
    Inactivity,
    /// Bot-stage session with no live upstream bot session.
    InactivityNoSession,
    /// Waiting session exceeded the waiting timeout.
    WaitingTimeout,
    /// Explicit cancellation by an operator.
    OperatorCancel,
}

/// Delivery status of a stored message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    #[default]
    Pending,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl MessageStatus {
    /// Map a gateway-specific status string onto the internal vocabulary.
    ///
    /// Unrecognized values map to [`MessageStatus::Pending`].
    pub fn from_gateway(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SERVER_ACK" | "SENT" => Self::Sent,
            "DELIVERY_ACK" | "DELIVERED" => Self::Delivered,
            "READ" | "PLAYED" => Self::Read,
            "ERROR" | "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }
}

/// Status of an upstream bot session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Opened,
    Paused,
    Closed,
}

/// One customer conversation lifecycle ("queue" record).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    /// Correlates to the upstream bot/gateway session.
    pub session_key: Option<String>,
    /// Gateway instance the conversation runs through.
    pub instance: String,
    pub customer_id: String,
    /// Gateway-specific customer address (e.g. `5511999990000@s.whatsapp.net`).
    pub address: String,
    pub status: SessionStatus,
    pub department: Option<String>,
    pub direction: Direction,
    pub requested_operator: Option<String>,
    pub assigned_operator: Option<String>,
    pub supervisor: Option<String>,
    pub bot_payload: BotPayload,
    pub metadata: SessionMetadata,
    pub created_at: DateTime<Utc>,
    pub bot_completed_at: Option<DateTime<Utc>>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    /// Row version, bumped by every successful conditional write.
    #[serde(default)]
    pub version: i64,
}

impl Session {
    /// A fresh inbound session in the `bot` stage.
    pub fn new_inbound(
        instance: &str,
        customer_id: &str,
        address: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_key: None,
            instance: instance.to_string(),
            customer_id: customer_id.to_string(),
            address: address.to_string(),
            status: SessionStatus::Bot,
            department: None,
            direction: Direction::Inbound,
            requested_operator: None,
            assigned_operator: None,
            supervisor: None,
            bot_payload: BotPayload::default(),
            metadata: SessionMetadata::default(),
            created_at: now,
            bot_completed_at: None,
            assigned_at: None,
            completed_at: None,
            updated_at: now,
            version: 0,
        }
    }

    /// An operator-initiated outbound session, self-assigned and already in `service`.
    pub fn new_outbound(
        instance: &str,
        customer_id: &str,
        address: &str,
        operator_id: &str,
        department: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status: SessionStatus::Service,
            direction: Direction::Outbound,
            department: department.map(str::to_string),
            assigned_operator: Some(operator_id.to_string()),
            assigned_at: Some(now),
            ..Self::new_inbound(instance, customer_id, address, now)
        }
    }

    /// Checks the structural invariants every persisted session must satisfy.
    ///
    /// - `assigned_operator` is set iff `status == service`
    /// - `completed_at` is set iff the status is terminal
    pub fn invariants_hold(&self) -> bool {
        let assigned_ok =
            self.assigned_operator.is_some() == (self.status == SessionStatus::Service);
        let completed_ok = self.completed_at.is_some() == self.status.is_terminal();
        assigned_ok && completed_ok
    }

    /// Returns true if the session is for a group conversation.
    pub fn is_group(&self) -> bool {
        is_group_address(&self.address)
    }
}

/// Immutable outcome record closing a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tabulation {
    pub id: String,
    pub session_id: String,
    pub operator_id: String,
    pub outcome: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chat message recorded from the gateway, keyed by the gateway message id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub gateway_id: String,
    pub instance: String,
    pub address: String,
    pub session_id: Option<String>,
    pub from_me: bool,
    pub body: String,
    pub push_name: Option<String>,
    pub status: MessageStatus,
    pub sent_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// External customer identity keyed by gateway address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub address: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A human operator known to the operator directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    pub id: String,
    pub name: String,
    pub department: String,
    pub active: bool,
}

/// A routing partition and its fallback assignee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub name: String,
    pub supervisor_id: Option<String>,
}

/// Snapshot of an upstream bot session as reported by the chat gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSession {
    pub id: String,
    pub bot_id: String,
    pub remote_jid: String,
    pub status: BotStatus,
    pub url: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Health status reported by storage and gateway health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}
