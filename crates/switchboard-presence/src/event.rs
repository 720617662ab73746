// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events pushed to connected operators.
//!
//! Serialized as `{"event": "<kind>", "data": {...}}`:
//!
//! ```json
//! {"event": "queue_update", "data": {"change": "claimed", "session": {...}}}
//! {"event": "operator_status", "data": {"operator_id": "op-1", "online": true, ...}}
//! {"event": "disconnect", "data": {"reason": "replaced by a newer login"}}
//! ```

use serde::{Deserialize, Serialize};
use switchboard_core::{Session, StoredMessage};

/// What happened to a session in a `queue_update` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueChange {
    Created,
    HandedOff,
    ReturnedToBot,
    OperatorRequested,
    Claimed,
    Transferred,
    Completed,
    Cancelled,
}

/// Severity of a system notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Info,
    Warning,
}

/// Typed event delivered to operator connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum OperatorEvent {
    /// A chat message stored for a session (or a group conversation).
    Message {
        message: StoredMessage,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_status: Option<switchboard_core::SessionStatus>,
    },
    /// A session changed state or routing.
    QueueUpdate { change: QueueChange, session: Session },
    /// A raw gateway event surfaced for visibility (group events).
    WebhookEvent {
        instance: String,
        kind: String,
        payload: serde_json::Value,
    },
    /// An operator connected, disconnected, or changed availability.
    OperatorStatus {
        operator_id: String,
        operator_name: String,
        department: String,
        online: bool,
        available: bool,
    },
    /// Advisory notice such as a gateway connection-state change.
    SystemNotification {
        level: NotificationLevel,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        instance: Option<String>,
    },
    /// Directive to drop the receiving connection.
    Disconnect { reason: String },
}

impl OperatorEvent {
    /// The wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::QueueUpdate { .. } => "queue_update",
            Self::WebhookEvent { .. } => "webhook_event",
            Self::OperatorStatus { .. } => "operator_status",
            Self::SystemNotification { .. } => "system_notification",
            Self::Disconnect { .. } => "disconnect",
        }
    }

    pub fn queue_update(change: QueueChange, session: &Session) -> Self {
        Self::QueueUpdate {
            change,
            session: session.clone(),
        }
    }

    /// Serializes the event for a text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"event":"system_notification","data":{{"level":"warning","message":"unserializable event: {e}"}}}}"#)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnect_serializes_with_event_tag() {
        let json = OperatorEvent::Disconnect {
            reason: "forced".into(),
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "disconnect");
        assert_eq!(value["data"]["reason"], "forced");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let event = OperatorEvent::SystemNotification {
            level: NotificationLevel::Info,
            message: "instance main is open".into(),
            instance: Some("main".into()),
        };
        let value: serde_json::Value = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(value["event"], event.kind());
    }
}
