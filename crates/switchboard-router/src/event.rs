// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook envelope parsing.
//!
//! Gateway payloads are loosely shaped JSON. They are validated once here
//! into a [`ParsedEvent`] whose variants carry only guaranteed-present
//! fields, so handlers never re-check optionality.
//!
//! Envelope:
//! ```json
//! {"event": "messages.upsert", "instance": "main", "data": { ... }}
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use switchboard_core::{BotStatus, MessageStatus, SwitchboardError, is_group_address};

/// Raw webhook envelope as posted by the chat gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub instance: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Event kinds the router distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewMessage,
    MessageStatus,
    Connection,
    Group,
    BotStart,
    BotStatusChange,
    SendConfirmation,
}

impl EventKind {
    /// Classifies a raw event name. Returns `None` for kinds the router ignores.
    ///
    /// Names are normalized by lowercasing and mapping `_` and `-` to `.`,
    /// so `MESSAGES_UPSERT` and `messages.upsert` are the same kind.
    pub fn classify(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .trim()
            .chars()
            .map(|c| match c {
                '_' | '-' => '.',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        match normalized.as_str() {
            "messages.upsert" => Some(Self::NewMessage),
            "messages.update" => Some(Self::MessageStatus),
            "connection.update" => Some(Self::Connection),
            "groups.upsert" | "groups.update" | "group.participants.update" => Some(Self::Group),
            "typebot.start" => Some(Self::BotStart),
            "typebot.change.status" => Some(Self::BotStatusChange),
            "send.message" => Some(Self::SendConfirmation),
            _ => None,
        }
    }
}

/// A chat message carried by `messages.upsert` and `send.message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub gateway_id: String,
    pub address: String,
    pub from_me: bool,
    pub body: String,
    pub push_name: Option<String>,
    pub status: Option<MessageStatus>,
    pub sent_at: DateTime<Utc>,
}

impl MessageEnvelope {
    pub fn is_group(&self) -> bool {
        is_group_address(&self.address)
    }
}

/// A bot-session event for one customer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotEvent {
    pub address: String,
    pub status: BotStatus,
    pub url: Option<String>,
    pub variables: BTreeMap<String, String>,
}

/// Validated webhook event.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    NewMessage {
        instance: String,
        message: MessageEnvelope,
    },
    MessageStatus {
        instance: String,
        gateway_id: String,
        status: MessageStatus,
    },
    Connection {
        instance: String,
        state: String,
    },
    Group {
        instance: String,
        kind: String,
        payload: serde_json::Value,
    },
    BotSession {
        instance: String,
        event: BotEvent,
    },
    SendConfirmation {
        instance: String,
        message: MessageEnvelope,
    },
}

impl ParsedEvent {
    pub fn instance(&self) -> &str {
        match self {
            Self::NewMessage { instance, .. }
            | Self::MessageStatus { instance, .. }
            | Self::Connection { instance, .. }
            | Self::Group { instance, .. }
            | Self::BotSession { instance, .. }
            | Self::SendConfirmation { instance, .. } => instance,
        }
    }
}

// --- Raw payload shapes ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKey {
    remote_jid: Option<String>,
    from_me: Option<bool>,
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawText {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMedia {
    caption: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContent {
    conversation: Option<String>,
    extended_text_message: Option<RawText>,
    image_message: Option<RawMedia>,
    video_message: Option<RawMedia>,
    document_message: Option<RawMedia>,
}

impl RawContent {
    fn text(self) -> String {
        self.conversation
            .or_else(|| self.extended_text_message.and_then(|t| t.text))
            .or_else(|| self.image_message.and_then(|m| m.caption))
            .or_else(|| self.video_message.and_then(|m| m.caption))
            .or_else(|| self.document_message.and_then(|m| m.caption))
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(default)]
    key: RawKey,
    push_name: Option<String>,
    #[serde(default)]
    message: Option<RawContent>,
    message_timestamp: Option<serde_json::Value>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStatusUpdate {
    key_id: Option<String>,
    message_id: Option<String>,
    key: Option<RawKey>,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConnection {
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawBotEvent {
    remote_jid: Option<String>,
    status: Option<String>,
    url: Option<String>,
    #[serde(default)]
    variables: Option<serde_json::Value>,
}

fn malformed(kind: &str, detail: &str) -> SwitchboardError {
    SwitchboardError::MalformedEvent(format!("{kind}: {detail}"))
}

fn required(value: Option<String>, kind: &str, field: &str) -> Result<String, SwitchboardError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| malformed(kind, &format!("missing `{field}`")))
}

fn decode<T: serde::de::DeserializeOwned>(
    data: serde_json::Value,
    kind: &str,
) -> Result<T, SwitchboardError> {
    serde_json::from_value(data).map_err(|e| malformed(kind, &e.to_string()))
}

/// Gateway timestamps are unix seconds, as a number or a numeric string.
fn parse_timestamp(raw: Option<&serde_json::Value>) -> DateTime<Utc> {
    let secs = match raw {
        Some(serde_json::Value::Number(n)) => n.as_i64(),
        Some(serde_json::Value::String(s)) => s.parse().ok(),
        _ => None,
    };
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
        .unwrap_or_else(Utc::now)
}

/// Flattens bot variables into strings. Accepts a map or a list of
/// `{"name": ..., "value": ...}` entries.
fn parse_variables(raw: Option<serde_json::Value>) -> BTreeMap<String, String> {
    fn scalar(v: &serde_json::Value) -> Option<String> {
        match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    let mut out = BTreeMap::new();
    match raw {
        Some(serde_json::Value::Object(map)) => {
            for (k, v) in &map {
                if let Some(v) = scalar(v) {
                    out.insert(k.clone(), v);
                }
            }
        }
        Some(serde_json::Value::Array(items)) => {
            for item in &items {
                let name = item.get("name").and_then(|n| n.as_str());
                let value = item.get("value").and_then(scalar);
                if let (Some(name), Some(value)) = (name, value) {
                    out.insert(name.to_string(), value);
                }
            }
        }
        _ => {}
    }
    out
}

fn parse_message(data: serde_json::Value, kind: &str) -> Result<MessageEnvelope, SwitchboardError> {
    let raw: RawMessage = decode(data, kind)?;
    let address = required(raw.key.remote_jid, kind, "key.remoteJid")?;
    let gateway_id = required(raw.key.id, kind, "key.id")?;
    Ok(MessageEnvelope {
        gateway_id,
        address,
        from_me: raw.key.from_me.unwrap_or(false),
        body: raw.message.map(RawContent::text).unwrap_or_default(),
        push_name: raw.push_name.filter(|n| !n.trim().is_empty()),
        status: raw.status.as_deref().map(MessageStatus::from_gateway),
        sent_at: parse_timestamp(raw.message_timestamp.as_ref()),
    })
}

/// Validates an envelope into a [`ParsedEvent`].
///
/// Returns `Ok(None)` for event kinds the router does not handle and
/// [`SwitchboardError::MalformedEvent`] when a handled kind lacks required fields.
pub fn parse_event(envelope: WebhookEnvelope) -> Result<Option<ParsedEvent>, SwitchboardError> {
    let Some(kind) = EventKind::classify(&envelope.event) else {
        return Ok(None);
    };
    let name = envelope.event.as_str();
    let instance = required(envelope.instance.clone(), name, "instance")?;
    let data = envelope.data;

    let parsed = match kind {
        EventKind::NewMessage => ParsedEvent::NewMessage {
            instance,
            message: parse_message(data, name)?,
        },
        EventKind::SendConfirmation => ParsedEvent::SendConfirmation {
            instance,
            message: parse_message(data, name)?,
        },
        EventKind::MessageStatus => {
            let raw: RawStatusUpdate = decode(data, name)?;
            let gateway_id = raw
                .key_id
                .or(raw.message_id)
                .or_else(|| raw.key.and_then(|k| k.id));
            ParsedEvent::MessageStatus {
                instance,
                gateway_id: required(gateway_id, name, "keyId")?,
                status: MessageStatus::from_gateway(&required(raw.status, name, "status")?),
            }
        }
        EventKind::Connection => {
            let raw: RawConnection = decode(data, name)?;
            ParsedEvent::Connection {
                instance,
                state: required(raw.state, name, "state")?,
            }
        }
        EventKind::Group => ParsedEvent::Group {
            instance,
            kind: envelope.event.clone(),
            payload: data,
        },
        EventKind::BotStart | EventKind::BotStatusChange => {
            let raw: RawBotEvent = decode(data, name)?;
            let address = required(raw.remote_jid, name, "remoteJid")?;
            let status = match (kind, raw.status) {
                (_, Some(s)) => BotStatus::from_str(s.trim())
                    .map_err(|_| malformed(name, &format!("unknown bot status `{s}`")))?,
                (EventKind::BotStart, None) => BotStatus::Opened,
                (_, None) => return Err(malformed(name, "missing `status`")),
            };
            ParsedEvent::BotSession {
                instance,
                event: BotEvent {
                    address,
                    status,
                    url: raw.url,
                    variables: parse_variables(raw.variables),
                },
            }
        }
    };
    Ok(Some(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(event: &str, data: serde_json::Value) -> WebhookEnvelope {
        WebhookEnvelope {
            event: event.to_string(),
            instance: Some("main".to_string()),
            data,
        }
    }

    #[test]
    fn classify_normalizes_separators_and_case() {
        assert_eq!(EventKind::classify("MESSAGES_UPSERT"), Some(EventKind::NewMessage));
        assert_eq!(EventKind::classify("messages.update"), Some(EventKind::MessageStatus));
        assert_eq!(EventKind::classify("TYPEBOT_CHANGE_STATUS"), Some(EventKind::BotStatusChange));
        assert_eq!(EventKind::classify("group-participants-update"), Some(EventKind::Group));
        assert_eq!(EventKind::classify("presence.update"), None);
    }

    #[test]
    fn parses_text_message() {
        let parsed = parse_event(envelope(
            "messages.upsert",
            json!({
                "key": {"remoteJid": "5511@s.whatsapp.net", "fromMe": false, "id": "ABC"},
                "pushName": "Ana",
                "message": {"conversation": "hello"},
                "messageTimestamp": 1767225600
            }),
        ))
        .unwrap()
        .unwrap();
        match parsed {
            ParsedEvent::NewMessage { instance, message } => {
                assert_eq!(instance, "main");
                assert_eq!(message.gateway_id, "ABC");
                assert_eq!(message.body, "hello");
                assert_eq!(message.push_name.as_deref(), Some("Ana"));
                assert_eq!(message.sent_at.timestamp(), 1767225600);
                assert!(!message.from_me);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn extended_text_and_string_timestamp() {
        let parsed = parse_event(envelope(
            "MESSAGES_UPSERT",
            json!({
                "key": {"remoteJid": "5511@s.whatsapp.net", "id": "X1"},
                "message": {"extendedTextMessage": {"text": "quoted reply"}},
                "messageTimestamp": "1767225600"
            }),
        ))
        .unwrap()
        .unwrap();
        let ParsedEvent::NewMessage { message, .. } = parsed else {
            panic!("expected a new message");
        };
        assert_eq!(message.body, "quoted reply");
        assert_eq!(message.sent_at.timestamp(), 1767225600);
    }

    #[test]
    fn message_without_address_is_malformed() {
        let err = parse_event(envelope("messages.upsert", json!({"key": {"id": "ABC"}})))
            .unwrap_err();
        assert!(matches!(err, SwitchboardError::MalformedEvent(_)));
        assert!(err.to_string().contains("remoteJid"));
    }

    #[test]
    fn missing_instance_is_malformed() {
        let mut env = envelope("connection.update", json!({"state": "open"}));
        env.instance = None;
        assert!(parse_event(env).is_err());
    }

    #[test]
    fn unknown_kinds_are_ignored() {
        assert_eq!(parse_event(envelope("chats.upsert", json!({}))).unwrap(), None);
    }

    #[test]
    fn status_update_accepts_key_id_variants() {
        for data in [
            json!({"keyId": "ABC", "status": "READ"}),
            json!({"messageId": "ABC", "status": "READ"}),
            json!({"key": {"id": "ABC"}, "status": "READ"}),
        ] {
            let parsed = parse_event(envelope("messages.update", data)).unwrap().unwrap();
            assert_eq!(
                parsed,
                ParsedEvent::MessageStatus {
                    instance: "main".into(),
                    gateway_id: "ABC".into(),
                    status: MessageStatus::Read,
                }
            );
        }
    }

    #[test]
    fn bot_events_parse_status_and_variables() {
        let parsed = parse_event(envelope(
            "typebot.change.status",
            json!({
                "remoteJid": "5511@s.whatsapp.net",
                "status": "closed",
                "url": "https://bot.example.com",
                "variables": [{"name": "department", "value": "billing"}, {"name": "age", "value": 42}]
            }),
        ))
        .unwrap()
        .unwrap();
        let ParsedEvent::BotSession { event, .. } = parsed else {
            panic!("expected a bot event");
        };
        assert_eq!(event.status, BotStatus::Closed);
        assert_eq!(event.variables["department"], "billing");
        assert_eq!(event.variables["age"], "42");
    }

    #[test]
    fn bot_start_defaults_to_opened() {
        let parsed = parse_event(envelope("typebot.start", json!({"remoteJid": "5511@s.whatsapp.net"})))
            .unwrap()
            .unwrap();
        let ParsedEvent::BotSession { event, .. } = parsed else {
            panic!("expected a bot event");
        };
        assert_eq!(event.status, BotStatus::Opened);
    }

    #[test]
    fn bot_status_change_requires_known_status() {
        let err = parse_event(envelope(
            "typebot.change.status",
            json!({"remoteJid": "5511@s.whatsapp.net", "status": "sleeping"}),
        ))
        .unwrap_err();
        assert!(err.to_string().contains("sleeping"));
    }

    proptest::proptest! {
        #[test]
        fn parsing_arbitrary_json_never_panics(event in "[a-zA-Z._-]{0,24}", text in ".{0,64}") {
            let data = serde_json::json!({"key": {"remoteJid": text.clone(), "id": text.clone()}, "status": text});
            let _ = parse_event(envelope(&event, data));
        }
    }
}
