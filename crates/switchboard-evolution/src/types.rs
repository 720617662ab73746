// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the Evolution gateway HTTP API.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use switchboard_core::{BotSession, BotStatus};

/// Body of `POST /message/sendText/{instance}`.
#[derive(Debug, Clone, Serialize)]
pub struct SendTextRequest<'a> {
    pub number: &'a str,
    pub text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub id: String,
    #[serde(default)]
    pub remote_jid: Option<String>,
    #[serde(default)]
    pub from_me: Option<bool>,
}

/// Response of `POST /message/sendText/{instance}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendTextResponse {
    pub key: MessageKey,
}

/// Body of `POST /typebot/changeStatus/{instance}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatusRequest<'a> {
    pub remote_jid: &'a str,
    pub status: BotStatus,
}

/// One entry of `GET /typebot/fetchSessions/{instance}/{botId}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBotSession {
    pub id: String,
    pub remote_jid: String,
    pub status: String,
    #[serde(default)]
    pub bot_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub variables: Option<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// The listing is returned either bare or wrapped in `{"sessions": [...]}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BotSessionList {
    Bare(Vec<RawBotSession>),
    Wrapped { sessions: Vec<RawBotSession> },
}

impl BotSessionList {
    pub fn into_inner(self) -> Vec<RawBotSession> {
        match self {
            Self::Bare(v) | Self::Wrapped { sessions: v } => v,
        }
    }
}

/// Error body returned by the gateway on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    /// Human-readable summary of the error body.
    pub fn summary(&self) -> String {
        let detail = self
            .response
            .as_ref()
            .map(|r| match r.get("message") {
                Some(m) => m.to_string(),
                None => r.to_string(),
            })
            .unwrap_or_default();
        match (&self.error, detail.is_empty()) {
            (Some(e), true) => e.clone(),
            (Some(e), false) => format!("{e}: {detail}"),
            (None, _) => detail,
        }
    }
}

fn flatten_variables(raw: Option<serde_json::Value>) -> BTreeMap<String, String> {
    let scalar = |v: &serde_json::Value| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    };
    let mut out = BTreeMap::new();
    match raw {
        Some(serde_json::Value::Object(map)) => {
            out.extend(map.iter().filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v))));
        }
        Some(serde_json::Value::Array(items)) => {
            for item in &items {
                if let (Some(name), Some(value)) = (
                    item.get("name").and_then(|n| n.as_str()),
                    item.get("value").and_then(scalar),
                ) {
                    out.insert(name.to_string(), value);
                }
            }
        }
        _ => {}
    }
    out
}

impl RawBotSession {
    /// Converts to the core snapshot. Entries with an unknown status are dropped.
    pub fn into_bot_session(self, bot_id: &str) -> Option<BotSession> {
        let status = BotStatus::from_str(self.status.trim()).ok()?;
        let now = Utc::now();
        let created_at = self.created_at.unwrap_or(now);
        Some(BotSession {
            id: self.id,
            bot_id: self.bot_id.unwrap_or_else(|| bot_id.to_string()),
            remote_jid: self.remote_jid,
            status,
            url: self.url,
            variables: flatten_variables(self.variables),
            created_at,
            updated_at: self.updated_at.unwrap_or(created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn listing_accepts_both_shapes() {
        let entry = json!({"id": "s1", "remoteJid": "5511@s.whatsapp.net", "status": "opened"});
        let bare: BotSessionList = serde_json::from_value(json!([entry.clone()])).unwrap();
        let wrapped: BotSessionList = serde_json::from_value(json!({"sessions": [entry]})).unwrap();
        assert_eq!(bare.into_inner().len(), 1);
        assert_eq!(wrapped.into_inner().len(), 1);
    }

    #[test]
    fn unknown_status_is_dropped() {
        let raw: RawBotSession = serde_json::from_value(
            json!({"id": "s1", "remoteJid": "x", "status": "zombie"}),
        )
        .unwrap();
        assert!(raw.into_bot_session("bot-1").is_none());
    }

    #[test]
    fn variables_flatten_from_list() {
        let raw: RawBotSession = serde_json::from_value(json!({
            "id": "s1",
            "remoteJid": "x",
            "status": "Paused",
            "variables": [{"name": "department", "value": "sales"}],
            "updatedAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let session = raw.into_bot_session("bot-1").unwrap();
        assert_eq!(session.status, BotStatus::Paused);
        assert_eq!(session.bot_id, "bot-1");
        assert_eq!(session.variables["department"], "sales");
        assert_eq!(session.updated_at.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn change_status_serializes_snake_case() {
        let body = serde_json::to_value(ChangeStatusRequest {
            remote_jid: "x",
            status: BotStatus::Closed,
        })
        .unwrap();
        assert_eq!(body, json!({"remoteJid": "x", "status": "closed"}));
    }

    #[test]
    fn error_summary_prefers_response_message() {
        let err: ApiErrorResponse = serde_json::from_value(json!({
            "status": 400, "error": "Bad Request", "response": {"message": ["number invalid"]}
        }))
        .unwrap();
        assert_eq!(err.summary(), r#"Bad Request: ["number invalid"]"#);
    }
}
