// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat gateway for deterministic testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use switchboard_core::{BotSession, BotStatus, ChatGateway, SwitchboardError};

/// A gateway operation that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    SendText,
    ChangeBotStatus,
    ListBotSessions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentText {
    pub instance: String,
    pub address: String,
    pub text: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub instance: String,
    pub address: String,
    pub status: BotStatus,
}

/// In-memory [`ChatGateway`].
///
/// Successful status changes are applied to the scripted bot sessions, so
/// repeated sweeps see the upstream state they produced.
#[derive(Default)]
pub struct MockChatGateway {
    sent: Mutex<Vec<SentText>>,
    status_changes: Mutex<Vec<StatusChange>>,
    bot_sessions: Mutex<HashMap<String, Vec<BotSession>>>,
    failing: Mutex<HashSet<GatewayOp>>,
    next_id: AtomicU64,
}

impl MockChatGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an upstream bot-session snapshot.
    pub fn bot_session(
        remote_jid: &str,
        status: BotStatus,
        updated_at: DateTime<Utc>,
    ) -> BotSession {
        BotSession {
            id: format!("bot-session-{remote_jid}"),
            bot_id: "bot-1".to_string(),
            remote_jid: remote_jid.to_string(),
            status,
            url: Some("https://bot.example.com/flow".to_string()),
            variables: BTreeMap::new(),
            created_at: updated_at,
            updated_at,
        }
    }

    /// Replaces the upstream bot sessions listed for an instance.
    pub async fn set_bot_sessions(&self, instance: &str, sessions: Vec<BotSession>) {
        self.bot_sessions
            .lock()
            .await
            .insert(instance.to_string(), sessions);
    }

    /// Makes an operation fail until [`MockChatGateway::recover`] is called.
    pub async fn fail(&self, op: GatewayOp) {
        self.failing.lock().await.insert(op);
    }

    pub async fn recover(&self, op: GatewayOp) {
        self.failing.lock().await.remove(&op);
    }

    pub async fn sent_texts(&self) -> Vec<SentText> {
        self.sent.lock().await.clone()
    }

    /// Texts sent to one address, in order.
    pub async fn texts_to(&self, address: &str) -> Vec<String> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|s| s.address == address)
            .map(|s| s.text.clone())
            .collect()
    }

    pub async fn status_changes(&self) -> Vec<StatusChange> {
        self.status_changes.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
        self.status_changes.lock().await.clear();
    }

    async fn check(&self, op: GatewayOp) -> Result<(), SwitchboardError> {
        if self.failing.lock().await.contains(&op) {
            return Err(SwitchboardError::Gateway {
                message: format!("mock gateway failure: {op:?}"),
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for MockChatGateway {
    async fn send_text(
        &self,
        instance: &str,
        address: &str,
        text: &str,
    ) -> Result<String, SwitchboardError> {
        self.check(GatewayOp::SendText).await?;
        let message_id = format!("mock-msg-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sent.lock().await.push(SentText {
            instance: instance.to_string(),
            address: address.to_string(),
            text: text.to_string(),
            message_id: message_id.clone(),
        });
        Ok(message_id)
    }

    async fn change_bot_status(
        &self,
        instance: &str,
        address: &str,
        status: BotStatus,
    ) -> Result<(), SwitchboardError> {
        self.check(GatewayOp::ChangeBotStatus).await?;
        self.status_changes.lock().await.push(StatusChange {
            instance: instance.to_string(),
            address: address.to_string(),
            status,
        });
        if let Some(list) = self.bot_sessions.lock().await.get_mut(instance) {
            for session in list.iter_mut().filter(|s| s.remote_jid == address) {
                session.status = status;
                session.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn list_bot_sessions(
        &self,
        instance: &str,
        _bot_id: &str,
    ) -> Result<Vec<BotSession>, SwitchboardError> {
        self.check(GatewayOp::ListBotSessions).await?;
        Ok(self
            .bot_sessions
            .lock()
            .await
            .get(instance)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_texts() {
        let gateway = MockChatGateway::new();
        let id = gateway.send_text("main", "a", "hello").await.unwrap();
        assert_eq!(id, "mock-msg-0");
        assert_eq!(gateway.texts_to("a").await, vec!["hello".to_string()]);
    }

    #[tokio::test]
    async fn injected_failures_until_recovered() {
        let gateway = MockChatGateway::new();
        gateway.fail(GatewayOp::SendText).await;
        assert!(gateway.send_text("main", "a", "x").await.is_err());
        gateway.recover(GatewayOp::SendText).await;
        assert!(gateway.send_text("main", "a", "x").await.is_ok());
    }

    #[tokio::test]
    async fn status_changes_apply_to_scripted_sessions() {
        let gateway = MockChatGateway::new();
        gateway
            .set_bot_sessions(
                "main",
                vec![MockChatGateway::bot_session("a", BotStatus::Opened, Utc::now())],
            )
            .await;
        gateway
            .change_bot_status("main", "a", BotStatus::Closed)
            .await
            .unwrap();
        let list = gateway.list_bot_sessions("main", "bot-1").await.unwrap();
        assert_eq!(list[0].status, BotStatus::Closed);
    }
}
