// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound chat-gateway client.
//!
//! The routing engine needs exactly three operations from the gateway:
//! send a text, change an upstream bot session's status, and list the
//! upstream bot sessions of an instance.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{BotSession, BotStatus};

#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Sends a text message and returns the gateway message id.
    async fn send_text(
        &self,
        instance: &str,
        address: &str,
        text: &str,
    ) -> Result<String, SwitchboardError>;

    /// Changes the status of the bot session bound to `address`.
    async fn change_bot_status(
        &self,
        instance: &str,
        address: &str,
        status: BotStatus,
    ) -> Result<(), SwitchboardError>;

    /// Lists upstream bot sessions for an instance and bot.
    async fn list_bot_sessions(
        &self,
        instance: &str,
        bot_id: &str,
    ) -> Result<Vec<BotSession>, SwitchboardError>;
}
