// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message persistence keyed by gateway message id.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{MessageStatus, StoredMessage};

/// Store of chat messages seen on the gateway.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Inserts the message unless one with the same gateway id exists.
    ///
    /// Returns true if a new row was written.
    async fn record_if_absent(&self, message: &StoredMessage) -> Result<bool, SwitchboardError>;

    /// Updates the delivery status. Returns false if the message is unknown.
    async fn update_status(
        &self,
        gateway_id: &str,
        status: MessageStatus,
    ) -> Result<bool, SwitchboardError>;

    async fn get_message(&self, gateway_id: &str)
    -> Result<Option<StoredMessage>, SwitchboardError>;

    /// Messages attached to a session in chronological order.
    async fn messages_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<StoredMessage>, SwitchboardError>;
}
