// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed key/value payloads carried on a session.
//!
//! [`SessionMetadata`] stores free-form string values, but writes through
//! [`MetaKey`] are validated so that well-known keys always hold values of
//! the expected shape. [`BotPayload`] is the bot-stage snapshot refreshed from
//! the upstream bot session.
//!
//! Well-known metadata keys by lifecycle stage:
//!
//! | stage    | key                            | value                         |
//! |----------|--------------------------------|-------------------------------|
//! | bot      | `source_message_id`            | gateway message id            |
//! | bot      | `push_name`                    | customer display name         |
//! | waiting  | `awaiting_operator_choice`     | `true` / `false`              |
//! | waiting  | `original_requested_operator`  | operator id                   |
//! | service  | `transferred_from`             | operator id                   |
//! | service  | `transfer_count`               | unsigned integer              |
//! | terminal | `cancel_reason`                | [`CancelReason`] string       |

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SwitchboardError;
use crate::types::{BotSession, BotStatus, CancelReason};

/// Bot variable that selects the department on hand-off.
pub const DEPARTMENT_VARIABLE: &str = "department";

/// Well-known session metadata keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    CancelReason,
    SourceMessageId,
    PushName,
    AwaitingOperatorChoice,
    OriginalRequestedOperator,
    TransferredFrom,
    TransferCount,
}

impl MetaKey {
    /// The key as stored in the metadata map.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CancelReason => "cancel_reason",
            Self::SourceMessageId => "source_message_id",
            Self::PushName => "push_name",
            Self::AwaitingOperatorChoice => "awaiting_operator_choice",
            Self::OriginalRequestedOperator => "original_requested_operator",
            Self::TransferredFrom => "transferred_from",
            Self::TransferCount => "transfer_count",
        }
    }

    fn validate(self, value: &str) -> Result<(), SwitchboardError> {
        let ok = match self {
            Self::CancelReason => CancelReason::from_str(value).is_ok(),
            Self::AwaitingOperatorChoice => value == "true" || value == "false",
            Self::TransferCount => value.parse::<u32>().is_ok(),
            Self::SourceMessageId
            | Self::OriginalRequestedOperator
            | Self::TransferredFrom => !value.trim().is_empty(),
            Self::PushName => true,
        };
        if ok {
            Ok(())
        } else {
            Err(SwitchboardError::Internal(format!(
                "invalid value `{value}` for metadata key `{}`",
                self.as_str()
            )))
        }
    }
}

/// Session metadata map with validated writes for well-known keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionMetadata(BTreeMap<String, String>);

impl SessionMetadata {
    /// Returns the raw value stored under a well-known key.
    pub fn get(&self, key: MetaKey) -> Option<&str> {
        self.0.get(key.as_str()).map(String::as_str)
    }

    /// Sets a well-known key after validating the value.
    pub fn set(&mut self, key: MetaKey, value: impl Into<String>) -> Result<(), SwitchboardError> {
        let value = value.into();
        key.validate(&value)?;
        self.0.insert(key.as_str().to_string(), value);
        Ok(())
    }

    /// Removes a well-known key.
    pub fn remove(&mut self, key: MetaKey) {
        self.0.remove(key.as_str());
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        self.get(MetaKey::CancelReason)
            .and_then(|v| CancelReason::from_str(v).ok())
    }

    pub fn set_cancel_reason(&mut self, reason: CancelReason) {
        self.0
            .insert(MetaKey::CancelReason.as_str().to_string(), reason.to_string());
    }

    pub fn awaiting_operator_choice(&self) -> bool {
        self.get(MetaKey::AwaitingOperatorChoice) == Some("true")
    }

    pub fn set_awaiting_operator_choice(&mut self, awaiting: bool) {
        self.0.insert(
            MetaKey::AwaitingOperatorChoice.as_str().to_string(),
            awaiting.to_string(),
        );
    }

    pub fn transfer_count(&self) -> u32 {
        self.get(MetaKey::TransferCount)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// Records a transfer away from `from_operator`.
    pub fn record_transfer(&mut self, from_operator: &str) {
        let count = self.transfer_count() + 1;
        self.0.insert(
            MetaKey::TransferredFrom.as_str().to_string(),
            from_operator.to_string(),
        );
        self.0
            .insert(MetaKey::TransferCount.as_str().to_string(), count.to_string());
    }

    /// Parses metadata loaded from storage. Unknown keys are preserved.
    pub fn from_json(raw: &str) -> Result<Self, SwitchboardError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| SwitchboardError::Storage {
            source: Box::new(e),
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Bot-stage snapshot refreshed from the live upstream bot session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotPayload {
    pub bot_session_id: Option<String>,
    pub bot_status: Option<BotStatus>,
    pub bot_url: Option<String>,
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl BotPayload {
    /// Builds a payload from an upstream bot session snapshot.
    pub fn from_snapshot(snapshot: &BotSession) -> Self {
        Self {
            bot_session_id: Some(snapshot.id.clone()),
            bot_status: Some(snapshot.status),
            bot_url: snapshot.url.clone(),
            variables: snapshot.variables.clone(),
            updated_at: Some(snapshot.updated_at),
        }
    }

    /// The department the bot selected, if any.
    pub fn department(&self) -> Option<&str> {
        self.variables
            .get(DEPARTMENT_VARIABLE)
            .map(|d| d.trim())
            .filter(|d| !d.is_empty())
    }

    pub fn from_json(raw: &str) -> Result<Self, SwitchboardError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|e| SwitchboardError::Storage {
            source: Box::new(e),
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
