// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard queue-routing engine.
//!
//! This crate provides the session model, the error taxonomy, and the
//! collaborator traits (storage, directories, chat gateway) that the
//! routing, presence, and reaper crates are written against.

pub mod effect;
pub mod error;
pub mod metadata;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use effect::best_effort;
pub use error::{Rejection, SwitchboardError};
pub use metadata::{BotPayload, DEPARTMENT_VARIABLE, MetaKey, SessionMetadata};
pub use types::{
    BotSession, BotStatus, CancelReason, Customer, Department, Direction, HealthStatus,
    MessageStatus, Operator, Session, SessionStatus, StoredMessage, Tabulation,
    is_group_address,
};

pub use traits::{
    ChatGateway, CustomerDirectory, MessageStore, OperatorDirectory, PriorState, SessionStore,
    TabulationStore,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    use chrono::Utc;

    #[test]
    fn rejection_reasons_are_snake_case() {
        assert_eq!(Rejection::NotWaiting.reason(), "not_waiting");
        assert_eq!(Rejection::AlreadyAssigned.reason(), "already_assigned");
        assert_eq!(
            Rejection::AssignedOperatorPresent.reason(),
            "assigned_operator_present"
        );
        assert_eq!(Rejection::from_str("not_assignee").ok(), Some(Rejection::NotAssignee));
    }

    #[test]
    fn rejected_error_exposes_reason() {
        let err = SwitchboardError::rejected("s-1", Rejection::Terminal);
        assert_eq!(err.rejection(), Some(Rejection::Terminal));
        assert!(err.to_string().contains("terminal"));
        assert!(SwitchboardError::not_found("session", "s-1").rejection().is_none());
    }

    #[test]
    fn session_status_roundtrips_through_strings() {
        for status in [
            SessionStatus::Bot,
            SessionStatus::Waiting,
            SessionStatus::Service,
            SessionStatus::Completed,
            SessionStatus::Cancelled,
        ] {
            assert_eq!(SessionStatus::from_str(&status.to_string()).ok(), Some(status));
        }
        assert!(SessionStatus::Completed.is_terminal());
        assert!(!SessionStatus::Waiting.is_terminal());
    }

    #[test]
    fn gateway_statuses_map_to_internal_vocabulary() {
        assert_eq!(MessageStatus::from_gateway("SERVER_ACK"), MessageStatus::Sent);
        assert_eq!(MessageStatus::from_gateway("DELIVERY_ACK"), MessageStatus::Delivered);
        assert_eq!(MessageStatus::from_gateway("read"), MessageStatus::Read);
        assert_eq!(MessageStatus::from_gateway("PLAYED"), MessageStatus::Read);
        assert_eq!(MessageStatus::from_gateway("ERROR"), MessageStatus::Failed);
        assert_eq!(MessageStatus::from_gateway("whatever"), MessageStatus::Pending);
    }

    #[test]
    fn bot_status_parses_case_insensitively() {
        assert_eq!(BotStatus::from_str("CLOSED").ok(), Some(BotStatus::Closed));
        assert_eq!(BotStatus::from_str("paused").ok(), Some(BotStatus::Paused));
    }

    #[test]
    fn new_sessions_satisfy_invariants() {
        let now = Utc::now();
        let inbound = Session::new_inbound("main", "c-1", "5511@s.whatsapp.net", now);
        assert_eq!(inbound.status, SessionStatus::Bot);
        assert_eq!(inbound.direction, Direction::Inbound);
        assert!(inbound.invariants_hold());

        let outbound =
            Session::new_outbound("main", "c-1", "5511@s.whatsapp.net", "op-1", Some("sales"), now);
        assert_eq!(outbound.status, SessionStatus::Service);
        assert_eq!(outbound.assigned_operator.as_deref(), Some("op-1"));
        assert!(outbound.invariants_hold());
    }

    #[test]
    fn group_addresses_are_detected() {
        assert!(is_group_address("120363@g.us"));
        assert!(!is_group_address("5511@s.whatsapp.net"));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn gateway_status_mapping_ignores_case(raw in "[a-zA-Z_]{0,16}") {
                prop_assert_eq!(
                    MessageStatus::from_gateway(&raw.to_lowercase()),
                    MessageStatus::from_gateway(&raw.to_uppercase())
                );
            }

            #[test]
            fn transfer_count_accepts_only_integers(raw in "\\PC{0,8}") {
                let mut meta = SessionMetadata::default();
                let accepted = meta.set(MetaKey::TransferCount, raw.clone()).is_ok();
                prop_assert_eq!(accepted, raw.parse::<u32>().is_ok());
            }
        }
    }
}
