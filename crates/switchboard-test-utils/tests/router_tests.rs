// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook routing against the full stack.

use serde_json::json;
use switchboard_core::{
    BotStatus, CancelReason, Direction, MessageStatus, MessageStore, MetaKey, SessionStatus,
};
use switchboard_presence::{OperatorEvent, QueueChange};
use switchboard_router::RouteOutcome;
use switchboard_test_utils::{GatewayOp, MockChatGateway, TestHarness, message_event};

const CUSTOMER: &str = "5511999990000@s.whatsapp.net";

fn session_id(outcome: &RouteOutcome) -> String {
    match outcome {
        RouteOutcome::MessageRecorded {
            session_id: Some(id),
            ..
        } => id.clone(),
        other => panic!("expected a recorded message, got {other:?}"),
    }
}

#[tokio::test]
async fn first_message_opens_inbound_bot_session() {
    let h = TestHarness::new().await.unwrap();
    let outcome = h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap();
    let RouteOutcome::MessageRecorded {
        created_session, ..
    } = &outcome
    else {
        panic!("unexpected {outcome:?}");
    };
    assert!(created_session);

    let session = h.sessions.get(&session_id(&outcome)).await.unwrap();
    assert_eq!(session.status, SessionStatus::Bot);
    assert_eq!(session.direction, Direction::Inbound);
    assert_eq!(session.instance, "main");
    assert_eq!(session.metadata.get(MetaKey::SourceMessageId), Some("MSG-1"));
    assert_eq!(session.metadata.get(MetaKey::PushName), Some("Test Customer"));
    assert!(session.invariants_hold());
}

#[tokio::test]
async fn replayed_message_is_idempotent() {
    let h = TestHarness::new().await.unwrap();
    let first = h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap();
    let id = session_id(&first);

    let replay = h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap();
    assert_eq!(
        replay,
        RouteOutcome::Duplicate {
            gateway_id: "MSG-1".into()
        }
    );

    let open = h.sessions.find_open(CUSTOMER).await.unwrap().unwrap();
    assert_eq!(open.id, id);
    let messages = h.storage.messages_for_session(&id).await.unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn replay_after_cancellation_does_not_reopen() {
    let h = TestHarness::new().await.unwrap();
    let id = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    h.sessions
        .cancel(&id, CancelReason::OperatorCancel)
        .await
        .unwrap();

    let replay = h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap();
    assert_eq!(
        replay,
        RouteOutcome::Duplicate {
            gateway_id: "MSG-1".into()
        }
    );
    assert!(h.sessions.find_open(CUSTOMER).await.unwrap().is_none());

    // A genuinely new message still opens a fresh session.
    let next = session_id(&h.customer_says(CUSTOMER, "MSG-2", "hello again").await.unwrap());
    assert_ne!(next, id);
}

#[tokio::test]
async fn follow_up_messages_reuse_the_open_session() {
    let h = TestHarness::new().await.unwrap();
    let first = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    let second = h.customer_says(CUSTOMER, "MSG-2", "anyone?").await.unwrap();
    let RouteOutcome::MessageRecorded {
        session_id: Some(id),
        created_session,
        ..
    } = second
    else {
        panic!("unexpected outcome");
    };
    assert_eq!(id, first);
    assert!(!created_session);
}

#[tokio::test]
async fn group_messages_bypass_the_queue() {
    let h = TestHarness::new().await.unwrap();
    let ana = h.add_operator("op-ana", "Ana", "support").await.unwrap();
    let bruno = h.add_operator("op-bruno", "Bruno", "sales").await.unwrap();
    let mut c1 = h.connect(&ana);
    let mut c2 = h.connect(&bruno);
    c1.drain();
    c2.drain();

    let outcome = h.customer_says("1203630@g.us", "G-1", "hi all").await.unwrap();
    let RouteOutcome::GroupMessage { delivery } = outcome else {
        panic!("unexpected {outcome:?}");
    };
    assert_eq!(delivery.delivered, 2);
    assert!(h.sessions.find_open("1203630@g.us").await.unwrap().is_none());
    assert!(h.storage.get_message("G-1").await.unwrap().is_some());
    assert!(matches!(&c1.drain()[..], [OperatorEvent::Message { .. }]));
}

#[tokio::test]
async fn operator_echo_is_stored_without_opening_a_session() {
    let h = TestHarness::new().await.unwrap();
    let outcome = h
        .route(message_event(CUSTOMER, "OUT-1", "hi from phone", true))
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        RouteOutcome::MessageRecorded {
            session_id: None,
            created_session: false,
            ..
        }
    ));
    assert!(h.sessions.find_open(CUSTOMER).await.unwrap().is_none());
    let stored = h.storage.get_message("OUT-1").await.unwrap().unwrap();
    assert!(stored.from_me);
}

#[tokio::test]
async fn status_updates_map_gateway_vocabulary() {
    let h = TestHarness::new().await.unwrap();
    h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap();

    let outcome = h
        .route(json!({
            "event": "MESSAGES_UPDATE",
            "instance": "main",
            "data": {"keyId": "MSG-1", "status": "READ"}
        }))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::StatusUpdated {
            gateway_id: "MSG-1".into(),
            found: true
        }
    );
    let stored = h.storage.get_message("MSG-1").await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Read);

    let unknown = h
        .route(json!({
            "event": "messages.update",
            "instance": "main",
            "data": {"keyId": "NOPE", "status": "DELIVERY_ACK"}
        }))
        .await
        .unwrap();
    assert!(matches!(unknown, RouteOutcome::StatusUpdated { found: false, .. }));
}

#[tokio::test]
async fn send_confirmation_works_without_a_session() {
    let h = TestHarness::new().await.unwrap();
    let body = json!({
        "event": "send.message",
        "instance": "main",
        "data": {
            "key": {"remoteJid": CUSTOMER, "fromMe": true, "id": "SENT-1"},
            "message": {"conversation": "campaign text"},
            "status": "PENDING"
        }
    });
    let first = h.route(body.clone()).await.unwrap();
    assert_eq!(
        first,
        RouteOutcome::Sent {
            gateway_id: "SENT-1".into(),
            new: true
        }
    );
    let again = h.route(body).await.unwrap();
    assert_eq!(
        again,
        RouteOutcome::Sent {
            gateway_id: "SENT-1".into(),
            new: false
        }
    );
    let stored = h.storage.get_message("SENT-1").await.unwrap().unwrap();
    assert_eq!(stored.status, MessageStatus::Sent);
    assert!(stored.session_id.is_none());
}

#[tokio::test]
async fn connection_updates_become_system_notifications() {
    let h = TestHarness::new().await.unwrap();
    let ana = h.add_operator("op-ana", "Ana", "support").await.unwrap();
    let mut conn = h.connect(&ana);
    conn.drain();

    let outcome = h
        .route(json!({"event": "CONNECTION_UPDATE", "instance": "main", "data": {"state": "close"}}))
        .await
        .unwrap();
    assert!(matches!(outcome, RouteOutcome::Notified { .. }));
    let events = conn.drain();
    assert!(matches!(
        &events[..],
        [OperatorEvent::SystemNotification { instance: Some(i), .. }] if i == "main"
    ));
}

#[tokio::test]
async fn malformed_and_unknown_events_are_acknowledged() {
    let h = TestHarness::new().await.unwrap();
    let malformed = h
        .route(json!({"event": "messages.upsert", "instance": "main", "data": {"key": {}}}))
        .await
        .unwrap();
    assert!(!malformed.is_success());

    let unknown = h
        .route(json!({"event": "chats.set", "instance": "main", "data": {}}))
        .await
        .unwrap();
    assert!(unknown.is_success());
    assert!(matches!(unknown, RouteOutcome::Ignored { .. }));
}

#[tokio::test]
async fn bot_close_hands_off_to_department() {
    let h = TestHarness::new().await.unwrap();
    let ana = h.add_operator("op-ana", "Ana", "support").await.unwrap();
    let mut conn = h.connect(&ana);
    let id = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    conn.drain();

    let outcome = h
        .bot_status(CUSTOMER, BotStatus::Closed, Some("support"))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::BotSessionRefreshed {
            session_id: Some(id.clone()),
            change: Some(QueueChange::HandedOff)
        }
    );

    let session = h.sessions.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(session.department.as_deref(), Some("support"));
    assert!(session.bot_completed_at.is_some());
    assert_eq!(session.bot_payload.department(), Some("support"));
    assert!(session.metadata.awaiting_operator_choice());

    let menu = h.gateway.texts_to(CUSTOMER).await;
    assert_eq!(menu.len(), 1);
    assert!(menu[0].contains("1 - Ana"), "menu was: {}", menu[0]);

    let events = conn.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        OperatorEvent::QueueUpdate { change: QueueChange::HandedOff, .. }
    )));
}

#[tokio::test]
async fn bot_snapshot_failure_does_not_block_hand_off() {
    let h = TestHarness::new().await.unwrap();
    let id = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    h.gateway.fail(GatewayOp::ListBotSessions).await;

    h.bot_status(CUSTOMER, BotStatus::Paused, Some("sales"))
        .await
        .unwrap();
    let session = h.sessions.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Waiting);
    assert_eq!(session.department.as_deref(), Some("sales"));
}

#[tokio::test]
async fn live_snapshot_enriches_the_bot_payload() {
    let h = TestHarness::new().await.unwrap();
    let id = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    let mut live = MockChatGateway::bot_session(CUSTOMER, BotStatus::Opened, chrono::Utc::now());
    live.variables.insert("plan".into(), "gold".into());
    h.gateway.set_bot_sessions("main", vec![live]).await;

    h.bot_status(CUSTOMER, BotStatus::Opened, None).await.unwrap();
    let session = h.sessions.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Bot);
    assert_eq!(
        session.bot_payload.bot_session_id.as_deref(),
        Some(format!("bot-session-{CUSTOMER}").as_str())
    );
    assert_eq!(session.bot_payload.variables.get("plan").map(String::as_str), Some("gold"));
}

#[tokio::test]
async fn bot_reopen_returns_waiting_session_to_bot() {
    let h = TestHarness::new().await.unwrap();
    let id = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    h.bot_status(CUSTOMER, BotStatus::Closed, Some("support"))
        .await
        .unwrap();

    let outcome = h.bot_status(CUSTOMER, BotStatus::Opened, None).await.unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::BotSessionRefreshed {
            session_id: Some(id.clone()),
            change: Some(QueueChange::ReturnedToBot)
        }
    );
    let session = h.sessions.get(&id).await.unwrap();
    assert_eq!(session.status, SessionStatus::Bot);
    assert!(session.bot_completed_at.is_none());
    assert!(session.invariants_hold());
}

#[tokio::test]
async fn bot_event_without_session_is_harmless() {
    let h = TestHarness::new().await.unwrap();
    let outcome = h
        .bot_status(CUSTOMER, BotStatus::Closed, None)
        .await
        .unwrap();
    assert_eq!(
        outcome,
        RouteOutcome::BotSessionRefreshed {
            session_id: None,
            change: None
        }
    );
}

#[tokio::test]
async fn messages_follow_the_assignee_once_in_service() {
    let h = TestHarness::new().await.unwrap();
    let ana = h.add_operator("op-ana", "Ana", "support").await.unwrap();
    let bruno = h.add_operator("op-bruno", "Bruno", "support").await.unwrap();
    let mut ana_conn = h.connect(&ana);
    let mut bruno_conn = h.connect(&bruno);

    let id = session_id(&h.customer_says(CUSTOMER, "MSG-1", "hello").await.unwrap());
    h.bot_status(CUSTOMER, BotStatus::Closed, Some("support"))
        .await
        .unwrap();
    h.assignment.claim(&id, "op-ana").await.unwrap();
    ana_conn.drain();
    bruno_conn.drain();

    h.customer_says(CUSTOMER, "MSG-2", "are you there?").await.unwrap();
    assert!(matches!(
        &ana_conn.drain()[..],
        [OperatorEvent::Message { session_status: Some(SessionStatus::Service), .. }]
    ));
    assert!(bruno_conn.drain().is_empty());
}
