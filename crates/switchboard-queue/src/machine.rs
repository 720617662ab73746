// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pure session state transitions.
//!
//! Each function takes the current session and returns the next one, or the
//! [`Rejection`] explaining why the move is not allowed. Nothing here touches
//! storage; [`crate::registry::SessionRegistry`] pairs these with conditional
//! writes.
//!
//! ```text
//!   bot ──hand_off──▶ waiting ──claim──▶ service ──complete──▶ completed
//!    ▲                  │  │               │ ▲
//!    └────resume_bot────┘  │               └─┘ transfer
//!    │                     │
//!    └──────cancel─────────┴──────────────────────────────────▶ cancelled
//! ```

use chrono::{DateTime, Utc};
use switchboard_core::{CancelReason, MetaKey, Rejection, Session, SessionStatus};

fn ensure_open(session: &Session) -> Result<(), Rejection> {
    if session.status.is_terminal() {
        Err(Rejection::Terminal)
    } else {
        Ok(())
    }
}

/// `bot → waiting`: the bot stage handed the conversation to a human queue.
pub fn hand_off(
    session: &Session,
    department: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.assigned_operator.is_some() {
        return Err(Rejection::AssignedOperatorPresent);
    }
    if session.status != SessionStatus::Bot {
        return Err(Rejection::NotInBot);
    }
    let mut next = session.clone();
    next.status = SessionStatus::Waiting;
    if let Some(dept) = department {
        next.department = Some(dept.to_string());
    }
    next.bot_completed_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// `waiting → bot`: the upstream bot session reopened before anyone claimed.
pub fn resume_bot(session: &Session, now: DateTime<Utc>) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.assigned_operator.is_some() {
        return Err(Rejection::AlreadyAssigned);
    }
    if session.status != SessionStatus::Waiting {
        return Err(Rejection::NotWaiting);
    }
    let mut next = session.clone();
    next.status = SessionStatus::Bot;
    next.bot_completed_at = None;
    next.requested_operator = None;
    next.metadata.set_awaiting_operator_choice(false);
    next.metadata.remove(MetaKey::OriginalRequestedOperator);
    next.updated_at = now;
    Ok(next)
}

/// Routes a waiting session toward an operator without assigning it.
///
/// `original` records the operator the customer picked when the request was
/// redirected to the supervisor.
pub fn route(
    session: &Session,
    requested: Option<&str>,
    supervisor: Option<&str>,
    original: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.assigned_operator.is_some() {
        return Err(Rejection::AlreadyAssigned);
    }
    if session.status != SessionStatus::Waiting {
        return Err(Rejection::NotWaiting);
    }
    let mut next = session.clone();
    next.requested_operator = requested.map(str::to_string);
    next.supervisor = supervisor.map(str::to_string);
    match original {
        Some(op) => {
            // Operator ids are non-empty, so this write cannot fail validation.
            let _ = next.metadata.set(MetaKey::OriginalRequestedOperator, op);
        }
        None => next.metadata.remove(MetaKey::OriginalRequestedOperator),
    }
    next.metadata.set_awaiting_operator_choice(false);
    next.updated_at = now;
    Ok(next)
}

/// Marks a waiting session as expecting a numeric operator choice.
pub fn await_choice(session: &Session, now: DateTime<Utc>) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.status != SessionStatus::Waiting {
        return Err(Rejection::NotWaiting);
    }
    let mut next = session.clone();
    next.metadata.set_awaiting_operator_choice(true);
    next.updated_at = now;
    Ok(next)
}

/// `waiting → service`: an operator claims the session.
///
/// "Already assigned" is checked before "not waiting" so a losing claimant
/// in a race always learns that someone else won.
pub fn claim(
    session: &Session,
    operator_id: &str,
    now: DateTime<Utc>,
) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.assigned_operator.is_some() {
        return Err(Rejection::AlreadyAssigned);
    }
    if session.status != SessionStatus::Waiting {
        return Err(Rejection::NotWaiting);
    }
    let mut next = session.clone();
    next.status = SessionStatus::Service;
    next.assigned_operator = Some(operator_id.to_string());
    next.assigned_at = Some(now);
    next.metadata.set_awaiting_operator_choice(false);
    next.updated_at = now;
    Ok(next)
}

/// `service → service`: the assignee hands the session to another operator.
pub fn transfer(
    session: &Session,
    caller: &str,
    target: &str,
    now: DateTime<Utc>,
) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.status != SessionStatus::Service {
        return Err(Rejection::NotInService);
    }
    if session.assigned_operator.as_deref() != Some(caller) {
        return Err(Rejection::NotAssignee);
    }
    if target == caller {
        return Err(Rejection::SameOperator);
    }
    let mut next = session.clone();
    next.assigned_operator = Some(target.to_string());
    next.assigned_at = Some(now);
    next.metadata.record_transfer(caller);
    next.updated_at = now;
    Ok(next)
}

/// `service → completed`: only the assignee may complete, with an outcome code.
pub fn complete(
    session: &Session,
    caller: &str,
    outcome: &str,
    now: DateTime<Utc>,
) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.status != SessionStatus::Service {
        return Err(Rejection::NotInService);
    }
    if session.assigned_operator.as_deref() != Some(caller) {
        return Err(Rejection::NotAssignee);
    }
    if outcome.trim().is_empty() {
        return Err(Rejection::MissingOutcome);
    }
    let mut next = session.clone();
    next.status = SessionStatus::Completed;
    next.assigned_operator = None;
    next.completed_at = Some(now);
    next.updated_at = now;
    Ok(next)
}

/// `bot | waiting → cancelled` with a recorded reason.
pub fn cancel(
    session: &Session,
    reason: CancelReason,
    now: DateTime<Utc>,
) -> Result<Session, Rejection> {
    ensure_open(session)?;
    if session.status == SessionStatus::Service {
        return Err(Rejection::NotCancellable);
    }
    let mut next = session.clone();
    next.status = SessionStatus::Cancelled;
    next.completed_at = Some(now);
    next.metadata.set_cancel_reason(reason);
    next.metadata.set_awaiting_operator_choice(false);
    next.updated_at = now;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn waiting() -> Session {
        let now = Utc::now();
        let bot = Session::new_inbound("main", "c-1", "5511@s.whatsapp.net", now);
        hand_off(&bot, Some("sales"), now).unwrap()
    }

    #[test]
    fn hand_off_stamps_bot_completion() {
        let s = waiting();
        assert_eq!(s.status, SessionStatus::Waiting);
        assert_eq!(s.department.as_deref(), Some("sales"));
        assert!(s.bot_completed_at.is_some());
        assert_eq!(hand_off(&s, None, Utc::now()), Err(Rejection::NotInBot));
    }

    #[test]
    fn claim_distinguishes_assigned_from_not_waiting() {
        let claimed = claim(&waiting(), "op-a", Utc::now()).unwrap();
        assert_eq!(claim(&claimed, "op-b", Utc::now()), Err(Rejection::AlreadyAssigned));

        let bot = Session::new_inbound("main", "c-1", "x@s.whatsapp.net", Utc::now());
        assert_eq!(claim(&bot, "op-b", Utc::now()), Err(Rejection::NotWaiting));
    }

    #[test]
    fn only_assignee_transfers_and_completes() {
        let s = claim(&waiting(), "op-a", Utc::now()).unwrap();
        assert_eq!(transfer(&s, "op-b", "op-c", Utc::now()), Err(Rejection::NotAssignee));
        assert_eq!(transfer(&s, "op-a", "op-a", Utc::now()), Err(Rejection::SameOperator));
        assert_eq!(complete(&s, "op-b", "resolved", Utc::now()), Err(Rejection::NotAssignee));
        assert_eq!(complete(&s, "op-a", "  ", Utc::now()), Err(Rejection::MissingOutcome));

        let moved = transfer(&s, "op-a", "op-b", Utc::now()).unwrap();
        assert_eq!(moved.assigned_operator.as_deref(), Some("op-b"));
        assert_eq!(moved.metadata.transfer_count(), 1);

        let done = complete(&moved, "op-b", "resolved", Utc::now()).unwrap();
        assert_eq!(done.status, SessionStatus::Completed);
        assert!(done.invariants_hold());
    }

    #[test]
    fn service_sessions_cannot_be_cancelled() {
        let s = claim(&waiting(), "op-a", Utc::now()).unwrap();
        assert_eq!(
            cancel(&s, CancelReason::OperatorCancel, Utc::now()),
            Err(Rejection::NotCancellable)
        );
    }

    #[test]
    fn terminal_sessions_reject_everything() {
        let cancelled = cancel(&waiting(), CancelReason::WaitingTimeout, Utc::now()).unwrap();
        assert_eq!(cancelled.metadata.cancel_reason(), Some(CancelReason::WaitingTimeout));
        let now = Utc::now();
        assert_eq!(claim(&cancelled, "op", now), Err(Rejection::Terminal));
        assert_eq!(hand_off(&cancelled, None, now), Err(Rejection::Terminal));
        assert_eq!(resume_bot(&cancelled, now), Err(Rejection::Terminal));
        assert_eq!(
            cancel(&cancelled, CancelReason::Inactivity, now),
            Err(Rejection::Terminal)
        );
    }

    #[test]
    fn resume_bot_clears_hand_off() {
        let routed = route(&waiting(), Some("op-a"), None, None, Utc::now()).unwrap();
        let back = resume_bot(&routed, Utc::now()).unwrap();
        assert_eq!(back.status, SessionStatus::Bot);
        assert!(back.bot_completed_at.is_none());
        assert!(back.requested_operator.is_none());
    }

    #[derive(Debug, Clone)]
    enum Op {
        HandOff,
        Resume,
        Claim(u8),
        Transfer(u8, u8),
        Complete(u8, bool),
        Cancel,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::HandOff),
            Just(Op::Resume),
            (0u8..3).prop_map(Op::Claim),
            (0u8..3, 0u8..3).prop_map(|(a, b)| Op::Transfer(a, b)),
            (0u8..3, any::<bool>()).prop_map(|(a, o)| Op::Complete(a, o)),
            Just(Op::Cancel),
        ]
    }

    fn operator(n: u8) -> String {
        format!("op-{n}")
    }

    proptest! {
        #[test]
        fn invariants_hold_under_any_sequence(ops in prop::collection::vec(op_strategy(), 0..40)) {
            let now = Utc::now();
            let mut session = Session::new_inbound("main", "c-1", "5511@s.whatsapp.net", now);
            let direction = session.direction;
            for op in ops {
                let result = match op {
                    Op::HandOff => hand_off(&session, Some("sales"), now),
                    Op::Resume => resume_bot(&session, now),
                    Op::Claim(a) => claim(&session, &operator(a), now),
                    Op::Transfer(a, b) => transfer(&session, &operator(a), &operator(b), now),
                    Op::Complete(a, with_outcome) => {
                        complete(&session, &operator(a), if with_outcome { "resolved" } else { "" }, now)
                    }
                    Op::Cancel => cancel(&session, CancelReason::OperatorCancel, now),
                };
                let was_terminal = session.status.is_terminal();
                match result {
                    Ok(next) => {
                        prop_assert!(!was_terminal);
                        session = next;
                    }
                    Err(_) => {}
                }
                prop_assert!(session.invariants_hold());
                prop_assert_eq!(session.direction, direction);
            }
        }
    }
}
