// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session queries, including the conditional update every transition goes through.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use switchboard_core::{
    BotPayload, PriorState, Session, SessionMetadata, SessionStatus, SwitchboardError,
};

use super::{get_enum, get_json, get_ts, get_ts_opt, ts, ts_opt};
use crate::database::{Database, map_tr_err};

const SESSION_COLUMNS: &str = "id, session_key, instance, customer_id, address, status, \
     department, direction, requested_operator, assigned_operator, supervisor, bot_payload, \
     metadata, created_at, bot_completed_at, assigned_at, completed_at, updated_at, version";

const OPEN_STATUSES: &str = "('bot', 'waiting', 'service')";

fn session_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        session_key: row.get(1)?,
        instance: row.get(2)?,
        customer_id: row.get(3)?,
        address: row.get(4)?,
        status: get_enum(row, 5)?,
        department: row.get(6)?,
        direction: get_enum(row, 7)?,
        requested_operator: row.get(8)?,
        assigned_operator: row.get(9)?,
        supervisor: row.get(10)?,
        bot_payload: get_json(row, 11, BotPayload::from_json)?,
        metadata: get_json(row, 12, SessionMetadata::from_json)?,
        created_at: get_ts(row, 13)?,
        bot_completed_at: get_ts_opt(row, 14)?,
        assigned_at: get_ts_opt(row, 15)?,
        completed_at: get_ts_opt(row, 16)?,
        updated_at: get_ts(row, 17)?,
        version: row.get(18)?,
    })
}

fn insert(conn: &rusqlite::Connection, s: &Session) -> rusqlite::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        ),
        params![
            s.id,
            s.session_key,
            s.instance,
            s.customer_id,
            s.address,
            s.status.to_string(),
            s.department,
            s.direction.to_string(),
            s.requested_operator,
            s.assigned_operator,
            s.supervisor,
            s.bot_payload.to_json(),
            s.metadata.to_json(),
            ts(s.created_at),
            ts_opt(s.bot_completed_at),
            ts_opt(s.assigned_at),
            ts_opt(s.completed_at),
            ts(s.updated_at),
            s.version,
        ],
    )?;
    Ok(())
}

fn select_open_by_address(
    conn: &rusqlite::Connection,
    address: &str,
) -> rusqlite::Result<Option<Session>> {
    conn.query_row(
        &format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE address = ?1 AND status IN {OPEN_STATUSES} \
             ORDER BY created_at DESC LIMIT 1"
        ),
        params![address],
        session_from_row,
    )
    .optional()
}

fn query_sessions(
    conn: &rusqlite::Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> rusqlite::Result<Vec<Session>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, session_from_row)?;
    rows.collect()
}

/// Inserts a new session row.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), SwitchboardError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| insert(conn, &session))
        .await
        .map_err(map_tr_err)
}

/// Loads a session by id.
pub async fn get_session(db: &Database, id: &str) -> Result<Option<Session>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![id],
                session_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Finds the open (non-terminal) session for an address.
pub async fn find_open_by_address(
    db: &Database,
    address: &str,
) -> Result<Option<Session>, SwitchboardError> {
    let address = address.to_string();
    db.connection()
        .call(move |conn| select_open_by_address(conn, &address))
        .await
        .map_err(map_tr_err)
}

/// Atomic find-or-insert of the open session for the candidate's address.
pub async fn open_session_if_absent(
    db: &Database,
    candidate: &Session,
) -> Result<(Session, bool), SwitchboardError> {
    let candidate = candidate.clone();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            if let Some(existing) = select_open_by_address(&tx, &candidate.address)? {
                return Ok((existing, false));
            }
            insert(&tx, &candidate)?;
            tx.commit()?;
            Ok((candidate, true))
        })
        .await
        .map_err(map_tr_err)
}

/// Conditional write: succeeds only if the row still has the prior version,
/// status and assignee. The stored version is incremented.
pub async fn update_session(
    db: &Database,
    session: &Session,
    prior: &PriorState,
) -> Result<bool, SwitchboardError> {
    let s = session.clone();
    let prior_status = prior.status.to_string();
    let prior_assignee = prior.assigned_operator.clone();
    let prior_version = prior.version;
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET
                    session_key = ?1, status = ?2, department = ?3,
                    requested_operator = ?4, assigned_operator = ?5, supervisor = ?6,
                    bot_payload = ?7, metadata = ?8, bot_completed_at = ?9,
                    assigned_at = ?10, completed_at = ?11, updated_at = ?12,
                    version = version + 1
                 WHERE id = ?13 AND status = ?14 AND assigned_operator IS ?15
                   AND version = ?16",
                params![
                    s.session_key,
                    s.status.to_string(),
                    s.department,
                    s.requested_operator,
                    s.assigned_operator,
                    s.supervisor,
                    s.bot_payload.to_json(),
                    s.metadata.to_json(),
                    ts_opt(s.bot_completed_at),
                    ts_opt(s.assigned_at),
                    ts_opt(s.completed_at),
                    ts(s.updated_at),
                    s.id,
                    prior_status,
                    prior_assignee,
                    prior_version,
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Waiting sessions routed to an operator, either by request or as supervisor.
pub async fn list_waiting_for_operator(
    db: &Database,
    operator_id: &str,
) -> Result<Vec<Session>, SwitchboardError> {
    let operator_id = operator_id.to_string();
    db.connection()
        .call(move |conn| {
            query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions \
                     WHERE status = 'waiting' \
                       AND (requested_operator = ?1 OR supervisor = ?1) \
                     ORDER BY COALESCE(bot_completed_at, created_at) ASC"
                ),
                &[&operator_id],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Waiting sessions in a department nobody requested, oldest hand-off first.
pub async fn list_waiting_unrequested(
    db: &Database,
    department: &str,
) -> Result<Vec<Session>, SwitchboardError> {
    let department = department.to_string();
    db.connection()
        .call(move |conn| {
            query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions \
                     WHERE status = 'waiting' AND department = ?1 \
                       AND requested_operator IS NULL \
                     ORDER BY COALESCE(bot_completed_at, created_at) ASC"
                ),
                &[&department],
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn list_in_service_for_operator(
    db: &Database,
    operator_id: &str,
) -> Result<Vec<Session>, SwitchboardError> {
    let operator_id = operator_id.to_string();
    db.connection()
        .call(move |conn| {
            query_sessions(
                conn,
                &format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions \
                     WHERE status = 'service' AND assigned_operator = ?1 \
                     ORDER BY assigned_at ASC"
                ),
                &[&operator_id],
            )
        })
        .await
        .map_err(map_tr_err)
}

/// Sessions in `status` whose current stage started before `cutoff`.
pub async fn list_stale(
    db: &Database,
    status: SessionStatus,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Session>, SwitchboardError> {
    let stage_start = match status {
        SessionStatus::Bot => "created_at",
        SessionStatus::Waiting => "COALESCE(bot_completed_at, created_at)",
        SessionStatus::Service => "COALESCE(assigned_at, created_at)",
        SessionStatus::Completed | SessionStatus::Cancelled => "updated_at",
    };
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions \
         WHERE status = ?1 AND {stage_start} < ?2 \
         ORDER BY {stage_start} ASC"
    );
    let status = status.to_string();
    let cutoff = ts(cutoff);
    db.connection()
        .call(move |conn| query_sessions(conn, &sql, &[&status, &cutoff]))
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::customers;
    use chrono::Duration;

    async fn setup() -> (Database, String) {
        let db = Database::open_in_memory().await.unwrap();
        let customer = customers::find_or_create(&db, "5511@s.whatsapp.net", None)
            .await
            .unwrap();
        (db, customer.id)
    }

    #[tokio::test]
    async fn open_session_if_absent_is_idempotent() {
        let (db, customer_id) = setup().await;
        let now = Utc::now();
        let first = Session::new_inbound("main", &customer_id, "5511@s.whatsapp.net", now);
        let second = Session::new_inbound("main", &customer_id, "5511@s.whatsapp.net", now);

        let (a, created_a) = open_session_if_absent(&db, &first).await.unwrap();
        let (b, created_b) = open_session_if_absent(&db, &second).await.unwrap();
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn conditional_update_rejects_stale_prior_state() {
        let (db, customer_id) = setup().await;
        let mut session = Session::new_inbound("main", &customer_id, "5511@s.whatsapp.net", Utc::now());
        session.status = SessionStatus::Waiting;
        create_session(&db, &session).await.unwrap();

        let prior = PriorState::of(&session);
        let mut claimed = session.clone();
        claimed.status = SessionStatus::Service;
        claimed.assigned_operator = Some("op-a".into());
        assert!(update_session(&db, &claimed, &prior).await.unwrap());

        let mut racer = session.clone();
        racer.status = SessionStatus::Service;
        racer.assigned_operator = Some("op-b".into());
        assert!(!update_session(&db, &racer, &prior).await.unwrap());

        let stored = get_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(stored.assigned_operator.as_deref(), Some("op-a"));
    }

    #[tokio::test]
    async fn stale_write_with_unchanged_status_is_rejected() {
        let (db, customer_id) = setup().await;
        let mut session = Session::new_inbound("main", &customer_id, "5511@s.whatsapp.net", Utc::now());
        session.status = SessionStatus::Waiting;
        session.department = Some("sales".into());
        create_session(&db, &session).await.unwrap();

        let stale = get_session(&db, &session.id).await.unwrap().unwrap();
        let mut routed = stale.clone();
        routed.requested_operator = Some("op-a".into());
        assert!(update_session(&db, &routed, &PriorState::of(&stale)).await.unwrap());

        let mut refreshed = stale.clone();
        refreshed.bot_payload.bot_url = Some("https://bot.example/next".into());
        assert!(!update_session(&db, &refreshed, &PriorState::of(&stale)).await.unwrap());

        let stored = get_session(&db, &session.id).await.unwrap().unwrap();
        assert_eq!(stored.requested_operator.as_deref(), Some("op-a"));
        assert_eq!(stored.version, stale.version + 1);
        assert!(stored.bot_payload.bot_url.is_none());
    }

    #[tokio::test]
    async fn terminal_sessions_are_not_open() {
        let (db, customer_id) = setup().await;
        let mut session = Session::new_inbound("main", &customer_id, "5511@s.whatsapp.net", Utc::now());
        session.status = SessionStatus::Cancelled;
        session.completed_at = Some(Utc::now());
        create_session(&db, &session).await.unwrap();
        assert!(find_open_by_address(&db, "5511@s.whatsapp.net").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn waiting_staleness_uses_hand_off_time() {
        let (db, customer_id) = setup().await;
        let now = Utc::now();
        let mut session = Session::new_inbound(
            "main",
            &customer_id,
            "5511@s.whatsapp.net",
            now - Duration::minutes(60),
        );
        session.status = SessionStatus::Waiting;
        session.bot_completed_at = Some(now - Duration::minutes(5));
        create_session(&db, &session).await.unwrap();

        let cutoff = now - Duration::minutes(20);
        assert!(list_stale(&db, SessionStatus::Waiting, cutoff).await.unwrap().is_empty());
        let cutoff = now - Duration::minutes(1);
        assert_eq!(list_stale(&db, SessionStatus::Waiting, cutoff).await.unwrap().len(), 1);
        assert!(list_stale(&db, SessionStatus::Bot, now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn waiting_lists_by_operator_and_department() {
        let (db, customer_id) = setup().await;
        let now = Utc::now();
        let mut requested = Session::new_inbound("main", &customer_id, "5511@s.whatsapp.net", now);
        requested.status = SessionStatus::Waiting;
        requested.department = Some("sales".into());
        requested.requested_operator = Some("op-a".into());
        create_session(&db, &requested).await.unwrap();

        let mut open_pool = Session::new_inbound("main", &customer_id, "5522@s.whatsapp.net", now);
        open_pool.status = SessionStatus::Waiting;
        open_pool.department = Some("sales".into());
        open_pool.supervisor = Some("sup".into());
        create_session(&db, &open_pool).await.unwrap();

        assert_eq!(list_waiting_for_operator(&db, "op-a").await.unwrap().len(), 1);
        assert_eq!(list_waiting_for_operator(&db, "sup").await.unwrap().len(), 1);
        let pool = list_waiting_unrequested(&db, "sales").await.unwrap();
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, open_pool.id);
    }
}
