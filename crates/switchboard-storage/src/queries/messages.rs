// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message queries keyed by gateway message id.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use switchboard_core::{MessageStatus, StoredMessage, SwitchboardError};

use super::{get_enum, get_ts, ts};
use crate::database::{Database, map_tr_err};

const MESSAGE_COLUMNS: &str =
    "gateway_id, instance, address, session_id, from_me, body, push_name, status, sent_at, recorded_at";

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredMessage> {
    Ok(StoredMessage {
        gateway_id: row.get(0)?,
        instance: row.get(1)?,
        address: row.get(2)?,
        session_id: row.get(3)?,
        from_me: row.get(4)?,
        body: row.get(5)?,
        push_name: row.get(6)?,
        status: get_enum(row, 7)?,
        sent_at: get_ts(row, 8)?,
        recorded_at: get_ts(row, 9)?,
    })
}

/// Inserts the message unless the gateway id is already stored.
pub async fn record_if_absent(
    db: &Database,
    message: &StoredMessage,
) -> Result<bool, SwitchboardError> {
    let m = message.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                &format!(
                    "INSERT OR IGNORE INTO messages ({MESSAGE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
                ),
                params![
                    m.gateway_id,
                    m.instance,
                    m.address,
                    m.session_id,
                    m.from_me,
                    m.body,
                    m.push_name,
                    m.status.to_string(),
                    ts(m.sent_at),
                    ts(m.recorded_at),
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn update_status(
    db: &Database,
    gateway_id: &str,
    status: MessageStatus,
) -> Result<bool, SwitchboardError> {
    let gateway_id = gateway_id.to_string();
    let status = status.to_string();
    let now = ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE messages SET status = ?1, recorded_at = ?2 WHERE gateway_id = ?3",
                params![status, now, gateway_id],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_message(
    db: &Database,
    gateway_id: &str,
) -> Result<Option<StoredMessage>, SwitchboardError> {
    let gateway_id = gateway_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE gateway_id = ?1"),
                params![gateway_id],
                message_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn messages_for_session(
    db: &Database,
    session_id: &str,
) -> Result<Vec<StoredMessage>, SwitchboardError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages WHERE session_id = ?1 ORDER BY sent_at ASC"
            ))?;
            let rows = stmt.query_map(params![session_id], message_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
