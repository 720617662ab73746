// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tabulation queries. Rows are insert-only.

use rusqlite::params;
use switchboard_core::{SwitchboardError, Tabulation};

use super::{get_ts, ts};
use crate::database::{Database, map_tr_err};

pub async fn create_tabulation(
    db: &Database,
    tabulation: &Tabulation,
) -> Result<(), SwitchboardError> {
    let t = tabulation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO tabulations (id, session_id, operator_id, outcome, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    t.id,
                    t.session_id,
                    t.operator_id,
                    t.outcome,
                    t.notes,
                    ts(t.created_at)
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn tabulations_for_session(
    db: &Database,
    session_id: &str,
) -> Result<Vec<Tabulation>, SwitchboardError> {
    let session_id = session_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, operator_id, outcome, notes, created_at
                 FROM tabulations WHERE session_id = ?1 ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok(Tabulation {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    operator_id: row.get(2)?,
                    outcome: row.get(3)?,
                    notes: row.get(4)?,
                    created_at: get_ts(row, 5)?,
                })
            })?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
