// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Customer directory queries.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use switchboard_core::{Customer, SwitchboardError};

use super::{get_ts, ts};
use crate::database::{Database, map_tr_err};

fn customer_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        address: row.get(1)?,
        display_name: row.get(2)?,
        created_at: get_ts(row, 3)?,
    })
}

fn select_by_address(
    conn: &rusqlite::Connection,
    address: &str,
) -> rusqlite::Result<Option<Customer>> {
    conn.query_row(
        "SELECT id, address, display_name, created_at FROM customers WHERE address = ?1",
        params![address],
        customer_from_row,
    )
    .optional()
}

/// Returns the customer for an address, creating it on first contact.
///
/// A known customer without a display name picks up the one supplied here.
pub async fn find_or_create(
    db: &Database,
    address: &str,
    display_name: Option<&str>,
) -> Result<Customer, SwitchboardError> {
    let address = address.to_string();
    let display_name = display_name.map(str::to_string);
    let id = uuid::Uuid::new_v4().to_string();
    let now = ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO customers (id, address, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id, address, display_name, now],
            )?;
            if display_name.is_some() {
                conn.execute(
                    "UPDATE customers SET display_name = ?1
                     WHERE address = ?2 AND display_name IS NULL",
                    params![display_name, address],
                )?;
            }
            select_by_address(conn, &address)?.ok_or(rusqlite::Error::QueryReturnedNoRows)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_by_address(
    db: &Database,
    address: &str,
) -> Result<Option<Customer>, SwitchboardError> {
    let address = address.to_string();
    db.connection()
        .call(move |conn| select_by_address(conn, &address))
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn find_or_create_is_stable_per_address() {
        let db = Database::open_in_memory().await.unwrap();
        let first = find_or_create(&db, "5511@s.whatsapp.net", None).await.unwrap();
        let again = find_or_create(&db, "5511@s.whatsapp.net", Some("Ana")).await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(again.display_name.as_deref(), Some("Ana"));

        let renamed = find_or_create(&db, "5511@s.whatsapp.net", Some("Other")).await.unwrap();
        assert_eq!(renamed.display_name.as_deref(), Some("Ana"));
    }
}
