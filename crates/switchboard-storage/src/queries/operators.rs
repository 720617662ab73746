// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator and department directory queries.

use rusqlite::{OptionalExtension, params};
use switchboard_core::{Department, Operator, SwitchboardError};

use crate::database::{Database, map_tr_err};

const OPERATOR_COLUMNS: &str = "id, name, department, active";

fn operator_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Operator> {
    Ok(Operator {
        id: row.get(0)?,
        name: row.get(1)?,
        department: row.get(2)?,
        active: row.get(3)?,
    })
}

/// Inserts or replaces an operator record.
pub async fn upsert_operator(db: &Database, operator: &Operator) -> Result<(), SwitchboardError> {
    let op = operator.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO operators (id, name, department, active) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (id) DO UPDATE SET
                    name = excluded.name,
                    department = excluded.department,
                    active = excluded.active",
                params![op.id, op.name, op.department, op.active],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Inserts or replaces a department and its supervisor link.
pub async fn upsert_department(
    db: &Database,
    department: &Department,
) -> Result<(), SwitchboardError> {
    let dept = department.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO departments (name, supervisor_id) VALUES (?1, ?2)
                 ON CONFLICT (name) DO UPDATE SET supervisor_id = excluded.supervisor_id",
                params![dept.name, dept.supervisor_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn find_operator(db: &Database, id: &str) -> Result<Option<Operator>, SwitchboardError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {OPERATOR_COLUMNS} FROM operators WHERE id = ?1"),
                params![id],
                operator_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// All operators of a department, ordered by name.
pub async fn operators_in_department(
    db: &Database,
    department: &str,
) -> Result<Vec<Operator>, SwitchboardError> {
    let department = department.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OPERATOR_COLUMNS} FROM operators WHERE department = ?1 ORDER BY name"
            ))?;
            let rows = stmt.query_map(params![department], operator_from_row)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// The supervisor operator configured for a department.
pub async fn department_supervisor(
    db: &Database,
    department: &str,
) -> Result<Option<Operator>, SwitchboardError> {
    let department = department.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT o.id, o.name, o.department, o.active
                 FROM departments d JOIN operators o ON o.id = d.supervisor_id
                 WHERE d.name = ?1",
                params![department],
                operator_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: &str, name: &str, dept: &str) -> Operator {
        Operator {
            id: id.into(),
            name: name.into(),
            department: dept.into(),
            active: true,
        }
    }

    #[tokio::test]
    async fn supervisor_resolves_through_department() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_operator(&db, &op("op-1", "Zoe", "sales")).await.unwrap();
        upsert_operator(&db, &op("sup-1", "Marta", "management")).await.unwrap();
        upsert_department(
            &db,
            &Department {
                name: "sales".into(),
                supervisor_id: Some("sup-1".into()),
            },
        )
        .await
        .unwrap();

        let sup = department_supervisor(&db, "sales").await.unwrap().unwrap();
        assert_eq!(sup.id, "sup-1");
        assert!(department_supervisor(&db, "billing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_updates_active_flag() {
        let db = Database::open_in_memory().await.unwrap();
        let mut zoe = op("op-1", "Zoe", "sales");
        upsert_operator(&db, &zoe).await.unwrap();
        zoe.active = false;
        upsert_operator(&db, &zoe).await.unwrap();
        let stored = find_operator(&db, "op-1").await.unwrap().unwrap();
        assert!(!stored.active);
        assert_eq!(operators_in_department(&db, "sales").await.unwrap().len(), 1);
    }
}
