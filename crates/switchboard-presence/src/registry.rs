// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-local table of live operator connections.
//!
//! The table is keyed by connection id. Views by operator and by department
//! are derived from copy-on-read snapshots, so no index can drift from the
//! primary map. No method awaits while a map shard is locked.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broadcast::DeliveryReport;
use crate::event::OperatorEvent;

/// Identity of the operator behind a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorIdentity {
    pub id: String,
    pub name: String,
    pub department: String,
}

impl From<&switchboard_core::Operator> for OperatorIdentity {
    fn from(op: &switchboard_core::Operator) -> Self {
        Self {
            id: op.id.clone(),
            name: op.name.clone(),
            department: op.department.clone(),
        }
    }
}

/// One live operator connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRecord {
    pub connection_id: String,
    pub operator_id: String,
    pub operator_name: String,
    pub department: String,
    pub available: bool,
    pub current_session: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

pub(crate) struct Connection {
    pub(crate) record: PresenceRecord,
    pub(crate) tx: mpsc::Sender<OperatorEvent>,
}

/// Registry of connected operators and the channels used to reach them.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
#[derive(Default)]
pub struct PresenceRegistry {
    pub(crate) connections: DashMap<String, Connection>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection and announces the operator as online.
    ///
    /// A second registration under the same connection id replaces the first.
    pub fn register(
        &self,
        connection_id: &str,
        operator: OperatorIdentity,
        tx: mpsc::Sender<OperatorEvent>,
    ) -> DeliveryReport {
        let now = Utc::now();
        let record = PresenceRecord {
            connection_id: connection_id.to_string(),
            operator_id: operator.id,
            operator_name: operator.name,
            department: operator.department,
            available: true,
            current_session: None,
            connected_at: now,
            last_activity: now,
        };
        let status = status_event(&record, true);
        info!(
            connection_id,
            operator_id = %record.operator_id,
            department = %record.department,
            "operator connected"
        );
        self.connections
            .insert(connection_id.to_string(), Connection { record, tx });
        self.to_all(status)
    }

    /// Removes a connection. Unknown connection ids are ignored.
    ///
    /// The operator is announced offline only when no other connection of
    /// theirs remains.
    pub fn remove(&self, connection_id: &str) -> Option<PresenceRecord> {
        let (_, conn) = self.connections.remove(connection_id)?;
        let record = conn.record;
        let still_online = self.is_online(&record.operator_id);
        info!(
            connection_id,
            operator_id = %record.operator_id,
            still_online,
            "operator disconnected"
        );
        self.to_all(status_event(&record, still_online));
        Some(record)
    }

    /// Updates the availability flag of a connection and announces it.
    pub fn set_availability(&self, connection_id: &str, available: bool) -> bool {
        let record = {
            let Some(mut entry) = self.connections.get_mut(connection_id) else {
                return false;
            };
            entry.record.available = available;
            entry.record.last_activity = Utc::now();
            entry.record.clone()
        };
        self.to_all(status_event(&record, true));
        true
    }

    /// Sets the session every connection of the operator is working on.
    pub fn set_current_session(&self, operator_id: &str, session_id: Option<&str>) {
        for mut entry in self.connections.iter_mut() {
            if entry.record.operator_id == operator_id {
                entry.record.current_session = session_id.map(str::to_string);
            }
        }
    }

    /// Refreshes the last-activity timestamp of a connection.
    pub fn touch(&self, connection_id: &str) -> bool {
        match self.connections.get_mut(connection_id) {
            Some(mut entry) => {
                entry.record.last_activity = Utc::now();
                true
            }
            None => false,
        }
    }

    /// True while the operator has at least one live connection.
    pub fn is_online(&self, operator_id: &str) -> bool {
        self.connections
            .iter()
            .any(|entry| entry.record.operator_id == operator_id)
    }

    /// Ids of all operators with at least one live connection.
    pub fn online_operators(&self) -> BTreeSet<String> {
        self.connections
            .iter()
            .map(|entry| entry.record.operator_id.clone())
            .collect()
    }

    pub fn get(&self, connection_id: &str) -> Option<PresenceRecord> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.record.clone())
    }

    /// Copy of every presence record.
    pub fn snapshot(&self) -> Vec<PresenceRecord> {
        self.connections
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    /// Records grouped by operator id.
    pub fn by_operator(&self) -> BTreeMap<String, Vec<PresenceRecord>> {
        let mut view: BTreeMap<String, Vec<PresenceRecord>> = BTreeMap::new();
        for record in self.snapshot() {
            view.entry(record.operator_id.clone()).or_default().push(record);
        }
        view
    }

    /// Records grouped by department.
    pub fn by_department(&self) -> BTreeMap<String, Vec<PresenceRecord>> {
        let mut view: BTreeMap<String, Vec<PresenceRecord>> = BTreeMap::new();
        for record in self.snapshot() {
            view.entry(record.department.clone()).or_default().push(record);
        }
        view
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Sends a `disconnect` directive to every connection of the operator
    /// and removes them. Returns the number of connections dropped.
    pub fn force_disconnect(&self, operator_id: &str, reason: &str) -> usize {
        let targets: Vec<String> = self
            .connections
            .iter()
            .filter(|entry| entry.record.operator_id == operator_id)
            .map(|entry| entry.key().clone())
            .collect();

        let directive = OperatorEvent::Disconnect {
            reason: reason.to_string(),
        };
        let mut dropped = 0;
        for connection_id in targets {
            if let Some((_, conn)) = self.connections.remove(&connection_id) {
                if conn.tx.try_send(directive.clone()).is_err() {
                    debug!(%connection_id, "disconnect directive not delivered");
                }
                dropped += 1;
            }
        }
        if dropped > 0 {
            info!(operator_id, dropped, reason, "operator force-disconnected");
            self.to_all(OperatorEvent::OperatorStatus {
                operator_id: operator_id.to_string(),
                operator_name: String::new(),
                department: String::new(),
                online: false,
                available: false,
            });
        }
        dropped
    }
}

fn status_event(record: &PresenceRecord, online: bool) -> OperatorEvent {
    OperatorEvent::OperatorStatus {
        operator_id: record.operator_id.clone(),
        operator_name: record.operator_name.clone(),
        department: record.department.clone(),
        online,
        available: online && record.available,
    }
}
