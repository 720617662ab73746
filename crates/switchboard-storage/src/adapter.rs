// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of every persistence collaborator trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use switchboard_config::model::StorageConfig;
use switchboard_core::{
    Customer, CustomerDirectory, Department, HealthStatus, MessageStatus, MessageStore, Operator,
    OperatorDirectory, PriorState, Session, SessionStatus, SessionStore, StoredMessage,
    SwitchboardError, Tabulation, TabulationStore,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed storage.
///
/// Wraps a [`Database`] handle and delegates to the typed query modules.
/// The database is opened on the first call to [`SqliteStorage::initialize`].
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// Create a new SqliteStorage with the given configuration.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wraps an already opened database.
    pub fn from_database(db: Database) -> Self {
        Self {
            config: StorageConfig {
                database_path: ":memory:".to_string(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        }
    }

    fn db(&self) -> Result<&Database, SwitchboardError> {
        self.db.get().ok_or_else(|| SwitchboardError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    /// Opens the database file and runs migrations.
    pub async fn initialize(&self) -> Result<(), SwitchboardError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SwitchboardError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    /// Checkpoints the WAL before shutdown.
    pub async fn close(&self) -> Result<(), SwitchboardError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("WAL checkpoint complete");
        }
        Ok(())
    }

    pub async fn health_check(&self) -> HealthStatus {
        let db = match self.db() {
            Ok(db) => db,
            Err(e) => return HealthStatus::Unhealthy(e.to_string()),
        };
        let ping = db
            .connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err);
        match ping {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }

    // --- Directory seeding ---

    pub async fn upsert_operator(&self, operator: &Operator) -> Result<(), SwitchboardError> {
        queries::operators::upsert_operator(self.db()?, operator).await
    }

    pub async fn upsert_department(&self, department: &Department) -> Result<(), SwitchboardError> {
        queries::operators::upsert_department(self.db()?, department).await
    }
}

#[async_trait]
impl SessionStore for SqliteStorage {
    async fn create_session(&self, session: &Session) -> Result<(), SwitchboardError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn get_session(&self, id: &str) -> Result<Option<Session>, SwitchboardError> {
        queries::sessions::get_session(self.db()?, id).await
    }

    async fn find_open_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Session>, SwitchboardError> {
        queries::sessions::find_open_by_address(self.db()?, address).await
    }

    async fn open_session_if_absent(
        &self,
        candidate: &Session,
    ) -> Result<(Session, bool), SwitchboardError> {
        queries::sessions::open_session_if_absent(self.db()?, candidate).await
    }

    async fn update_session(
        &self,
        session: &Session,
        prior: &PriorState,
    ) -> Result<bool, SwitchboardError> {
        queries::sessions::update_session(self.db()?, session, prior).await
    }

    async fn list_waiting_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Vec<Session>, SwitchboardError> {
        queries::sessions::list_waiting_for_operator(self.db()?, operator_id).await
    }

    async fn list_waiting_unrequested(
        &self,
        department: &str,
    ) -> Result<Vec<Session>, SwitchboardError> {
        queries::sessions::list_waiting_unrequested(self.db()?, department).await
    }

    async fn list_in_service_for_operator(
        &self,
        operator_id: &str,
    ) -> Result<Vec<Session>, SwitchboardError> {
        queries::sessions::list_in_service_for_operator(self.db()?, operator_id).await
    }

    async fn list_stale(
        &self,
        status: SessionStatus,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Session>, SwitchboardError> {
        queries::sessions::list_stale(self.db()?, status, cutoff).await
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn record_if_absent(&self, message: &StoredMessage) -> Result<bool, SwitchboardError> {
        queries::messages::record_if_absent(self.db()?, message).await
    }

    async fn update_status(
        &self,
        gateway_id: &str,
        status: MessageStatus,
    ) -> Result<bool, SwitchboardError> {
        queries::messages::update_status(self.db()?, gateway_id, status).await
    }

    async fn get_message(
        &self,
        gateway_id: &str,
    ) -> Result<Option<StoredMessage>, SwitchboardError> {
        queries::messages::get_message(self.db()?, gateway_id).await
    }

    async fn messages_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<StoredMessage>, SwitchboardError> {
        queries::messages::messages_for_session(self.db()?, session_id).await
    }
}

#[async_trait]
impl CustomerDirectory for SqliteStorage {
    async fn find_or_create_customer(
        &self,
        address: &str,
        display_name: Option<&str>,
    ) -> Result<Customer, SwitchboardError> {
        queries::customers::find_or_create(self.db()?, address, display_name).await
    }

    async fn find_customer_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Customer>, SwitchboardError> {
        queries::customers::find_by_address(self.db()?, address).await
    }
}

#[async_trait]
impl OperatorDirectory for SqliteStorage {
    async fn find_operator(&self, id: &str) -> Result<Option<Operator>, SwitchboardError> {
        queries::operators::find_operator(self.db()?, id).await
    }

    async fn operators_in_department(
        &self,
        department: &str,
    ) -> Result<Vec<Operator>, SwitchboardError> {
        queries::operators::operators_in_department(self.db()?, department).await
    }

    async fn department_supervisor(
        &self,
        department: &str,
    ) -> Result<Option<Operator>, SwitchboardError> {
        queries::operators::department_supervisor(self.db()?, department).await
    }
}

#[async_trait]
impl TabulationStore for SqliteStorage {
    async fn create_tabulation(&self, tabulation: &Tabulation) -> Result<(), SwitchboardError> {
        queries::tabulations::create_tabulation(self.db()?, tabulation).await
    }

    async fn tabulations_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<Tabulation>, SwitchboardError> {
        queries::tabulations::tabulations_for_session(self.db()?, session_id).await
    }
}
