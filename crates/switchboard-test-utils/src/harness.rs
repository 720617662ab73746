// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the full routing stack over a temp SQLite
//! database and a [`MockChatGateway`]. Webhooks are fed with
//! [`TestHarness::route`] and operators are simulated with
//! [`TestHarness::connect`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tokio::sync::mpsc;

use switchboard_config::model::{
    InstanceConfig, ReaperConfig, RoutingConfig, StorageConfig, SwitchboardConfig,
};
use switchboard_core::{BotStatus, Department, Operator, SwitchboardError};
use switchboard_presence::{OperatorEvent, OperatorIdentity, PresenceRegistry};
use switchboard_queue::{AssignmentEngine, Notices, SessionRegistry};
use switchboard_reaper::Reaper;
use switchboard_router::{EventRouter, RouteOutcome, WebhookEnvelope};
use switchboard_storage::SqliteStorage;

use crate::mock_gateway::MockChatGateway;

/// Instance name used by the harness unless configured otherwise.
pub const DEFAULT_INSTANCE: &str = "main";

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    routing: RoutingConfig,
    reaper: ReaperConfig,
    instances: Vec<InstanceConfig>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            routing: RoutingConfig::default(),
            reaper: ReaperConfig::default(),
            instances: vec![InstanceConfig {
                name: DEFAULT_INSTANCE.to_string(),
                bot_id: "bot-1".to_string(),
            }],
        }
    }

    pub fn with_default_department(mut self, department: &str) -> Self {
        self.routing.default_department = Some(department.to_string());
        self
    }

    pub fn with_reaper(mut self, reaper: ReaperConfig) -> Self {
        self.reaper = reaper;
        self
    }

    /// Replaces the configured gateway instances.
    pub fn with_instances(mut self, instances: Vec<InstanceConfig>) -> Self {
        self.instances = instances;
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, SwitchboardError> {
        let temp_dir = tempfile::TempDir::new().map_err(|e| SwitchboardError::Storage {
            source: Box::new(e),
        })?;
        let db_path = temp_dir.path().join("test.db");

        let storage_config = StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        };
        let storage = Arc::new(SqliteStorage::new(storage_config.clone()));
        storage.initialize().await?;

        let gateway = Arc::new(MockChatGateway::new());
        let presence = Arc::new(PresenceRegistry::new());
        let sessions = Arc::new(SessionRegistry::new(storage.clone()));
        let notices = Notices::new(self.routing.clone());

        let assignment = Arc::new(AssignmentEngine::new(
            sessions.clone(),
            storage.clone(),
            storage.clone(),
            storage.clone(),
            gateway.clone(),
            presence.clone(),
            notices.clone(),
        ));

        let mut router = EventRouter::new(
            assignment.clone(),
            storage.clone(),
            storage.clone(),
            gateway.clone(),
            presence.clone(),
        );
        for instance in &self.instances {
            router = router.with_bot(&instance.name, &instance.bot_id);
        }

        let reaper = Arc::new(Reaper::new(
            sessions.clone(),
            gateway.clone(),
            presence.clone(),
            notices,
            self.reaper.clone(),
            self.instances.clone(),
        ));

        let mut config = SwitchboardConfig::default();
        config.storage = storage_config;
        config.reaper = self.reaper;
        config.routing = self.routing;
        config.evolution.instances = self.instances;

        Ok(TestHarness {
            storage,
            gateway,
            presence,
            sessions,
            assignment,
            router: Arc::new(router),
            reaper,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A simulated operator WebSocket connection.
pub struct OperatorConnection {
    pub connection_id: String,
    pub rx: mpsc::Receiver<OperatorEvent>,
}

impl OperatorConnection {
    /// Every event received so far.
    pub fn drain(&mut self) -> Vec<OperatorEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// A complete routing stack over temp storage and a mock gateway.
pub struct TestHarness {
    /// SQLite storage (temp DB, removed on drop).
    pub storage: Arc<SqliteStorage>,
    pub gateway: Arc<MockChatGateway>,
    pub presence: Arc<PresenceRegistry>,
    pub sessions: Arc<SessionRegistry>,
    pub assignment: Arc<AssignmentEngine>,
    pub router: Arc<EventRouter>,
    pub reaper: Arc<Reaper>,
    pub config: SwitchboardConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// A harness with default settings.
    pub async fn new() -> Result<Self, SwitchboardError> {
        Self::builder().build().await
    }

    /// Seeds an active operator.
    pub async fn add_operator(
        &self,
        id: &str,
        name: &str,
        department: &str,
    ) -> Result<Operator, SwitchboardError> {
        let operator = Operator {
            id: id.to_string(),
            name: name.to_string(),
            department: department.to_string(),
            active: true,
        };
        self.storage.upsert_operator(&operator).await?;
        Ok(operator)
    }

    /// Seeds a department with an optional supervisor.
    pub async fn add_department(
        &self,
        name: &str,
        supervisor_id: Option<&str>,
    ) -> Result<(), SwitchboardError> {
        self.storage
            .upsert_department(&Department {
                name: name.to_string(),
                supervisor_id: supervisor_id.map(str::to_string),
            })
            .await
    }

    /// Registers a live connection for an operator.
    pub fn connect(&self, operator: &Operator) -> OperatorConnection {
        self.connect_with_capacity(operator, 256)
    }

    pub fn connect_with_capacity(&self, operator: &Operator, capacity: usize) -> OperatorConnection {
        let (tx, rx) = mpsc::channel(capacity);
        let connection_id = format!("conn-{}-{}", operator.id, self.presence.connection_count());
        self.presence
            .register(&connection_id, OperatorIdentity::from(operator), tx);
        OperatorConnection { connection_id, rx }
    }

    /// Routes a raw webhook body.
    pub async fn route(&self, body: Value) -> Result<RouteOutcome, SwitchboardError> {
        let envelope: WebhookEnvelope = serde_json::from_value(body)
            .map_err(|e| SwitchboardError::MalformedEvent(e.to_string()))?;
        self.router.route(envelope).await
    }

    /// Delivers an inbound customer message.
    pub async fn customer_says(
        &self,
        address: &str,
        message_id: &str,
        text: &str,
    ) -> Result<RouteOutcome, SwitchboardError> {
        self.route(message_event(address, message_id, text, false))
            .await
    }

    /// Delivers a bot-session status change.
    pub async fn bot_status(
        &self,
        address: &str,
        status: BotStatus,
        department: Option<&str>,
    ) -> Result<RouteOutcome, SwitchboardError> {
        self.route(bot_status_event(address, status, department))
            .await
    }
}

/// A `messages.upsert` webhook body.
pub fn message_event(address: &str, message_id: &str, text: &str, from_me: bool) -> Value {
    json!({
        "event": "messages.upsert",
        "instance": DEFAULT_INSTANCE,
        "data": {
            "key": {"remoteJid": address, "fromMe": from_me, "id": message_id},
            "pushName": "Test Customer",
            "message": {"conversation": text},
            "messageTimestamp": Utc::now().timestamp()
        }
    })
}

/// A `typebot.change.status` webhook body.
pub fn bot_status_event(address: &str, status: BotStatus, department: Option<&str>) -> Value {
    let variables = match department {
        Some(dept) => json!([{"name": "department", "value": dept}]),
        None => json!([]),
    };
    json!({
        "event": "typebot.change.status",
        "instance": DEFAULT_INSTANCE,
        "data": {"remoteJid": address, "status": status.to_string(), "variables": variables}
    })
}

/// A time comfortably past every default reaper cutoff.
pub fn far_future() -> DateTime<Utc> {
    Utc::now() + chrono::TimeDelta::hours(2)
}
