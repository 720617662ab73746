// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard routing engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Every section is optional and defaults to values suitable for a local
/// single-instance deployment.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// HTTP/WebSocket listener and shared secrets.
    #[serde(default)]
    pub server: ServerConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chat-gateway (Evolution API) client settings.
    #[serde(default)]
    pub evolution: EvolutionConfig,

    /// Inactivity reaper cadence and cutoffs.
    #[serde(default)]
    pub reaper: ReaperConfig,

    /// Routing defaults and customer-facing message templates.
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Address to bind the server to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Shared secret the chat gateway must present on webhook intake.
    /// When unset, webhooks are accepted without a token.
    #[serde(default)]
    pub webhook_token: Option<String>,

    /// Bearer token for operator endpoints. When unset, operator endpoints
    /// reject every request.
    #[serde(default)]
    pub operator_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bind_address: default_bind_address(),
            port: default_port(),
            webhook_token: None,
            operator_token: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3100
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("switchboard.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("switchboard.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// A gateway instance and the bot whose sessions the reaper sweeps.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    pub name: String,
    pub bot_id: String,
}

/// Chat-gateway client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvolutionConfig {
    /// Base URL of the gateway HTTP API.
    #[serde(default = "default_evolution_base_url")]
    pub base_url: String,

    /// API key sent in the `apikey` header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_evolution_timeout_secs")]
    pub timeout_secs: u64,

    /// Instances swept for idle upstream bot sessions.
    #[serde(default)]
    pub instances: Vec<InstanceConfig>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            base_url: default_evolution_base_url(),
            api_key: None,
            timeout_secs: default_evolution_timeout_secs(),
            instances: Vec::new(),
        }
    }
}

fn default_evolution_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_evolution_timeout_secs() -> u64 {
    15
}

/// Inactivity reaper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReaperConfig {
    #[serde(default = "default_reaper_enabled")]
    pub enabled: bool,

    /// Seconds between sweeps.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Age after which a `bot` session with no upstream bot session is cancelled.
    #[serde(default = "default_bot_cutoff_secs")]
    pub bot_no_session_cutoff_secs: u64,

    /// Idle time after which an opened upstream bot session is closed.
    #[serde(default = "default_bot_cutoff_secs")]
    pub bot_idle_cutoff_secs: u64,

    /// Age after which a `waiting` session is cancelled.
    #[serde(default = "default_waiting_timeout_secs")]
    pub waiting_timeout_secs: u64,
}

impl ReaperConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn bot_no_session_cutoff(&self) -> Duration {
        Duration::from_secs(self.bot_no_session_cutoff_secs)
    }

    pub fn bot_idle_cutoff(&self) -> Duration {
        Duration::from_secs(self.bot_idle_cutoff_secs)
    }

    pub fn waiting_timeout(&self) -> Duration {
        Duration::from_secs(self.waiting_timeout_secs)
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_reaper_enabled(),
            interval_secs: default_interval_secs(),
            bot_no_session_cutoff_secs: default_bot_cutoff_secs(),
            bot_idle_cutoff_secs: default_bot_cutoff_secs(),
            waiting_timeout_secs: default_waiting_timeout_secs(),
        }
    }
}

fn default_reaper_enabled() -> bool {
    true
}

fn default_interval_secs() -> u64 {
    60
}

fn default_bot_cutoff_secs() -> u64 {
    300
}

fn default_waiting_timeout_secs() -> u64 {
    1200
}

/// Routing defaults and customer-facing templates.
///
/// Templates may contain `{operator}` and `{department}` placeholders.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RoutingConfig {
    /// Department used when a session reaches `waiting` without one.
    #[serde(default)]
    pub default_department: Option<String>,

    #[serde(default = "default_inactivity_notice")]
    pub inactivity_notice: String,

    #[serde(default = "default_waiting_timeout_notice")]
    pub waiting_timeout_notice: String,

    #[serde(default = "default_wait_notice")]
    pub wait_notice: String,

    #[serde(default = "default_operator_menu_header")]
    pub operator_menu_header: String,

    #[serde(default = "default_transfer_notice")]
    pub transfer_notice: String,

    #[serde(default = "default_assigned_notice")]
    pub assigned_notice: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_department: None,
            inactivity_notice: default_inactivity_notice(),
            waiting_timeout_notice: default_waiting_timeout_notice(),
            wait_notice: default_wait_notice(),
            operator_menu_header: default_operator_menu_header(),
            transfer_notice: default_transfer_notice(),
            assigned_notice: default_assigned_notice(),
        }
    }
}

fn default_inactivity_notice() -> String {
    "Your conversation was closed due to inactivity. Send a new message any time to start again."
        .to_string()
}

fn default_waiting_timeout_notice() -> String {
    "Sorry, no operator was available in time. Send a new message any time to try again."
        .to_string()
}

fn default_wait_notice() -> String {
    "{operator} is not available right now. Please wait, you will be attended shortly."
        .to_string()
}

fn default_operator_menu_header() -> String {
    "Choose an operator from {department} by replying with a number:".to_string()
}

fn default_transfer_notice() -> String {
    "You are being transferred to {operator}.".to_string()
}

fn default_assigned_notice() -> String {
    "{operator} will attend you shortly.".to_string()
}
