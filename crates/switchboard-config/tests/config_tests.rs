// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Switchboard configuration system.

use std::io::Write;

use serial_test::serial;
use switchboard_config::diagnostic::ConfigError;
use switchboard_config::model::SwitchboardConfig;
use switchboard_config::{
    load_and_validate_path, load_and_validate_str, load_config_from_path, load_config_from_str,
};

/// Valid TOML with every section deserializes.
#[test]
fn valid_toml_deserializes_into_switchboard_config() {
    let toml = r#"
[server]
log_level = "debug"
bind_address = "0.0.0.0"
port = 8088
webhook_token = "hook-secret"
operator_token = "op-secret"

[storage]
database_path = "/tmp/switchboard-test.db"
wal_mode = false

[evolution]
base_url = "https://evo.example.com"
api_key = "evo-key"
timeout_secs = 5

[[evolution.instances]]
name = "main"
bot_id = "bot-123"

[reaper]
interval_secs = 30
waiting_timeout_secs = 600

[routing]
default_department = "support"
wait_notice = "Hold on, {operator} is busy."
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.server.log_level, "debug");
    assert_eq!(config.server.port, 8088);
    assert_eq!(config.server.webhook_token.as_deref(), Some("hook-secret"));
    assert_eq!(config.storage.database_path, "/tmp/switchboard-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.evolution.api_key.as_deref(), Some("evo-key"));
    assert_eq!(config.evolution.instances.len(), 1);
    assert_eq!(config.evolution.instances[0].bot_id, "bot-123");
    assert_eq!(config.reaper.interval_secs, 30);
    assert_eq!(config.reaper.waiting_timeout_secs, 600);
    // Unset keys keep their defaults.
    assert_eq!(config.reaper.bot_no_session_cutoff_secs, 300);
    assert_eq!(config.routing.default_department.as_deref(), Some("support"));
    assert_eq!(config.routing.wait_notice, "Hold on, {operator} is busy.");
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_config_from_str("").expect("empty config should load");
    let defaults = SwitchboardConfig::default();
    assert_eq!(config.server.port, defaults.server.port);
    assert_eq!(config.reaper.interval_secs, 60);
    assert_eq!(config.reaper.bot_idle_cutoff_secs, 300);
    assert_eq!(config.reaper.waiting_timeout_secs, 1200);
    assert!(config.reaper.enabled);
    assert!(config.evolution.instances.is_empty());
}

#[test]
fn unknown_key_gets_a_suggestion() {
    let toml = r#"
[reaper]
intervl_secs = 10
"#;

    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("expected an UnknownKey diagnostic");
    assert_eq!(unknown.0, "intervl_secs");
    assert_eq!(unknown.1.as_deref(), Some("interval_secs"));
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[queue]\nsize = 3\n").expect_err("unknown section");
    assert!(format!("{err}").contains("queue"));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[server]\nport = \"eighty\"\n").expect_err("bad type");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { .. } | ConfigError::Other(_)))
    );
}

#[test]
fn semantic_errors_surface_through_load_and_validate() {
    let toml = r#"
[reaper]
waiting_timeout_secs = 0

[[evolution.instances]]
name = ""
bot_id = "b"
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
#[serial]
fn env_overrides_file_values() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[reaper]\nwaiting_timeout_secs = 900\n").unwrap();

    // SAFETY: serialized with other env-touching tests.
    unsafe {
        std::env::set_var("SWITCHBOARD_REAPER_WAITING_TIMEOUT_SECS", "45");
        std::env::set_var("SWITCHBOARD_ROUTING_DEFAULT_DEPARTMENT", "billing");
    }
    let config = load_config_from_path(file.path());
    unsafe {
        std::env::remove_var("SWITCHBOARD_REAPER_WAITING_TIMEOUT_SECS");
        std::env::remove_var("SWITCHBOARD_ROUTING_DEFAULT_DEPARTMENT");
    }

    let config = config.expect("config should load");
    assert_eq!(config.reaper.waiting_timeout_secs, 45);
    assert_eq!(config.routing.default_department.as_deref(), Some("billing"));
}

#[test]
#[serial]
fn path_loader_reports_span_for_unknown_key() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[server]\nprot = 3000\n").unwrap();

    let errors = load_and_validate_path(file.path()).expect_err("unknown key");
    match &errors[0] {
        ConfigError::UnknownKey {
            suggestion, span, ..
        } => {
            assert_eq!(suggestion.as_deref(), Some("port"));
            assert!(span.is_some());
        }
        other => panic!("unexpected diagnostic: {other:?}"),
    }
}
