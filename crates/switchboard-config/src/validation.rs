// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Collects every violation instead of failing on the first.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let level = config.server.log_level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "server.log_level `{}` must be one of {}",
            config.server.log_level,
            LOG_LEVELS.join(", ")
        )));
    }

    let addr = config.server.bind_address.trim();
    if addr.is_empty() {
        errors.push(ConfigError::validation(
            "server.bind_address must not be empty",
        ));
    } else {
        let is_valid_ip = addr.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = addr
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::validation(format!(
                "server.bind_address `{addr}` is not a valid IP address or hostname"
            )));
        }
    }

    if config.server.port == 0 {
        errors.push(ConfigError::validation("server.port must not be 0"));
    }

    for (key, token) in [
        ("server.webhook_token", &config.server.webhook_token),
        ("server.operator_token", &config.server.operator_token),
    ] {
        if token.as_deref().is_some_and(|t| t.trim().is_empty()) {
            errors.push(ConfigError::validation(format!(
                "{key} must not be blank when set"
            )));
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    let base_url = config.evolution.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        errors.push(ConfigError::validation(format!(
            "evolution.base_url `{base_url}` must start with http:// or https://"
        )));
    }

    if config.evolution.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "evolution.timeout_secs must be at least 1",
        ));
    }

    let mut seen_instances = HashSet::new();
    for (i, instance) in config.evolution.instances.iter().enumerate() {
        if instance.name.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "evolution.instances[{i}].name must not be empty"
            )));
        } else if !seen_instances.insert(instance.name.as_str()) {
            errors.push(ConfigError::validation(format!(
                "duplicate instance name `{}` in evolution.instances",
                instance.name
            )));
        }
        if instance.bot_id.trim().is_empty() {
            errors.push(ConfigError::validation(format!(
                "evolution.instances[{i}].bot_id must not be empty"
            )));
        }
    }

    let reaper = &config.reaper;
    for (key, value) in [
        ("reaper.interval_secs", reaper.interval_secs),
        ("reaper.bot_no_session_cutoff_secs", reaper.bot_no_session_cutoff_secs),
        ("reaper.bot_idle_cutoff_secs", reaper.bot_idle_cutoff_secs),
        ("reaper.waiting_timeout_secs", reaper.waiting_timeout_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{key} must be at least 1"
            )));
        }
    }

    if config
        .routing
        .default_department
        .as_deref()
        .is_some_and(|d| d.trim().is_empty())
    {
        errors.push(ConfigError::validation(
            "routing.default_department must not be blank when set",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InstanceConfig;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&SwitchboardConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_violation() {
        let mut config = SwitchboardConfig::default();
        config.server.port = 0;
        config.reaper.interval_secs = 0;
        config.evolution.base_url = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn rejects_duplicate_instances() {
        let mut config = SwitchboardConfig::default();
        let instance = InstanceConfig {
            name: "main".into(),
            bot_id: "bot-1".into(),
        };
        config.evolution.instances = vec![instance.clone(), instance];
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("duplicate instance name `main`"));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = SwitchboardConfig::default();
        config.server.log_level = "verbose".into();
        assert!(validate_config(&config).is_err());
    }
}
