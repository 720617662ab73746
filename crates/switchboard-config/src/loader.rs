// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading.
//!
//! Compiled defaults sit at the bottom. `/etc`, the user config dir and the
//! working directory are merged on top in that order, and `SWITCHBOARD_*`
//! variables win over every file.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::SwitchboardConfig;

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/switchboard/switchboard.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "switchboard.toml";
pub(crate) const USER_CONFIG_SUFFIX: &str = "switchboard/switchboard.toml";

const ENV_PREFIX: &str = "SWITCHBOARD_";

/// Top-level tables that environment variables can address.
const ENV_SECTIONS: &[&str] = &["server", "storage", "evolution", "reaper", "routing"];

/// Figment seeded with compiled defaults.
fn defaults() -> Figment {
    Figment::from(Serialized::defaults(SwitchboardConfig::default()))
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_CONFIG_SUFFIX))
}

/// Loads the full hierarchy: defaults, `/etc`, user dir, `./switchboard.toml`, env.
pub fn load_config() -> Result<SwitchboardConfig, figment::Error> {
    build_figment().extract()
}

/// Loads from a TOML string over the defaults. Files and env are ignored.
pub fn load_config_from_str(toml_content: &str) -> Result<SwitchboardConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

/// Loads one explicit file (`--config`) plus env overrides.
pub fn load_config_from_path(path: &Path) -> Result<SwitchboardConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The unextracted hierarchy, so diagnostics can inspect where values came from.
pub fn build_figment() -> Figment {
    let mut figment = defaults().merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Maps a prefix-stripped, lowercased variable name onto a dotted key.
///
/// Only the leading section name becomes a table, so
/// `reaper_waiting_timeout_secs` is `reaper.waiting_timeout_secs`. Names that
/// start with no known section pass through and fail `deny_unknown_fields`.
fn env_key(name: &str) -> String {
    ENV_SECTIONS
        .iter()
        .find_map(|section| {
            name.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or_else(|| name.to_string())
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).map(|key| env_key(key.as_str()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_split_only_at_the_section() {
        assert_eq!(
            env_key("reaper_waiting_timeout_secs"),
            "reaper.waiting_timeout_secs"
        );
        assert_eq!(env_key("server_operator_token"), "server.operator_token");
        assert_eq!(
            env_key("routing_default_department"),
            "routing.default_department"
        );
    }

    #[test]
    fn unknown_env_sections_pass_through() {
        assert_eq!(env_key("queue_size"), "queue_size");
        assert_eq!(env_key("serverless"), "serverless");
    }
}
