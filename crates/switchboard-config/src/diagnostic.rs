// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns figment errors into miette diagnostics.
//!
//! Unknown keys are the common operator mistake (`intervl_secs`,
//! `operator_tokn`), so they get a source span pointing at the offending
//! line and a Jaro-Winkler "did you mean" against the keys of the same
//! section.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{}`", qualified(section.as_deref(), key))]
    #[diagnostic(
        code(switchboard::config::unknown_key),
        help("{}", unknown_key_help(section.as_deref(), suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Table the key appeared in, e.g. `reaper`. `None` at the top level.
        section: Option<String>,
        suggestion: Option<String>,
        valid_keys: Vec<String>,
        #[label("not a known key")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for `{key}`: {detail}")]
    #[diagnostic(code(switchboard::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(switchboard::config::missing_key),
        help("set `{key}` in switchboard.toml or through its SWITCHBOARD_* variable")
    )]
    MissingKey { key: String },

    /// A value that parsed but makes no sense (port 0, blank token, ...).
    #[error("validation error: {message}")]
    #[diagnostic(code(switchboard::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(switchboard::config::other))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn qualified(section: Option<&str>, key: &str) -> String {
    match section {
        Some(section) => format!("{section}.{key}"),
        None => key.to_string(),
    }
}

fn unknown_key_help(section: Option<&str>, suggestion: Option<&str>, valid: &[String]) -> String {
    let table = section.map_or_else(|| "the top level".to_string(), |s| format!("[{s}]"));
    let listing = valid.join(", ");
    match suggestion {
        Some(s) => format!("did you mean `{s}`? {table} accepts: {listing}"),
        None => format!("{table} accepts: {listing}"),
    }
}

/// Converts every error carried by a `figment::Error` into a diagnostic.
///
/// `toml_sources` holds `(path, content)` pairs of the files that were
/// merged, used to attach spans to unknown keys.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let path: Vec<String> = error.path.iter().map(ToString::to_string).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let (span, src) = locate(&error, &path, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        section: (!path.is_empty()).then(|| path.join(".")),
                        suggestion: suggest_key(field, expected),
                        valid_keys: expected.iter().map(|k| k.to_string()).collect(),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: qualified(
                        (!path.is_empty()).then(|| path.join(".")).as_deref(),
                        field,
                    ),
                },
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: path.join("."),
                    detail: format!("found {actual}"),
                    expected: expected.to_string(),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// Resolves the TOML file an error came from and the span of `field` in it.
fn locate(
    error: &figment::error::Error,
    section: &[String],
    field: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let reported = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    // Inline strings have no path; a single candidate is unambiguous.
    let source = match reported {
        Some(path) => toml_sources.iter().find(|(p, _)| *p == path),
        None => None,
    }
    .or(match toml_sources {
        [only] => Some(only),
        _ => None,
    });

    let Some((path, content)) = source else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(path, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` inside the table named by `section`.
///
/// Lines are scanned while tracking the current `[table]` or
/// `[[array.of.tables]]` header; the key matches only under the header
/// whose dotted name equals `section` (top level when `section` is empty).
pub fn find_key_offset(content: &str, section: &[String], field: &str) -> Option<usize> {
    let wanted = section.join(".");
    let mut current = String::new();
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if let Some(header) = trimmed.strip_prefix('[') {
            current = header
                .trim_start_matches('[')
                .split(']')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
        } else if current == wanted {
            if let Some(rest) = trimmed.strip_prefix(field) {
                if rest.starts_with([' ', '\t', '=']) {
                    return Some(offset + (line.len() - trimmed.len()));
                }
            }
        }
        offset += line.len();
    }
    None
}

/// The most similar valid key, if any clears the similarity threshold.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Prints each diagnostic to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        match handler.render_report(&mut buf, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{buf}"),
            Err(_) => eprintln!("Error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("switchboard: {} configuration errors", errors.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_reaper_key() {
        let valid = &["enabled", "interval_secs", "waiting_timeout_secs"];
        assert_eq!(
            suggest_key("intervl_secs", valid),
            Some("interval_secs".to_string())
        );
    }

    #[test]
    fn no_suggestion_for_distant_typo() {
        let valid = &["log_level", "bind_address", "port"];
        assert_eq!(suggest_key("zzzzzz", valid), None);
    }

    #[test]
    fn key_offset_respects_the_section() {
        let content = "[server]\nport = 1\n\n[reaper]\nport = 5\n";
        let path = vec!["reaper".to_string()];
        let o = find_key_offset(content, &path, "port").unwrap();
        assert_eq!(o, content.rfind("port").unwrap());
    }

    #[test]
    fn key_offset_inside_array_of_tables() {
        let content = "[evolution]\nbase_url = \"http://x\"\n\n[[evolution.instances]]\nnmae = \"main\"\n";
        let path = vec!["evolution".to_string(), "instances".to_string()];
        let o = find_key_offset(content, &path, "nmae").unwrap();
        assert_eq!(&content[o..o + 4], "nmae");
    }

    #[test]
    fn key_offset_handles_crlf() {
        let content = "[server]\r\nlog_levl = \"x\"\r\n";
        let path = vec!["server".to_string()];
        let o = find_key_offset(content, &path, "log_levl").unwrap();
        assert_eq!(&content[o..o + 8], "log_levl");
    }

    #[test]
    fn help_names_the_table() {
        let help = unknown_key_help(Some("reaper"), Some("interval_secs"), &["enabled".into()]);
        assert!(help.starts_with("did you mean `interval_secs`? [reaper] accepts"));
        assert!(unknown_key_help(None, None, &[]).contains("top level"));
    }
}
