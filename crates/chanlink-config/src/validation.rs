// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the semantic constraints serde cannot express: positive intervals,
//! ordered backoff bounds, well-formed allow-list entries.

use crate::diagnostic::ConfigError;
use crate::model::{ChanlinkConfig, StorageBackend};

/// Validate a deserialized configuration.
///
/// Collects every violation instead of stopping at the first one.
pub fn validate_config(config: &ChanlinkConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let d = &config.delivery;

    if d.max_payload_length == 0 {
        errors.push(ConfigError::invalid(
            "delivery.max_payload_length",
            "must be at least 1",
        ));
    }
    if d.poll_interval_ms == 0 {
        errors.push(ConfigError::invalid(
            "delivery.poll_interval_ms",
            "must be greater than 0",
        ));
    }
    if d.push_retry_count == 0 {
        errors.push(ConfigError::invalid(
            "delivery.push_retry_count",
            "must be at least 1",
        ));
    }
    if d.backoff_base_ms == 0 {
        errors.push(ConfigError::invalid(
            "delivery.backoff_base_ms",
            "must be greater than 0",
        ));
    }
    if d.backoff_max_ms < d.backoff_base_ms {
        errors.push(ConfigError::invalid(
            "delivery.backoff_max_ms",
            format!(
                "must be at least backoff_base_ms ({}), got {}",
                d.backoff_base_ms, d.backoff_max_ms
            ),
        ));
    }
    if d.sync_failure_threshold == 0 {
        errors.push(ConfigError::invalid(
            "delivery.sync_failure_threshold",
            "must be at least 1",
        ));
    }

    let s = &config.security;
    if s.max_name_length == 0 {
        errors.push(ConfigError::invalid(
            "security.max_name_length",
            "must be at least 1",
        ));
    }
    for (i, entry) in s.allowed_participants.iter().enumerate() {
        if !is_identifier(entry) {
            errors.push(ConfigError::invalid(
                format!("security.allowed_participants[{i}]"),
                format!("`{entry}` may only contain letters, digits, space, `-` and `_`"),
            ));
        } else if entry.chars().count() > s.max_name_length {
            errors.push(ConfigError::invalid(
                format!("security.allowed_participants[{i}]"),
                format!("is longer than max_name_length ({})", s.max_name_length),
            ));
        }
    }

    for (i, pattern) in s.blocked_patterns.iter().enumerate() {
        if pattern.trim().is_empty() {
            errors.push(ConfigError::invalid(
                format!("security.blocked_patterns[{i}]"),
                "must not be empty",
            ));
        }
    }

    if config.gateway.host.trim().is_empty() {
        errors.push(ConfigError::invalid("gateway.host", "must not be empty"));
    }

    if config.storage.backend == StorageBackend::Sqlite
        && config.storage.database_path.trim().is_empty()
    {
        errors.push(ConfigError::invalid(
            "storage.database_path",
            "must not be empty when backend is sqlite",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(count = errors.len(), "configuration failed validation");
        Err(errors)
    }
}

fn is_identifier(s: &str) -> bool {
    !s.trim().is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(errors: &[ConfigError]) -> Vec<String> {
        errors
            .iter()
            .filter_map(|e| match e {
                ConfigError::Validation { field, .. } => Some(field.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ChanlinkConfig::default()).is_ok());
    }

    #[test]
    fn zero_interval_and_retry_count_are_both_reported() {
        let mut config = ChanlinkConfig::default();
        config.delivery.poll_interval_ms = 0;
        config.delivery.push_retry_count = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            fields(&errors),
            vec!["delivery.poll_interval_ms", "delivery.push_retry_count"]
        );
    }

    #[test]
    fn backoff_max_below_base_fails() {
        let mut config = ChanlinkConfig::default();
        config.delivery.backoff_base_ms = 5000;
        config.delivery.backoff_max_ms = 1000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["delivery.backoff_max_ms"]);
    }

    #[test]
    fn malformed_allow_list_entry_fails() {
        let mut config = ChanlinkConfig::default();
        config.security.allowed_participants =
            vec!["agent-1".into(), "<script>".into(), "ok name".into()];
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["security.allowed_participants[1]"]);
    }

    #[test]
    fn empty_sqlite_path_fails_only_for_sqlite_backend() {
        let mut config = ChanlinkConfig::default();
        config.storage.database_path = " ".into();
        assert!(validate_config(&config).is_ok());

        config.storage.backend = StorageBackend::Sqlite;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(fields(&errors), vec!["storage.database_path"]);
    }

    #[test]
    fn empty_host_fails() {
        let mut config = ChanlinkConfig::default();
        config.gateway.host = String::new();
        assert!(validate_config(&config).is_err());
    }
}
