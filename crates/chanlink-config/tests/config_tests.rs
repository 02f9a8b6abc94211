// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for chanlink configuration loading.

use std::io::Write;

use chanlink_config::diagnostic::ConfigError;
use chanlink_config::model::{ChanlinkConfig, StorageBackend};
use chanlink_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
log_level = "debug"

[delivery]
max_payload_length = 500
poll_interval_ms = 1000
push_retry_count = 3
backoff_base_ms = 250
backoff_max_ms = 2000
sync_failure_threshold = 2
push_reprobe_interval_ms = 60000
backlog_limit = 100

[security]
max_name_length = 32
allowed_participants = ["agent-1", "agent_2"]

[storage]
backend = "sqlite"
database_path = "/tmp/chanlink-test.db"

[gateway]
host = "0.0.0.0"
port = 9000
"#;

    let config = load_and_validate_str(toml).expect("valid TOML");
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.delivery.max_payload_length, 500);
    assert_eq!(config.delivery.push_retry_count, 3);
    assert_eq!(config.delivery.backlog_limit(), Some(100));
    assert_eq!(config.security.allowed_participants, vec!["agent-1", "agent_2"]);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert_eq!(config.gateway.port, 9000);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("defaults");
    assert_eq!(config.log_level, "info");
    assert_eq!(config.delivery.max_payload_length, 1000);
    assert_eq!(config.delivery.poll_interval_ms, 2100);
    assert_eq!(config.delivery.push_retry_count, 5);
    assert_eq!(config.delivery.backoff_base_ms, 1000);
    assert!(config.security.allowed_participants.is_empty());
    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.gateway.host, "127.0.0.1");
}

#[test]
fn unknown_delivery_key_suggests_correction() {
    let toml = "[delivery]\npoll_intervl_ms = 10\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "poll_intervl_ms");
            assert_eq!(suggestion.as_deref(), Some("poll_interval_ms"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[gateway]\nport = \"eighty\"\n").unwrap_err();
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key == "gateway.port"),
        "got {errors:?}"
    );
}

#[test]
fn semantic_errors_surface_through_load_and_validate() {
    let toml = "[delivery]\npoll_interval_ms = 0\nbackoff_base_ms = 0\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .all(|e| matches!(e, ConfigError::Validation { .. })));
}

/// Env overrides are merged as dotted keys; simulated here with a tuple provider.
#[test]
fn env_style_override_wins_over_file() {
    use figment::{
        Figment,
        providers::{Format, Serialized, Toml},
    };

    let config: ChanlinkConfig = Figment::new()
        .merge(Serialized::defaults(ChanlinkConfig::default()))
        .merge(Toml::string("[delivery]\npoll_interval_ms = 5000\n"))
        .merge(("delivery.poll_interval_ms", 250))
        .extract()
        .expect("merge");

    assert_eq!(config.delivery.poll_interval_ms, 250);
}

#[test]
fn unknown_key_in_file_is_reported_with_suggestion() {
    let mut file = tempfile::NamedTempFile::new().expect("tempfile");
    write!(file, "[gateway]\nhots = \"0.0.0.0\"\n").expect("write");

    let errors = load_and_validate_path(file.path()).unwrap_err();
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "hots");
            assert_eq!(suggestion.as_deref(), Some("host"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}
