// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the chanlink delivery system.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level chanlink configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChanlinkConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Delivery, polling and reconnection settings.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Input validation settings.
    #[serde(default)]
    pub security: SecurityConfig,

    /// Registry backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP/WebSocket gateway settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for ChanlinkConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            delivery: DeliveryConfig::default(),
            security: SecurityConfig::default(),
            storage: StorageConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Delivery, polling and reconnection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Maximum payload length in characters.
    #[serde(default = "default_max_payload_length")]
    pub max_payload_length: usize,

    /// Pull transport cadence in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Consecutive failed push connects before failing over to pull.
    #[serde(default = "default_push_retry_count")]
    pub push_retry_count: u32,

    /// Backoff base delay in milliseconds; the k-th retry waits base * k.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound for a single backoff delay in milliseconds.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Consecutive failed sync calls before a degraded event is emitted.
    #[serde(default = "default_sync_failure_threshold")]
    pub sync_failure_threshold: u32,

    /// How often pull mode re-attempts push, in milliseconds. 0 disables re-probing.
    #[serde(default)]
    pub push_reprobe_interval_ms: u64,

    /// Cap on the backlog returned to a client starting from watermark 0. 0 = unlimited.
    #[serde(default)]
    pub backlog_limit: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_payload_length: default_max_payload_length(),
            poll_interval_ms: default_poll_interval_ms(),
            push_retry_count: default_push_retry_count(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            sync_failure_threshold: default_sync_failure_threshold(),
            push_reprobe_interval_ms: 0,
            backlog_limit: 0,
        }
    }
}

impl DeliveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn push_reprobe_interval(&self) -> Option<Duration> {
        (self.push_reprobe_interval_ms > 0)
            .then(|| Duration::from_millis(self.push_reprobe_interval_ms))
    }

    pub fn backlog_limit(&self) -> Option<usize> {
        (self.backlog_limit > 0).then_some(self.backlog_limit)
    }
}

fn default_max_payload_length() -> usize {
    1000
}

fn default_poll_interval_ms() -> u64 {
    2100
}

fn default_push_retry_count() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_sync_failure_threshold() -> u32 {
    3
}

/// Input validation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Maximum length of channel names and participant identifiers.
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,

    /// Participants allowed to join channels. Empty means unrestricted.
    #[serde(default)]
    pub allowed_participants: Vec<String>,

    /// Extra case-insensitive regexes rejected in payloads, on top of the built-in blocklist.
    #[serde(default)]
    pub blocked_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_name_length: default_max_name_length(),
            allowed_participants: Vec::new(),
            blocked_patterns: Vec::new(),
        }
    }
}

fn default_max_name_length() -> usize {
    64
}

/// Which registry backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// In-process registry; history is lost on restart.
    #[default]
    Memory,
    /// SQLite file registry.
    Sqlite,
}

/// Registry backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Backend selection.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Path to the SQLite database file (sqlite backend only).
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("chanlink").join("chanlink.db"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "chanlink.db".to_string())
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_gateway_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Remote sessions with no request and no open WebSocket for this many
    /// poll intervals are dropped. 0 keeps them until detach.
    #[serde(default = "default_idle_session_polls")]
    pub idle_session_polls: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
            idle_session_polls: default_idle_session_polls(),
        }
    }
}

impl ChanlinkConfig {
    /// How long a remote session may stay silent before the gateway drops it.
    pub fn session_idle_timeout(&self) -> Option<Duration> {
        (self.gateway.idle_session_polls > 0)
            .then(|| self.delivery.poll_interval() * self.gateway.idle_session_polls)
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    8710
}

fn default_idle_session_polls() -> u32 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_defaults_match_documented_values() {
        let d = DeliveryConfig::default();
        assert_eq!(d.max_payload_length, 1000);
        assert_eq!(d.poll_interval(), Duration::from_millis(2100));
        assert_eq!(d.push_retry_count, 5);
        assert_eq!(d.backoff_base(), Duration::from_secs(1));
        assert_eq!(d.sync_failure_threshold, 3);
        assert!(d.push_reprobe_interval().is_none());
        assert!(d.backlog_limit().is_none());
    }

    #[test]
    fn zero_means_disabled_for_optional_policies() {
        let d = DeliveryConfig {
            push_reprobe_interval_ms: 60_000,
            backlog_limit: 50,
            ..Default::default()
        };
        assert_eq!(d.push_reprobe_interval(), Some(Duration::from_secs(60)));
        assert_eq!(d.backlog_limit(), Some(50));
    }

    #[test]
    fn session_idle_timeout_scales_with_poll_interval() {
        let mut config = ChanlinkConfig::default();
        assert_eq!(config.session_idle_timeout(), Some(Duration::from_millis(63_000)));
        config.delivery.poll_interval_ms = 1000;
        config.gateway.idle_session_polls = 5;
        assert_eq!(config.session_idle_timeout(), Some(Duration::from_secs(5)));
        config.gateway.idle_session_polls = 0;
        assert_eq!(config.session_idle_timeout(), None);
    }

    #[test]
    fn storage_backend_parses_snake_case() {
        let cfg: StorageConfig = toml::from_str("backend = \"sqlite\"").unwrap();
        assert_eq!(cfg.backend, StorageBackend::Sqlite);
    }
}
