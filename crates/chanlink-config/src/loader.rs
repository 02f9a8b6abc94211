// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./chanlink.toml` > `~/.config/chanlink/chanlink.toml` > `/etc/chanlink/chanlink.toml`
//! with environment variable overrides via `CHANLINK_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChanlinkConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chanlink/chanlink.toml` (system-wide)
/// 3. `~/.config/chanlink/chanlink.toml` (user XDG config)
/// 4. `./chanlink.toml` (local directory)
/// 5. `CHANLINK_*` environment variables
pub fn load_config() -> Result<ChanlinkConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<ChanlinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChanlinkConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChanlinkConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChanlinkConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading.
///
/// Returns the Figment before extraction so callers can inspect metadata.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChanlinkConfig::default()))
        .merge(Toml::file("/etc/chanlink/chanlink.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chanlink/chanlink.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chanlink.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")`: `CHANLINK_DELIVERY_POLL_INTERVAL_MS`
/// must map to `delivery.poll_interval_ms`, not `delivery.poll.interval.ms`.
fn env_provider() -> Env {
    Env::prefixed("CHANLINK_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env var name to its dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    const SECTIONS: [&str; 4] = ["delivery", "security", "storage", "gateway"];
    for section in SECTIONS {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
