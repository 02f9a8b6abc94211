// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for the chanlink delivery system.
//!
//! TOML files are read from the XDG hierarchy, overridden by `CHANLINK_*`
//! environment variables, checked with `deny_unknown_fields` and then
//! validated semantically. Failures render as miette diagnostics.
//!
//! # Usage
//!
//! ```no_run
//! use chanlink_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("poll every {:?}", config.delivery.poll_interval());
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    ChanlinkConfig, DeliveryConfig, GatewayConfig, SecurityConfig, StorageBackend, StorageConfig,
};

/// Load from the XDG hierarchy plus environment, then validate.
pub fn load_and_validate() -> Result<ChanlinkConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Load a single TOML file (plus environment), then validate.
pub fn load_and_validate_path(path: &Path) -> Result<ChanlinkConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources([path.to_path_buf()])
    })
}

/// Load from a TOML string, then validate. No files, no environment.
pub fn load_and_validate_str(toml_content: &str) -> Result<ChanlinkConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<ChanlinkConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<ChanlinkConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Contents of every config file that exists, for span resolution.
fn collect_toml_sources() -> Vec<(String, String)> {
    let local = std::env::current_dir()
        .map(|d| d.join("chanlink.toml"))
        .unwrap_or_else(|_| PathBuf::from("chanlink.toml"));
    let user = dirs::config_dir().map(|d| d.join("chanlink/chanlink.toml"));
    let system = PathBuf::from("/etc/chanlink/chanlink.toml");

    read_sources([Some(local), user, Some(system)].into_iter().flatten())
}

fn read_sources(paths: impl IntoIterator<Item = PathBuf>) -> Vec<(String, String)> {
    paths
        .into_iter()
        .filter_map(|p| {
            std::fs::read_to_string(&p)
                .ok()
                .map(|content| (p.display().to_string(), content))
        })
        .collect()
}
