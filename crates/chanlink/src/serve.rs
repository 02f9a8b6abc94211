// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chanlink serve`: run the gateway over the configured registry.

use std::sync::Arc;

use chanlink_config::ChanlinkConfig;
use chanlink_core::{ChanlinkError, HealthStatus, Registry};
use chanlink_gateway::{GatewayState, ServerConfig, start_server};
use chanlink_security::Validator;
use chanlink_storage::open_registry;
use chanlink_sync::{ChannelHub, SyncOptions};
use tracing::{info, warn};

use crate::shutdown;

/// Open the registry and build the hub described by `config`.
pub async fn build_hub(config: &ChanlinkConfig) -> Result<Arc<ChannelHub>, ChanlinkError> {
    let registry = open_registry(&config.storage).await?;
    match registry.health_check().await? {
        HealthStatus::Healthy => {}
        HealthStatus::Degraded(msg) => warn!(detail = %msg, "registry degraded at startup"),
        HealthStatus::Unhealthy(msg) => {
            return Err(ChanlinkError::Internal(format!("registry unhealthy: {msg}")));
        }
    }
    let validator = Validator::from_config(config)?;
    let hub = ChannelHub::new(registry, validator)
        .with_sync_options(SyncOptions::from_config(&config.delivery));
    Ok(Arc::new(hub))
}

pub async fn run_serve(config: ChanlinkConfig) -> Result<(), ChanlinkError> {
    init_tracing(&config.log_level);
    info!("starting chanlink serve");

    let hub = build_hub(&config).await?;
    let state = GatewayState::new(hub).with_idle_timeout(config.session_idle_timeout());
    let server_config = ServerConfig::from(&config.gateway);
    let cancel = shutdown::install_signal_handler();

    info!(
        host = %server_config.host,
        port = server_config.port,
        poll_interval_ms = config.delivery.poll_interval_ms,
        idle_session_polls = config.gateway.idle_session_polls,
        "gateway starting"
    );
    start_server(&server_config, state, async move {
        cancel.cancelled().await;
    })
    .await?;

    info!("chanlink serve stopped");
    Ok(())
}

/// Initialize the tracing subscriber. `RUST_LOG` takes precedence.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chanlink={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::ChannelKind;

    #[tokio::test]
    async fn hub_from_default_config_uses_memory_registry() {
        let hub = build_hub(&ChanlinkConfig::default()).await.unwrap();
        let id = hub.create_channel("general", ChannelKind::General).await.unwrap();
        let channels = hub.list_channels().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].id, id);
    }

    #[tokio::test]
    async fn bad_blocked_pattern_is_config_error() {
        let mut config = ChanlinkConfig::default();
        config.security.blocked_patterns = vec!["(unclosed".into()];
        let err = build_hub(&config).await.err().unwrap();
        assert!(matches!(err, ChanlinkError::Config(_)));
    }
}
