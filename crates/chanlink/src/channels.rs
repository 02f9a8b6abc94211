// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chanlink channels`: create and list channels.
//!
//! Talks to a running gateway when `--remote` is given, otherwise to the
//! configured registry directly.

use chanlink_config::ChanlinkConfig;
use chanlink_core::{Channel, ChannelKind, ChanlinkError};
use chanlink_gateway::RemoteTransport;

use crate::serve::build_hub;

pub async fn create(
    config: &ChanlinkConfig,
    remote: Option<&str>,
    name: &str,
    kind: ChannelKind,
) -> Result<Channel, ChanlinkError> {
    match remote {
        Some(url) => RemoteTransport::new(url)?.create_channel(name, kind).await,
        None => {
            let hub = build_hub(config).await?;
            let id = hub.create_channel(name, kind).await?;
            hub.open_channel(&id).await
        }
    }
}

pub async fn list(
    config: &ChanlinkConfig,
    remote: Option<&str>,
) -> Result<Vec<Channel>, ChanlinkError> {
    match remote {
        Some(url) => RemoteTransport::new(url)?.list_channels().await,
        None => build_hub(config).await?.list_channels().await,
    }
}

/// One line per channel: id, kind, name, member count.
pub fn format_channel(channel: &Channel) -> String {
    format!(
        "{}\t{}\t{}\t{} members",
        channel.id,
        channel.kind,
        channel.name,
        channel.members.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_format() {
        let config = ChanlinkConfig::default();
        let channel = create(&config, None, "ops", ChannelKind::Topic).await.unwrap();
        let line = format_channel(&channel);
        assert!(line.starts_with(channel.id.as_str()));
        assert!(line.contains("\ttopic\tops\t0 members"));
    }

    #[tokio::test]
    async fn invalid_name_is_rejected() {
        let config = ChanlinkConfig::default();
        let err = create(&config, None, "<b>", ChannelKind::General)
            .await
            .unwrap_err();
        assert!(matches!(err, ChanlinkError::InvalidInput { .. }));
    }
}
