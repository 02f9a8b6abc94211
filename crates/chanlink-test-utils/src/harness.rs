// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end delivery tests.
//!
//! `TestHarness` assembles an in-memory registry behind a [`FlakyRegistry`],
//! a [`ChannelHub`] and one channel with a poster already joined, so tests
//! can drive traffic with a single call.

use std::sync::Arc;

use chanlink_config::ChanlinkConfig;
use chanlink_core::{
    ChanlinkError, ChannelId, ChannelKind, MessageBody, Participant, SequencePosition,
    StateUpdate,
};
use chanlink_security::{AllowList, Validator};
use chanlink_storage::MemoryRegistry;
use chanlink_sync::{ChannelHub, LocalTransport, SyncOptions};

use crate::flaky_registry::FlakyRegistry;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    channel_name: String,
    poster_key: String,
    sync_options: SyncOptions,
    allowed_participants: Vec<String>,
    max_payload_length: Option<usize>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            channel_name: "general".to_string(),
            poster_key: "poster".to_string(),
            sync_options: SyncOptions::default(),
            allowed_participants: Vec::new(),
            max_payload_length: None,
        }
    }

    pub fn with_channel_name(mut self, name: &str) -> Self {
        self.channel_name = name.to_string();
        self
    }

    /// Cap the backlog returned to fresh clients.
    pub fn with_backlog_limit(mut self, limit: usize) -> Self {
        self.sync_options.backlog_limit = Some(limit);
        self
    }

    /// Restrict membership; the poster is added automatically.
    pub fn with_allowed_participants(mut self, participants: &[&str]) -> Self {
        self.allowed_participants = participants.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_max_payload_length(mut self, max: usize) -> Self {
        self.max_payload_length = Some(max);
        self
    }

    pub async fn build(self) -> Result<TestHarness, ChanlinkError> {
        let registry = Arc::new(FlakyRegistry::new(Arc::new(MemoryRegistry::new())));

        let mut validator = Validator::default();
        if let Some(max) = self.max_payload_length {
            validator = validator.with_max_payload_length(max);
        }
        if !self.allowed_participants.is_empty() {
            let mut allowed = self.allowed_participants;
            allowed.push(self.poster_key.clone());
            validator = validator.with_allow_list(AllowList::new(allowed));
        }

        let hub = Arc::new(
            ChannelHub::new(registry.clone(), validator).with_sync_options(self.sync_options),
        );
        let channel = hub
            .create_channel(&self.channel_name, ChannelKind::General)
            .await?;
        let poster = hub.join(&channel, &self.poster_key, "Poster").await?;

        Ok(TestHarness {
            hub,
            registry,
            channel,
            poster,
            config: ChanlinkConfig::default(),
        })
    }
}

/// A hub with one channel and a joined poster.
pub struct TestHarness {
    pub hub: Arc<ChannelHub>,
    pub registry: Arc<FlakyRegistry>,
    pub channel: ChannelId,
    pub poster: Participant,
    pub config: ChanlinkConfig,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Default harness: unrestricted membership, no backlog cap.
    pub async fn new() -> Result<Self, ChanlinkError> {
        Self::builder().build().await
    }

    /// In-process link, pull and push transport over this harness's hub.
    pub fn transport(&self) -> LocalTransport {
        LocalTransport::new(self.hub.clone())
    }

    /// Post a content message as the poster.
    pub async fn post(&self, text: &str) -> Result<SequencePosition, ChanlinkError> {
        self.hub
            .post(
                &self.channel,
                &self.poster.id,
                MessageBody::Content(text.to_string()),
            )
            .await
    }

    /// Post a state update as the poster.
    pub async fn post_state(&self, update: StateUpdate) -> Result<SequencePosition, ChanlinkError> {
        self.hub
            .post(&self.channel, &self.poster.id, MessageBody::State(update))
            .await
    }

    /// Post `count` numbered content messages.
    pub async fn post_many(&self, count: usize) -> Result<(), ChanlinkError> {
        for i in 1..=count {
            self.post(&format!("message {i}")).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::Watermarks;

    #[tokio::test]
    async fn harness_posts_into_its_channel() {
        let harness = TestHarness::new().await.unwrap();
        harness.post_many(3).await.unwrap();
        let batch = harness
            .hub
            .sync(&harness.channel, Watermarks::ZERO)
            .await
            .unwrap();
        assert_eq!(batch.content.len(), 3);
        assert_eq!(batch.watermarks.content, 3);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_sync_failures() {
        let harness = TestHarness::new().await.unwrap();
        harness.registry.fail_next_reads(1);
        let err = harness
            .hub
            .sync(&harness.channel, Watermarks::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, ChanlinkError::SyncFailure { .. }));
        assert!(
            harness
                .hub
                .sync(&harness.channel, Watermarks::ZERO)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn allow_list_admits_the_poster() {
        let harness = TestHarness::builder()
            .with_allowed_participants(&["agent-a"])
            .build()
            .await
            .unwrap();
        assert!(harness.post("hi").await.is_ok());
        let err = harness
            .hub
            .join(&harness.channel, "stranger", "")
            .await
            .unwrap_err();
        assert!(err.reject_reason().is_some());
    }
}
