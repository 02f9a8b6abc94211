// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry wrapper with injectable read failures.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chanlink_core::{
    Channel, ChannelId, ChannelKind, ChanlinkError, HealthStatus, Message, MessageBody,
    Participant, ParticipantId, Registry, SequencePosition, StreamKind,
};

/// Delegates to an inner registry, failing message reads on demand.
///
/// Only `fetch_since` and `latest_position` are affected, so writes keep
/// working while pollers see storage errors.
pub struct FlakyRegistry {
    inner: Arc<dyn Registry>,
    failing: AtomicBool,
    failures_remaining: AtomicU32,
    reads: AtomicU32,
}

impl FlakyRegistry {
    pub fn new(inner: Arc<dyn Registry>) -> Self {
        Self {
            inner,
            failing: AtomicBool::new(false),
            failures_remaining: AtomicU32::new(0),
            reads: AtomicU32::new(0),
        }
    }

    /// Fail every read until switched back.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail the next `n` reads.
    pub fn fail_next_reads(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of message reads attempted.
    pub fn reads(&self) -> u32 {
        self.reads.load(Ordering::SeqCst)
    }

    fn check_read(&self) -> Result<(), ChanlinkError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let scripted = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted || self.failing.load(Ordering::SeqCst) {
            return Err(ChanlinkError::registry(std::io::Error::other(
                "injected registry failure",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Registry for FlakyRegistry {
    async fn create_channel(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelId, ChanlinkError> {
        self.inner.create_channel(name, kind).await
    }

    async fn channel(&self, id: &ChannelId) -> Result<Option<Channel>, ChanlinkError> {
        self.inner.channel(id).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ChanlinkError> {
        self.inner.list_channels().await
    }

    async fn retire_channel(&self, id: &ChannelId) -> Result<(), ChanlinkError> {
        self.inner.retire_channel(id).await
    }

    async fn create_or_get_participant(
        &self,
        external_key: &str,
        display_name: &str,
    ) -> Result<Participant, ChanlinkError> {
        self.inner
            .create_or_get_participant(external_key, display_name)
            .await
    }

    async fn deactivate_participant(&self, id: &ParticipantId) -> Result<(), ChanlinkError> {
        self.inner.deactivate_participant(id).await
    }

    async fn add_member(
        &self,
        participant: &ParticipantId,
        channel: &ChannelId,
    ) -> Result<(), ChanlinkError> {
        self.inner.add_member(participant, channel).await
    }

    async fn members(&self, channel: &ChannelId) -> Result<Vec<Participant>, ChanlinkError> {
        self.inner.members(channel).await
    }

    async fn append_message(
        &self,
        channel: &ChannelId,
        participant: &ParticipantId,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError> {
        self.inner.append_message(channel, participant, body).await
    }

    async fn fetch_since(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
        position: SequencePosition,
    ) -> Result<Vec<Message>, ChanlinkError> {
        self.check_read()?;
        self.inner.fetch_since(channel, kind, position).await
    }

    async fn latest_position(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
    ) -> Result<SequencePosition, ChanlinkError> {
        self.check_read()?;
        self.inner.latest_position(channel, kind).await
    }

    async fn health_check(&self) -> Result<HealthStatus, ChanlinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Ok(HealthStatus::Degraded("injected failures active".into()));
        }
        self.inner.health_check().await
    }
}
