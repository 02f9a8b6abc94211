// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry trait: channel, membership and message persistence.

use async_trait::async_trait;

use crate::error::ChanlinkError;
use crate::types::{
    Channel, ChannelId, ChannelKind, HealthStatus, Message, MessageBody, Participant,
    ParticipantId, SequencePosition, StreamKind,
};

/// The single authoritative sink for channels and their message logs.
///
/// Every call is treated as one atomic read or write. Positions are assigned
/// by the registry and are strictly increasing and gap-free per
/// (channel, stream kind), in insertion order.
#[async_trait]
pub trait Registry: Send + Sync + 'static {
    /// Creates a channel and returns its new identifier.
    async fn create_channel(&self, name: &str, kind: ChannelKind)
    -> Result<ChannelId, ChanlinkError>;

    /// Looks up a channel, retired or not.
    async fn channel(&self, id: &ChannelId) -> Result<Option<Channel>, ChanlinkError>;

    /// Lists all channels that are not retired.
    async fn list_channels(&self) -> Result<Vec<Channel>, ChanlinkError>;

    /// Soft-retires a channel. History stays readable.
    async fn retire_channel(&self, id: &ChannelId) -> Result<(), ChanlinkError>;

    /// Returns the participant registered under `external_key`, creating it on first contact.
    async fn create_or_get_participant(
        &self,
        external_key: &str,
        display_name: &str,
    ) -> Result<Participant, ChanlinkError>;

    /// Marks a participant inactive. Participants are never deleted.
    async fn deactivate_participant(&self, id: &ParticipantId) -> Result<(), ChanlinkError>;

    /// Adds a participant to a channel. Idempotent.
    async fn add_member(
        &self,
        participant: &ParticipantId,
        channel: &ChannelId,
    ) -> Result<(), ChanlinkError>;

    /// Lists the members of a channel.
    async fn members(&self, channel: &ChannelId) -> Result<Vec<Participant>, ChanlinkError>;

    /// Appends an already-sanitized message and returns its position in the
    /// (channel, `body.kind()`) lane.
    async fn append_message(
        &self,
        channel: &ChannelId,
        participant: &ParticipantId,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError>;

    /// Returns the messages of one lane with position strictly greater than
    /// `position`, in ascending position order.
    async fn fetch_since(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
        position: SequencePosition,
    ) -> Result<Vec<Message>, ChanlinkError>;

    /// Highest position assigned in a lane, 0 when the lane is empty.
    async fn latest_position(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
    ) -> Result<SequencePosition, ChanlinkError> {
        Ok(self
            .fetch_since(channel, kind, 0)
            .await?
            .last()
            .map_or(0, |m| m.position))
    }

    /// Reports backend health.
    async fn health_check(&self) -> Result<HealthStatus, ChanlinkError> {
        Ok(HealthStatus::Healthy)
    }
}
