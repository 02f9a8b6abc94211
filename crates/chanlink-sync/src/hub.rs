// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The write boundary of a deployment.
//!
//! Every message enters through [`ChannelHub::post`]: validated, escaped once,
//! appended to the registry, then fanned out to live subscribers of its
//! channel. Subscribers treat fan-out as a hint and fall back to the sync
//! protocol whenever they see a gap.

use std::sync::Arc;

use chanlink_core::{
    Channel, ChannelId, ChannelKind, ChanlinkError, Message, MessageBody, Participant,
    ParticipantId, Registry, SequencePosition, SyncBatch, Watermarks,
};
use chanlink_security::Validator;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::protocol::{SyncOptions, sync};

const FANOUT_CAPACITY: usize = 256;

/// Something subscribers of a channel should know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    Message(Message),
    ChannelUpdated(Channel),
}

/// Validates, persists and fans out channel traffic.
pub struct ChannelHub {
    registry: Arc<dyn Registry>,
    validator: Validator,
    options: SyncOptions,
    fanout: DashMap<ChannelId, broadcast::Sender<HubEvent>>,
}

impl ChannelHub {
    pub fn new(registry: Arc<dyn Registry>, validator: Validator) -> Self {
        Self {
            registry,
            validator,
            options: SyncOptions::default(),
            fanout: DashMap::new(),
        }
    }

    pub fn with_sync_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    pub async fn create_channel(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelId, ChanlinkError> {
        self.validator.validate_channel_name(name)?;
        let id = self.registry.create_channel(name, kind).await?;
        info!(channel = %id, name, %kind, "channel created");
        Ok(id)
    }

    /// The channel, if it exists and is not retired.
    pub async fn open_channel(&self, id: &ChannelId) -> Result<Channel, ChanlinkError> {
        match self.registry.channel(id).await? {
            Some(channel) if !channel.retired => Ok(channel),
            _ => Err(ChanlinkError::not_found("channel", id.as_str())),
        }
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>, ChanlinkError> {
        self.registry.list_channels().await
    }

    pub async fn members(&self, channel: &ChannelId) -> Result<Vec<Participant>, ChanlinkError> {
        self.registry.members(channel).await
    }

    /// Retire a channel and tell its subscribers.
    pub async fn retire_channel(&self, id: &ChannelId) -> Result<(), ChanlinkError> {
        self.registry.retire_channel(id).await?;
        if let Some(channel) = self.registry.channel(id).await? {
            self.publish(id, HubEvent::ChannelUpdated(channel));
        }
        info!(channel = %id, "channel retired");
        Ok(())
    }

    /// Register `participant_key` as a member of `channel`.
    ///
    /// The key must pass the identifier whitelist and the allow-list. An empty
    /// display name falls back to the key.
    pub async fn join(
        &self,
        channel: &ChannelId,
        participant_key: &str,
        display_name: &str,
    ) -> Result<Participant, ChanlinkError> {
        self.validator.validate_participant(participant_key)?;
        let display_name = match display_name.trim() {
            "" => participant_key,
            name => name,
        };
        self.validator.validate_display_name(display_name)?;

        let before = self.open_channel(channel).await?;
        let mut participant = self
            .registry
            .create_or_get_participant(participant_key, display_name)
            .await?;
        if !participant.active {
            return Err(ChanlinkError::not_found(
                "participant",
                participant.id.as_str(),
            ));
        }
        self.registry.add_member(&participant.id, channel).await?;
        participant.channels.insert(channel.clone());

        if !before.members.contains(&participant.id)
            && let Some(updated) = self.registry.channel(channel).await?
        {
            self.publish(channel, HubEvent::ChannelUpdated(updated));
        }
        debug!(channel = %channel, participant = %participant.id, "joined");
        Ok(participant)
    }

    /// Validate, sanitize, persist and fan out one message.
    pub async fn post(
        &self,
        channel: &ChannelId,
        sender: &ParticipantId,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError> {
        let body = self.validator.sanitize_body(body).inspect_err(|reason| {
            debug!(channel = %channel, sender = %sender, %reason, "message rejected");
        })?;
        let kind = body.kind();
        let position = self.registry.append_message(channel, sender, body).await?;

        match self
            .registry
            .fetch_since(channel, kind, position.saturating_sub(1))
            .await
        {
            Ok(fetched) => {
                if let Some(message) = fetched.into_iter().find(|m| m.position == position) {
                    self.publish(channel, HubEvent::Message(message));
                }
            }
            // Subscribers recover through the sync protocol on their next gap.
            Err(e) => warn!(channel = %channel, position, error = %e, "fan-out read failed"),
        }
        Ok(position)
    }

    /// Run the sync protocol with this hub's options.
    pub async fn sync(
        &self,
        channel: &ChannelId,
        since: Watermarks,
    ) -> Result<SyncBatch, ChanlinkError> {
        sync(self.registry.as_ref(), channel, since, &self.options).await
    }

    /// Subscribe to live events of `channel`.
    pub fn subscribe(&self, channel: &ChannelId) -> broadcast::Receiver<HubEvent> {
        self.fanout
            .entry(channel.clone())
            .or_insert_with(|| broadcast::channel(FANOUT_CAPACITY).0)
            .subscribe()
    }

    /// Number of channels with at least one live subscriber slot.
    pub fn live_channels(&self) -> usize {
        self.fanout.len()
    }

    fn publish(&self, channel: &ChannelId, event: HubEvent) {
        let delivered = self
            .fanout
            .get(channel)
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false);
        if !delivered {
            self.fanout
                .remove_if(channel, |_, tx| tx.receiver_count() == 0);
        }
    }
}
