// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process registry. History lives as long as the value does.

use std::collections::HashMap;

use async_trait::async_trait;
use chanlink_core::{
    Channel, ChannelId, ChannelKind, ChanlinkError, Message, MessageBody, Participant,
    ParticipantId, Registry, SequencePosition, StreamKind,
};
use chrono::Utc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    /// Creation order, for stable listing.
    order: Vec<ChannelId>,
    channels: HashMap<ChannelId, Channel>,
    participants: HashMap<ParticipantId, Participant>,
    by_key: HashMap<String, ParticipantId>,
    logs: HashMap<(ChannelId, StreamKind), Vec<Message>>,
}

impl Inner {
    fn open_channel(&self, id: &ChannelId) -> Result<&Channel, ChanlinkError> {
        self.channels
            .get(id)
            .filter(|c| !c.retired)
            .ok_or_else(|| ChanlinkError::not_found("channel", id.as_str()))
    }

    fn active_participant(&self, id: &ParticipantId) -> Result<&Participant, ChanlinkError> {
        self.participants
            .get(id)
            .filter(|p| p.active)
            .ok_or_else(|| ChanlinkError::not_found("participant", id.as_str()))
    }
}

/// A [`Registry`] kept entirely in memory behind one lock.
///
/// Every operation takes the lock once, which makes it atomic.
#[derive(Default)]
pub struct MemoryRegistry {
    inner: RwLock<Inner>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for MemoryRegistry {
    async fn create_channel(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelId, ChanlinkError> {
        let id = ChannelId(uuid::Uuid::new_v4().to_string());
        let channel = Channel {
            id: id.clone(),
            name: name.to_string(),
            kind,
            created_at: Utc::now(),
            members: Default::default(),
            retired: false,
        };
        let mut inner = self.inner.write().await;
        inner.order.push(id.clone());
        inner.channels.insert(id.clone(), channel);
        Ok(id)
    }

    async fn channel(&self, id: &ChannelId) -> Result<Option<Channel>, ChanlinkError> {
        Ok(self.inner.read().await.channels.get(id).cloned())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ChanlinkError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.channels.get(id))
            .filter(|c| !c.retired)
            .cloned()
            .collect())
    }

    async fn retire_channel(&self, id: &ChannelId) -> Result<(), ChanlinkError> {
        let mut inner = self.inner.write().await;
        let channel = inner
            .channels
            .get_mut(id)
            .ok_or_else(|| ChanlinkError::not_found("channel", id.as_str()))?;
        channel.retired = true;
        Ok(())
    }

    async fn create_or_get_participant(
        &self,
        external_key: &str,
        display_name: &str,
    ) -> Result<Participant, ChanlinkError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .by_key
            .get(external_key)
            .and_then(|id| inner.participants.get(id))
        {
            return Ok(existing.clone());
        }
        let participant = Participant {
            id: ParticipantId(uuid::Uuid::new_v4().to_string()),
            external_key: external_key.to_string(),
            display_name: display_name.to_string(),
            channels: Default::default(),
            sequence: 0,
            active: true,
        };
        inner
            .by_key
            .insert(external_key.to_string(), participant.id.clone());
        inner
            .participants
            .insert(participant.id.clone(), participant.clone());
        Ok(participant)
    }

    async fn deactivate_participant(&self, id: &ParticipantId) -> Result<(), ChanlinkError> {
        let mut inner = self.inner.write().await;
        let participant = inner
            .participants
            .get_mut(id)
            .ok_or_else(|| ChanlinkError::not_found("participant", id.as_str()))?;
        participant.active = false;
        Ok(())
    }

    async fn add_member(
        &self,
        participant: &ParticipantId,
        channel: &ChannelId,
    ) -> Result<(), ChanlinkError> {
        let mut inner = self.inner.write().await;
        inner.open_channel(channel)?;
        inner.active_participant(participant)?;
        if let Some(c) = inner.channels.get_mut(channel) {
            c.members.insert(participant.clone());
        }
        if let Some(p) = inner.participants.get_mut(participant) {
            p.channels.insert(channel.clone());
        }
        Ok(())
    }

    async fn members(&self, channel: &ChannelId) -> Result<Vec<Participant>, ChanlinkError> {
        let inner = self.inner.read().await;
        let c = inner
            .channels
            .get(channel)
            .ok_or_else(|| ChanlinkError::not_found("channel", channel.as_str()))?;
        Ok(c.members
            .iter()
            .filter_map(|id| inner.participants.get(id))
            .cloned()
            .collect())
    }

    async fn append_message(
        &self,
        channel: &ChannelId,
        participant: &ParticipantId,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError> {
        let mut inner = self.inner.write().await;
        let is_member = inner.open_channel(channel)?.members.contains(participant);
        inner.active_participant(participant)?;
        if !is_member {
            return Err(ChanlinkError::not_found(
                "membership",
                format!("{participant} in {channel}"),
            ));
        }

        let sender_seq = match inner.participants.get_mut(participant) {
            Some(p) => {
                p.sequence += 1;
                p.sequence
            }
            None => return Err(ChanlinkError::not_found("participant", participant.as_str())),
        };

        let kind = body.kind();
        let log = inner.logs.entry((channel.clone(), kind)).or_default();
        let position = log.last().map_or(0, |m| m.position) + 1;
        log.push(Message {
            channel_id: channel.clone(),
            position,
            sender: participant.clone(),
            sender_seq,
            body,
            created_at: Utc::now(),
        });
        Ok(position)
    }

    async fn fetch_since(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
        position: SequencePosition,
    ) -> Result<Vec<Message>, ChanlinkError> {
        let inner = self.inner.read().await;
        let Some(log) = inner.logs.get(&(channel.clone(), kind)) else {
            return Ok(Vec::new());
        };
        // Positions start at 1 and are gap-free, so index == position - 1.
        let start = usize::try_from(position).unwrap_or(usize::MAX).min(log.len());
        Ok(log[start..].to_vec())
    }

    async fn latest_position(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
    ) -> Result<SequencePosition, ChanlinkError> {
        let inner = self.inner.read().await;
        Ok(inner
            .logs
            .get(&(channel.clone(), kind))
            .and_then(|log| log.last())
            .map_or(0, |m| m.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (MemoryRegistry, ChannelId, Participant) {
        let registry = MemoryRegistry::new();
        let channel = registry
            .create_channel("general", ChannelKind::General)
            .await
            .unwrap();
        let p = registry
            .create_or_get_participant("key-a", "Alice")
            .await
            .unwrap();
        registry.add_member(&p.id, &channel).await.unwrap();
        (registry, channel, p)
    }

    #[tokio::test]
    async fn positions_are_gap_free_per_lane() {
        let (registry, channel, p) = seeded().await;
        let a = registry
            .append_message(&channel, &p.id, MessageBody::Content("one".into()))
            .await
            .unwrap();
        let s = registry
            .append_message(
                &channel,
                &p.id,
                MessageBody::State(chanlink_core::StateUpdate::Typing { active: true }),
            )
            .await
            .unwrap();
        let b = registry
            .append_message(&channel, &p.id, MessageBody::Content("two".into()))
            .await
            .unwrap();
        assert_eq!((a, s, b), (1, 1, 2));

        let content = registry
            .fetch_since(&channel, StreamKind::Content, 1)
            .await
            .unwrap();
        assert_eq!(content.len(), 1);
        assert_eq!(content[0].position, 2);
        assert_eq!(content[0].sender_seq, 3);
    }

    #[tokio::test]
    async fn fetch_past_end_is_empty() {
        let (registry, channel, _) = seeded().await;
        let msgs = registry
            .fetch_since(&channel, StreamKind::Content, 99)
            .await
            .unwrap();
        assert!(msgs.is_empty());
    }

    #[tokio::test]
    async fn create_or_get_is_idempotent_by_key() {
        let registry = MemoryRegistry::new();
        let a = registry.create_or_get_participant("k", "A").await.unwrap();
        let b = registry.create_or_get_participant("k", "B").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.display_name, "A");
    }

    #[tokio::test]
    async fn non_member_cannot_append() {
        let (registry, channel, _) = seeded().await;
        let outsider = registry
            .create_or_get_participant("key-b", "Bob")
            .await
            .unwrap();
        let err = registry
            .append_message(&channel, &outsider.id, MessageBody::Content("hi".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChanlinkError::NotFound { kind: "membership", .. }));
    }

    #[tokio::test]
    async fn retired_channel_keeps_history_but_rejects_writes() {
        let (registry, channel, p) = seeded().await;
        registry
            .append_message(&channel, &p.id, MessageBody::Content("before".into()))
            .await
            .unwrap();
        registry.retire_channel(&channel).await.unwrap();

        assert!(registry.list_channels().await.unwrap().is_empty());
        let err = registry
            .append_message(&channel, &p.id, MessageBody::Content("after".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, ChanlinkError::NotFound { kind: "channel", .. }));
        let history = registry
            .fetch_since(&channel, StreamKind::Content, 0)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }
}
