// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`Registry`] trait.

use async_trait::async_trait;
use chanlink_core::{
    Channel, ChannelId, ChannelKind, ChanlinkError, HealthStatus, Message, MessageBody,
    Participant, ParticipantId, Registry, SequencePosition, StreamKind,
};

use crate::database::{Database, map_tr_err};
use crate::queries::{channels, messages, participants};

/// SQLite-backed registry. Delegates to the typed query modules.
pub struct SqliteRegistry {
    db: Database,
}

impl SqliteRegistry {
    pub async fn open(path: &str) -> Result<Self, ChanlinkError> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    pub async fn open_in_memory() -> Result<Self, ChanlinkError> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }

    /// Checkpoint and close the underlying database.
    pub async fn close(self) -> Result<(), ChanlinkError> {
        self.db.close().await
    }
}

#[async_trait]
impl Registry for SqliteRegistry {
    async fn create_channel(
        &self,
        name: &str,
        kind: ChannelKind,
    ) -> Result<ChannelId, ChanlinkError> {
        channels::insert_channel(&self.db, name, kind).await
    }

    async fn channel(&self, id: &ChannelId) -> Result<Option<Channel>, ChanlinkError> {
        channels::get_channel(&self.db, id).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, ChanlinkError> {
        channels::list_active_channels(&self.db).await
    }

    async fn retire_channel(&self, id: &ChannelId) -> Result<(), ChanlinkError> {
        channels::retire_channel(&self.db, id).await
    }

    async fn create_or_get_participant(
        &self,
        external_key: &str,
        display_name: &str,
    ) -> Result<Participant, ChanlinkError> {
        participants::upsert_participant(&self.db, external_key, display_name).await
    }

    async fn deactivate_participant(&self, id: &ParticipantId) -> Result<(), ChanlinkError> {
        participants::deactivate(&self.db, id).await
    }

    async fn add_member(
        &self,
        participant: &ParticipantId,
        channel: &ChannelId,
    ) -> Result<(), ChanlinkError> {
        channels::insert_member(&self.db, participant, channel).await
    }

    async fn members(&self, channel: &ChannelId) -> Result<Vec<Participant>, ChanlinkError> {
        participants::channel_members(&self.db, channel).await
    }

    async fn append_message(
        &self,
        channel: &ChannelId,
        participant: &ParticipantId,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError> {
        messages::append(&self.db, channel, participant, body).await
    }

    async fn fetch_since(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
        position: SequencePosition,
    ) -> Result<Vec<Message>, ChanlinkError> {
        messages::fetch_since(&self.db, channel, kind, position).await
    }

    async fn latest_position(
        &self,
        channel: &ChannelId,
        kind: StreamKind,
    ) -> Result<SequencePosition, ChanlinkError> {
        messages::latest_position(&self.db, channel, kind).await
    }

    async fn health_check(&self) -> Result<HealthStatus, ChanlinkError> {
        self.db
            .connection()
            .call(|conn| conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }
}
