// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Channel and membership rows.

use std::collections::BTreeSet;
use std::str::FromStr;

use chanlink_core::{Channel, ChannelId, ChannelKind, ChanlinkError, ParticipantId};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use super::{Missing, parse_timestamp, timestamp};
use crate::database::{Database, map_tr_err};

pub async fn insert_channel(
    db: &Database,
    name: &str,
    kind: ChannelKind,
) -> Result<ChannelId, ChanlinkError> {
    let id = uuid::Uuid::new_v4().to_string();
    let name = name.to_string();
    let row_id = id.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO channels (id, name, kind, created_at, retired) VALUES (?1, ?2, ?3, ?4, 0)",
                params![row_id, name, kind.to_string(), timestamp(Utc::now())],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(ChannelId(id))
}

pub async fn get_channel(db: &Database, id: &ChannelId) -> Result<Option<Channel>, ChanlinkError> {
    let id = id.as_str().to_string();
    db.connection()
        .call(move |conn| load_channel(conn, &id))
        .await
        .map_err(map_tr_err)
}

pub async fn list_active_channels(db: &Database) -> Result<Vec<Channel>, ChanlinkError> {
    db.connection()
        .call(|conn| -> rusqlite::Result<Vec<Channel>> {
            let ids: Vec<String> = conn
                .prepare("SELECT id FROM channels WHERE retired = 0 ORDER BY created_at ASC, id ASC")?
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            let mut channels = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(channel) = load_channel(conn, &id)? {
                    channels.push(channel);
                }
            }
            Ok(channels)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn retire_channel(db: &Database, id: &ChannelId) -> Result<(), ChanlinkError> {
    let row_id = id.as_str().to_string();
    let updated = db
        .connection()
        .call(move |conn| conn.execute("UPDATE channels SET retired = 1 WHERE id = ?1", params![row_id]))
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(Missing::Channel.into_error(id.as_str()));
    }
    Ok(())
}

pub async fn insert_member(
    db: &Database,
    participant: &ParticipantId,
    channel: &ChannelId,
) -> Result<(), ChanlinkError> {
    let (pid, cid) = (participant.as_str().to_string(), channel.as_str().to_string());
    let outcome = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Result<(), Missing>> {
            let retired: Option<bool> = conn
                .query_row("SELECT retired FROM channels WHERE id = ?1", params![cid], |r| {
                    r.get(0)
                })
                .optional()?;
            if retired != Some(false) {
                return Ok(Err(Missing::Channel));
            }
            let active: Option<bool> = conn
                .query_row("SELECT active FROM participants WHERE id = ?1", params![pid], |r| {
                    r.get(0)
                })
                .optional()?;
            if active != Some(true) {
                return Ok(Err(Missing::Participant));
            }
            conn.execute(
                "INSERT OR IGNORE INTO members (channel_id, participant_id, joined_at) VALUES (?1, ?2, ?3)",
                params![cid, pid, timestamp(Utc::now())],
            )?;
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?;
    outcome.map_err(|missing| match missing {
        Missing::Channel => missing.into_error(channel.as_str()),
        _ => missing.into_error(participant.as_str()),
    })
}

/// Load one channel row plus its member ids.
pub(crate) fn load_channel(conn: &Connection, id: &str) -> rusqlite::Result<Option<Channel>> {
    let row = conn
        .query_row(
            "SELECT id, name, kind, created_at, retired FROM channels WHERE id = ?1",
            params![id],
            |row| {
                let kind: String = row.get(2)?;
                let created: String = row.get(3)?;
                Ok(Channel {
                    id: ChannelId(row.get(0)?),
                    name: row.get(1)?,
                    kind: ChannelKind::from_str(&kind).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
                    })?,
                    created_at: parse_timestamp(3, &created)?,
                    members: BTreeSet::new(),
                    retired: row.get(4)?,
                })
            },
        )
        .optional()?;

    let Some(mut channel) = row else {
        return Ok(None);
    };
    channel.members = conn
        .prepare("SELECT participant_id FROM members WHERE channel_id = ?1")?
        .query_map(params![id], |row| Ok(ParticipantId(row.get(0)?)))?
        .collect::<rusqlite::Result<_>>()?;
    Ok(Some(channel))
}
