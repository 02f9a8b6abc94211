// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message log rows.

use chanlink_core::{
    ChanlinkError, ChannelId, Message, MessageBody, ParticipantId, SequencePosition, StreamKind,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, params};

use super::{Missing, parse_timestamp, timestamp};
use crate::database::{Database, map_tr_err};

/// Append a message and return its position in the (channel, kind) lane.
///
/// Position assignment, the sender counter bump and the insert share one
/// transaction, so positions stay gap-free under concurrent writers.
pub async fn append(
    db: &Database,
    channel: &ChannelId,
    sender: &ParticipantId,
    body: MessageBody,
) -> Result<SequencePosition, ChanlinkError> {
    let kind = body.kind().to_string();
    let payload = serde_json::to_string(&body).map_err(ChanlinkError::registry)?;
    let (cid, pid) = (channel.as_str().to_string(), sender.as_str().to_string());

    let outcome = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Result<i64, Missing>> {
            let tx = conn.transaction()?;

            let retired: Option<bool> = tx
                .query_row("SELECT retired FROM channels WHERE id = ?1", params![cid], |r| {
                    r.get(0)
                })
                .optional()?;
            if retired != Some(false) {
                return Ok(Err(Missing::Channel));
            }
            let sender_seq: Option<i64> = tx
                .query_row(
                    "UPDATE participants SET sequence = sequence + 1
                     WHERE id = ?1 AND active = 1 RETURNING sequence",
                    params![pid],
                    |r| r.get(0),
                )
                .optional()?;
            let Some(sender_seq) = sender_seq else {
                return Ok(Err(Missing::Participant));
            };
            let is_member = tx
                .query_row(
                    "SELECT 1 FROM members WHERE channel_id = ?1 AND participant_id = ?2",
                    params![cid, pid],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !is_member {
                return Ok(Err(Missing::Membership));
            }

            let position: i64 = tx.query_row(
                "SELECT COALESCE(MAX(position), 0) + 1 FROM messages WHERE channel_id = ?1 AND kind = ?2",
                params![cid, kind],
                |r| r.get(0),
            )?;
            tx.execute(
                "INSERT INTO messages (channel_id, kind, position, sender, sender_seq, body, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![cid, kind, position, pid, sender_seq, payload, timestamp(Utc::now())],
            )?;
            tx.commit()?;
            Ok(Ok(position))
        })
        .await
        .map_err(map_tr_err)?;

    match outcome {
        Ok(position) => Ok(position as SequencePosition),
        Err(Missing::Channel) => Err(Missing::Channel.into_error(channel.as_str())),
        Err(Missing::Membership) => Err(Missing::Membership.into_error(&format!(
            "{} in {}",
            sender.as_str(),
            channel.as_str()
        ))),
        Err(missing) => Err(missing.into_error(sender.as_str())),
    }
}

/// Messages of one lane with position strictly greater than `after`, ascending.
pub async fn fetch_since(
    db: &Database,
    channel: &ChannelId,
    kind: StreamKind,
    after: SequencePosition,
) -> Result<Vec<Message>, ChanlinkError> {
    let (cid, kind_str) = (channel.as_str().to_string(), kind.to_string());
    let after = i64::try_from(after).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| -> rusqlite::Result<Vec<Message>> {
            conn.prepare(
                "SELECT channel_id, position, sender, sender_seq, body, created_at
                 FROM messages WHERE channel_id = ?1 AND kind = ?2 AND position > ?3
                 ORDER BY position ASC",
            )?
            .query_map(params![cid, kind_str, after], row_to_message)?
            .collect()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn latest_position(
    db: &Database,
    channel: &ChannelId,
    kind: StreamKind,
) -> Result<SequencePosition, ChanlinkError> {
    let (cid, kind_str) = (channel.as_str().to_string(), kind.to_string());
    let latest: i64 = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT COALESCE(MAX(position), 0) FROM messages WHERE channel_id = ?1 AND kind = ?2",
                params![cid, kind_str],
                |r| r.get(0),
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(latest as SequencePosition)
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let position: i64 = row.get(1)?;
    let sender_seq: i64 = row.get(3)?;
    let body: String = row.get(4)?;
    let created: String = row.get(5)?;
    Ok(Message {
        channel_id: ChannelId(row.get(0)?),
        position: position as SequencePosition,
        sender: ParticipantId(row.get(2)?),
        sender_seq: sender_seq as u64,
        body: serde_json::from_str(&body)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        created_at: parse_timestamp(5, &created)?,
    })
}
