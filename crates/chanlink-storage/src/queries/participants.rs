// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Participant rows.

use chanlink_core::{ChanlinkError, ChannelId, Participant, ParticipantId};
use rusqlite::{Connection, OptionalExtension, params};

use super::Missing;
use crate::database::{Database, map_tr_err};

const SELECT_PARTICIPANT: &str =
    "SELECT id, external_key, display_name, sequence, active FROM participants";

/// Return the participant for `external_key`, inserting it on first contact.
///
/// The display name is only set on insert.
pub async fn upsert_participant(
    db: &Database,
    external_key: &str,
    display_name: &str,
) -> Result<Participant, ChanlinkError> {
    let key = external_key.to_string();
    let name = display_name.to_string();
    let fresh_id = uuid::Uuid::new_v4().to_string();
    db.connection()
        .call(move |conn| -> rusqlite::Result<Participant> {
            conn.execute(
                "INSERT OR IGNORE INTO participants (id, external_key, display_name, sequence, active)
                 VALUES (?1, ?2, ?3, 0, 1)",
                params![fresh_id, key, name],
            )?;
            let participant = conn.query_row(
                &format!("{SELECT_PARTICIPANT} WHERE external_key = ?1"),
                params![key],
                row_to_participant,
            )?;
            with_channels(conn, participant)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn deactivate(db: &Database, id: &ParticipantId) -> Result<(), ChanlinkError> {
    let row_id = id.as_str().to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE participants SET active = 0 WHERE id = ?1",
                params![row_id],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(Missing::Participant.into_error(id.as_str()));
    }
    Ok(())
}

pub async fn channel_members(
    db: &Database,
    channel: &ChannelId,
) -> Result<Vec<Participant>, ChanlinkError> {
    let cid = channel.as_str().to_string();
    let found = db
        .connection()
        .call(move |conn| -> rusqlite::Result<Option<Vec<Participant>>> {
            let exists = conn
                .query_row("SELECT 1 FROM channels WHERE id = ?1", params![cid], |_| Ok(()))
                .optional()?
                .is_some();
            if !exists {
                return Ok(None);
            }
            let rows: Vec<Participant> = conn
                .prepare(
                    "SELECT p.id, p.external_key, p.display_name, p.sequence, p.active
                     FROM participants p JOIN members m ON m.participant_id = p.id
                     WHERE m.channel_id = ?1
                     ORDER BY m.joined_at ASC, p.id ASC",
                )?
                .query_map(params![cid], row_to_participant)?
                .collect::<rusqlite::Result<_>>()?;
            rows.into_iter()
                .map(|p| with_channels(conn, p))
                .collect::<rusqlite::Result<Vec<_>>>()
                .map(Some)
        })
        .await
        .map_err(map_tr_err)?;
    found.ok_or_else(|| Missing::Channel.into_error(channel.as_str()))
}

fn row_to_participant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Participant> {
    let sequence: i64 = row.get(3)?;
    Ok(Participant {
        id: ParticipantId(row.get(0)?),
        external_key: row.get(1)?,
        display_name: row.get(2)?,
        channels: Default::default(),
        sequence: sequence as u64,
        active: row.get(4)?,
    })
}

fn with_channels(conn: &Connection, mut participant: Participant) -> rusqlite::Result<Participant> {
    participant.channels = conn
        .prepare("SELECT channel_id FROM members WHERE participant_id = ?1")?
        .query_map(params![participant.id.as_str()], |row| {
            Ok(ChannelId(row.get(0)?))
        })?
        .collect::<rusqlite::Result<_>>()?;
    Ok(participant)
}
