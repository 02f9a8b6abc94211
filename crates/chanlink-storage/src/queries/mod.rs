// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed SQL operations, one module per table group.

pub mod channels;
pub mod messages;
pub mod participants;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

/// Which referenced row a write could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Missing {
    Channel,
    Participant,
    Membership,
}

impl Missing {
    pub(crate) fn into_error(self, id: &str) -> chanlink_core::ChanlinkError {
        let kind = match self {
            Missing::Channel => "channel",
            Missing::Participant => "participant",
            Missing::Membership => "membership",
        };
        chanlink_core::ChanlinkError::not_found(kind, id)
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
