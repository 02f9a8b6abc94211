// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the registry, the sync protocol and the transports.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Server-assigned position of a message within one (channel, stream kind) lane.
///
/// Positions start at 1; a watermark of 0 means "nothing delivered yet".
pub type SequencePosition = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque, globally unique and immutable channel identifier.
    ChannelId
);
string_id!(
    /// Stable participant identifier assigned by the registry.
    ParticipantId
);
string_id!(
    /// Identifier of one connection session.
    SessionId
);

/// Health status reported by registries and the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Fully operational.
    Healthy,
    /// Operational but experiencing issues.
    Degraded(String),
    /// Not operational.
    Unhealthy(String),
}

/// What a channel is for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    #[default]
    General,
    Topic,
}

/// One of the two independent message lanes of a channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    /// Renderable text, applied as incremental append.
    Content,
    /// Ephemeral side-channel signals, applied as latest-value replace.
    State,
}

impl StreamKind {
    pub const ALL: [StreamKind; 2] = [StreamKind::Content, StreamKind::State];
}

/// Which transport produced a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    Push,
    Pull,
}

/// A named channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub members: BTreeSet<ParticipantId>,
    /// Retired channels keep their history but accept no new traffic.
    #[serde(default)]
    pub retired: bool,
}

/// An agent or user that takes part in channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    /// Stable external key used for create-or-get (e.g. a session token).
    pub external_key: String,
    pub display_name: String,
    #[serde(default)]
    pub channels: BTreeSet<ChannelId>,
    /// Per-participant counter, bumped on every message the participant sends.
    pub sequence: u64,
    pub active: bool,
}

/// Presence values carried on the state lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

/// A strictly typed side-channel signal.
///
/// Renderers interpret these values; nothing on the state lane is ever
/// evaluated as code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateUpdate {
    Typing { active: bool },
    Presence { status: PresenceStatus },
    Custom { key: String, value: String },
}

/// Payload of a stored message, in post-sanitization form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "lane", content = "data", rename_all = "snake_case")]
pub enum MessageBody {
    Content(String),
    State(StateUpdate),
}

impl MessageBody {
    /// The lane this body travels on.
    pub fn kind(&self) -> StreamKind {
        match self {
            MessageBody::Content(_) => StreamKind::Content,
            MessageBody::State(_) => StreamKind::State,
        }
    }
}

/// A message as stored by the registry and delivered to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub channel_id: ChannelId,
    /// Strictly increasing within (channel, kind). The only ordering key.
    pub position: SequencePosition,
    pub sender: ParticipantId,
    /// The sender's own sequence counter at send time.
    pub sender_seq: u64,
    pub body: MessageBody,
    /// Display only; never used for ordering.
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn kind(&self) -> StreamKind {
        self.body.kind()
    }
}

/// Highest delivered position per stream kind, for one session on one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Watermarks {
    #[serde(default)]
    pub content: SequencePosition,
    #[serde(default)]
    pub state: SequencePosition,
}

impl Watermarks {
    pub const ZERO: Watermarks = Watermarks {
        content: 0,
        state: 0,
    };

    pub fn new(content: SequencePosition, state: SequencePosition) -> Self {
        Self { content, state }
    }

    pub fn get(&self, kind: StreamKind) -> SequencePosition {
        match kind {
            StreamKind::Content => self.content,
            StreamKind::State => self.state,
        }
    }

    /// Raise the watermark for `kind` to `position`. Never lowers it.
    ///
    /// Returns true when the watermark moved.
    pub fn advance(&mut self, kind: StreamKind, position: SequencePosition) -> bool {
        let slot = match kind {
            StreamKind::Content => &mut self.content,
            StreamKind::State => &mut self.state,
        };
        if position > *slot {
            *slot = position;
            true
        } else {
            false
        }
    }

    /// Pointwise maximum of two watermark sets.
    pub fn max(self, other: Watermarks) -> Watermarks {
        Watermarks {
            content: self.content.max(other.content),
            state: self.state.max(other.state),
        }
    }
}

/// Per-kind flag set when a fresh sync was capped to the most recent messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Truncation {
    #[serde(default)]
    pub content: bool,
    #[serde(default)]
    pub state: bool,
}

impl Truncation {
    pub fn any(&self) -> bool {
        self.content || self.state
    }

    pub fn set(&mut self, kind: StreamKind) {
        match kind {
            StreamKind::Content => self.content = true,
            StreamKind::State => self.state = true,
        }
    }
}

/// Result of one sync call: two independently ordered lanes plus the new watermarks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub content: Vec<Message>,
    pub state: Vec<Message>,
    pub watermarks: Watermarks,
    #[serde(default)]
    pub truncated: Truncation,
}

impl SyncBatch {
    /// An empty batch that leaves `watermarks` unchanged.
    pub fn empty(watermarks: Watermarks) -> Self {
        Self {
            watermarks,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.state.is_empty()
    }

    pub fn len(&self) -> usize {
        self.content.len() + self.state.len()
    }

    pub fn lane(&self, kind: StreamKind) -> &[Message] {
        match kind {
            StreamKind::Content => &self.content,
            StreamKind::State => &self.state,
        }
    }
}

/// The binding of a participant to a channel for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    pub participant: Participant,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn watermark_never_decreases() {
        let mut wm = Watermarks::ZERO;
        assert!(wm.advance(StreamKind::Content, 5));
        assert!(!wm.advance(StreamKind::Content, 3));
        assert!(!wm.advance(StreamKind::Content, 5));
        assert_eq!(wm.get(StreamKind::Content), 5);
        assert_eq!(wm.get(StreamKind::State), 0);
    }

    #[test]
    fn watermark_max_is_pointwise() {
        let a = Watermarks::new(4, 1);
        let b = Watermarks::new(2, 9);
        assert_eq!(a.max(b), Watermarks::new(4, 9));
    }

    #[test]
    fn stream_kind_round_trips_through_strings() {
        for kind in StreamKind::ALL {
            let s = kind.to_string();
            assert_eq!(StreamKind::from_str(&s).unwrap(), kind);
        }
        assert_eq!(StreamKind::Content.to_string(), "content");
    }

    #[test]
    fn state_update_serializes_tagged() {
        let body = MessageBody::State(StateUpdate::Typing { active: true });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lane": "state", "data": {"kind": "typing", "active": true}})
        );
        assert_eq!(body.kind(), StreamKind::State);
    }

    #[test]
    fn watermarks_deserialize_with_missing_fields() {
        let wm: Watermarks = serde_json::from_str(r#"{"content": 7}"#).unwrap();
        assert_eq!(wm, Watermarks::new(7, 0));
    }

    #[test]
    fn empty_batch_keeps_watermarks() {
        let batch = SyncBatch::empty(Watermarks::new(3, 2));
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.watermarks, Watermarks::new(3, 2));
        assert!(!batch.truncated.any());
    }
}
