// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session watermark bookkeeping.

use chanlink_core::{Message, StreamKind, SyncBatch, Watermarks};

/// How an incoming message relates to what has already been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// At or below the watermark: already delivered.
    Duplicate,
    /// Exactly one above the watermark: deliver and commit.
    Next,
    /// Further ahead: something in between is missing.
    Gap { expected: u64 },
}

/// Highest delivered position per stream kind for one session.
///
/// Watermarks only move forward, and only through [`WatermarkStore::commit`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatermarkStore {
    marks: Watermarks,
}

impl WatermarkStore {
    pub fn new(initial: Watermarks) -> Self {
        Self { marks: initial }
    }

    pub fn current(&self) -> Watermarks {
        self.marks
    }

    pub fn get(&self, kind: StreamKind) -> u64 {
        self.marks.get(kind)
    }

    pub fn admit(&self, message: &Message) -> Admission {
        let mark = self.marks.get(message.kind());
        if message.position <= mark {
            Admission::Duplicate
        } else if message.position == mark + 1 {
            Admission::Next
        } else {
            Admission::Gap { expected: mark + 1 }
        }
    }

    /// Record `message` as delivered. Returns false if it was not newer.
    pub fn commit(&mut self, message: &Message) -> bool {
        self.marks.advance(message.kind(), message.position)
    }

    /// Record a whole sync batch as delivered.
    pub fn commit_batch(&mut self, batch: &SyncBatch) {
        self.marks = self.marks.max(batch.watermarks);
    }

    /// Drop already-delivered messages from a batch fetched against an older watermark.
    pub fn filter_fresh(&self, batch: &mut SyncBatch) {
        let marks = self.marks;
        batch.content.retain(|m| m.position > marks.content);
        batch.state.retain(|m| m.position > marks.state);
        batch.watermarks = batch.watermarks.max(marks);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanlink_core::{ChannelId, MessageBody, ParticipantId, StateUpdate};

    fn msg(kind: StreamKind, position: u64) -> Message {
        let body = match kind {
            StreamKind::Content => MessageBody::Content(format!("m{position}")),
            StreamKind::State => MessageBody::State(StateUpdate::Typing { active: true }),
        };
        Message {
            channel_id: ChannelId::from("c"),
            position,
            sender: ParticipantId::from("p"),
            sender_seq: position,
            body,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn admission_classifies_relative_to_watermark() {
        let store = WatermarkStore::new(Watermarks::new(3, 0));
        assert_eq!(store.admit(&msg(StreamKind::Content, 2)), Admission::Duplicate);
        assert_eq!(store.admit(&msg(StreamKind::Content, 3)), Admission::Duplicate);
        assert_eq!(store.admit(&msg(StreamKind::Content, 4)), Admission::Next);
        assert_eq!(
            store.admit(&msg(StreamKind::Content, 6)),
            Admission::Gap { expected: 4 }
        );
        assert_eq!(store.admit(&msg(StreamKind::State, 1)), Admission::Next);
    }

    #[test]
    fn commit_never_moves_backwards() {
        let mut store = WatermarkStore::default();
        assert!(store.commit(&msg(StreamKind::Content, 2)));
        assert!(!store.commit(&msg(StreamKind::Content, 1)));
        assert_eq!(store.get(StreamKind::Content), 2);
    }

    #[test]
    fn filter_fresh_drops_delivered_prefix() {
        let store = WatermarkStore::new(Watermarks::new(2, 1));
        let mut batch = SyncBatch {
            content: (1..=4).map(|p| msg(StreamKind::Content, p)).collect(),
            state: vec![msg(StreamKind::State, 1)],
            watermarks: Watermarks::new(4, 1),
            ..Default::default()
        };
        store.filter_fresh(&mut batch);
        let positions: Vec<_> = batch.content.iter().map(|m| m.position).collect();
        assert_eq!(positions, vec![3, 4]);
        assert!(batch.state.is_empty());
        assert_eq!(batch.watermarks, Watermarks::new(4, 1));
    }
}
