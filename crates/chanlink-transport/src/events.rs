// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What a session hands to the application.

use chanlink_core::{
    Channel, ChannelId, Message, SessionId, StreamKind, TransportKind, Watermarks,
};

use crate::reconnect::LinkState;

/// One batch of newly delivered messages.
///
/// The lanes are independent ordered lists: apply `content` as append and
/// `state` as latest-value replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    pub content: Vec<Message>,
    pub state: Vec<Message>,
    /// Watermarks after this delivery.
    pub watermarks: Watermarks,
    /// Transport that produced the batch.
    pub transport: TransportKind,
}

impl Delivery {
    pub fn len(&self) -> usize {
        self.content.len() + self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.state.is_empty()
    }
}

/// Lifecycle and status notifications of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected { transport: TransportKind },
    /// The push stream ended; a reconnect follows.
    Disconnected,
    /// Push retries are exhausted; the session now polls.
    FailedOver,
    /// Sync has failed this many times in a row. The session keeps polling.
    Degraded {
        consecutive_failures: u32,
        error: String,
    },
    /// A sync succeeded after a degraded period.
    Recovered,
    ChannelUpdated(Channel),
    SystemStatus(String),
    /// An `error` frame from the server.
    RemoteError(String),
    /// Older history of this lane was skipped by the backlog cap.
    Truncated { kind: StreamKind },
}

/// Snapshot of a session's connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    pub link_state: LinkState,
    /// Active transport, if any.
    pub transport: Option<TransportKind>,
    /// Consecutive failed push connects.
    pub retry_count: u32,
    pub watermarks: Watermarks,
    pub consecutive_sync_failures: u32,
}

impl SessionStatus {
    pub(crate) fn initial(watermarks: Watermarks) -> Self {
        Self {
            link_state: LinkState::Disconnected,
            transport: None,
            retry_count: 0,
            watermarks,
            consecutive_sync_failures: 0,
        }
    }
}
