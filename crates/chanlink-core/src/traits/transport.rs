// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport strategy traits.
//!
//! A session talks to the channel through three seams: a [`ChannelLink`] for
//! joining and publishing, a [`PullTransport`] for timed sync calls, and an
//! optional [`PushTransport`] for a persistent frame stream. In-process and
//! remote (HTTP/WebSocket) implementations are interchangeable.

use async_trait::async_trait;

use crate::error::ChanlinkError;
use crate::frame::Frame;
use crate::types::{ChannelId, Membership, MessageBody, SequencePosition, SyncBatch, Watermarks};

/// Join/publish surface of a channel.
#[async_trait]
pub trait ChannelLink: Send + Sync + 'static {
    /// Registers the participant identified by `participant_key` with the channel.
    async fn join(
        &self,
        channel: &ChannelId,
        participant_key: &str,
        display_name: &str,
    ) -> Result<Membership, ChanlinkError>;

    /// Publishes a message. Validation rejections come back as `InvalidInput`.
    async fn publish(
        &self,
        membership: &Membership,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError>;

    /// Releases whatever the remote side holds for this membership. Idempotent.
    async fn leave(&self, membership: &Membership) -> Result<(), ChanlinkError>;
}

/// Request/response sync transport.
#[async_trait]
pub trait PullTransport: Send + Sync + 'static {
    /// Returns everything newer than `since`, per lane, with the new watermarks.
    async fn poll(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<SyncBatch, ChanlinkError>;
}

/// Persistent push transport.
#[async_trait]
pub trait PushTransport: Send + Sync + 'static {
    /// Opens a stream that first replays everything newer than `since` and
    /// then forwards live frames.
    async fn open(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<Box<dyn PushStream>, ChanlinkError>;
}

/// An open push connection.
#[async_trait]
pub trait PushStream: Send {
    /// Waits for the next frame.
    ///
    /// `Ok(None)` means the peer closed the stream. `ProtocolViolation` errors
    /// concern a single frame and leave the stream usable; any other error
    /// ends the stream.
    async fn next_frame(&mut self) -> Result<Option<Frame>, ChanlinkError>;

    /// Closes the stream. Safe to call more than once.
    async fn close(&mut self);
}
