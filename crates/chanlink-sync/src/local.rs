// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process transports over a shared [`ChannelHub`].
//!
//! Used when the transport manager and the hub live in one process, and by
//! tests as the reference implementation of the transport seams.

use std::sync::Arc;

use async_trait::async_trait;
use chanlink_core::{
    ChanlinkError, ChannelId, ChannelLink, Frame, Membership, MessageBody, PullTransport,
    PushStream, PushTransport, SequencePosition, SessionId, StreamKind, SyncBatch, Watermarks,
};
use tracing::debug;

use crate::feed::ChannelFeed;
use crate::hub::{ChannelHub, HubEvent};

/// Link, pull and push transport backed directly by a hub.
#[derive(Clone)]
pub struct LocalTransport {
    hub: Arc<ChannelHub>,
}

impl LocalTransport {
    pub fn new(hub: Arc<ChannelHub>) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Arc<ChannelHub> {
        &self.hub
    }
}

#[async_trait]
impl ChannelLink for LocalTransport {
    async fn join(
        &self,
        channel: &ChannelId,
        participant_key: &str,
        display_name: &str,
    ) -> Result<Membership, ChanlinkError> {
        let participant = self.hub.join(channel, participant_key, display_name).await?;
        Ok(Membership {
            session_id: SessionId(uuid::Uuid::new_v4().to_string()),
            channel_id: channel.clone(),
            participant,
        })
    }

    async fn publish(
        &self,
        membership: &Membership,
        body: MessageBody,
    ) -> Result<SequencePosition, ChanlinkError> {
        self.hub
            .post(&membership.channel_id, &membership.participant.id, body)
            .await
    }

    async fn leave(&self, membership: &Membership) -> Result<(), ChanlinkError> {
        debug!(session_id = %membership.session_id, "local session left");
        Ok(())
    }
}

#[async_trait]
impl PullTransport for LocalTransport {
    async fn poll(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<SyncBatch, ChanlinkError> {
        self.hub.sync(&membership.channel_id, since).await
    }
}

#[async_trait]
impl PushTransport for LocalTransport {
    async fn open(
        &self,
        membership: &Membership,
        since: Watermarks,
    ) -> Result<Box<dyn PushStream>, ChanlinkError> {
        let feed = ChannelFeed::open(self.hub.clone(), membership.channel_id.clone(), since)
            .await
            .map_err(|e| ChanlinkError::transport_with("push open failed", e))?;
        Ok(Box::new(LocalPushStream::new(feed)))
    }
}

/// Text for the status frame announcing a capped backlog.
pub fn truncation_notice(kinds: impl IntoIterator<Item = StreamKind>) -> String {
    let lanes: Vec<String> = kinds.into_iter().map(|k| k.to_string()).collect();
    format!("history truncated: {}", lanes.join(","))
}

/// Frames from a [`ChannelFeed`].
pub struct LocalPushStream {
    feed: ChannelFeed,
    notice: Option<Frame>,
    closed: bool,
}

impl LocalPushStream {
    fn new(feed: ChannelFeed) -> Self {
        let truncated = feed.initial_truncation();
        let notice = truncated.any().then(|| Frame::SystemStatus {
            status: truncation_notice(
                StreamKind::ALL
                    .into_iter()
                    .filter(|k| match k {
                        StreamKind::Content => truncated.content,
                        StreamKind::State => truncated.state,
                    }),
            ),
        });
        Self {
            feed,
            notice,
            closed: false,
        }
    }
}

#[async_trait]
impl PushStream for LocalPushStream {
    async fn next_frame(&mut self) -> Result<Option<Frame>, ChanlinkError> {
        if self.closed {
            return Ok(None);
        }
        if let Some(notice) = self.notice.take() {
            return Ok(Some(notice));
        }
        match self.feed.next().await {
            Ok(Some(HubEvent::Message(message))) => Ok(Some(Frame::Message { message })),
            Ok(Some(HubEvent::ChannelUpdated(channel))) => Ok(Some(Frame::ChannelUpdate { channel })),
            Ok(None) => Ok(None),
            Err(e) => Err(ChanlinkError::transport_with("push feed failed", e)),
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
