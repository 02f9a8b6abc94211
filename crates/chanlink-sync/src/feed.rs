// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catch-up-then-live event stream for one push connection.

use std::collections::VecDeque;
use std::sync::Arc;

use chanlink_core::{ChanlinkError, ChannelId, Truncation, Watermarks};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::hub::{ChannelHub, HubEvent};
use crate::watermark::{Admission, WatermarkStore};

/// Ordered, gap-free and duplicate-free events of one channel.
///
/// The feed subscribes to fan-out before computing its catch-up batch, so
/// nothing appended in between is lost. Live messages are forwarded only
/// when they directly follow what was already sent; anything else triggers
/// another catch-up through the sync protocol.
pub struct ChannelFeed {
    hub: Arc<ChannelHub>,
    channel: ChannelId,
    rx: broadcast::Receiver<HubEvent>,
    sent: WatermarkStore,
    pending: VecDeque<HubEvent>,
    truncated: Truncation,
}

impl ChannelFeed {
    pub async fn open(
        hub: Arc<ChannelHub>,
        channel: ChannelId,
        since: Watermarks,
    ) -> Result<Self, ChanlinkError> {
        hub.open_channel(&channel).await?;
        let rx = hub.subscribe(&channel);
        let mut feed = Self {
            hub,
            channel,
            rx,
            sent: WatermarkStore::new(since),
            pending: VecDeque::new(),
            truncated: Truncation::default(),
        };
        feed.truncated = feed.catch_up().await?;
        Ok(feed)
    }

    /// Which lanes of the initial catch-up were capped by the backlog limit.
    pub fn initial_truncation(&self) -> Truncation {
        self.truncated
    }

    /// Watermarks of everything handed out (or queued) so far.
    pub fn watermarks(&self) -> Watermarks {
        self.sent.current()
    }

    async fn catch_up(&mut self) -> Result<Truncation, ChanlinkError> {
        let batch = self.hub.sync(&self.channel, self.sent.current()).await?;
        self.sent.commit_batch(&batch);
        let truncated = batch.truncated;
        self.pending.extend(
            batch
                .content
                .into_iter()
                .chain(batch.state)
                .map(HubEvent::Message),
        );
        Ok(truncated)
    }

    /// The next event, or `None` once the hub side is gone.
    pub async fn next(&mut self) -> Result<Option<HubEvent>, ChanlinkError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }
            match self.rx.recv().await {
                Ok(HubEvent::Message(message)) => match self.sent.admit(&message) {
                    Admission::Duplicate => continue,
                    Admission::Next => {
                        self.sent.commit(&message);
                        return Ok(Some(HubEvent::Message(message)));
                    }
                    Admission::Gap { .. } => {
                        self.catch_up().await?;
                    }
                },
                Ok(event @ HubEvent::ChannelUpdated(_)) => return Ok(Some(event)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %self.channel, skipped, "feed lagged, catching up");
                    self.catch_up().await?;
                }
                Err(RecvError::Closed) => return Ok(None),
            }
        }
    }
}
