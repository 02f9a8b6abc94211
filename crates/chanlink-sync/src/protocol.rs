// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sync protocol shared by every transport.
//!
//! Both lanes are fetched independently against the caller's watermarks.
//! Asking again with the same watermarks returns an empty batch, which is
//! what keeps polling cycles and push-to-pull failover duplicate-free.

use chanlink_config::DeliveryConfig;
use chanlink_core::{
    ChanlinkError, ChannelId, Registry, StreamKind, SyncBatch, Truncation, Watermarks,
};
use tracing::debug;

/// Policy knobs for [`sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// For a lane starting at watermark 0, only return the most recent N messages.
    pub backlog_limit: Option<usize>,
    /// Return at most N messages per lane; the caller continues from the new watermark.
    pub page_size: Option<usize>,
}

impl SyncOptions {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            backlog_limit: config.backlog_limit(),
            page_size: None,
        }
    }
}

/// Fetch everything newer than `since` on both lanes of `channel`.
///
/// Registry errors come back as [`ChanlinkError::SyncFailure`].
pub async fn sync(
    registry: &dyn Registry,
    channel: &ChannelId,
    since: Watermarks,
    options: &SyncOptions,
) -> Result<SyncBatch, ChanlinkError> {
    let mut batch = SyncBatch::empty(since);
    let mut truncated = Truncation::default();

    for kind in StreamKind::ALL {
        let mark = since.get(kind);
        let mut from = mark;

        if mark == 0
            && let Some(limit) = options.backlog_limit
        {
            let latest = registry
                .latest_position(channel, kind)
                .await
                .map_err(|e| ChanlinkError::sync(format!("latest {kind} position"), e))?;
            let limit = limit as u64;
            if latest > limit {
                from = latest - limit;
                truncated.set(kind);
            }
        }

        let mut messages = registry
            .fetch_since(channel, kind, from)
            .await
            .map_err(|e| ChanlinkError::sync(format!("fetch {kind} lane"), e))?;
        if let Some(page) = options.page_size {
            messages.truncate(page);
        }

        if let Some(last) = messages.last() {
            batch.watermarks.advance(kind, last.position);
        }
        match kind {
            StreamKind::Content => batch.content = messages,
            StreamKind::State => batch.state = messages,
        }
    }

    batch.truncated = truncated;
    debug!(
        channel = %channel,
        content = batch.content.len(),
        state = batch.state.len(),
        "sync batch"
    );
    Ok(batch)
}
