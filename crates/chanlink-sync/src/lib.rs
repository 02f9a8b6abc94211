// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync protocol and channel hub for the chanlink delivery system.
//!
//! - [`watermark`]: per-session delivered positions and frame admission.
//! - [`protocol`]: the `sync` call every transport is built on.
//! - [`hub`]: the validating write boundary with per-channel fan-out.
//! - [`feed`]: catch-up-then-live streams for push connections.
//! - [`local`]: in-process implementations of the transport traits.

pub mod feed;
pub mod hub;
pub mod local;
pub mod protocol;
pub mod watermark;

pub use feed::ChannelFeed;
pub use hub::{ChannelHub, HubEvent};
pub use local::{LocalPushStream, LocalTransport, truncation_notice};
pub use protocol::{SyncOptions, sync};
pub use watermark::{Admission, WatermarkStore};
