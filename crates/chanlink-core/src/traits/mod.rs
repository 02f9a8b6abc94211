// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams of the delivery core.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod registry;
pub mod transport;

pub use registry::Registry;
pub use transport::{ChannelLink, PullTransport, PushStream, PushTransport};
