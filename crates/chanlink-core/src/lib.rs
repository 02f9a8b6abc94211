// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the chanlink delivery system.
//!
//! This crate provides the error taxonomy, domain types, push wire frames and
//! the trait seams (registry and transports) used throughout the workspace.

pub mod error;
pub mod frame;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ChanlinkError, RejectReason};
pub use frame::Frame;
pub use types::{
    Channel, ChannelId, ChannelKind, HealthStatus, Membership, Message, MessageBody, Participant,
    ParticipantId, PresenceStatus, SequencePosition, SessionId, StateUpdate, StreamKind,
    SyncBatch, TransportKind, Truncation, Watermarks,
};

pub use traits::{ChannelLink, PullTransport, PushStream, PushTransport, Registry};
