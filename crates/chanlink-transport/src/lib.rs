// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Client-side session management for the chanlink delivery system.
//!
//! A [`TransportManager`] attaches sessions to channels. Every session tries
//! the push transport first, retries with linear backoff, fails over to
//! fixed-cadence polling and hands each new batch to a single sink together
//! with its updated watermarks.

pub mod events;
pub mod manager;
pub mod reconnect;
pub mod session;

pub use events::{Delivery, SessionEvent, SessionStatus};
pub use manager::{TransportManager, TransportManagerBuilder};
pub use reconnect::{LinkState, ReconnectPolicy, Reconnector, RetryDecision, compute_backoff};
pub use session::SessionHandle;
