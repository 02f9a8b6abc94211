// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chanlink integration tests.
//!
//! Provides scripted transports, a failure-injecting registry and a
//! ready-made hub so delivery tests stay fast and deterministic.
//!
//! # Components
//!
//! - [`ScriptedPushTransport`] - push transport that fails a scripted number of connects
//! - [`ManualPushTransport`] - push transport whose frames are fed by the test
//! - [`FlakyRegistry`] - registry wrapper with injectable read failures
//! - [`TestHarness`] - hub, channel and poster wired together

pub mod flaky_registry;
pub mod harness;
pub mod mock_push;

pub use flaky_registry::FlakyRegistry;
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_push::{ManualPushTransport, PushController, ScriptedPushTransport};
