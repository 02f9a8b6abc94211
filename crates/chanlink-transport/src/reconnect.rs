// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push reconnection state machine.
//!
//! States: `Disconnected -> Connecting -> Push`. A failed connect falls back
//! to `Disconnected` and waits `base * attempt` (capped) before the next one.
//! The N-th consecutive failure moves the session to `Pull`, where it stays,
//! optionally re-probing push on a slower schedule. An unexpected close of
//! an established push stream goes back to `Connecting` with the counter reset.

use std::fmt;
use std::time::Duration;

use chanlink_config::DeliveryConfig;

/// Timing and threshold policy for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Consecutive failed push connects before failing over to pull.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Fixed pull cadence.
    pub poll_interval: Duration,
    /// How often pull mode re-attempts push. `None` stays in pull for good.
    pub reprobe_interval: Option<Duration>,
    /// Consecutive failed sync calls before a degraded event.
    pub sync_failure_threshold: u32,
}

impl ReconnectPolicy {
    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self {
            max_retries: config.push_retry_count.max(1),
            backoff_base: config.backoff_base(),
            backoff_max: config.backoff_max(),
            poll_interval: config.poll_interval(),
            reprobe_interval: config.push_reprobe_interval(),
            sync_failure_threshold: config.sync_failure_threshold.max(1),
        }
    }

    /// Delay after the `attempt`-th consecutive failure.
    pub fn backoff(&self, attempt: u32) -> Duration {
        compute_backoff(attempt, self.backoff_base, self.backoff_max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

/// `min(base * attempt, max)`; zero before the first failure.
pub fn compute_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    base.saturating_mul(attempt).min(max)
}

/// Where a session's transport currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Not connected; waiting out a backoff or not started yet.
    Disconnected,
    /// A push connect is in flight.
    Connecting { attempt: u32 },
    /// Receiving over push.
    Push,
    /// Polling over pull.
    Pull,
    /// Detached. Terminal.
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "disconnected"),
            LinkState::Connecting { attempt } => write!(f, "connecting (attempt {attempt})"),
            LinkState::Push => write!(f, "connected (push)"),
            LinkState::Pull => write!(f, "connected (pull)"),
            LinkState::Closed => write!(f, "closed"),
        }
    }
}

/// What to do after a failed push connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    FailOver,
}

/// Tracks consecutive push failures and the resulting link state.
#[derive(Debug, Clone)]
pub struct Reconnector {
    policy: ReconnectPolicy,
    failures: u32,
    state: LinkState,
}

impl Reconnector {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            state: LinkState::Disconnected,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Consecutive failed connects since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Enter `Connecting` and return the attempt number (1-based).
    pub fn begin_attempt(&mut self) -> u32 {
        let attempt = self.failures + 1;
        self.state = LinkState::Connecting { attempt };
        attempt
    }

    pub fn on_connect_failed(&mut self) -> RetryDecision {
        self.failures += 1;
        if self.failures >= self.policy.max_retries {
            self.state = LinkState::Pull;
            RetryDecision::FailOver
        } else {
            self.state = LinkState::Disconnected;
            RetryDecision::RetryAfter(self.policy.backoff(self.failures))
        }
    }

    pub fn on_connected(&mut self) {
        self.failures = 0;
        self.state = LinkState::Push;
    }

    /// An established push stream ended without being asked to.
    pub fn on_push_closed(&mut self) {
        self.failures = 0;
        self.state = LinkState::Disconnected;
    }

    /// Polling without push, either after failover or because no push
    /// transport is configured.
    pub fn enter_pull(&mut self) {
        self.state = LinkState::Pull;
    }

    pub fn close(&mut self) {
        self.state = LinkState::Closed;
    }
}
