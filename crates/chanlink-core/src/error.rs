// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chanlink delivery system.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all chanlink traits and operations.
///
/// The first four variants are the delivery taxonomy: validation rejections,
/// push transport failures, failed sync calls, and malformed wire frames.
/// None of them is process-fatal.
#[derive(Debug, Error)]
pub enum ChanlinkError {
    /// Validation or sanitization rejected the input. Never retried.
    #[error("invalid input: {reason}")]
    InvalidInput { reason: RejectReason },

    /// Push socket error or close. Retried with backoff, then failed over.
    #[error("transport failure: {message}")]
    TransportFailure {
        message: String,
        source: Option<BoxError>,
    },

    /// A registry call failed during a poll. Retried at the next interval.
    #[error("sync failure: {message}")]
    SyncFailure {
        message: String,
        source: Option<BoxError>,
    },

    /// A wire frame could not be decoded. The frame is dropped.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Registry backend errors (database, serialization).
    #[error("registry error: {source}")]
    Registry { source: BoxError },

    /// A channel, participant or session does not exist (or is retired).
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Configuration errors.
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The session was detached while the operation was pending.
    #[error("session closed")]
    SessionClosed,

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ChanlinkError {
    pub fn invalid(reason: RejectReason) -> Self {
        Self::InvalidInput { reason }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportFailure {
            message: message.into(),
            source: None,
        }
    }

    pub fn transport_with(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::TransportFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Wrap any error raised while fetching a sync batch.
    pub fn sync(message: impl Into<String>, source: ChanlinkError) -> Self {
        Self::SyncFailure {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn registry(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Registry {
            source: Box::new(source),
        }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Whether a later attempt of the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure { .. }
                | Self::SyncFailure { .. }
                | Self::Registry { .. }
                | Self::Timeout { .. }
        )
    }

    /// The rejection reason, if this is a validation failure.
    pub fn reject_reason(&self) -> Option<&RejectReason> {
        match self {
            Self::InvalidInput { reason } => Some(reason),
            _ => None,
        }
    }
}

impl From<RejectReason> for ChanlinkError {
    fn from(reason: RejectReason) -> Self {
        Self::InvalidInput { reason }
    }
}

/// Why the validator rejected an input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("payload is empty")]
    Empty,

    #[error("payload contains non-text control characters")]
    NotTextual,

    #[error("payload length {len} exceeds maximum of {max}")]
    TooLong { len: usize, max: usize },

    #[error("potentially malicious content detected: {pattern}")]
    Blocked { pattern: String },

    #[error("{field} contains invalid characters")]
    InvalidCharacters { field: &'static str },

    #[error("{field} length {len} exceeds maximum of {max}")]
    NameTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("participant `{participant}` is not on the allow-list")]
    NotAllowed { participant: String },

    #[error("state update key is empty or malformed")]
    InvalidStateKey,

    /// A rejection reported by a remote gateway, as its display text.
    #[error("{0}")]
    Remote(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ChanlinkError::transport("reset").is_retryable());
        assert!(ChanlinkError::sync("poll", ChanlinkError::Internal("x".into())).is_retryable());
        assert!(ChanlinkError::registry(std::io::Error::other("db")).is_retryable());
        assert!(!ChanlinkError::invalid(RejectReason::Empty).is_retryable());
        assert!(!ChanlinkError::ProtocolViolation("bad".into()).is_retryable());
        assert!(!ChanlinkError::SessionClosed.is_retryable());
    }

    #[test]
    fn invalid_input_display_carries_reason() {
        let err = ChanlinkError::invalid(RejectReason::TooLong { len: 1001, max: 1000 });
        assert_eq!(
            err.to_string(),
            "invalid input: payload length 1001 exceeds maximum of 1000"
        );
        assert_eq!(
            err.reject_reason(),
            Some(&RejectReason::TooLong { len: 1001, max: 1000 })
        );
    }

    #[test]
    fn not_found_display() {
        let err = ChanlinkError::not_found("channel", "ch-1");
        assert_eq!(err.to_string(), "channel not found: ch-1");
    }
}
