// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message validator/sanitizer used at the write boundary.

use chanlink_config::ChanlinkConfig;
use chanlink_core::{ChanlinkError, MessageBody, RejectReason, StateUpdate};
use tracing::debug;

use crate::blocklist::Blocklist;
use crate::escape::{decode_for_matching, escape_html};
use crate::identifier::{AllowList, validate_identifier};

const DEFAULT_MAX_PAYLOAD: usize = 1000;
const DEFAULT_MAX_NAME: usize = 64;
const MAX_STATE_KEY: usize = 64;

/// Validates and escapes payloads, channel names and participant identifiers.
///
/// `validate` is the gate. `sanitize` only escapes and is idempotent; the
/// write boundary runs both once, right before a message is persisted.
#[derive(Debug, Clone)]
pub struct Validator {
    max_payload_length: usize,
    max_name_length: usize,
    blocklist: Blocklist,
    allow_list: AllowList,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            max_payload_length: DEFAULT_MAX_PAYLOAD,
            max_name_length: DEFAULT_MAX_NAME,
            blocklist: Blocklist::default(),
            allow_list: AllowList::default(),
        }
    }
}

impl Validator {
    /// Build from configuration. Fails if an extra blocklist pattern is not a valid regex.
    pub fn from_config(config: &ChanlinkConfig) -> Result<Self, ChanlinkError> {
        let blocklist = Blocklist::with_extra(&config.security.blocked_patterns)
            .map_err(|e| ChanlinkError::Config(format!("security.blocked_patterns: {e}")))?;
        Ok(Self {
            max_payload_length: config.delivery.max_payload_length,
            max_name_length: config.security.max_name_length,
            blocklist,
            allow_list: AllowList::new(config.security.allowed_participants.iter().cloned()),
        })
    }

    pub fn with_max_payload_length(mut self, max: usize) -> Self {
        self.max_payload_length = max;
        self
    }

    pub fn with_allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = allow_list;
        self
    }

    pub fn with_blocklist(mut self, blocklist: Blocklist) -> Self {
        self.blocklist = blocklist;
        self
    }

    pub fn max_payload_length(&self) -> usize {
        self.max_payload_length
    }

    /// Check a content payload without transforming it.
    ///
    /// Length is counted in characters of the raw input. The blocklist sees
    /// both the raw text and its decoded form, so character references
    /// cannot smuggle a scheme or tag past it.
    pub fn validate(&self, raw: &str) -> Result<(), RejectReason> {
        if raw.trim().is_empty() {
            return Err(RejectReason::Empty);
        }
        if raw
            .chars()
            .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
        {
            return Err(RejectReason::NotTextual);
        }
        let len = raw.chars().count();
        if len > self.max_payload_length {
            return Err(RejectReason::TooLong {
                len,
                max: self.max_payload_length,
            });
        }
        let decoded = decode_for_matching(raw);
        let matched = self
            .blocklist
            .first_match(raw)
            .or_else(|| self.blocklist.first_match(&decoded));
        if let Some(pattern) = matched {
            debug!(pattern, "payload matched blocklist");
            return Err(RejectReason::Blocked {
                pattern: pattern.to_string(),
            });
        }
        Ok(())
    }

    /// The trimmed and escaped form of an already validated payload.
    pub fn sanitize(&self, raw: &str) -> String {
        escape_html(raw.trim()).into_owned()
    }

    /// Validate a typed state-lane update.
    pub fn validate_state(&self, update: &StateUpdate) -> Result<(), RejectReason> {
        match update {
            StateUpdate::Typing { .. } | StateUpdate::Presence { .. } => Ok(()),
            StateUpdate::Custom { key, value } => {
                let key_ok = !key.is_empty()
                    && key.len() <= MAX_STATE_KEY
                    && key
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
                if !key_ok {
                    return Err(RejectReason::InvalidStateKey);
                }
                self.validate(value)
            }
        }
    }

    /// Validate any message body.
    pub fn validate_body(&self, body: &MessageBody) -> Result<(), RejectReason> {
        match body {
            MessageBody::Content(text) => self.validate(text),
            MessageBody::State(update) => self.validate_state(update),
        }
    }

    /// Validate and escape any message body. State updates only carry free
    /// text in `Custom::value`, which is escaped like content.
    pub fn sanitize_body(&self, body: MessageBody) -> Result<MessageBody, RejectReason> {
        self.validate_body(&body)?;
        Ok(match body {
            MessageBody::Content(text) => MessageBody::Content(self.sanitize(&text)),
            MessageBody::State(StateUpdate::Custom { key, value }) => {
                MessageBody::State(StateUpdate::Custom {
                    value: self.sanitize(&value),
                    key,
                })
            }
            state @ MessageBody::State(_) => state,
        })
    }

    pub fn validate_channel_name(&self, name: &str) -> Result<(), RejectReason> {
        validate_identifier("channel name", name, self.max_name_length)
    }

    pub fn validate_display_name(&self, name: &str) -> Result<(), RejectReason> {
        validate_identifier("display name", name, self.max_name_length)
    }

    /// Whitelist check plus allow-list membership.
    pub fn validate_participant(&self, participant: &str) -> Result<(), RejectReason> {
        validate_identifier("participant id", participant, self.max_name_length)?;
        if !self.allow_list.permits(participant) {
            return Err(RejectReason::NotAllowed {
                participant: participant.to_string(),
            });
        }
        Ok(())
    }
}
