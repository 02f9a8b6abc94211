// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whitelist checks for channel names and participant identifiers.

use std::collections::HashSet;
use std::sync::LazyLock;

use chanlink_core::RejectReason;
use regex::Regex;

/// Letters, digits, space, hyphen and underscore.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 _-]+$").unwrap());

/// Check `value` against the identifier whitelist and `max_len` (in characters).
pub fn validate_identifier(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), RejectReason> {
    if value.trim().is_empty() {
        return Err(RejectReason::Empty);
    }
    let len = value.chars().count();
    if len > max_len {
        return Err(RejectReason::NameTooLong {
            field,
            len,
            max: max_len,
        });
    }
    if !IDENTIFIER.is_match(value) {
        return Err(RejectReason::InvalidCharacters { field });
    }
    Ok(())
}

/// Participants allowed to join. An empty list admits everyone.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    entries: HashSet<String>,
}

impl AllowList {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_restricted(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn permits(&self, participant: &str) -> bool {
        !self.is_restricted() || self.entries.contains(participant)
    }
}
