// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Regex blocklist for markup and script injection attempts.
//!
//! Matching is a first line of defense only. Escaping in [`crate::escape`]
//! is what makes stored payloads inert.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Built-in rules: (name reported in the rejection, pattern).
///
/// Tags are matched on their opening form so an unterminated `<script` is
/// caught as well as a complete element.
static BUILTIN_RULES: LazyLock<Vec<BlockRule>> = LazyLock::new(|| {
    [
        ("script tag", r"(?i)<\s*script\b"),
        ("iframe tag", r"(?i)<\s*iframe\b"),
        ("object tag", r"(?i)<\s*object\b"),
        ("embed tag", r"(?i)<\s*embed\b"),
        ("javascript: uri", r"(?i)javascript\s*:"),
        ("vbscript: uri", r"(?i)vbscript\s*:"),
        ("inline event handler", r"(?i)\bon[a-z]{3,}\s*="),
    ]
    .into_iter()
    .map(|(name, pattern)| BlockRule {
        name: name.to_string(),
        // Compile-time constant patterns.
        regex: Regex::new(pattern).unwrap(),
    })
    .collect()
});

#[derive(Debug, Clone)]
struct BlockRule {
    name: String,
    regex: Regex,
}

/// An ordered set of rejection rules.
#[derive(Debug, Clone)]
pub struct Blocklist {
    rules: Vec<BlockRule>,
}

impl Default for Blocklist {
    fn default() -> Self {
        Self {
            rules: BUILTIN_RULES.clone(),
        }
    }
}

impl Blocklist {
    /// Built-in rules followed by `extra` case-insensitive patterns.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Result<Self, regex::Error> {
        let mut list = Self::default();
        for pattern in extra {
            let pattern = pattern.as_ref();
            let regex = RegexBuilder::new(pattern).case_insensitive(true).build()?;
            list.rules.push(BlockRule {
                name: pattern.to_string(),
                regex,
            });
        }
        Ok(list)
    }

    /// Name of the first rule `input` trips, if any.
    pub fn first_match(&self, input: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(input))
            .map(|rule| rule.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_script_element() {
        let list = Blocklist::default();
        assert_eq!(
            list.first_match("<script>alert(1)</script>"),
            Some("script tag")
        );
        assert_eq!(list.first_match("< SCRIPT src=x>"), Some("script tag"));
    }

    #[test]
    fn blocks_embedding_tags() {
        let list = Blocklist::default();
        assert_eq!(list.first_match("<iframe src=x></iframe>"), Some("iframe tag"));
        assert_eq!(list.first_match("<object data=x>"), Some("object tag"));
        assert_eq!(list.first_match("<EMBED src=x>"), Some("embed tag"));
    }

    #[test]
    fn blocks_script_uris() {
        let list = Blocklist::default();
        assert_eq!(
            list.first_match("click javascript:alert(1)"),
            Some("javascript: uri")
        );
        assert_eq!(list.first_match("VBScript :msgbox"), Some("vbscript: uri"));
    }

    #[test]
    fn blocks_event_handlers() {
        let list = Blocklist::default();
        for input in [
            "<img onerror=x>",
            "onload = go()",
            "<a ONCLICK=\"y\">",
            "<div onpointerenter=x>",
            "<input onfocusin=y>",
            "<p oncut=z>",
        ] {
            assert_eq!(
                list.first_match(input),
                Some("inline event handler"),
                "{input}"
            );
        }
    }

    #[test]
    fn plain_text_passes() {
        let list = Blocklist::default();
        for input in [
            "hello world",
            "a < b and c > d",
            "once = twice",
            "one=1",
            "button=on",
            "the description mentions scripts",
            "money: $5 & more",
        ] {
            assert_eq!(list.first_match(input), None, "{input}");
        }
    }

    #[test]
    fn extra_patterns_are_case_insensitive() {
        let list = Blocklist::with_extra(&["forbidden\\s+word"]).unwrap();
        assert_eq!(list.len(), Blocklist::default().len() + 1);
        assert_eq!(
            list.first_match("a FORBIDDEN  word"),
            Some("forbidden\\s+word")
        );
    }

    #[test]
    fn malformed_extra_pattern_is_an_error() {
        assert!(Blocklist::with_extra(&["(unclosed"]).is_err());
    }
}
