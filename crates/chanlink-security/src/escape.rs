// SPDX-FileCopyrightText: 2026 Chanlink Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Idempotent HTML-entity escaping and character-reference decoding.
//!
//! `<`, `>`, `"`, `'` and `&` are always replaced by one canonical reference
//! each. An existing reference that decodes to one of those characters is
//! rewritten to the canonical form; any other `&` is escaped. Every `&` in
//! the output therefore opens a canonical reference, so
//! `escape_html(escape_html(x)) == escape_html(x)` for every input.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

/// A character reference at the start of the haystack.
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#([0-9]{1,7})|#[xX]([0-9a-fA-F]{1,6})|([A-Za-z][A-Za-z0-9]{1,31}));").unwrap()
});

/// Named references a renderer would decode into scheme or markup syntax.
const NAMED: &[(&str, char)] = &[
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("amp", '&'),
    ("colon", ':'),
    ("sol", '/'),
    ("lpar", '('),
    ("rpar", ')'),
    ("Tab", '\t'),
    ("NewLine", '\n'),
];

fn canonical(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        '&' => Some("&amp;"),
        _ => None,
    }
}

/// Decode the reference at the start of `input`: (character, byte length).
fn reference_at(input: &str) -> Option<(char, usize)> {
    let caps = ENTITY.captures(input)?;
    let len = caps.get(0)?.len();
    let decoded = if let Some(dec) = caps.get(1) {
        dec.as_str().parse().ok().and_then(char::from_u32)
    } else if let Some(hex) = caps.get(2) {
        u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
    } else {
        let name = caps.get(3)?.as_str();
        NAMED
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|&(_, c)| c)
    };
    decoded.map(|c| (c, len))
}

/// Escape `input` for safe embedding in HTML text or attribute values.
pub fn escape_html(input: &str) -> Cow<'_, str> {
    if !input.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len() + 16);
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        let mut width = c.len_utf8();
        match c {
            '&' => match reference_at(rest).and_then(|(d, len)| canonical(d).map(|e| (e, len))) {
                Some((escaped, len)) => {
                    out.push_str(escaped);
                    width = len;
                }
                None => out.push_str("&amp;"),
            },
            _ => match canonical(c) {
                Some(escaped) => out.push_str(escaped),
                None => out.push(c),
            },
        }
        rest = &rest[width..];
    }
    Cow::Owned(out)
}

/// What a renderer would see once character references are decoded, with
/// the control characters URL parsers ignore removed.
///
/// Decoding is a single pass, as in HTML: `&amp;#58;` becomes `&#58;`.
pub fn decode_for_matching(input: &str) -> Cow<'_, str> {
    if !input.contains('&') && !input.chars().any(char::is_control) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(c) = rest.chars().next() {
        let (decoded, width) = match c {
            '&' => reference_at(rest).unwrap_or((c, 1)),
            _ => (c, c.len_utf8()),
        };
        if !decoded.is_control() {
            out.push(decoded);
        }
        rest = &rest[width..];
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            escape_html(r#"<b class="x">it's</b>"#),
            "&lt;b class=&quot;x&quot;&gt;it&#39;s&lt;/b&gt;"
        );
    }

    #[test]
    fn bare_ampersand_is_escaped_and_markup_references_are_canonical() {
        assert_eq!(escape_html("fish & chips"), "fish &amp; chips");
        assert_eq!(escape_html("&amp; &lt; &#39; &#x27; &apos;"), "&amp; &lt; &#39; &#39; &#39;");
        assert_eq!(escape_html("&#60;script&#62;"), "&lt;script&gt;");
        assert_eq!(escape_html("&nbsp;"), "&amp;nbsp;");
        assert_eq!(escape_html("&lt"), "&amp;lt");
    }

    #[test]
    fn scheme_references_are_not_passed_through() {
        assert_eq!(
            escape_html("&#106;avascript&#58;alert(1)"),
            "&amp;#106;avascript&amp;#58;alert(1)"
        );
        assert_eq!(escape_html("&#x6A;avascript:"), "&amp;#x6A;avascript:");
        assert_eq!(escape_html("java&Tab;script&colon;"), "java&amp;Tab;script&amp;colon;");
        assert_eq!(escape_html("&#0;&#9999999;"), "&amp;#0;&amp;#9999999;");
    }

    #[test]
    fn decoding_reveals_encoded_schemes_and_tags() {
        assert_eq!(decode_for_matching("&#106;avascript&#58;"), "javascript:");
        assert_eq!(decode_for_matching("&#x6A;avascript:"), "javascript:");
        assert_eq!(decode_for_matching("&#60;script&#62;"), "<script>");
        assert_eq!(decode_for_matching("java&Tab;script&COLON;"), "javascript:");
        assert_eq!(decode_for_matching("java\tscript:"), "javascript:");
        assert_eq!(decode_for_matching("&amp;#58;"), "&#58;");
        assert_eq!(decode_for_matching("&bogus; & x"), "&bogus; & x");
    }

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(escape_html("hello"), Cow::Borrowed("hello")));
    }

    #[test]
    fn unicode_passes_through() {
        assert_eq!(escape_html("héllo <ü>"), "héllo &lt;ü&gt;");
    }

    proptest! {
        #[test]
        fn escaping_is_idempotent(s in ".{0,200}") {
            let once = escape_html(&s).into_owned();
            let twice = escape_html(&once).into_owned();
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn escaping_is_idempotent_on_entity_heavy_input(s in "[&<>\"';#xa-f0-9lgtamp]{0,64}") {
            let once = escape_html(&s).into_owned();
            prop_assert_eq!(escape_html(&once).into_owned(), once.clone());
            prop_assert!(!once.contains(['<', '>', '"', '\'']));
        }
    }
}
