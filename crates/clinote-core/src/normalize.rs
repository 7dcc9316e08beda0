//! Whitespace canonicalization applied before any extractor runs.
//!
//! Handles:
//! - Line endings (CRLF, lone CR → LF)
//! - Horizontal whitespace (tab, NBSP, form feed… → single space)
//! - Blank line runs (3+ newlines → 2)
//!
//! Extractors match against single-space-separated tokens, so table
//! patterns must never rely on tabs or column alignment.

use std::fmt;
use std::ops::Deref;

/// Note text after whitespace canonicalization.
///
/// Normalizing a `NormalizedText` again yields the same text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedText(String);

impl NormalizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Deref for NormalizedText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NormalizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NormalizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonicalize whitespace in raw note text. Never fails.
pub fn normalize(raw: &str) -> NormalizedText {
    // Unify line endings and horizontal whitespace first
    let mut unified = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                unified.push('\n');
            }
            '\n' => unified.push('\n'),
            c if c.is_whitespace() => unified.push(' '),
            c => unified.push(c),
        }
    }

    // Collapse space runs per line, then cap blank line runs at one
    let mut out = String::with_capacity(unified.len());
    let mut pending_blank = false;
    for line in unified.split('\n') {
        let collapsed = collapse_spaces(line);
        if collapsed.is_empty() {
            pending_blank = !out.is_empty();
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if pending_blank {
                out.push('\n');
            }
        }
        out.push_str(&collapsed);
        pending_blank = false;
    }

    NormalizedText(out)
}

fn collapse_spaces(line: &str) -> String {
    line.split(' ')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_endings() {
        assert_eq!(normalize("a\r\nb\rc").as_str(), "a\nb\nc");
    }

    #[test]
    fn test_horizontal_whitespace() {
        assert_eq!(
            normalize("BP\t\tPulse\u{00A0}\u{00A0}Resp").as_str(),
            "BP Pulse Resp"
        );
        assert_eq!(normalize("  Sodium   139  ").as_str(), "Sodium 139");
    }

    #[test]
    fn test_blank_line_runs() {
        assert_eq!(normalize("a\n\n\n\nb").as_str(), "a\n\nb");
        assert_eq!(normalize("a\n \t \n\nb").as_str(), "a\n\nb");
        assert_eq!(normalize("a\n\nb").as_str(), "a\n\nb");
    }

    #[test]
    fn test_trim() {
        assert_eq!(normalize("\n\n  hello \n\n").as_str(), "hello");
        assert_eq!(normalize("   ").as_str(), "");
        assert_eq!(normalize("").as_str(), "");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "CHIEF COMPLAINT:\r\n\tChest pain\r\n\r\n\r\n\r\nPLAN:  EKG",
            "\u{00A0}x\u{000B}y\u{000C}z",
            "a\r\r\rb",
        ];
        for sample in samples {
            let once = normalize(sample);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", sample);
        }
    }
}
