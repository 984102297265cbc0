//! Wire formats and per-document delimiter sets
//!
//! The delimiter set discovered while reading a document is stored on the
//! envelope so that serialization back to the wire reuses exactly the same
//! characters instead of the format defaults.
#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for delimiter slots a format does not use.
pub const NO_DELIMITER: u8 = 0;

/// Interchange wire formats understood by the translator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    /// UN/EDIFACT (UNA/UNB ... UNZ)
    Edifact,
    /// TRADACOMS (STX ... END)
    Tradacoms,
    /// NACHA ACH fixed-width records
    Ach,
}

impl Format {
    /// Upper-case display name
    pub fn name(self) -> &'static str {
        match self {
            Format::Edifact => "EDIFACT",
            Format::Tradacoms => "TRADACOMS",
            Format::Ach => "ACH",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Delimiter set used by a single document instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    /// Segment terminator
    pub segment: u8,
    /// Data element (field) separator
    pub field: u8,
    /// Component (sub-field) separator
    pub component: u8,
    /// Repetition separator, when the syntax version has one
    pub repetition: Option<u8>,
    /// Escape/release character; `None` disables escaping
    pub escape: Option<u8>,
    /// Separator between segment tag and first field (TRADACOMS `=`)
    pub tag: Option<u8>,
    /// Decimal mark
    pub decimal: u8,
    /// Character swallowed directly after a segment terminator (CR/LF pairs)
    pub skip: Option<u8>,
}

impl Delimiters {
    /// EDIFACT level A defaults (no UNA present)
    pub const fn edifact() -> Self {
        Self {
            segment: b'\'',
            field: b'+',
            component: b':',
            repetition: None,
            escape: Some(b'?'),
            tag: None,
            decimal: b'.',
            skip: None,
        }
    }

    /// TRADACOMS fixed delimiters
    pub const fn tradacoms() -> Self {
        Self {
            segment: b'\'',
            field: b'+',
            component: b':',
            repetition: None,
            escape: Some(b'?'),
            tag: Some(b'='),
            decimal: b'.',
            skip: None,
        }
    }

    /// ACH records carry no field delimiters; records end with a line feed.
    pub const fn ach() -> Self {
        Self {
            segment: b'\n',
            field: NO_DELIMITER,
            component: NO_DELIMITER,
            repetition: None,
            escape: None,
            tag: None,
            decimal: b'.',
            skip: None,
        }
    }

    /// Format defaults
    pub const fn for_format(format: Format) -> Self {
        match format {
            Format::Edifact => Self::edifact(),
            Format::Tradacoms => Self::tradacoms(),
            Format::Ach => Self::ach(),
        }
    }

    /// Characters that separate fields inside a segment
    pub fn field_set(&self) -> Vec<u8> {
        let mut set = vec![self.field];
        if let Some(tag) = self.tag {
            set.push(tag);
        }
        set
    }

    /// Characters that separate components inside a composite field
    pub fn component_set(&self) -> Vec<u8> {
        vec![self.component]
    }

    /// Escape characters (empty when escaping is disabled)
    pub fn escape_set(&self) -> Vec<u8> {
        self.escape.into_iter().collect()
    }

    /// True for any structural delimiter of this set
    pub fn is_delimiter(&self, byte: u8) -> bool {
        byte != NO_DELIMITER
            && (byte == self.segment
                || byte == self.field
                || byte == self.component
                || Some(byte) == self.repetition
                || Some(byte) == self.tag)
    }

    /// Resolve remaining escape sequences in extracted text
    pub fn unescape(&self, text: &str) -> String {
        unescape(text, &self.escape_set())
    }

    /// Prefix every delimiter and escape character in `value` with the escape
    /// character. Values are returned unchanged when escaping is disabled.
    pub fn escape_value(&self, value: &str) -> String {
        let Some(escape) = self.escape else {
            return value.to_string();
        };
        let mut out = String::with_capacity(value.len());
        for c in value.chars() {
            if c.is_ascii() {
                let b = c as u8;
                if b == escape || self.is_delimiter(b) {
                    out.push(escape as char);
                }
            }
            out.push(c);
        }
        out
    }
}

impl Default for Delimiters {
    fn default() -> Self {
        Self::edifact()
    }
}

/// Drop each escape character and keep the character after it literally.
///
/// A trailing escape character with nothing after it is kept.
pub fn unescape(text: &str, escapes: &[u8]) -> String {
    if escapes.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c.is_ascii() && escapes.contains(&(c as u8)) {
            match chars.next() {
                Some(next) => out.push(next),
                None => out.push(c),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_delimiters() {
        let d = Delimiters::default();
        assert_eq!(d.segment, b'\'');
        assert_eq!(d.field, b'+');
        assert_eq!(d.component, b':');
        assert_eq!(d.escape, Some(b'?'));
        assert_eq!(d.repetition, None);
    }

    #[test]
    fn test_tradacoms_field_set_includes_tag_separator() {
        let d = Delimiters::tradacoms();
        assert_eq!(d.field_set(), vec![b'+', b'=']);
    }

    #[test]
    fn test_unescape() {
        assert_eq!(unescape("a?+b", b"?"), "a+b");
        assert_eq!(unescape("a??b", b"?"), "a?b");
        assert_eq!(unescape("ab?", b"?"), "ab?");
        assert_eq!(unescape("a?+b", b""), "a?+b");
    }

    #[test]
    fn test_escape_value() {
        let d = Delimiters::edifact();
        assert_eq!(d.escape_value("O'NEIL+SONS?"), "O?'NEIL?+SONS??");
        assert_eq!(d.unescape(&d.escape_value("a:b")), "a:b");
    }

    #[test]
    fn test_ach_has_no_field_delimiters() {
        let d = Delimiters::ach();
        assert!(!d.is_delimiter(NO_DELIMITER));
        assert_eq!(d.escape_value("A+B"), "A+B");
    }
}
