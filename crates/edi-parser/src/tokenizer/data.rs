//! Splitting segment and element text into tokens

use edi_ir::Delimiters;

/// Single-cursor access to the tokens of one segment or element
pub trait Tokens {
    /// Advance and return the next token, or `None` once exhausted
    fn next_token(&mut self) -> Option<String>;

    /// Token at a 0-based index, without moving the cursor
    fn token_at(&self, index: usize) -> Option<String>;

    fn has_more(&self) -> bool;

    /// Total number of tokens
    fn count(&self) -> usize;

    /// Move the cursor back before the first token
    fn rewind(&mut self);
}

/// Delimiter-driven tokenizer that keeps empty tokens
///
/// Escapes: the byte after an escape character is always taken as data.
/// When that byte is one of this tokenizer's delimiters the escape marker is
/// dropped; otherwise both bytes are kept so an inner tokenizer (or the final
/// unescape) can still see them.
#[derive(Debug, Clone)]
pub struct DataTokenizer {
    tokens: Vec<Vec<u8>>,
    cursor: usize,
}

impl DataTokenizer {
    /// Tokenize `text` on any byte in `delimiters`, honoring `escapes`
    pub fn new(text: &[u8], delimiters: &[u8], escapes: &[u8]) -> Self {
        Self::build(text, delimiters, delimiters, escapes)
    }

    /// Tokenize a whole segment: the tag separator (if any) ends only the id
    pub fn segment(text: &[u8], delimiters: &Delimiters) -> Self {
        let fields = [delimiters.field];
        let escapes = delimiters.escape_set();
        match delimiters.tag {
            Some(tag) => Self::build(text, &[tag, delimiters.field], &fields, &escapes),
            None => Self::build(text, &fields, &fields, &escapes),
        }
    }

    /// Tokenize a field on the component separator
    pub fn components(text: &str, delimiters: &Delimiters) -> Self {
        Self::new(text.as_bytes(), &delimiters.component_set(), &delimiters.escape_set())
    }

    fn build(text: &[u8], first: &[u8], rest: &[u8], escapes: &[u8]) -> Self {
        let mut tokens = Vec::new();
        if text.is_empty() {
            return Self { tokens, cursor: 0 };
        }
        let mut current = Vec::new();
        let mut bytes = text.iter().copied();
        while let Some(b) = bytes.next() {
            let delimiters = if tokens.is_empty() { first } else { rest };
            if escapes.contains(&b) {
                match bytes.next() {
                    Some(escaped) if delimiters.contains(&escaped) => current.push(escaped),
                    Some(escaped) => {
                        current.push(b);
                        current.push(escaped);
                    }
                    None => current.push(b),
                }
            } else if delimiters.contains(&b) {
                tokens.push(std::mem::take(&mut current));
            } else {
                current.push(b);
            }
        }
        tokens.push(current);
        Self { tokens, cursor: 0 }
    }

    /// Raw bytes of a token
    pub fn bytes_at(&self, index: usize) -> Option<&[u8]> {
        self.tokens.get(index).map(Vec::as_slice)
    }
}

impl Tokens for DataTokenizer {
    fn next_token(&mut self) -> Option<String> {
        let token = self.token_at(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }

    fn token_at(&self, index: usize) -> Option<String> {
        self.tokens
            .get(index)
            .map(|t| String::from_utf8_lossy(t).into_owned())
    }

    fn has_more(&self) -> bool {
        self.cursor < self.tokens.len()
    }

    fn count(&self) -> usize {
        self.tokens.len()
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

/// Tokens that were split ahead of time (replayed service segments, fixed-width records)
#[derive(Debug, Clone, Default)]
pub struct FixedTokenizer {
    tokens: Vec<String>,
    cursor: usize,
}

impl FixedTokenizer {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens, cursor: 0 }
    }

    /// Cut `record` into consecutive fields of the given widths
    ///
    /// The first token is `id`; a short record yields empty trailing fields.
    pub fn fixed_width(id: &str, record: &[u8], widths: &[usize]) -> Self {
        let mut tokens = Vec::with_capacity(widths.len() + 1);
        tokens.push(id.to_string());
        let mut start = 0;
        for &width in widths {
            let end = (start + width).min(record.len());
            let field = record.get(start..end).unwrap_or_default();
            tokens.push(String::from_utf8_lossy(field).into_owned());
            start = end;
        }
        Self::new(tokens)
    }
}

impl Tokens for FixedTokenizer {
    fn next_token(&mut self) -> Option<String> {
        let token = self.tokens.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(token)
    }

    fn token_at(&self, index: usize) -> Option<String> {
        self.tokens.get(index).cloned()
    }

    fn has_more(&self) -> bool {
        self.cursor < self.tokens.len()
    }

    fn count(&self) -> usize {
        self.tokens.len()
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all(mut t: impl Tokens) -> Vec<String> {
        let mut out = Vec::new();
        while let Some(token) = t.next_token() {
            out.push(token);
        }
        out
    }

    #[test]
    fn test_empty_tokens_are_preserved() {
        let t = DataTokenizer::new(b"field,,field,", b",", b"");
        assert_eq!(t.count(), 4);
        assert_eq!(all(t), vec!["field", "", "field", ""]);
    }

    #[test]
    fn test_token_count_matches_field_count() {
        for text in ["a", "a+b", "+", "++", "a++b+c", "+a+"] {
            let fields = text.matches('+').count() + 1;
            assert_eq!(DataTokenizer::new(text.as_bytes(), b"+", b"?").count(), fields, "{text}");
        }
        assert_eq!(DataTokenizer::new(b"", b"+", b"?").count(), 0);
    }

    #[test]
    fn test_escaped_delimiter_is_one_token() {
        let t = DataTokenizer::new(b"a?+b", b"+", b"?");
        assert_eq!(t.count(), 1);
        assert_eq!(all(t), vec!["a+b"]);
    }

    #[test]
    fn test_escaped_non_delimiter_keeps_marker() {
        let t = DataTokenizer::new(b"a?:b+c??+d", b"+", b"?");
        assert_eq!(all(t), vec!["a?:b", "c??", "d"]);
    }

    #[test]
    fn test_trailing_escape_is_kept() {
        assert_eq!(all(DataTokenizer::new(b"ab?", b"+", b"?")), vec!["ab?"]);
    }

    #[test]
    fn test_cursor_starts_before_first_token() {
        let mut t = DataTokenizer::new(b"UNH+1+ORDERS:D:96A", b"+", b"?");
        assert!(t.has_more());
        assert_eq!(t.token_at(2).as_deref(), Some("ORDERS:D:96A"));
        assert_eq!(t.next_token().as_deref(), Some("UNH"));
        assert_eq!(t.token_at(0).as_deref(), Some("UNH"));
        assert_eq!(t.next_token().as_deref(), Some("1"));
        t.rewind();
        assert_eq!(t.next_token().as_deref(), Some("UNH"));
    }

    #[test]
    fn test_tag_separator_only_ends_the_id() {
        let t = DataTokenizer::segment(b"STX=ANA:1+A=B", &Delimiters::tradacoms());
        assert_eq!(all(t), vec!["STX", "ANA:1", "A=B"]);
    }

    #[test]
    fn test_components_keep_outer_escapes_resolved() {
        let field = all(DataTokenizer::segment(b"FTX+A?:B:C", &Delimiters::edifact()));
        assert_eq!(field[1], "A?:B:C");
        let parts = all(DataTokenizer::components(&field[1], &Delimiters::edifact()));
        assert_eq!(parts, vec!["A:B", "C"]);
    }

    #[test]
    fn test_fixed_width_split() {
        let t = FixedTokenizer::fixed_width("6", b"622123456789", &[1, 2, 9, 5]);
        assert_eq!(all(t), vec!["6", "6", "22", "123456789", ""]);
    }
}
