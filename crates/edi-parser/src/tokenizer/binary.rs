//! Segments carrying a length-prefixed binary payload (`BIN`, `BDS`)

use super::data::Tokens;
use super::stream::StreamTokenizer;
use crate::{Error, Result};
use std::io::Read;
use tracing::debug;

/// Tokens of a binary segment: id, declared length, payload
///
/// The payload may contain delimiter and escape bytes; it is never split or
/// unescaped.
#[derive(Debug, Clone)]
pub struct BinaryTokenizer {
    id: String,
    length: String,
    raw: Vec<u8>,
    payload_start: usize,
    cursor: usize,
}

impl BinaryTokenizer {
    /// Read the rest of a binary segment once its id and the separator after
    /// it have been consumed
    ///
    /// The length field runs to the next field separator; exactly that many
    /// bytes are then pulled raw, and the segment terminator must follow.
    ///
    /// # Errors
    ///
    /// [`Error::BinaryLength`] when the length field is missing or not a
    /// number, when the input ends inside the payload, or when the byte after
    /// the payload is not the segment terminator.
    pub fn read<R: Read>(id: &[u8], separator: u8, stream: &mut StreamTokenizer<R>) -> Result<Self> {
        let id_text = String::from_utf8_lossy(id).into_owned();
        let length_bytes = stream.read_length_field(&id_text)?;
        let length = String::from_utf8_lossy(&length_bytes).into_owned();
        let declared: usize = length
            .trim()
            .parse()
            .map_err(|_| Error::binary_length(&id_text, format!("length '{length}' is not a number")))?;
        debug!("{} declares {} payload bytes", id_text, declared);
        let payload = stream.pull_raw(&id_text, declared)?;

        let mut raw = Vec::with_capacity(id.len() + length_bytes.len() + declared + 2);
        raw.extend_from_slice(id);
        raw.push(separator);
        raw.extend_from_slice(&length_bytes);
        raw.push(stream.field_separator());
        let payload_start = raw.len();
        raw.extend_from_slice(&payload);

        Ok(Self {
            id: id_text,
            length,
            raw,
            payload_start,
            cursor: 0,
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.raw[self.payload_start..]
    }

    /// The segment as it appeared on the wire, without its terminator
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }
}

impl Tokens for BinaryTokenizer {
    fn next_token(&mut self) -> Option<String> {
        let token = self.token_at(self.cursor)?;
        self.cursor += 1;
        Some(token)
    }

    fn token_at(&self, index: usize) -> Option<String> {
        match index {
            0 => Some(self.id.clone()),
            1 => Some(self.length.clone()),
            2 => Some(String::from_utf8_lossy(self.payload()).into_owned()),
            _ => None,
        }
    }

    fn has_more(&self) -> bool {
        self.cursor < 3
    }

    fn count(&self) -> usize {
        3
    }

    fn rewind(&mut self) {
        self.cursor = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::stream::{CharStream, RawSegment};
    use edi_ir::Delimiters;

    fn read(input: &str) -> Result<(BinaryTokenizer, StreamTokenizer<&[u8]>)> {
        let d = Delimiters::edifact();
        let mut stream = StreamTokenizer::new(CharStream::new(input.as_bytes()), &d);
        match stream.next_segment_with(|id| id == b"BIN")? {
            Some(RawSegment::Binary(t)) => Ok((t, stream)),
            other => panic!("expected a binary segment, got {other:?}"),
        }
    }

    #[test]
    fn test_exact_length() {
        let (t, _) = read("BIN+5+a+b:c'UNT+1'").unwrap();
        assert_eq!(t.payload(), b"a+b:c");
        assert_eq!(t.raw(), b"BIN+5+a+b:c");
        assert_eq!(t.count(), 3);
    }

    #[test]
    fn test_payload_containing_terminator() {
        let (mut t, mut stream) = read("BIN+6+ab'cde'UNT+1'").unwrap();
        assert_eq!(t.payload(), b"ab'cde");
        assert_eq!(t.next_token().as_deref(), Some("BIN"));
        assert_eq!(t.next_token().as_deref(), Some("6"));
        assert_eq!(t.next_token().as_deref(), Some("ab'cde"));
        assert!(!t.has_more());
        assert_eq!(stream.next_segment().unwrap().unwrap(), b"UNT+1");
    }

    #[test]
    fn test_payload_containing_escape_byte() {
        let (t, mut stream) = read("BIN+3+?'b'UNT+1'").unwrap();
        assert_eq!(t.payload(), b"?'b");
        assert_eq!(stream.next_segment().unwrap().unwrap(), b"UNT+1");

        let (t, mut stream) = read("BIN+5+a?b'c'UNT+1'").unwrap();
        assert_eq!(t.payload(), b"a?b'c");
        assert_eq!(stream.next_segment().unwrap().unwrap(), b"UNT+1");

        let (t, _) = read("BIN+2+??'").unwrap();
        assert_eq!(t.payload(), b"??");
    }

    #[test]
    fn test_declared_shorter_than_present_fails() {
        assert!(matches!(read("BIN+2+abcd'"), Err(Error::BinaryLength { .. })));
        assert!(matches!(read("BIN+4+a?b'c'"), Err(Error::BinaryLength { .. })));
    }

    #[test]
    fn test_missing_terminator_after_payload_fails() {
        assert!(matches!(read("BIN+6+ab'cdeX'"), Err(Error::BinaryLength { .. })));
        assert!(matches!(read("BIN+6+ab'"), Err(Error::BinaryLength { .. })));
    }

    #[test]
    fn test_malformed_length_fails() {
        assert!(matches!(read("BIN+X1+ab'"), Err(Error::BinaryLength { .. })));
        assert!(matches!(read("BIN+3'"), Err(Error::BinaryLength { .. })));
        assert!(matches!(read("BIN'"), Err(Error::BinaryLength { .. })));
    }
}
