//! Byte stream with pushback, and the segment reader built on it

use super::binary::BinaryTokenizer;
use crate::{Error, Result};
use edi_ir::Delimiters;
use std::io::{BufReader, Read};
use tracing::trace;

/// Buffered byte source with unlimited pushback and a consumed-byte count
pub struct CharStream<R> {
    reader: BufReader<R>,
    pushback: Vec<u8>,
    consumed: usize,
}

impl<R: Read> CharStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            pushback: Vec::new(),
            consumed: 0,
        }
    }

    /// Next byte, or `None` at end of input
    ///
    /// # Errors
    ///
    /// Propagates read failures from the underlying reader.
    pub fn next_byte(&mut self) -> Result<Option<u8>> {
        if let Some(b) = self.pushback.pop() {
            self.consumed += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.reader.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.consumed += 1;
                    return Ok(Some(buf[0]));
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    /// Return bytes to the stream; they are read again in the given order
    pub fn push_back(&mut self, bytes: &[u8]) {
        self.pushback.extend(bytes.iter().rev());
        self.consumed = self.consumed.saturating_sub(bytes.len());
    }

    /// Look at up to `n` bytes without consuming them
    ///
    /// # Errors
    ///
    /// Propagates read failures from the underlying reader.
    pub fn peek(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            match self.next_byte()? {
                Some(b) => out.push(b),
                None => break,
            }
        }
        self.push_back(&out);
        Ok(out)
    }

    /// Bytes handed out so far, net of pushback
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// One segment as the stream tokenizer returned it
#[derive(Debug, Clone)]
pub enum RawSegment {
    /// Segment text without its terminator
    Text(Vec<u8>),
    /// A segment whose payload was read raw, escapes and delimiters included
    Binary(BinaryTokenizer),
}

impl RawSegment {
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            RawSegment::Text(text) => text,
            RawSegment::Binary(binary) => binary.raw().to_vec(),
        }
    }
}

/// Reads one segment at a time from a [`CharStream`]
pub struct StreamTokenizer<R> {
    stream: CharStream<R>,
    segment: u8,
    field: u8,
    tag: Option<u8>,
    escape: Option<u8>,
    skip: Option<u8>,
    record_width: Option<usize>,
    last_terminator: Vec<u8>,
}

impl<R: Read> StreamTokenizer<R> {
    pub fn new(stream: CharStream<R>, delimiters: &Delimiters) -> Self {
        Self {
            stream,
            segment: delimiters.segment,
            field: delimiters.field,
            tag: delimiters.tag,
            escape: delimiters.escape,
            skip: delimiters.skip,
            record_width: None,
            last_terminator: Vec::new(),
        }
    }

    /// Read fixed-width records instead of delimiter-terminated segments
    pub fn fixed_width(mut self, width: usize) -> Self {
        self.record_width = Some(width);
        self
    }

    pub fn set_delimiters(&mut self, delimiters: &Delimiters) {
        self.segment = delimiters.segment;
        self.field = delimiters.field;
        self.tag = delimiters.tag;
        self.escape = delimiters.escape;
        self.skip = delimiters.skip;
    }

    /// Bytes that ended the last segment (terminator plus any skipped byte)
    pub fn last_terminator(&self) -> &[u8] {
        &self.last_terminator
    }

    pub fn bytes_consumed(&self) -> usize {
        self.stream.consumed()
    }

    /// Offset at which the next segment's text starts, after line breaks
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn skip_line_breaks(&mut self) -> Result<usize> {
        let keeps_terminator = self.record_width.is_none();
        while let Some(b) = self.stream.next_byte()? {
            let line_break = b == b'\r' || b == b'\n' || Some(b) == self.skip;
            if !line_break || (keeps_terminator && b == self.segment) {
                self.stream.push_back(&[b]);
                break;
            }
        }
        Ok(self.stream.consumed())
    }

    /// Raw text of the next segment without its terminator; `None` at end of input
    ///
    /// An escaped segment terminator is taken as data and its escape marker
    /// dropped; any other escape pair is kept for the field tokenizer.
    ///
    /// # Errors
    ///
    /// Propagates read failures.
    pub fn next_segment(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.next_segment_with(|_| false)?.map(RawSegment::into_bytes))
    }

    /// Like [`StreamTokenizer::next_segment`], but a segment whose id satisfies
    /// `is_binary` is handed to [`BinaryTokenizer::read`] as soon as its id is
    /// complete, so its length and payload never go through escape handling.
    ///
    /// # Errors
    ///
    /// Read failures, and [`Error::BinaryLength`] for a malformed binary segment.
    pub fn next_segment_with(&mut self, is_binary: impl Fn(&[u8]) -> bool) -> Result<Option<RawSegment>> {
        self.skip_line_breaks()?;
        if let Some(width) = self.record_width {
            return Ok(self.next_record(width)?.map(RawSegment::Text));
        }
        self.last_terminator.clear();
        let mut text = Vec::new();
        let mut in_id = true;
        loop {
            let Some(b) = self.stream.next_byte()? else {
                if in_id && is_binary(&text) {
                    return Err(Error::binary_length(String::from_utf8_lossy(&text), "missing length field"));
                }
                return Ok(if text.is_empty() { None } else { Some(RawSegment::Text(text)) });
            };
            if Some(b) == self.escape {
                match self.stream.next_byte()? {
                    Some(next) if next == self.segment => text.push(next),
                    Some(next) => {
                        text.push(b);
                        text.push(next);
                    }
                    None => text.push(b),
                }
            } else if b == self.segment {
                if in_id && is_binary(&text) {
                    return Err(Error::binary_length(String::from_utf8_lossy(&text), "missing length field"));
                }
                self.terminate(b)?;
                trace!("segment of {} bytes", text.len());
                return Ok(Some(RawSegment::Text(text)));
            } else if in_id && (b == self.field || Some(b) == self.tag) {
                in_id = false;
                if is_binary(&text) {
                    let binary = BinaryTokenizer::read(&text, b, self)?;
                    trace!("binary segment of {} bytes", binary.raw().len());
                    return Ok(Some(RawSegment::Binary(binary)));
                }
                text.push(b);
            } else {
                text.push(b);
            }
        }
    }

    /// Bytes up to the next field separator, which is consumed
    ///
    /// # Errors
    ///
    /// [`Error::BinaryLength`] when the segment or the input ends first.
    pub fn read_length_field(&mut self, segment_id: &str) -> Result<Vec<u8>> {
        let mut length = Vec::new();
        loop {
            match self.stream.next_byte()? {
                Some(b) if b == self.field => return Ok(length),
                Some(b) if b == self.segment => {
                    return Err(Error::binary_length(segment_id, "segment ends before the payload"));
                }
                Some(b) => length.push(b),
                None => return Err(Error::binary_length(segment_id, "input ended in the length field")),
            }
        }
    }

    pub fn field_separator(&self) -> u8 {
        self.field
    }

    fn next_record(&mut self, width: usize) -> Result<Option<Vec<u8>>> {
        self.last_terminator.clear();
        let mut record = Vec::with_capacity(width);
        while record.len() < width {
            match self.stream.next_byte()? {
                None => break,
                Some(b'\r' | b'\n') if !record.is_empty() => {
                    self.last_terminator.push(b'\n');
                    break;
                }
                Some(b) => record.push(b),
            }
        }
        Ok(if record.is_empty() { None } else { Some(record) })
    }

    fn terminate(&mut self, terminator: u8) -> Result<()> {
        self.last_terminator.clear();
        self.last_terminator.push(terminator);
        if let Some(skip) = self.skip {
            match self.stream.next_byte()? {
                Some(b) if b == skip => self.last_terminator.push(b),
                Some(b) => self.stream.push_back(&[b]),
                None => {}
            }
        }
        Ok(())
    }

    /// Read exactly `n` raw bytes, then require and consume the segment terminator
    ///
    /// # Errors
    ///
    /// [`Error::BinaryLength`] when the input ends early or the byte after the
    /// payload is not the segment terminator.
    pub fn pull_raw(&mut self, segment_id: &str, n: usize) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(n);
        while bytes.len() < n {
            match self.stream.next_byte()? {
                Some(b) => bytes.push(b),
                None => {
                    return Err(Error::binary_length(
                        segment_id,
                        format!("input ended {} bytes short of the declared length", n - bytes.len()),
                    ));
                }
            }
        }
        match self.stream.next_byte()? {
            Some(b) if b == self.segment => self.terminate(b)?,
            Some(b) => {
                return Err(Error::binary_length(
                    segment_id,
                    format!("expected segment terminator after payload, found byte 0x{b:02X}"),
                ));
            }
            None => {
                return Err(Error::binary_length(
                    segment_id,
                    "input ended before the segment terminator",
                ));
            }
        }
        Ok(bytes)
    }

    pub fn stream_mut(&mut self) -> &mut CharStream<R> {
        &mut self.stream
    }
}
