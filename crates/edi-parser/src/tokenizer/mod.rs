//! Tokenizers and the segment/element cursor the parsers drive

pub mod binary;
pub mod data;
pub mod stream;

pub use binary::BinaryTokenizer;
pub use data::{DataTokenizer, FixedTokenizer, Tokens};
pub use stream::{CharStream, RawSegment, StreamTokenizer};

use crate::{ParserConfig, Result};
use edi_ir::{Delimiters, DocumentErrors, ErrorCode, ErrorLevel, ErrorRecord};
use std::collections::VecDeque;
use std::io::Read;
use tracing::trace;

/// Where the facade's cursors currently stand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    BetweenSegments,
    /// Positioned on the segment id, no data element fetched yet
    BeforeFirstElement,
    MidElements,
    /// Every element of the segment has been fetched
    Exhausted,
}

#[derive(Debug, Clone)]
enum SegmentCursor {
    Data(DataTokenizer),
    Binary(BinaryTokenizer),
    Fixed(FixedTokenizer),
}

impl SegmentCursor {
    fn tokens(&self) -> &dyn Tokens {
        match self {
            SegmentCursor::Data(t) => t,
            SegmentCursor::Binary(t) => t,
            SegmentCursor::Fixed(t) => t,
        }
    }

    fn tokens_mut(&mut self) -> &mut dyn Tokens {
        match self {
            SegmentCursor::Data(t) => t,
            SegmentCursor::Binary(t) => t,
            SegmentCursor::Fixed(t) => t,
        }
    }
}

/// Single-cursor view of a document: one current segment, one current element
///
/// Segment positions are 1-based and never reset; element position 0 is the
/// segment id. Every error reported through [`Tokenizer::report_error`] is
/// stamped with the current segment position, id and byte offset.
pub struct Tokenizer<R> {
    stream: StreamTokenizer<R>,
    delimiters: Delimiters,
    config: ParserConfig,
    errors: DocumentErrors,
    pending: VecDeque<(Vec<String>, usize)>,
    fixed: bool,
    raw: Vec<u8>,
    cursor: Option<SegmentCursor>,
    segment_id: String,
    segment_offset: usize,
    position: usize,
    element_position: usize,
    current: String,
    element_ready: bool,
}

impl<R: Read> Tokenizer<R> {
    pub fn new(reader: R, delimiters: Delimiters, config: &ParserConfig) -> Self {
        Self::from_stream(CharStream::new(reader), delimiters, config)
    }

    /// Wrap a stream a delimiter sniffer has already peeked into
    pub fn from_stream(stream: CharStream<R>, delimiters: Delimiters, config: &ParserConfig) -> Self {
        Self {
            stream: StreamTokenizer::new(stream, &delimiters),
            delimiters,
            config: config.clone(),
            errors: DocumentErrors::new(config.error_level),
            pending: VecDeque::new(),
            fixed: false,
            raw: Vec::new(),
            cursor: None,
            segment_id: String::new(),
            segment_offset: 0,
            position: 0,
            element_position: 0,
            current: String::new(),
            element_ready: false,
        }
    }

    /// Read fixed-width records; the id is the record's first byte
    pub fn fixed_width(mut self, width: usize) -> Self {
        self.stream = self.stream.fixed_width(width);
        self.fixed = true;
        self
    }

    /// Queue an already split segment to be returned before anything is read
    ///
    /// Used for service segments whose text cannot be tokenized with the
    /// delimiters they define (UNA).
    pub fn replay(&mut self, tokens: Vec<String>, offset: usize) {
        self.pending.push_back((tokens, offset));
    }

    /// Advance to the next segment; `false` at end of input
    ///
    /// Zero-length segments are reported against `owner` and skipped without
    /// taking a position.
    ///
    /// # Errors
    ///
    /// I/O failures and malformed binary segments.
    pub fn next_segment(&mut self, owner: &str) -> Result<bool> {
        if let Some((tokens, offset)) = self.pending.pop_front() {
            self.raw = tokens.join("").into_bytes();
            self.begin(SegmentCursor::Fixed(FixedTokenizer::new(tokens)), offset);
            return Ok(true);
        }
        loop {
            let offset = self.stream.skip_line_breaks()?;
            let config = &self.config;
            let next = self
                .stream
                .next_segment_with(|id| std::str::from_utf8(id).is_ok_and(|id| config.is_binary_segment(id)))?;
            let cursor = match next {
                None => {
                    self.cursor = None;
                    self.segment_id.clear();
                    self.current.clear();
                    return Ok(false);
                }
                Some(RawSegment::Text(raw)) if raw.is_empty() => {
                    let record = ErrorRecord::new(
                        ErrorCode::ZeroLengthSegment,
                        ErrorLevel::Integrity,
                        "Zero-length segment",
                    )
                    .at(self.position + 1, "", offset)
                    .in_container(owner);
                    self.errors.add(record);
                    continue;
                }
                Some(RawSegment::Text(raw)) => {
                    let cursor = self.tokenize(&raw);
                    self.raw = raw;
                    cursor
                }
                Some(RawSegment::Binary(binary)) => {
                    self.raw = binary.raw().to_vec();
                    SegmentCursor::Binary(binary)
                }
            };
            self.begin(cursor, offset);
            return Ok(true);
        }
    }

    fn tokenize(&self, raw: &[u8]) -> SegmentCursor {
        if self.fixed {
            let id = String::from_utf8_lossy(&raw[..1]).into_owned();
            let record = String::from_utf8_lossy(raw).into_owned();
            return SegmentCursor::Fixed(FixedTokenizer::new(vec![id, record]));
        }
        SegmentCursor::Data(DataTokenizer::segment(raw, &self.delimiters))
    }

    fn begin(&mut self, mut cursor: SegmentCursor, offset: usize) {
        self.segment_id = cursor.tokens_mut().next_token().unwrap_or_default();
        self.cursor = Some(cursor);
        self.position += 1;
        self.segment_offset = offset;
        self.element_position = 0;
        self.current.clone_from(&self.segment_id);
        self.element_ready = false;
        trace!(position = self.position, offset, "segment {}", self.segment_id);
    }

    pub fn bytes_consumed(&self) -> usize {
        self.stream.bytes_consumed()
    }
}

impl<R> Tokenizer<R> {
    /// Advance to the next data element; empty once the segment is exhausted
    pub fn next_data_element(&mut self) -> &str {
        let next = self
            .cursor
            .as_mut()
            .and_then(|c| c.tokens_mut().next_token());
        match next {
            Some(token) => {
                self.element_position += 1;
                self.current = token;
            }
            None => self.current.clear(),
        }
        self.element_ready = true;
        &self.current
    }

    /// The element most recently fetched (the id before any fetch)
    pub fn current_data_element(&self) -> &str {
        &self.current
    }

    /// False until [`Tokenizer::next_data_element`] has been called for this segment
    pub fn is_element_ready(&self) -> bool {
        self.element_ready
    }

    pub fn has_more_elements(&self) -> bool {
        self.cursor.as_ref().is_some_and(|c| c.tokens().has_more())
    }

    /// Element at a 1-based position (0 is the id), without moving the cursor
    pub fn element_at(&self, position: usize) -> Option<String> {
        self.cursor.as_ref()?.tokens().token_at(position)
    }

    /// Number of data elements in the current segment, excluding the id
    pub fn element_count(&self) -> usize {
        self.cursor
            .as_ref()
            .map_or(0, |c| c.tokens().count().saturating_sub(1))
    }

    /// Rewind to the state right after [`Tokenizer::next_segment`]
    pub fn reset_segment(&mut self) {
        if let Some(cursor) = self.cursor.as_mut() {
            let tokens = cursor.tokens_mut();
            tokens.rewind();
            tokens.next_token();
        }
        self.element_position = 0;
        self.current.clone_from(&self.segment_id);
        self.element_ready = false;
    }

    /// Split the current element on the component separator
    pub fn make_subfield_tokenizer(&self) -> DataTokenizer {
        DataTokenizer::components(&self.current, &self.delimiters)
    }

    /// Re-split a fixed-width record into fields of the given widths
    ///
    /// Field 1 starts at the record's first byte. The cursor is rewound.
    pub fn apply_layout(&mut self, widths: &[usize]) {
        if matches!(self.cursor, Some(SegmentCursor::Fixed(_))) {
            let mut fixed = FixedTokenizer::fixed_width(&self.segment_id, &self.raw, widths);
            fixed.next_token();
            self.cursor = Some(SegmentCursor::Fixed(fixed));
            self.element_position = 0;
            self.current.clone_from(&self.segment_id);
            self.element_ready = false;
        }
    }

    /// Run `f` with the current fixed-width record cut into fields of the
    /// given widths, then put the record back as it was and rewind
    pub fn with_layout<T>(&mut self, widths: &[usize], f: impl FnOnce(&mut Self) -> T) -> T {
        let saved = self.cursor.clone();
        self.apply_layout(widths);
        let out = f(self);
        self.cursor = saved;
        self.reset_segment();
        out
    }

    /// Replace the id the current segment is known by
    pub fn override_segment_id(&mut self, id: impl Into<String>) {
        self.segment_id = id.into();
        if self.element_position == 0 {
            self.current.clone_from(&self.segment_id);
        }
    }

    /// Binary payload of the current segment, if it is a binary segment
    pub fn current_binary(&self) -> Option<&[u8]> {
        match self.cursor.as_ref()? {
            SegmentCursor::Binary(b) => Some(b.payload()),
            _ => None,
        }
    }

    pub fn state(&self) -> CursorState {
        let Some(cursor) = self.cursor.as_ref() else {
            return CursorState::BetweenSegments;
        };
        if !self.element_ready {
            CursorState::BeforeFirstElement
        } else if cursor.tokens().has_more() {
            CursorState::MidElements
        } else {
            CursorState::Exhausted
        }
    }

    /// Record a soft error at the current segment
    ///
    /// Returns false when the level filter dropped it.
    pub fn report_error(
        &mut self,
        description: impl Into<String>,
        owner: &str,
        code: ErrorCode,
        offending: Option<&str>,
        level: ErrorLevel,
    ) -> bool {
        let mut record = ErrorRecord::new(code, level, description)
            .at(self.position, self.segment_id.clone(), self.segment_offset)
            .in_container(owner);
        if let Some(offending) = offending {
            record = record.with_offending(offending);
        }
        self.errors.add(record)
    }

    pub fn unescape(&self, text: &str) -> String {
        self.delimiters.unescape(text)
    }

    pub fn segment_id(&self) -> &str {
        &self.segment_id
    }

    /// 1-based position of the current segment
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn element_position(&self) -> usize {
        self.element_position
    }

    /// Byte offset at which the current segment starts
    pub fn segment_offset(&self) -> usize {
        self.segment_offset
    }

    /// Text of the current segment as read, without its terminator
    pub fn raw_segment(&self) -> &[u8] {
        &self.raw
    }

    /// True when records are fixed-width and fields are cut by [`Tokenizer::apply_layout`]
    pub fn is_fixed_width(&self) -> bool {
        self.fixed
    }

    pub fn delimiters(&self) -> &Delimiters {
        &self.delimiters
    }

    pub fn errors(&self) -> &DocumentErrors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut DocumentErrors {
        &mut self.errors
    }

    pub fn into_errors(self) -> DocumentErrors {
        self.errors
    }
}
