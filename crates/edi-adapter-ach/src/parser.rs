//! ACH file parser
//!
//! Reads `1 (5 (6 7*)* 8)* 9 [9999...]`. Batch headers of cross-border
//! classes (CBR, PBR) are read with their own layout under the id `5CB`.
//! Control records are checked against what was actually read: record
//! counts, entry hash, debit and credit totals, batch numbers and the
//! block count.

use crate::Result;
use crate::layouts::{
    self, BATCH_NUMBER_RANGE, BLOCKING_FACTOR, CROSS_BORDER_CLASSES, CROSS_BORDER_HEADER, RECORD_WIDTH, SEC_RANGE,
};
use crate::syntax;
use crate::totals::Totals;
use edi_ir::{Envelope, ErrorCode, ErrorLevel, Format, FunctionalGroup, Segment, TransactionSet};
use edi_parser::{
    BodyParser, CharStream, DocumentHandler, NullHandler, Outcome, ParseStatus, ParsedDocument, ParserConfig, Tokenizer,
    build_segment, finish_document, missing_trailer, parse_untemplated, resolve_transaction_set, verify_count,
    verify_reference,
};
use edi_schema::{SchemaLookup, TemplateEnvelope, TemplateSegment, TransactionSetKey};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

const OWNER: &str = "ACH";

const BATCH_BOUNDARY: &[&str] = &["8", "5", "9"];

/// Streaming ACH parser
pub struct AchParser<L> {
    config: ParserConfig,
    lookup: L,
}

impl<L: SchemaLookup> AchParser<L> {
    pub fn new(config: ParserConfig, lookup: L) -> Self {
        Self { config, lookup }
    }

    /// Parse one ACH file, reporting structure to `handler`
    ///
    /// # Errors
    ///
    /// I/O failures, a missing file header record, and the configured
    /// escalations.
    pub fn parse<R: Read, H: DocumentHandler>(&self, input: R, handler: &mut H) -> Result<ParsedDocument> {
        let mut stream = CharStream::new(input);
        let delimiters = syntax::sniff(&mut stream)?;
        let envelope_template = self
            .lookup
            .envelope(Format::Ach)
            .unwrap_or_else(|| Arc::new(layouts::ach_envelope()));
        let mut file = AchFile {
            tokenizer: Tokenizer::from_stream(stream, delimiters, &self.config).fixed_width(RECORD_WIDTH),
            handler,
            config: &self.config,
            lookup: &self.lookup,
            templates: RecordTemplates::from_envelope(&envelope_template),
            envelope: Envelope::new(Format::Ach, delimiters),
            at_end: false,
            entries: 0,
            totals: Totals::default(),
            totals_known: true,
        };
        let status = file.run()?;
        let AchFile {
            tokenizer, envelope, ..
        } = file;
        Ok(finish_document(
            envelope,
            tokenizer.into_errors(),
            status,
            &self.config,
            Some(&envelope_template),
            &self.lookup,
        )?)
    }

    /// Parse without structure notifications
    ///
    /// # Errors
    ///
    /// See [`AchParser::parse`].
    pub fn parse_document<R: Read>(&self, input: R) -> Result<ParsedDocument> {
        self.parse(input, &mut NullHandler)
    }
}

struct RecordTemplates {
    file_header: TemplateSegment,
    file_control: TemplateSegment,
    batch_header: TemplateSegment,
    cross_border_header: TemplateSegment,
    batch_control: TemplateSegment,
}

impl RecordTemplates {
    fn from_envelope(envelope: &TemplateEnvelope) -> Self {
        Self {
            file_header: envelope.header.clone(),
            file_control: envelope.trailer.clone(),
            batch_header: envelope.set_header.clone().unwrap_or_else(layouts::batch_header),
            cross_border_header: layouts::cross_border_batch_header(),
            batch_control: envelope.set_trailer.clone().unwrap_or_else(layouts::batch_control),
        }
    }
}

struct AchFile<'p, R, H, L> {
    tokenizer: Tokenizer<R>,
    handler: &'p mut H,
    config: &'p ParserConfig,
    lookup: &'p L,
    templates: RecordTemplates,
    envelope: Envelope,
    at_end: bool,
    /// Entry and addenda records of the closed batches
    entries: usize,
    totals: Totals,
    /// False once a batch without a template was read
    totals_known: bool,
}

impl<R: Read, H: DocumentHandler, L: SchemaLookup> AchFile<'_, R, H, L> {
    fn advance(&mut self) -> edi_parser::Result<()> {
        self.at_end = !self.tokenizer.next_segment(OWNER)?;
        Ok(())
    }

    fn at(&self, id: &str) -> bool {
        !self.at_end && self.tokenizer.segment_id() == id
    }

    /// Text of the current raw record at a byte range
    fn raw_field(&self, range: std::ops::Range<usize>) -> String {
        let raw = self.tokenizer.raw_segment();
        let bytes = raw.get(range.start.min(raw.len())..range.end.min(raw.len())).unwrap_or_default();
        String::from_utf8_lossy(bytes).trim().to_string()
    }

    fn unexpected(&mut self, context: &str) {
        let id = self.tokenizer.segment_id().to_string();
        warn!("Unexpected record {} {} at byte {}", id, context, self.tokenizer.segment_offset());
        self.tokenizer.report_error(
            format!("Record type {id} is not expected {context}"),
            OWNER,
            ErrorCode::UnexpectedSegment,
            Some(&id),
            ErrorLevel::Integrity,
        );
    }

    fn run(&mut self) -> edi_parser::Result<ParseStatus> {
        self.advance()?;
        if !self.at("1") {
            let found = if self.at_end { "end of input" } else { self.tokenizer.segment_id() };
            return Err(edi_parser::Error::missing_segment("1", found, self.tokenizer.segment_offset()));
        }
        self.envelope.header = Some(build_segment(&mut self.tokenizer, &self.templates.file_header, OWNER));
        if self.handler.start_envelope(&self.envelope).is_halt() {
            return Ok(ParseStatus::Halted);
        }

        self.advance()?;
        let mut group = FunctionalGroup::implicit();
        if self.handler.start_functional_group(&group).is_halt() {
            self.envelope.groups.push(group);
            return Ok(ParseStatus::Halted);
        }
        while !self.at_end && !self.at("9") {
            if self.at("5") {
                let (batch, proceed) = self.batch()?;
                group.transaction_sets.push(batch);
                if !proceed {
                    self.envelope.groups.push(group);
                    return Ok(ParseStatus::Halted);
                }
            } else {
                self.unexpected("between batches");
                self.advance()?;
            }
        }
        let flow = self.handler.end_functional_group(&group);
        self.envelope.groups.push(group);
        if flow.is_halt() {
            return Ok(ParseStatus::Halted);
        }

        if self.at_end {
            missing_trailer(&mut self.tokenizer, OWNER, "9");
        } else {
            self.file_control();
            self.advance()?;
            while !self.at_end {
                if self.tokenizer.raw_segment().iter().all(|&b| b == b'9') {
                    debug!("Skipping filler record at byte {}", self.tokenizer.segment_offset());
                } else {
                    self.unexpected("after the file control record");
                }
                self.advance()?;
            }
        }
        if self.handler.end_envelope(&self.envelope).is_halt() {
            return Ok(ParseStatus::Halted);
        }
        Ok(ParseStatus::Completed)
    }

    fn file_control(&mut self) {
        let control = build_segment(&mut self.tokenizer, &self.templates.file_control, OWNER);
        let batches = self.envelope.transaction_set_count();
        let blocks = self.tokenizer.position().div_ceil(BLOCKING_FACTOR);
        let t = &mut self.tokenizer;
        verify_count(t, OWNER, &control, 2, batches);
        verify_count(t, OWNER, &control, 3, blocks);
        verify_count(t, OWNER, &control, 4, self.entries);
        if self.totals_known {
            verify_count(t, OWNER, &control, 5, self.totals.entry_hash);
            verify_count(t, OWNER, &control, 6, self.totals.debits);
            verify_count(t, OWNER, &control, 7, self.totals.credits);
        }
        self.envelope.trailer = Some(control);
    }

    /// Batch header, entries and batch control; the flag is false when the handler halted
    fn batch(&mut self) -> edi_parser::Result<(TransactionSet, bool)> {
        let first = self.tokenizer.position();
        let entry_class = self.raw_field(SEC_RANGE);
        let batch_number = self.raw_field(BATCH_NUMBER_RANGE);
        let header = if CROSS_BORDER_CLASSES.contains(&entry_class.as_str()) {
            self.tokenizer.override_segment_id(CROSS_BORDER_HEADER);
            build_segment(&mut self.tokenizer, &self.templates.cross_border_header, OWNER)
        } else {
            build_segment(&mut self.tokenizer, &self.templates.batch_header, OWNER)
        };
        let key = batch_key(&entry_class, self.envelope.header.as_ref());
        let owner = key.id.clone();
        debug!("Batch {} ({})", batch_number, key);

        let template = resolve_transaction_set(self.lookup, &key, &mut self.tokenizer, self.config, &owner)?;
        let name = template.as_ref().map_or(owner.as_str(), |t| t.name.as_str());
        let mut batch = TransactionSet::new(&owner, name);
        batch.sender = key.sender;
        batch.receiver = key.receiver;
        batch.control_number = Some(batch_number);
        batch.header = Some(header);
        if self.handler.start_transaction_set(&batch).is_halt() {
            return Ok((batch, false));
        }

        let (body, outcome) = match &template {
            Some(template) => {
                let mut body = BodyParser::new(template, self.config.prevalidate);
                let outcome = body.parse_until(&mut self.tokenizer, &mut *self.handler, BATCH_BOUNDARY)?;
                (body.finish(), outcome)
            }
            None => parse_untemplated(&mut self.tokenizer, &mut *self.handler, BATCH_BOUNDARY, &owner)?,
        };
        batch.body = body;

        match outcome {
            Outcome::Halted => return Ok((batch, false)),
            Outcome::EndOfInput => {
                self.at_end = true;
                missing_trailer(&mut self.tokenizer, &owner, "8");
            }
            Outcome::Yielded if self.tokenizer.segment_id() == "8" => {
                let control = build_segment(&mut self.tokenizer, &self.templates.batch_control, &owner);
                self.batch_control(&mut batch, control, first, template.is_some());
                self.advance()?;
            }
            Outcome::Yielded => missing_trailer(&mut self.tokenizer, &owner, "8"),
        }
        let flow = self.handler.end_transaction_set(&batch);
        Ok((batch, !flow.is_halt()))
    }

    /// Entry hash and amounts need the entries' fields, so only a batch read
    /// with a template has them checked
    fn batch_control(&mut self, batch: &mut TransactionSet, control: Segment, first: usize, templated: bool) {
        let records = self.tokenizer.position() - first - 1;
        let owner = batch.id.as_str();
        let t = &mut self.tokenizer;
        verify_count(t, owner, &control, 3, records);
        if templated {
            let totals = Totals::of(batch);
            verify_count(t, owner, &control, 4, totals.entry_hash);
            verify_count(t, owner, &control, 5, totals.debits);
            verify_count(t, owner, &control, 6, totals.credits);
            self.totals.add(totals);
        } else {
            self.totals_known = false;
        }
        verify_reference(t, owner, &control, 11, batch.control_number.as_deref());
        self.entries += records;
        batch.trailer = Some(control);
    }
}

/// Template lookup key for a batch: its entry class, with origin and destination
fn batch_key(entry_class: &str, file_header: Option<&Segment>) -> TransactionSetKey {
    let key = TransactionSetKey::new(entry_class);
    let party = |position| file_header.and_then(|h| h.text(position)).map(str::trim);
    match (party(4), party(3)) {
        (Some(origin), Some(destination)) => key.with_parties(origin, destination),
        _ => key,
    }
}
