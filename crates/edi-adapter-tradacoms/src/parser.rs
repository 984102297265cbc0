//! TRADACOMS transmission parser
//!
//! Reads `STX ([BAT] (MHD ... MTR)+ [EOB])+ END`. Messages outside a batch
//! are collected into an implicit functional group.

use crate::envelopes::{self, message_key};
use crate::syntax;
use crate::Result;
use edi_ir::{Envelope, ErrorCode, ErrorLevel, Format, FunctionalGroup, TransactionSet};
use edi_parser::{
    BodyParser, CharStream, DocumentHandler, NullHandler, Outcome, ParseStatus, ParsedDocument, ParserConfig, Tokenizer,
    build_segment, finish_document, missing_trailer, parse_untemplated, resolve_transaction_set, verify_count,
};
use edi_schema::{SchemaLookup, TemplateEnvelope, TemplateSegment};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

const OWNER: &str = "TRADACOMS";

const MESSAGE_BOUNDARY: &[&str] = &["MTR", "MHD", "EOB", "BAT", "END"];

/// Streaming TRADACOMS parser
pub struct TradacomsParser<L> {
    config: ParserConfig,
    lookup: L,
}

impl<L: SchemaLookup> TradacomsParser<L> {
    pub fn new(config: ParserConfig, lookup: L) -> Self {
        Self { config, lookup }
    }

    /// Parse one transmission, reporting structure to `handler`
    ///
    /// # Errors
    ///
    /// I/O failures, a missing STX, malformed binary segments, and the
    /// configured escalations.
    pub fn parse<R: Read, H: DocumentHandler>(&self, input: R, handler: &mut H) -> Result<ParsedDocument> {
        let mut stream = CharStream::new(input);
        let delimiters = syntax::sniff(&mut stream)?;
        let envelope_template = self
            .lookup
            .envelope(Format::Tradacoms)
            .unwrap_or_else(|| Arc::new(envelopes::tradacoms_envelope()));
        let mut transmission = Transmission {
            tokenizer: Tokenizer::from_stream(stream, delimiters, &self.config),
            handler,
            config: &self.config,
            lookup: &self.lookup,
            templates: ControlTemplates::from_envelope(&envelope_template),
            envelope: Envelope::new(Format::Tradacoms, delimiters),
            at_end: false,
        };
        let status = transmission.run()?;
        let Transmission {
            tokenizer, envelope, ..
        } = transmission;
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
    /// See [`TradacomsParser::parse`].
    pub fn parse_document<R: Read>(&self, input: R) -> Result<ParsedDocument> {
        self.parse(input, &mut NullHandler)
    }
}

struct ControlTemplates {
    stx: TemplateSegment,
    end: TemplateSegment,
    bat: TemplateSegment,
    eob: TemplateSegment,
    mhd: TemplateSegment,
    mtr: TemplateSegment,
}

impl ControlTemplates {
    fn from_envelope(envelope: &TemplateEnvelope) -> Self {
        let pick = |slot: &Option<TemplateSegment>, builtin: fn() -> TemplateSegment| {
            slot.clone().unwrap_or_else(builtin)
        };
        Self {
            stx: envelope.header.clone(),
            end: envelope.trailer.clone(),
            bat: pick(&envelope.group_header, envelopes::bat),
            eob: pick(&envelope.group_trailer, envelopes::eob),
            mhd: pick(&envelope.set_header, envelopes::mhd),
            mtr: pick(&envelope.set_trailer, envelopes::mtr),
        }
    }
}

struct Transmission<'p, R, H, L> {
    tokenizer: Tokenizer<R>,
    handler: &'p mut H,
    config: &'p ParserConfig,
    lookup: &'p L,
    templates: ControlTemplates,
    envelope: Envelope,
    at_end: bool,
}

impl<R: Read, H: DocumentHandler, L: SchemaLookup> Transmission<'_, R, H, L> {
    fn advance(&mut self) -> edi_parser::Result<()> {
        self.at_end = !self.tokenizer.next_segment(OWNER)?;
        Ok(())
    }

    fn at(&self, id: &str) -> bool {
        !self.at_end && self.tokenizer.segment_id() == id
    }

    fn unexpected(&mut self, context: &str) {
        let id = self.tokenizer.segment_id().to_string();
        warn!("Unexpected segment {} {} at byte {}", id, context, self.tokenizer.segment_offset());
        self.tokenizer.report_error(
            format!("Segment {id} is not expected {context}"),
            OWNER,
            ErrorCode::UnexpectedSegment,
            Some(&id),
            ErrorLevel::Integrity,
        );
    }

    fn run(&mut self) -> edi_parser::Result<ParseStatus> {
        self.advance()?;
        if !self.at("STX") {
            let found = if self.at_end { "end of input" } else { self.tokenizer.segment_id() };
            return Err(edi_parser::Error::missing_segment("STX", found, self.tokenizer.segment_offset()));
        }
        self.envelope.header = Some(build_segment(&mut self.tokenizer, &self.templates.stx, OWNER));
        if self.handler.start_envelope(&self.envelope).is_halt() {
            return Ok(ParseStatus::Halted);
        }

        self.advance()?;
        while !self.at_end && !self.at("END") {
            let id = self.tokenizer.segment_id().to_string();
            let proceed = match id.as_str() {
                "BAT" => self.batch()?,
                "MHD" => self.implicit_group()?,
                _ => {
                    self.unexpected("between batches");
                    self.advance()?;
                    true
                }
            };
            if !proceed {
                return Ok(ParseStatus::Halted);
            }
        }

        if self.at_end {
            missing_trailer(&mut self.tokenizer, OWNER, "END");
        } else {
            let end = build_segment(&mut self.tokenizer, &self.templates.end, OWNER);
            let messages = self.envelope.transaction_set_count();
            verify_count(&mut self.tokenizer, OWNER, &end, 1, messages);
            self.envelope.trailer = Some(end);
            self.advance()?;
            if !self.at_end {
                self.unexpected("after END");
            }
        }
        if self.handler.end_envelope(&self.envelope).is_halt() {
            return Ok(ParseStatus::Halted);
        }
        Ok(ParseStatus::Completed)
    }

    fn batch(&mut self) -> edi_parser::Result<bool> {
        let bat = build_segment(&mut self.tokenizer, &self.templates.bat, OWNER);
        debug!("Batch {}", bat.text(1).unwrap_or_default());
        let mut group = FunctionalGroup::explicit(bat);
        if self.handler.start_functional_group(&group).is_halt() {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        self.advance()?;
        if !self.messages(&mut group, &["EOB", "BAT", "END"])? {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        if self.at("EOB") {
            let eob = build_segment(&mut self.tokenizer, &self.templates.eob, OWNER);
            verify_count(&mut self.tokenizer, OWNER, &eob, 1, group.transaction_sets.len());
            group.trailer = Some(eob);
            self.advance()?;
        } else {
            missing_trailer(&mut self.tokenizer, OWNER, "EOB");
        }
        let flow = self.handler.end_functional_group(&group);
        self.envelope.groups.push(group);
        Ok(!flow.is_halt())
    }

    fn implicit_group(&mut self) -> edi_parser::Result<bool> {
        let mut group = FunctionalGroup::implicit();
        if self.handler.start_functional_group(&group).is_halt() {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        if !self.messages(&mut group, &["BAT", "END"])? {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        let flow = self.handler.end_functional_group(&group);
        self.envelope.groups.push(group);
        Ok(!flow.is_halt())
    }

    fn messages(&mut self, group: &mut FunctionalGroup, stop: &[&str]) -> edi_parser::Result<bool> {
        while !self.at_end && !stop.contains(&self.tokenizer.segment_id()) {
            if self.at("MHD") {
                let (ts, proceed) = self.message()?;
                group.transaction_sets.push(ts);
                if !proceed {
                    return Ok(false);
                }
            } else {
                self.unexpected("between messages");
                self.advance()?;
            }
        }
        Ok(true)
    }

    /// MHD ... MTR; the flag is false when the handler halted
    fn message(&mut self) -> edi_parser::Result<(TransactionSet, bool)> {
        let first = self.tokenizer.position();
        let mhd = build_segment(&mut self.tokenizer, &self.templates.mhd, OWNER);
        let key = message_key(&mhd, self.envelope.header.as_ref());
        let owner = key.id.clone();
        debug!("Message {} ({})", mhd.text(1).unwrap_or_default(), key);

        let template = resolve_transaction_set(self.lookup, &key, &mut self.tokenizer, self.config, &owner)?;
        let name = template.as_ref().map_or(owner.as_str(), |t| t.name.as_str());
        let mut ts = TransactionSet::new(&owner, name);
        ts.version = key.version;
        ts.sender = key.sender;
        ts.receiver = key.receiver;
        ts.control_number = mhd.text(1).map(str::to_string);
        ts.header = Some(mhd);
        if self.handler.start_transaction_set(&ts).is_halt() {
            return Ok((ts, false));
        }

        let (body, outcome) = match &template {
            Some(template) => {
                let mut body = BodyParser::new(template, self.config.prevalidate);
                let outcome = body.parse_until(&mut self.tokenizer, &mut *self.handler, MESSAGE_BOUNDARY)?;
                (body.finish(), outcome)
            }
            None => parse_untemplated(&mut self.tokenizer, &mut *self.handler, MESSAGE_BOUNDARY, &owner)?,
        };
        ts.body = body;

        match outcome {
            Outcome::Halted => return Ok((ts, false)),
            Outcome::EndOfInput => {
                self.at_end = true;
                missing_trailer(&mut self.tokenizer, &owner, "MTR");
            }
            Outcome::Yielded if self.tokenizer.segment_id() == "MTR" => {
                let mtr = build_segment(&mut self.tokenizer, &self.templates.mtr, &owner);
                let read = self.tokenizer.position() - first + 1;
                verify_count(&mut self.tokenizer, &owner, &mtr, 1, read);
                ts.trailer = Some(mtr);
                self.advance()?;
            }
            Outcome::Yielded => missing_trailer(&mut self.tokenizer, &owner, "MTR"),
        }
        let flow = self.handler.end_transaction_set(&ts);
        Ok((ts, !flow.is_halt()))
    }
}
