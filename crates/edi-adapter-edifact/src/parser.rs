//! EDIFACT interchange parser
//!
//! Reads `[UNA] UNB ([UNG] (UNH ... UNT)+ [UNE])+ UNZ`. Messages outside a
//! UNG/UNE pair are collected into an implicit functional group. Message
//! bodies are handed to the template-driven body parser of `edi-parser`.

use crate::envelopes::{self, MessageIdentifier};
use crate::syntax;
use crate::Result;
use edi_ir::{Envelope, ErrorCode, ErrorLevel, Format, FunctionalGroup, Segment, TransactionSet};
use edi_parser::{
    BodyParser, CharStream, DocumentHandler, NullHandler, Outcome, ParseStatus, ParsedDocument, ParserConfig, Tokenizer,
    build_segment, finish_document, missing_trailer, parse_untemplated, resolve_transaction_set, verify_count,
    verify_reference,
};
use edi_schema::{SchemaLookup, TemplateEnvelope, TemplateSegment};
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

const OWNER: &str = "EDIFACT";

/// Segment ids that end a message body
const MESSAGE_BOUNDARY: &[&str] = &["UNT", "UNH", "UNE", "UNG", "UNZ"];

/// Streaming EDIFACT parser
pub struct EdifactParser<L> {
    config: ParserConfig,
    lookup: L,
}

impl<L: SchemaLookup> EdifactParser<L> {
    pub fn new(config: ParserConfig, lookup: L) -> Self {
        Self { config, lookup }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse one interchange, reporting structure to `handler`
    ///
    /// # Errors
    ///
    /// I/O failures, a missing UNB, malformed binary segments, and the
    /// configured escalations (unknown message with `throw_on_error`, any
    /// recorded error with `fail_on_errors`).
    pub fn parse<R: Read, H: DocumentHandler>(&self, input: R, handler: &mut H) -> Result<ParsedDocument> {
        let mut stream = CharStream::new(input);
        let advice = syntax::sniff(&mut stream)?;
        debug!("EDIFACT delimiters: {:?}", advice.delimiters);
        let mut tokenizer = Tokenizer::from_stream(stream, advice.delimiters, &self.config);
        if let Some(una) = advice.una {
            tokenizer.replay(una, 0);
        }

        let envelope_template = self
            .lookup
            .envelope(Format::Edifact)
            .unwrap_or_else(|| Arc::new(envelopes::edifact_envelope()));
        let mut interchange = Interchange {
            tokenizer,
            handler,
            config: &self.config,
            lookup: &self.lookup,
            templates: ServiceTemplates::from_envelope(&envelope_template),
            envelope: Envelope::new(Format::Edifact, advice.delimiters),
            at_end: false,
        };
        let status = interchange.run()?;
        let Interchange {
            tokenizer, envelope, ..
        } = interchange;
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
    /// See [`EdifactParser::parse`].
    pub fn parse_document<R: Read>(&self, input: R) -> Result<ParsedDocument> {
        self.parse(input, &mut NullHandler)
    }
}

/// Service segment templates, with built-in ones filling gaps in a
/// registered envelope
struct ServiceTemplates {
    una: TemplateSegment,
    unb: TemplateSegment,
    unz: TemplateSegment,
    ung: TemplateSegment,
    une: TemplateSegment,
    unh: TemplateSegment,
    unt: TemplateSegment,
}

impl ServiceTemplates {
    fn from_envelope(envelope: &TemplateEnvelope) -> Self {
        let pick = |slot: &Option<TemplateSegment>, builtin: fn() -> TemplateSegment| {
            slot.clone().unwrap_or_else(builtin)
        };
        Self {
            una: pick(&envelope.service_advice, envelopes::una),
            unb: envelope.header.clone(),
            unz: envelope.trailer.clone(),
            ung: pick(&envelope.group_header, envelopes::ung),
            une: pick(&envelope.group_trailer, envelopes::une),
            unh: pick(&envelope.set_header, envelopes::unh),
            unt: pick(&envelope.set_trailer, envelopes::unt),
        }
    }
}

/// State of one interchange being read
struct Interchange<'p, R, H, L> {
    tokenizer: Tokenizer<R>,
    handler: &'p mut H,
    config: &'p ParserConfig,
    lookup: &'p L,
    templates: ServiceTemplates,
    envelope: Envelope,
    at_end: bool,
}

impl<R: Read, H: DocumentHandler, L: SchemaLookup> Interchange<'_, R, H, L> {
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
        if self.at("UNA") {
            self.envelope.service_advice = Some(build_segment(&mut self.tokenizer, &self.templates.una, OWNER));
            self.advance()?;
        }
        if !self.at("UNB") {
            let found = if self.at_end { "end of input" } else { self.tokenizer.segment_id() };
            return Err(edi_parser::Error::missing_segment("UNB", found, self.tokenizer.segment_offset()));
        }
        self.envelope.header = Some(build_segment(&mut self.tokenizer, &self.templates.unb, OWNER));
        if self.handler.start_envelope(&self.envelope).is_halt() {
            return Ok(ParseStatus::Halted);
        }

        self.advance()?;
        while !self.at_end && !self.at("UNZ") {
            let id = self.tokenizer.segment_id().to_string();
            let proceed = match id.as_str() {
                "UNG" => self.explicit_group()?,
                "UNH" => self.implicit_group()?,
                _ => {
                    self.unexpected("between functional groups");
                    self.advance()?;
                    true
                }
            };
            if !proceed {
                return Ok(ParseStatus::Halted);
            }
        }

        if self.at_end {
            missing_trailer(&mut self.tokenizer, OWNER, "UNZ");
        } else {
            let unz = build_segment(&mut self.tokenizer, &self.templates.unz, OWNER);
            let explicit = self.envelope.groups.iter().filter(|g| !g.implicit).count();
            let count = if explicit > 0 {
                explicit
            } else {
                self.envelope.transaction_set_count()
            };
            let reference = self.envelope.header.as_ref().and_then(|h| h.text(5)).map(str::to_string);
            verify_count(&mut self.tokenizer, OWNER, &unz, 1, count);
            verify_reference(&mut self.tokenizer, OWNER, &unz, 2, reference.as_deref());
            self.envelope.trailer = Some(unz);
            self.advance()?;
            if !self.at_end {
                self.unexpected("after UNZ");
            }
        }
        if self.handler.end_envelope(&self.envelope).is_halt() {
            return Ok(ParseStatus::Halted);
        }
        Ok(ParseStatus::Completed)
    }

    /// UNG ... UNE; false when the handler halted
    fn explicit_group(&mut self) -> edi_parser::Result<bool> {
        let ung = build_segment(&mut self.tokenizer, &self.templates.ung, OWNER);
        let reference = ung.text(5).map(str::to_string);
        debug!("Functional group {}", reference.as_deref().unwrap_or_default());
        let mut group = FunctionalGroup::explicit(ung);
        if self.handler.start_functional_group(&group).is_halt() {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        self.advance()?;
        if !self.messages(&mut group, &["UNE", "UNG", "UNZ"])? {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        if self.at("UNE") {
            let une = build_segment(&mut self.tokenizer, &self.templates.une, OWNER);
            verify_count(&mut self.tokenizer, OWNER, &une, 1, group.transaction_sets.len());
            verify_reference(&mut self.tokenizer, OWNER, &une, 2, reference.as_deref());
            group.trailer = Some(une);
            self.advance()?;
        } else {
            missing_trailer(&mut self.tokenizer, OWNER, "UNE");
        }
        let flow = self.handler.end_functional_group(&group);
        self.envelope.groups.push(group);
        Ok(!flow.is_halt())
    }

    /// Messages without a UNG; false when the handler halted
    fn implicit_group(&mut self) -> edi_parser::Result<bool> {
        let mut group = FunctionalGroup::implicit();
        if self.handler.start_functional_group(&group).is_halt() {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        if !self.messages(&mut group, &["UNG", "UNZ"])? {
            self.envelope.groups.push(group);
            return Ok(false);
        }
        let flow = self.handler.end_functional_group(&group);
        self.envelope.groups.push(group);
        Ok(!flow.is_halt())
    }

    fn messages(&mut self, group: &mut FunctionalGroup, stop: &[&str]) -> edi_parser::Result<bool> {
        while !self.at_end && !stop.contains(&self.tokenizer.segment_id()) {
            if self.at("UNH") {
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

    /// UNH ... UNT; the flag is false when the handler halted
    fn message(&mut self) -> edi_parser::Result<(TransactionSet, bool)> {
        let first = self.tokenizer.position();
        let unh = build_segment(&mut self.tokenizer, &self.templates.unh, OWNER);
        let ident = MessageIdentifier::from_unh(&unh);
        let key = ident.key(self.envelope.header.as_ref());
        let owner = ident.message_type.clone();
        debug!("Message {} ({})", ident.reference.as_deref().unwrap_or_default(), key);

        let template = resolve_transaction_set(self.lookup, &key, &mut self.tokenizer, self.config, &owner)?;
        let name = template.as_ref().map_or(owner.as_str(), |t| t.name.as_str());
        let mut ts = TransactionSet::new(&owner, name);
        ts.version = key.version;
        ts.sender = key.sender;
        ts.receiver = key.receiver;
        ts.test_indicator = key.test_indicator;
        ts.control_number.clone_from(&ident.reference);
        ts.header = Some(unh);
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
                missing_trailer(&mut self.tokenizer, &owner, "UNT");
            }
            Outcome::Yielded if self.tokenizer.segment_id() == "UNT" => {
                let unt = build_segment(&mut self.tokenizer, &self.templates.unt, &owner);
                // every segment read counts, including ones the template rejected
                let read = self.tokenizer.position() - first + 1;
                verify_count(&mut self.tokenizer, &owner, &unt, 1, read);
                verify_reference(&mut self.tokenizer, &owner, &unt, 2, ident.reference.as_deref());
                ts.trailer = Some(unt);
                self.advance()?;
            }
            Outcome::Yielded => missing_trailer(&mut self.tokenizer, &owner, "UNT"),
        }
        let flow = self.handler.end_transaction_set(&ts);
        Ok((ts, !flow.is_halt()))
    }
}

/// The interchange header of a parsed document, if one was read
pub fn interchange_header(envelope: &Envelope) -> Option<&Segment> {
    envelope.header.as_ref().filter(|h| h.id == "UNB")
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::Node;
    use edi_parser::Flow;
    use edi_schema::{SchemaLoader, SchemaRegistry};

    const SCHEMA: &str = r"
transaction_sets:
  - id: ORDERS
    name: Purchase order
    version: D96A
    body:
      - kind: segment
        id: BGM
        required: true
        elements:
          - { position: 1, id: '1001', name: DocumentName, type: AN, max_length: 3 }
          - { position: 2, id: '1004', name: DocumentNumber, type: AN, max_length: 35 }
      - kind: segment
        id: DTM
        max_use: 5
        elements:
          - position: 1
            id: C507
            name: DateTimePeriod
            components:
              - { position: 1, id: '2005', name: Qualifier, type: AN, max_length: 3 }
              - { position: 2, id: '2380', name: Value, type: AN, max_length: 35 }
              - { position: 3, id: '2379', name: Format, type: AN, max_length: 3 }
";

    const ORDERS: &str = "UNB+UNOA:2+SENDER+RECEIVER+240101:1200+REF1'\
UNH+1+ORDERS:D:96A:UN'BGM+220+PO1'DTM+137:20240101:102'UNT+4+1'\
UNH+2+ORDERS:D:96A:UN'BGM+220+PO2'UNT+3+2'\
UNZ+2+REF1'";

    fn parser() -> EdifactParser<SchemaRegistry> {
        let registry = SchemaRegistry::new();
        SchemaLoader::new()
            .load_from_yaml(SCHEMA)
            .unwrap()
            .register(&registry);
        EdifactParser::new(ParserConfig::default(), registry)
    }

    #[test]
    fn test_implicit_group() {
        let doc = parser().parse_document(ORDERS.as_bytes()).unwrap();
        assert!(doc.errors.is_empty(), "{:?}", doc.errors.records());
        assert_eq!(doc.status, ParseStatus::Completed);
        assert_eq!(doc.envelope.groups.len(), 1);
        assert!(doc.envelope.groups[0].implicit);

        let sets: Vec<&TransactionSet> = doc.envelope.transaction_sets().collect();
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].name, "Purchase order");
        assert_eq!(sets[0].version.as_deref(), Some("D96A"));
        assert_eq!(sets[0].sender.as_deref(), Some("SENDER"));
        assert_eq!(sets[1].control_number.as_deref(), Some("2"));
        let dtm = sets[0].body.get("DTM").and_then(Node::as_segment).unwrap();
        assert_eq!(dtm.component(1, 2), Some("20240101"));
    }

    #[test]
    fn test_explicit_group_counts() {
        let text = "UNB+UNOA:2+S+R+240101:1200+9'UNG+ORDERS+S+R+240101:1200+G1+UN+D:96A'\
UNH+1+ORDERS:D:96A:UN'BGM+220'UNT+3+1'UNE+1+G1'UNZ+1+9'";
        let doc = parser().parse_document(text.as_bytes()).unwrap();
        assert!(doc.errors.is_empty(), "{:?}", doc.errors.records());
        let group = &doc.envelope.groups[0];
        assert!(!group.implicit);
        assert_eq!(group.trailer.as_ref().and_then(|t| t.text(2)), Some("G1"));
    }

    #[test]
    fn test_control_mismatches() {
        let text = "UNB+UNOA:2+S+R+240101:1200+REF1'UNH+1+ORDERS:D:96A:UN'BGM+220'UNT+9+2'UNZ+5+REF2'";
        let doc = parser().parse_document(text.as_bytes()).unwrap();
        let codes: Vec<ErrorCode> = doc.errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                ErrorCode::ControlCountMismatch,
                ErrorCode::ControlReferenceMismatch,
                ErrorCode::ControlCountMismatch,
                ErrorCode::ControlReferenceMismatch,
            ]
        );
        assert_eq!(doc.errors.records()[0].segment_id, "UNT");
        assert_eq!(doc.errors.records()[3].segment_id, "UNZ");
    }

    #[test]
    fn test_missing_unb_is_fatal() {
        let err = parser().parse_document(&b"UNH+1+ORDERS:D:96A:UN'"[..]).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Parse(edi_parser::Error::MissingSegment { ref found, .. }) if found == "UNH"
        ));
    }

    #[test]
    fn test_truncated_interchange() {
        let text = "UNB+UNOA:2+S+R+240101:1200+REF1'UNH+1+ORDERS:D:96A:UN'BGM+220'";
        let doc = parser().parse_document(text.as_bytes()).unwrap();
        let missing: Vec<&str> = doc
            .errors
            .with_code(ErrorCode::MissingTrailer)
            .filter_map(|e| e.offending.as_deref())
            .collect();
        assert_eq!(missing, vec!["UNT", "UNZ"]);
        assert_eq!(doc.envelope.transaction_set_count(), 1);
    }

    struct StopAtFirstMessage(usize);

    impl DocumentHandler for StopAtFirstMessage {
        fn end_transaction_set(&mut self, _ts: &TransactionSet) -> Flow {
            self.0 += 1;
            Flow::Halt
        }
    }

    #[test]
    fn test_halt_after_first_message() {
        let mut handler = StopAtFirstMessage(0);
        let doc = parser().parse(ORDERS.as_bytes(), &mut handler).unwrap();
        assert_eq!(handler.0, 1);
        assert_eq!(doc.status, ParseStatus::Halted);
        assert_eq!(doc.envelope.transaction_set_count(), 1);
        assert!(doc.envelope.trailer.is_none());
    }

    struct HaltOnClose;

    impl DocumentHandler for HaltOnClose {
        fn end_envelope(&mut self, _envelope: &Envelope) -> Flow {
            Flow::Halt
        }
    }

    #[test]
    fn test_halt_on_envelope_close() {
        let doc = parser().parse(ORDERS.as_bytes(), &mut HaltOnClose).unwrap();
        assert_eq!(doc.status, ParseStatus::Halted);
        assert_eq!(doc.envelope.transaction_set_count(), 2);
        assert!(doc.envelope.trailer.is_some());
    }

    #[derive(Default)]
    struct SegmentIds(Vec<String>);

    impl DocumentHandler for SegmentIds {
        fn start_segment(&mut self, segment: &Segment) -> Flow {
            self.0.push(segment.id.clone());
            Flow::Continue
        }
    }

    #[test]
    fn test_segment_callbacks_skip_service_segments() {
        let mut handler = SegmentIds::default();
        let doc = parser().parse(ORDERS.as_bytes(), &mut handler).unwrap();
        assert_eq!(doc.status, ParseStatus::Completed);
        assert_eq!(handler.0, vec!["BGM", "DTM", "BGM"]);
        let ts = doc.envelope.transaction_sets().next().unwrap();
        assert_eq!(ts.header.as_ref().map(|h| h.id.as_str()), Some("UNH"));
        assert_eq!(ts.trailer.as_ref().map(|t| t.id.as_str()), Some("UNT"));
    }

    #[test]
    fn test_header_accessor() {
        let doc = parser().parse_document(ORDERS.as_bytes()).unwrap();
        let unb = interchange_header(&doc.envelope).unwrap();
        assert_eq!(unb.component(2, 1), Some("SENDER"));
        assert_eq!(unb.text(5), Some("REF1"));
    }
}
