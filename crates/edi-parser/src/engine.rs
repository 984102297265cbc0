//! Template-driven parsing of a transaction-set body
//!
//! The parser keeps a stack of open containers (the body itself, tables and
//! loop iterations). Each incoming segment is offered to the innermost open
//! container first and then outward; within a container only templates at or
//! after the last one used are eligible, and templates that already reached
//! their maximum use are skipped. When several templates accept the same
//! segment id, the matcher decides by content. A segment nobody accepts is
//! handed back to the caller.

use crate::handler::{DocumentHandler, Flow};
use crate::matcher::{Verdict, is_this_you};
use crate::tokenizer::{Tokenizer, Tokens};
use crate::Result;
use edi_ir::{Children, CompositeElement, DataElement, ErrorCode, ErrorLevel, Field, Group, Node, Segment};
use edi_schema::{DataType, ElementContainer, TemplateElement, TemplateNode, TemplateSegment, TemplateTransactionSet};
use std::io::Read;
use tracing::debug;

/// Why a parse call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The tokenizer stands on a segment this body does not accept
    Yielded,
    EndOfInput,
    /// A handler asked to stop
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Body,
    Table,
    Loop,
}

#[derive(Debug)]
struct Frame<'t> {
    children: &'t [TemplateNode],
    next: usize,
    counts: Vec<usize>,
    group: Group,
    kind: FrameKind,
    path: String,
}

impl<'t> Frame<'t> {
    fn new(children: &'t [TemplateNode], group: Group, kind: FrameKind, path: String) -> Self {
        Self {
            children,
            next: 0,
            counts: vec![0; children.len()],
            group,
            kind,
            path,
        }
    }

    /// Templates that may take a segment with this id, in template order
    fn candidates(&self, segment_id: &str) -> Vec<usize> {
        (self.next..self.children.len())
            .filter(|&i| self.counts[i] < self.children[i].max_use() && self.children[i].accepts(segment_id))
            .collect()
    }
}

/// Resumable parser for one transaction-set body
#[derive(Debug)]
pub struct BodyParser<'t> {
    prevalidate: bool,
    stack: Vec<Frame<'t>>,
}

impl<'t> BodyParser<'t> {
    pub fn new(template: &'t TemplateTransactionSet, prevalidate: bool) -> Self {
        let root = Frame::new(
            &template.tables,
            Group::new(&template.id, &template.name),
            FrameKind::Body,
            template.id.clone(),
        );
        Self {
            prevalidate,
            stack: vec![root],
        }
    }

    /// Path of the innermost open container, used as error owner
    pub fn path(&self) -> &str {
        self.stack.last().map_or("", |f| f.path.as_str())
    }

    /// Read and place segments until one is not accepted
    ///
    /// # Errors
    ///
    /// Fatal tokenizer conditions (I/O, malformed binary segments).
    pub fn parse<R: Read, H: DocumentHandler>(
        &mut self,
        tokenizer: &mut Tokenizer<R>,
        handler: &mut H,
    ) -> Result<Outcome> {
        loop {
            if !tokenizer.next_segment(self.path())? {
                return Ok(Outcome::EndOfInput);
            }
            let Some((level, index)) = self.locate(tokenizer) else {
                debug!("{} yields at {}", self.path(), tokenizer.segment_id());
                return Ok(Outcome::Yielded);
            };
            if self.enter(level, index, tokenizer, handler).is_halt() {
                return Ok(Outcome::Halted);
            }
        }
    }

    /// Skip the segment the tokenizer stands on and keep parsing
    ///
    /// # Errors
    ///
    /// As [`BodyParser::parse`].
    pub fn continue_parse<R: Read, H: DocumentHandler>(
        &mut self,
        tokenizer: &mut Tokenizer<R>,
        handler: &mut H,
    ) -> Result<Outcome> {
        self.parse(tokenizer, handler)
    }

    /// Parse until a segment in `boundary` (or the end of input) is reached
    ///
    /// Any other segment the body does not accept is reported as unrecognized
    /// or out of place, with its byte offset, and parsing resumes after it.
    ///
    /// # Errors
    ///
    /// As [`BodyParser::parse`].
    pub fn parse_until<R: Read, H: DocumentHandler>(
        &mut self,
        tokenizer: &mut Tokenizer<R>,
        handler: &mut H,
        boundary: &[&str],
    ) -> Result<Outcome> {
        let mut outcome = self.parse(tokenizer, handler)?;
        while outcome == Outcome::Yielded && !boundary.contains(&tokenizer.segment_id()) {
            let id = tokenizer.segment_id().to_string();
            let description = format!(
                "Unrecognized or out-of-place segment {id} at byte {}",
                tokenizer.segment_offset()
            );
            tokenizer.report_error(
                description,
                self.path(),
                ErrorCode::UnrecognizedSegment,
                Some(&id),
                ErrorLevel::Integrity,
            );
            outcome = self.continue_parse(tokenizer, handler)?;
        }
        Ok(outcome)
    }

    /// Close every open container and return the body
    pub fn finish(mut self) -> Children {
        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack
            .pop()
            .map(|root| root.group.children)
            .unwrap_or_default()
    }

    fn locate<R>(&self, tokenizer: &mut Tokenizer<R>) -> Option<(usize, usize)> {
        let id = tokenizer.segment_id().to_string();
        for level in (0..self.stack.len()).rev() {
            let frame = &self.stack[level];
            let candidates = frame.candidates(&id);
            if candidates.is_empty() {
                continue;
            }
            let index = self.choose(tokenizer, frame.children, &candidates, &frame.path);
            return Some((level, index));
        }
        None
    }

    fn choose<R>(
        &self,
        tokenizer: &mut Tokenizer<R>,
        children: &[TemplateNode],
        candidates: &[usize],
        owner: &str,
    ) -> usize {
        let first = candidates[0];
        if candidates.len() == 1 || !self.prevalidate {
            return first;
        }
        let id = tokenizer.segment_id().to_string();
        let mut undecided = None;
        let mut rejection = None;
        for &i in candidates {
            let verdict = match lead_segment_of(&children[i], &id) {
                Some(lead) => is_this_you(tokenizer, &lead.elements),
                None => Verdict::Undecidable,
            };
            match verdict {
                Verdict::Match => return i,
                Verdict::Undecidable => {
                    undecided.get_or_insert(i);
                }
                Verdict::Mismatch(reason) => {
                    rejection.get_or_insert(reason);
                }
            }
        }
        if let Some(i) = undecided {
            return i;
        }
        if let Some(reason) = rejection {
            tokenizer.report_error(
                format!("No candidate for {id} accepts its content: {reason}"),
                owner,
                ErrorCode::InvalidCodeValue,
                Some(&id),
                ErrorLevel::Requirement,
            );
        }
        first
    }

    fn enter<R, H: DocumentHandler>(
        &mut self,
        level: usize,
        index: usize,
        tokenizer: &mut Tokenizer<R>,
        handler: &mut H,
    ) -> Flow {
        while self.stack.len() > level + 1 {
            self.close_top();
        }
        let frame = &mut self.stack[level];
        frame.counts[index] += 1;
        frame.next = index;
        let parent = frame.path.clone();
        let children = frame.children;

        match &children[index] {
            TemplateNode::Segment(template) => self.emit(template, tokenizer, handler),
            TemplateNode::Loop(template) => {
                let mut lead_frame = Frame::new(
                    &template.children,
                    Group::new(&template.id, &template.name),
                    FrameKind::Loop,
                    format!("{parent}/{}", template.id),
                );
                let Some(lead) = template.lead() else {
                    return Flow::Continue;
                };
                lead_frame.counts[0] = 1;
                self.stack.push(lead_frame);
                self.emit(lead, tokenizer, handler)
            }
            TemplateNode::Table(template) => {
                let table = Frame::new(
                    &template.children,
                    Group::new(&template.id, &template.name),
                    FrameKind::Table,
                    format!("{parent}/{}", template.id),
                );
                let candidates = table.candidates(tokenizer.segment_id());
                let path = table.path.clone();
                self.stack.push(table);
                if candidates.is_empty() {
                    return Flow::Continue;
                }
                let inner = self.choose(tokenizer, &template.children, &candidates, &path);
                let top = self.stack.len() - 1;
                self.enter(top, inner, tokenizer, handler)
            }
        }
    }

    fn emit<R, H: DocumentHandler>(
        &mut self,
        template: &TemplateSegment,
        tokenizer: &mut Tokenizer<R>,
        handler: &mut H,
    ) -> Flow {
        let owner = self.path().to_string();
        let segment = build_segment(tokenizer, template, &owner);
        let flow = handler.start_segment(&segment);
        let flow = if flow.is_halt() { flow } else { handler.end_segment(&segment) };
        if let Some(frame) = self.stack.last_mut() {
            frame.group.children.push(Node::Segment(segment));
        }
        flow
    }

    fn close_top(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let node = match frame.kind {
            FrameKind::Loop => Node::Loop(frame.group),
            FrameKind::Table | FrameKind::Body => Node::Table(frame.group),
        };
        if let Some(parent) = self.stack.last_mut() {
            parent.group.children.push(node);
        }
    }
}

/// Segment template a node would be matched with for this id
fn lead_segment_of<'a>(node: &'a TemplateNode, segment_id: &str) -> Option<&'a TemplateSegment> {
    match node {
        TemplateNode::Segment(s) => Some(s),
        TemplateNode::Loop(l) => l.lead(),
        TemplateNode::Table(t) => t
            .children
            .iter()
            .find(|c| c.accepts(segment_id))
            .and_then(|c| lead_segment_of(c, segment_id)),
    }
}

/// Field widths of a fixed-width record template, in position order
pub fn layout_widths(template: &TemplateSegment) -> Vec<usize> {
    element_widths(&template.elements)
}

/// Widths of the fields in an element container; a composite spans its components
pub fn element_widths(elements: &ElementContainer) -> Vec<usize> {
    elements
        .iter()
        .map(|element| match element {
            TemplateElement::Data(d) => d.max_length,
            TemplateElement::Composite(c) => c
                .elements
                .iter()
                .map(|inner| match inner {
                    TemplateElement::Data(d) => d.max_length,
                    TemplateElement::Composite(_) => 0,
                })
                .sum(),
        })
        .collect()
}

/// Build the tree segment for the tokenizer's current segment
///
/// Fields land at their template positions with escapes resolved; empty
/// fields are left out. Non-empty fields beyond the template are reported
/// once as too many data elements. A template without elements keeps every
/// field under a generated id.
pub fn build_segment<R>(tokenizer: &mut Tokenizer<R>, template: &TemplateSegment, owner: &str) -> Segment {
    if tokenizer.is_fixed_width() && !template.elements.is_empty() {
        tokenizer.apply_layout(&layout_widths(template));
    } else {
        tokenizer.reset_segment();
    }
    let fixed = tokenizer.is_fixed_width();
    let mut segment = Segment::new(&template.id, &template.xml_tag)
        .at(tokenizer.position(), tokenizer.segment_offset());
    let generic = template.elements.is_empty();
    let mut extra = Vec::new();
    let mut position = 0;

    while tokenizer.has_more_elements() {
        let raw = tokenizer.next_data_element().to_string();
        position += 1;
        let raw = if fixed { raw.trim_end().to_string() } else { raw };
        if raw.is_empty() {
            continue;
        }
        match template.elements.get(position) {
            Some(TemplateElement::Data(d)) => {
                let element = match tokenizer.current_binary() {
                    Some(bytes) if d.data_type == DataType::Binary => {
                        DataElement::binary(&d.id, &d.xml_tag, position, bytes.to_vec())
                    }
                    _ => DataElement::new(&d.id, &d.xml_tag, position, tokenizer.unescape(&raw)),
                };
                segment.set_field(Field::Data(element));
            }
            Some(TemplateElement::Composite(c)) => {
                let mut composite = CompositeElement::new(&c.id, &c.xml_tag, position);
                let mut parts = tokenizer.make_subfield_tokenizer();
                let mut k = 0;
                while let Some(part) = parts.next_token() {
                    k += 1;
                    if part.is_empty() {
                        continue;
                    }
                    let (id, name) = match c.elements.get(k) {
                        Some(inner) => (inner.id().to_string(), tag_of(inner)),
                        None => (format!("{}{k:02}", c.id), format!("{}{k:02}", c.id)),
                    };
                    composite.set_component(DataElement::new(id, name, k, tokenizer.unescape(&part)));
                }
                if !composite.components.is_empty() {
                    segment.set_field(Field::Composite(composite));
                }
            }
            None if generic => {
                if let Some(field) = generic_field(tokenizer, &template.id, position, &raw) {
                    segment.set_field(field);
                }
            }
            None => extra.push(raw),
        }
    }

    if !extra.is_empty() {
        let description = format!(
            "Segment {} has {} data element(s) beyond the {} defined",
            template.id,
            extra.len(),
            template.elements.max_position()
        );
        tokenizer.report_error(
            description,
            owner,
            ErrorCode::TooManyDataElements,
            extra.first().map(String::as_str),
            ErrorLevel::Requirement,
        );
    }
    tokenizer.reset_segment();
    segment
}

fn tag_of(element: &TemplateElement) -> String {
    match element {
        TemplateElement::Data(d) => d.xml_tag.clone(),
        TemplateElement::Composite(c) => c.xml_tag.clone(),
    }
}

fn generic_field<R>(tokenizer: &Tokenizer<R>, segment_id: &str, position: usize, raw: &str) -> Option<Field> {
    let id = format!("{segment_id}{position:02}");
    if let Some(bytes) = tokenizer.current_binary().filter(|_| position == 2) {
        return Some(Field::Data(DataElement::binary(&id, &id, position, bytes.to_vec())));
    }
    let mut parts = tokenizer.make_subfield_tokenizer();
    if parts.count() < 2 {
        return Some(Field::Data(DataElement::new(&id, &id, position, tokenizer.unescape(raw))));
    }
    let mut composite = CompositeElement::new(&id, &id, position);
    let mut k = 0;
    while let Some(part) = parts.next_token() {
        k += 1;
        if !part.is_empty() {
            let name = format!("{id}-{k:02}");
            composite.set_component(DataElement::new(&name, &name, k, tokenizer.unescape(&part)));
        }
    }
    (!composite.components.is_empty()).then_some(Field::Composite(composite))
}

/// Keep the segments of a body no template describes, until `boundary`
///
/// # Errors
///
/// Fatal tokenizer conditions.
pub fn parse_untemplated<R: Read, H: DocumentHandler>(
    tokenizer: &mut Tokenizer<R>,
    handler: &mut H,
    boundary: &[&str],
    owner: &str,
) -> Result<(Children, Outcome)> {
    let mut body = Children::new();
    loop {
        if !tokenizer.next_segment(owner)? {
            return Ok((body, Outcome::EndOfInput));
        }
        if boundary.contains(&tokenizer.segment_id()) {
            return Ok((body, Outcome::Yielded));
        }
        let template = TemplateSegment::new(tokenizer.segment_id(), tokenizer.segment_id());
        let segment = build_segment(tokenizer, &template, owner);
        let mut flow = handler.start_segment(&segment);
        if !flow.is_halt() {
            flow = handler.end_segment(&segment);
        }
        body.push(Node::Segment(segment));
        if flow.is_halt() {
            return Ok((body, Outcome::Halted));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NullHandler, ParserConfig};
    use edi_ir::Delimiters;
    use edi_schema::{CodeList, TemplateComposite, TemplateDataElement, TemplateLoop, TemplateTable};
    use std::sync::Arc;

    fn party(id: &str, codes: &[&str]) -> TemplateLoop {
        let nad = TemplateSegment::new("NAD", "NameAndAddress")
            .with_element(
                TemplateDataElement::new("3035", "PartyQualifier", 1, DataType::Identifier, 1, 3)
                    .required()
                    .with_codes(Arc::new(CodeList::with_codes(id, codes.iter().copied()))),
            )
            .with_composite(
                TemplateComposite::new("C082", "PartyId", 2)
                    .with(TemplateDataElement::new("3039", "PartyIdentifier", 1, DataType::Alphanumeric, 1, 35))
                    .with(TemplateDataElement::new("3055", "Agency", 3, DataType::Alphanumeric, 1, 3)),
            );
        TemplateLoop::new(id, id, nad.required())
            .max_use(9)
            .with(TemplateSegment::new("CTA", "Contact"))
    }

    fn orders() -> TemplateTransactionSet {
        let heading = TemplateTable::new("heading", "Heading")
            .with(
                TemplateSegment::new("BGM", "BeginningOfMessage")
                    .required()
                    .with_element(TemplateDataElement::new("1001", "DocumentName", 1, DataType::Alphanumeric, 1, 3)),
            )
            .with(TemplateSegment::new("DTM", "DateTime").max_use(5))
            .with(party("SG2", &["BY", "SU"]))
            .with(party("SG11", &["DP"]));
        let detail = TemplateTable::new("detail", "Detail").with(
            TemplateLoop::new("SG28", "Line", TemplateSegment::new("LIN", "LineItem").required())
                .max_use(99)
                .with(TemplateSegment::new("QTY", "Quantity")),
        );
        TemplateTransactionSet::new("ORDERS", "Purchase order")
            .with(heading)
            .with(detail)
    }

    fn run<'a>(template: &'a TemplateTransactionSet, text: &'a str) -> (Children, Outcome, Tokenizer<&'a [u8]>) {
        let mut t = Tokenizer::new(text.as_bytes(), Delimiters::edifact(), &ParserConfig::default());
        let mut parser = BodyParser::new(template, true);
        let outcome = parser.parse_until(&mut t, &mut NullHandler, &["UNT"]).unwrap();
        (parser.finish(), outcome, t)
    }

    fn shape(children: &Children) -> Vec<String> {
        children
            .iter()
            .map(|node| match node {
                Node::Segment(s) => s.id.clone(),
                Node::Loop(g) | Node::Table(g) => format!("{}[{}]", g.id, shape(&g.children).join(",")),
            })
            .collect()
    }

    #[test]
    fn test_tables_loops_and_repeats() {
        let template = orders();
        let (body, outcome, t) = run(
            &template,
            "BGM+220'DTM+137:20240101:102'DTM+2:20240105:102'NAD+BY+123::9'CTA+IC'NAD+SU+456'LIN+1'QTY+21:5'LIN+2'UNT+11+1'",
        );
        assert_eq!(outcome, Outcome::Yielded);
        assert_eq!(t.segment_id(), "UNT");
        assert!(t.errors().is_empty(), "{}", t.errors());
        assert_eq!(
            shape(&body),
            vec![
                "heading[BGM,DTM,DTM,SG2[NAD,CTA],SG2[NAD]]",
                "detail[SG28[LIN,QTY],SG28[LIN]]",
            ]
        );
    }

    #[test]
    fn test_prevalidation_picks_loop_by_code() {
        let template = orders();
        let (body, _, t) = run(&template, "BGM+220'NAD+BY+1'NAD+DP+2'UNT+4+1'");
        assert!(t.errors().is_empty());
        assert_eq!(shape(&body), vec!["heading[BGM,SG2[NAD],SG11[NAD]]"]);
    }

    #[test]
    fn test_no_candidate_matching_falls_back_to_first() {
        let template = orders();
        let (body, _, t) = run(&template, "BGM+220'NAD+ZZ+1'UNT+3+1'");
        assert_eq!(shape(&body), vec!["heading[BGM,SG2[NAD]]"]);
        let errors = t.errors().records();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::InvalidCodeValue);
        assert_eq!(errors[0].level, ErrorLevel::Requirement);
        assert!(errors[0].description.contains("'ZZ'"));
    }

    #[test]
    fn test_unknown_segment_is_reported_once_and_skipped() {
        let template = orders();
        let (body, outcome, t) = run(&template, "BGM+220'XXX+1'DTM+137:20240101:102'UNT+4+1'");
        assert_eq!(outcome, Outcome::Yielded);
        let errors = t.errors().records();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::UnrecognizedSegment);
        assert_eq!(errors[0].segment_id, "XXX");
        assert_eq!(errors[0].byte_offset, 8);
        assert_eq!(shape(&body), vec!["heading[BGM,DTM]"]);
    }

    #[test]
    fn test_fields_composites_and_escapes() {
        let template = orders();
        let (body, _, t) = run(&template, "BGM+220+EXTRA'NAD+BY+5412?+3::9'UNT+3+1'");
        let Some(Node::Table(heading)) = body.get("heading") else {
            panic!("no heading table");
        };
        let bgm = heading.children.get("BGM").and_then(Node::as_segment).unwrap();
        assert_eq!(bgm.text(1), Some("220"));
        assert_eq!(bgm.field(2), None);
        let nad = heading.children.find_path("SG2/NAD").ok().and_then(Node::as_segment).unwrap();
        assert_eq!(nad.component(2, 1), Some("5412+3"));
        assert_eq!(nad.component(2, 2), None);
        assert_eq!(nad.component(2, 3), Some("9"));
        assert_eq!(nad.position, 2);

        let extra: Vec<_> = t.errors().with_code(ErrorCode::TooManyDataElements).collect();
        assert_eq!(extra.len(), 1);
        assert_eq!(extra[0].offending.as_deref(), Some("EXTRA"));
    }

    #[test]
    fn test_end_of_input_inside_body() {
        let template = orders();
        let (body, outcome, _) = run(&template, "BGM+220'LIN+1'");
        assert_eq!(outcome, Outcome::EndOfInput);
        assert_eq!(shape(&body), vec!["heading[BGM]", "detail[SG28[LIN]]"]);
    }

    #[test]
    fn test_untemplated_body_keeps_segments() {
        let mut t = Tokenizer::new(&b"FOO+a:b+c'BAR'UNT+3+1'"[..], Delimiters::edifact(), &ParserConfig::default());
        let (body, outcome) = parse_untemplated(&mut t, &mut NullHandler, &["UNT"], "X").unwrap();
        assert_eq!(outcome, Outcome::Yielded);
        assert_eq!(body.len(), 2);
        let foo = body.get("FOO").and_then(Node::as_segment).unwrap();
        assert_eq!(foo.component(1, 2), Some("b"));
        assert_eq!(foo.text(2), Some("c"));
    }

    #[test]
    fn test_layout_widths_follow_positions() {
        let seg = TemplateSegment::new("6", "EntryDetail")
            .with_element(TemplateDataElement::new("1", "RecordType", 1, DataType::Alphanumeric, 1, 1))
            .with_element(TemplateDataElement::new("2", "TransactionCode", 2, DataType::Numeric(0), 2, 2))
            .with_element(TemplateDataElement::new("3", "Routing", 3, DataType::Alphanumeric, 9, 9));
        assert_eq!(layout_widths(&seg), vec![1, 2, 9]);
    }
}
