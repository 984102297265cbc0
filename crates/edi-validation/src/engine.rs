//! Validation engine: walks a finished tree against its templates

use crate::rules::{RuleResult, validate_value};
use edi_ir::{
    Children, DataElement, DocumentErrors, Envelope, ErrorCode, ErrorLevel, ErrorRecord, Field, Node,
    Segment, TransactionSet, Value,
};
use edi_schema::{
    SchemaLookup, TemplateDataElement, TemplateElement, TemplateEnvelope, TemplateNode, TemplateSegment,
    TemplateTransactionSet, TransactionSetKey,
};
use tracing::{debug, trace};

/// Validate one transaction set body against its template
///
/// Returns `true` when nothing was recorded.
pub fn validate_transaction_set(
    ts: &TransactionSet,
    template: &TemplateTransactionSet,
    errors: &mut DocumentErrors,
) -> bool {
    let before = errors.len();
    let mut context = ValidationContext::new(errors, &ts.id);
    if let Some(header) = &ts.header {
        context.anchor(header);
    }
    context.children(&ts.body, &template.tables);
    errors.len() == before
}

/// Validate control segments and every transaction set in an envelope
///
/// Transaction sets whose template cannot be resolved are skipped; the
/// parser has already reported them.
pub fn validate_envelope<L: SchemaLookup + ?Sized>(
    envelope: &Envelope,
    envelope_template: Option<&TemplateEnvelope>,
    lookup: &L,
    errors: &mut DocumentErrors,
) -> bool {
    let before = errors.len();
    if let Some(t) = envelope_template {
        let mut context = ValidationContext::new(errors, envelope.format.name());
        context.control(envelope.service_advice.as_ref(), t.service_advice.as_ref());
        context.control(envelope.header.as_ref(), Some(&t.header));
        for group in &envelope.groups {
            if !group.implicit {
                context.control(group.header.as_ref(), t.group_header.as_ref());
            }
            for ts in &group.transaction_sets {
                context.control(ts.header.as_ref(), t.set_header.as_ref());
                context.control(ts.trailer.as_ref(), t.set_trailer.as_ref());
            }
            if !group.implicit {
                context.control(group.trailer.as_ref(), t.group_trailer.as_ref());
            }
        }
        context.control(envelope.trailer.as_ref(), Some(&t.trailer));
    }

    for ts in envelope.transaction_sets() {
        let key = TransactionSetKey::from(ts);
        match lookup.transaction_set(&key) {
            Ok(template) => {
                validate_transaction_set(ts, &template, errors);
            }
            Err(e) => debug!("Skipping validation of {}: {}", key, e),
        }
    }
    errors.len() == before
}

/// Validate a single segment against its template
pub fn validate_segment(segment: &Segment, template: &TemplateSegment, errors: &mut DocumentErrors) -> bool {
    let before = errors.len();
    ValidationContext::new(errors, &segment.id).segment(segment, template);
    errors.len() == before
}

#[derive(Debug, Clone, Default)]
struct Anchor {
    position: usize,
    segment_id: String,
    byte_offset: usize,
}

/// Walk state: where findings are recorded and how they are located
struct ValidationContext<'e> {
    errors: &'e mut DocumentErrors,
    path: Vec<String>,
    anchor: Anchor,
}

impl<'e> ValidationContext<'e> {
    fn new(errors: &'e mut DocumentErrors, root: &str) -> Self {
        Self {
            errors,
            path: vec![root.to_string()],
            anchor: Anchor::default(),
        }
    }

    fn anchor(&mut self, segment: &Segment) {
        self.anchor = Anchor {
            position: segment.position,
            segment_id: segment.id.clone(),
            byte_offset: segment.byte_offset,
        };
    }

    fn record(&mut self, code: ErrorCode, level: ErrorLevel, description: String, offending: Option<&str>) {
        let mut record = ErrorRecord::new(code, level, description)
            .at(self.anchor.position, self.anchor.segment_id.clone(), self.anchor.byte_offset)
            .in_container(self.path.join("/"));
        if let Some(value) = offending {
            record = record.with_offending(value);
        }
        self.errors.add(record);
    }

    fn control(&mut self, segment: Option<&Segment>, template: Option<&TemplateSegment>) {
        match (segment, template) {
            (Some(s), Some(t)) if s.id == t.id => self.segment(s, t),
            // a variant header (ACH 5CB) the parser already built from its own layout
            (Some(_), Some(_)) => {}
            (None, Some(t)) if t.required => self.record(
                ErrorCode::MandatorySegmentMissing,
                ErrorLevel::Requirement,
                format!("Mandatory segment {} missing", t.id),
                None,
            ),
            _ => {}
        }
    }

    /// Assign actual children to template slots in order, then check each slot
    fn children(&mut self, actual: &Children, templates: &[TemplateNode]) {
        let mut assigned: Vec<Vec<&Node>> = vec![Vec::new(); templates.len()];
        let mut cursor = 0;
        for node in actual {
            let slot = (cursor..templates.len())
                .chain(0..cursor)
                .find(|&i| same_kind(node, &templates[i]));
            match slot {
                Some(i) => {
                    cursor = i;
                    assigned[i].push(node);
                }
                None => {
                    if let Some(s) = node.first_segment() {
                        self.anchor(s);
                    }
                    self.record(
                        ErrorCode::UnexpectedSegment,
                        ErrorLevel::Requirement,
                        format!("{} is not expected here", node.id()),
                        None,
                    );
                }
            }
        }

        for (template, nodes) in templates.iter().zip(assigned) {
            self.occurrences(template, &nodes);
        }
    }

    fn occurrences(&mut self, template: &TemplateNode, nodes: &[&Node]) {
        if nodes.is_empty() {
            match template {
                TemplateNode::Table(table) => {
                    self.path.push(table.id.clone());
                    self.children(&Children::new(), &table.children);
                    self.path.pop();
                }
                _ if template.is_required() => {
                    let what = if matches!(template, TemplateNode::Loop(_)) { "loop" } else { "segment" };
                    self.record(
                        ErrorCode::MandatorySegmentMissing,
                        ErrorLevel::Requirement,
                        format!("Mandatory {what} {} missing", template.id()),
                        None,
                    );
                }
                _ => {}
            }
            return;
        }

        for node in nodes {
            self.node(node, template);
        }

        if nodes.len() > template.max_use() {
            let code = match template {
                TemplateNode::Loop(_) => ErrorCode::LoopOverMax,
                _ => ErrorCode::SegmentOverMaxUse,
            };
            self.record(
                code,
                ErrorLevel::Requirement,
                format!(
                    "{} occurs {} times, maximum is {}",
                    template.id(),
                    nodes.len(),
                    template.max_use()
                ),
                None,
            );
        }
    }

    fn node(&mut self, node: &Node, template: &TemplateNode) {
        match (node, template) {
            (Node::Segment(s), TemplateNode::Segment(t)) => self.segment(s, t),
            (Node::Loop(g), TemplateNode::Loop(t)) => {
                self.path.push(t.id.clone());
                self.children(&g.children, &t.children);
                self.path.pop();
            }
            (Node::Table(g), TemplateNode::Table(t)) => {
                self.path.push(t.id.clone());
                self.children(&g.children, &t.children);
                self.path.pop();
            }
            _ => {}
        }
        if let Some(validator) = template.validator() {
            if !validator.validate(node, &mut *self.errors) {
                self.record(
                    ErrorCode::ValidatorRejected,
                    ErrorLevel::Requirement,
                    format!("{} rejected by {:?}", node.id(), validator),
                    None,
                );
            }
        }
    }

    fn segment(&mut self, segment: &Segment, template: &TemplateSegment) {
        trace!("Validating segment {} at {}", segment.id, segment.position);
        self.anchor(segment);
        for element in template.elements.iter() {
            match (element, segment.field(element.position())) {
                (TemplateElement::Data(t), None) => self.missing(t.required, &t.id),
                (TemplateElement::Data(t), Some(Field::Data(d))) => self.data(d, t),
                (TemplateElement::Data(t), Some(Field::Composite(c))) => match c.components.get(&1) {
                    Some(d) => self.data(d, t),
                    None => self.missing(t.required, &t.id),
                },
                (TemplateElement::Composite(t), None) => self.missing(t.required, &t.id),
                (TemplateElement::Composite(t), Some(Field::Data(d))) => {
                    // a composite sent as a single value fills its first component
                    for component in t.elements.iter() {
                        if let TemplateElement::Data(ct) = component {
                            if ct.position == 1 {
                                self.data(d, ct);
                            } else {
                                self.missing(ct.required, &ct.id);
                            }
                        }
                    }
                }
                (TemplateElement::Composite(t), Some(Field::Composite(c))) => {
                    let present = c.components.values().any(|d| !d.value.is_null());
                    if !present {
                        self.missing(t.required, &t.id);
                        continue;
                    }
                    for component in t.elements.iter() {
                        if let TemplateElement::Data(ct) = component {
                            match c.components.get(&ct.position) {
                                Some(d) => self.data(d, ct),
                                None => self.missing(ct.required, &ct.id),
                            }
                        }
                    }
                }
            }
        }

        if !template.elements.is_empty() && segment.last_position() > template.elements.max_position() {
            self.record(
                ErrorCode::TooManyDataElements,
                ErrorLevel::Requirement,
                format!(
                    "{} has {} data elements, at most {} expected",
                    segment.id,
                    segment.last_position(),
                    template.elements.max_position()
                ),
                None,
            );
        }

        if let Some(validator) = &template.validator {
            let node = Node::Segment(segment.clone());
            if !validator.validate(&node, &mut *self.errors) {
                self.record(
                    ErrorCode::ValidatorRejected,
                    ErrorLevel::Requirement,
                    format!("{} rejected by {:?}", segment.id, validator),
                    None,
                );
            }
        }
    }

    fn missing(&mut self, required: bool, id: &str) {
        if required {
            self.record(
                ErrorCode::MandatoryElementMissing,
                ErrorLevel::Requirement,
                format!("Mandatory data element {id} missing"),
                None,
            );
        }
    }

    fn data(&mut self, element: &DataElement, template: &TemplateDataElement) {
        match &element.value {
            Value::Binary(_) => {}
            value if value.is_null() => self.missing(template.required, &template.id),
            Value::String(text) => {
                for failure in validate_value(text, template) {
                    if let RuleResult::Invalid { code, message } = failure {
                        let level = if code == ErrorCode::InvalidCodeValue {
                            ErrorLevel::Requirement
                        } else {
                            ErrorLevel::Situation
                        };
                        self.record(code, level, message, Some(text));
                    }
                }
            }
            Value::Null => {}
        }
    }
}

/// A template slot can hold the node when kinds agree and ids match
fn same_kind(node: &Node, template: &TemplateNode) -> bool {
    match (node, template) {
        (Node::Segment(s), TemplateNode::Segment(t)) => s.id == t.id,
        (Node::Loop(g), TemplateNode::Loop(t)) => g.id == t.id,
        (Node::Table(g), TemplateNode::Table(t)) => g.id == t.id,
        _ => false,
    }
}
