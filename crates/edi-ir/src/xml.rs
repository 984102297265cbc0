//! XML rendering of a parsed envelope

use crate::document::{Envelope, FunctionalGroup, TransactionSet};
use crate::node::{DataElement, Field, Group, Segment, Value};
use crate::traversal::{GroupKind, Traversal, walk_envelope};
use crate::{Error, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::fmt::Write as _;

/// Render an envelope as indented XML
///
/// # Errors
///
/// Returns [`Error::Xml`] when the writer fails.
pub fn to_xml(envelope: &Envelope) -> Result<String> {
    let mut emitter = XmlEmitter {
        writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        error: None,
    };
    emitter.emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));
    walk_envelope(envelope, &mut emitter);
    if let Some(message) = emitter.error {
        return Err(Error::Xml(message));
    }
    String::from_utf8(emitter.writer.into_inner()).map_err(|e| Error::Xml(e.to_string()))
}

struct XmlEmitter {
    writer: Writer<Vec<u8>>,
    error: Option<String>,
}

impl XmlEmitter {
    fn emit(&mut self, event: Event<'_>) {
        if self.error.is_some() {
            return;
        }
        if let Err(e) = self.writer.write_event(event) {
            self.error = Some(e.to_string());
        }
    }

    fn start(&mut self, name: &str, attributes: &[(&str, &str)]) {
        let mut start = BytesStart::new(name);
        for &(key, value) in attributes {
            if !value.is_empty() {
                start.push_attribute((key, value));
            }
        }
        self.emit(Event::Start(start));
    }

    fn end(&mut self, name: &str) {
        self.emit(Event::End(BytesEnd::new(name)));
    }

    fn data_element(&mut self, element: &DataElement) {
        let position = element.position.to_string();
        let (text, encoding) = match &element.value {
            Value::String(s) => (s.clone(), ""),
            Value::Binary(bytes) => (hex(bytes), "hex"),
            Value::Null => (String::new(), ""),
        };
        self.start(
            "element",
            &[
                ("id", element.id.as_str()),
                ("name", element.name.as_str()),
                ("position", position.as_str()),
                ("encoding", encoding),
            ],
        );
        self.emit(Event::Text(BytesText::new(&text)));
        self.end("element");
    }
}

impl Traversal for XmlEmitter {
    fn visit_segment(&mut self, segment: &Segment) {
        let position = segment.position.to_string();
        let offset = segment.byte_offset.to_string();
        self.start(
            "segment",
            &[
                ("id", segment.id.as_str()),
                ("name", segment.name.as_str()),
                ("position", position.as_str()),
                ("offset", offset.as_str()),
            ],
        );
        for field in segment.fields.values() {
            match field {
                Field::Data(d) => self.data_element(d),
                Field::Composite(c) => {
                    let position = c.position.to_string();
                    self.start(
                        "composite",
                        &[("id", c.id.as_str()), ("name", c.name.as_str()), ("position", position.as_str())],
                    );
                    for component in c.components.values() {
                        self.data_element(component);
                    }
                    self.end("composite");
                }
            }
        }
        self.end("segment");
    }

    fn enter_envelope(&mut self, envelope: &Envelope) {
        self.start("envelope", &[("format", envelope.format.name())]);
    }

    fn leave_envelope(&mut self, _envelope: &Envelope) {
        self.end("envelope");
    }

    fn enter_group(&mut self, group: &FunctionalGroup) {
        self.start(
            "functionalGroup",
            &[("implicit", if group.implicit { "true" } else { "" })],
        );
    }

    fn leave_group(&mut self, _group: &FunctionalGroup) {
        self.end("functionalGroup");
    }

    fn enter_transaction_set(&mut self, ts: &TransactionSet) {
        self.start(
            "transactionSet",
            &[
                ("id", ts.id.as_str()),
                ("name", ts.name.as_str()),
                ("version", ts.version.as_deref().unwrap_or("")),
                ("control", ts.control_number.as_deref().unwrap_or("")),
            ],
        );
    }

    fn leave_transaction_set(&mut self, _ts: &TransactionSet) {
        self.end("transactionSet");
    }

    fn enter(&mut self, kind: GroupKind, group: &Group) {
        let tag = match kind {
            GroupKind::Loop => "loop",
            GroupKind::Table => "table",
        };
        self.start(tag, &[("id", group.id.as_str()), ("name", group.name.as_str())]);
    }

    fn leave(&mut self, kind: GroupKind, _group: &Group) {
        match kind {
            GroupKind::Loop => self.end("loop"),
            GroupKind::Table => self.end("table"),
        }
    }

    fn should_continue(&self) -> bool {
        self.error.is_none()
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{CompositeElement, Node};
    use crate::syntax::{Delimiters, Format};

    #[test]
    fn test_xml_escapes_and_nests() {
        let mut env = Envelope::new(Format::Edifact, Delimiters::edifact());
        let mut bgm = Segment::new("BGM", "BeginningOfMessage").at(3, 57);
        bgm.set_field(Field::Data(DataElement::new("1004", "DocumentNumber", 2, "PO<1>&2")));
        let mut c = CompositeElement::new("C002", "DocumentName", 1);
        c.set_component(DataElement::new("1001", "DocumentNameCode", 1, "220"));
        bgm.set_field(Field::Composite(c));

        let mut ts = TransactionSet::new("ORDERS", "PurchaseOrder");
        let mut table = Group::new("heading", "Heading");
        table.children.push(Node::Segment(bgm));
        ts.body.push(Node::Table(table));
        let mut group = FunctionalGroup::implicit();
        group.transaction_sets.push(ts);
        env.groups.push(group);

        let xml = to_xml(&env).unwrap();
        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<envelope format=\"EDIFACT\">"));
        assert!(xml.contains("<functionalGroup implicit=\"true\">"));
        assert!(xml.contains("PO&lt;1&gt;&amp;2"));
        assert!(xml.contains("offset=\"57\""));
        assert!(xml.contains("<composite id=\"C002\""));
        assert!(xml.trim_end().ends_with("</envelope>"));
    }

    #[test]
    fn test_binary_values_render_as_hex() {
        assert_eq!(hex(&[0x00, 0xAB, 0x10]), "00AB10");
    }
}
