//! EDIFACT envelope handling (UNA, UNB/UNZ, UNG/UNE, UNH/UNT)
//!
//! Built-in templates for the service segments, used when the schema lookup
//! does not provide an EDIFACT envelope, and the typed view of UNH that keys
//! the message template lookup.

use edi_ir::Segment;
use edi_schema::{DataType, TemplateComposite, TemplateDataElement, TemplateEnvelope, TemplateSegment, TransactionSetKey};
use edi_ir::Format;

fn an(id: &str, name: &str, position: usize, min: usize, max: usize) -> TemplateDataElement {
    TemplateDataElement::new(id, name, position, DataType::Alphanumeric, min, max)
}

fn num(id: &str, name: &str, position: usize, max: usize) -> TemplateDataElement {
    TemplateDataElement::new(id, name, position, DataType::Numeric(0), 1, max)
}

fn party(id: &str, name: &str, position: usize) -> TemplateComposite {
    TemplateComposite::new(id, name, position)
        .required()
        .with(an("0004", "PartyIdentification", 1, 1, 35).required())
        .with(an("0007", "CodeQualifier", 2, 1, 4))
        .with(an("0008", "RoutingAddress", 3, 1, 35))
}

fn date_time(position: usize) -> TemplateComposite {
    TemplateComposite::new("S004", "DateTimeOfPreparation", position)
        .with(TemplateDataElement::new("0017", "Date", 1, DataType::Date, 6, 8))
        .with(TemplateDataElement::new("0019", "Time", 2, DataType::Time, 4, 4))
}

/// UNA service string advice, one element per service character
pub fn una() -> TemplateSegment {
    [
        "ComponentSeparator",
        "ElementSeparator",
        "DecimalMark",
        "ReleaseCharacter",
        "RepetitionSeparator",
        "SegmentTerminator",
    ]
    .into_iter()
    .enumerate()
    .fold(TemplateSegment::new("UNA", "ServiceStringAdvice"), |seg, (i, name)| {
        seg.with_element(an(&format!("UNA{}", i + 1), name, i + 1, 1, 1))
    })
}

/// UNB interchange header
pub fn unb() -> TemplateSegment {
    TemplateSegment::new("UNB", "InterchangeHeader")
        .required()
        .with_composite(
            TemplateComposite::new("S001", "SyntaxIdentifier", 1)
                .required()
                .with(an("0001", "SyntaxIdentifier", 1, 4, 4).required())
                .with(an("0002", "SyntaxVersion", 2, 1, 1).required())
                .with(an("0080", "ServiceCodeListVersion", 3, 1, 6))
                .with(an("0133", "CharacterEncoding", 4, 1, 3)),
        )
        .with_composite(party("S002", "InterchangeSender", 2))
        .with_composite(party("S003", "InterchangeRecipient", 3))
        .with_composite(date_time(4))
        .with_element(an("0020", "InterchangeControlReference", 5, 1, 14).required())
        .with_composite(
            TemplateComposite::new("S005", "RecipientReference", 6)
                .with(an("0022", "RecipientPassword", 1, 1, 14))
                .with(an("0025", "PasswordQualifier", 2, 2, 2)),
        )
        .with_element(an("0026", "ApplicationReference", 7, 1, 14))
        .with_element(an("0029", "ProcessingPriority", 8, 1, 1))
        .with_element(num("0031", "AcknowledgementRequest", 9, 1))
        .with_element(an("0032", "AgreementIdentifier", 10, 1, 35))
        .with_element(num("0035", "TestIndicator", 11, 1))
}

/// UNZ interchange trailer
pub fn unz() -> TemplateSegment {
    TemplateSegment::new("UNZ", "InterchangeTrailer")
        .required()
        .with_element(num("0036", "InterchangeControlCount", 1, 6).required())
        .with_element(an("0020", "InterchangeControlReference", 2, 1, 14).required())
}

/// UNG functional group header
pub fn ung() -> TemplateSegment {
    TemplateSegment::new("UNG", "FunctionalGroupHeader")
        .with_element(an("0038", "MessageGroupIdentification", 1, 1, 6).required())
        .with_composite(party("S006", "ApplicationSender", 2))
        .with_composite(party("S007", "ApplicationRecipient", 3))
        .with_composite(date_time(4))
        .with_element(an("0048", "GroupReferenceNumber", 5, 1, 14).required())
        .with_element(an("0051", "ControllingAgency", 6, 1, 2))
        .with_composite(
            TemplateComposite::new("S008", "MessageVersion", 7)
                .with(an("0052", "MessageVersionNumber", 1, 1, 3))
                .with(an("0054", "MessageReleaseNumber", 2, 1, 3))
                .with(an("0057", "AssociationAssignedCode", 3, 1, 6)),
        )
        .with_element(an("0058", "ApplicationPassword", 8, 1, 14))
}

/// UNE functional group trailer
pub fn une() -> TemplateSegment {
    TemplateSegment::new("UNE", "FunctionalGroupTrailer")
        .with_element(num("0060", "GroupControlCount", 1, 6).required())
        .with_element(an("0048", "GroupReferenceNumber", 2, 1, 14).required())
}

/// UNH message header
pub fn unh() -> TemplateSegment {
    TemplateSegment::new("UNH", "MessageHeader")
        .required()
        .with_element(an("0062", "MessageReferenceNumber", 1, 1, 14).required())
        .with_composite(
            TemplateComposite::new("S009", "MessageIdentifier", 2)
                .required()
                .with(an("0065", "MessageType", 1, 1, 6).required())
                .with(an("0052", "MessageVersionNumber", 2, 1, 3).required())
                .with(an("0054", "MessageReleaseNumber", 3, 1, 3).required())
                .with(an("0051", "ControllingAgency", 4, 1, 2).required())
                .with(an("0057", "AssociationAssignedCode", 5, 1, 6)),
        )
        .with_element(an("0068", "CommonAccessReference", 3, 1, 35))
        .with_composite(
            TemplateComposite::new("S010", "StatusOfTransfer", 4)
                .with(num("0070", "SequenceOfTransfers", 1, 2))
                .with(an("0073", "FirstAndLastTransfer", 2, 1, 1)),
        )
}

/// UNT message trailer
pub fn unt() -> TemplateSegment {
    TemplateSegment::new("UNT", "MessageTrailer")
        .required()
        .with_element(num("0074", "NumberOfSegments", 1, 6).required())
        .with_element(an("0062", "MessageReferenceNumber", 2, 1, 14).required())
}

/// Service segment templates for an EDIFACT interchange
pub fn edifact_envelope() -> TemplateEnvelope {
    TemplateEnvelope {
        format: Format::Edifact,
        service_advice: Some(una()),
        header: unb(),
        trailer: unz(),
        group_header: Some(ung()),
        group_trailer: Some(une()),
        set_header: Some(unh()),
        set_trailer: Some(unt()),
    }
}

/// Message type identifier carried by UNH (S009)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageIdentifier {
    /// Message type (e.g., "ORDERS", "INVOIC")
    pub message_type: String,
    /// Directory version plus release (e.g., "D96A")
    pub version: Option<String>,
    /// Message reference number (0062)
    pub reference: Option<String>,
}

impl MessageIdentifier {
    pub fn from_unh(unh: &Segment) -> Self {
        let version = match (unh.component(2, 2), unh.component(2, 3)) {
            (Some(v), Some(r)) => Some(format!("{v}{r}")),
            (Some(v), None) => Some(v.to_string()),
            _ => None,
        };
        Self {
            message_type: unh.component(2, 1).unwrap_or_default().to_string(),
            version,
            reference: unh.text(1).map(str::to_string),
        }
    }

    /// Template lookup key, with trading partners and test flag from UNB
    pub fn key(&self, unb: Option<&Segment>) -> TransactionSetKey {
        let mut key = TransactionSetKey::new(&self.message_type);
        if let Some(version) = &self.version {
            key = key.with_version(version);
        }
        if let Some(unb) = unb {
            if let (Some(sender), Some(receiver)) = (unb.component(2, 1), unb.component(3, 1)) {
                key = key.with_parties(sender, receiver);
            }
            if let Some(test) = unb.text(11) {
                key = key.with_test_indicator(test);
            }
        }
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_ir::{CompositeElement, DataElement, Field};

    #[test]
    fn test_envelope_lookup_by_id() {
        let envelope = edifact_envelope();
        assert_eq!(envelope.control_segment("UNT").map(|s| s.elements.len()), Some(2));
        assert!(envelope.control_segment("UNB").is_some_and(|s| s.required));
        assert!(envelope.control_segment("BGM").is_none());
        assert_eq!(una().elements.max_position(), 6);
    }

    #[test]
    fn test_message_identifier() {
        let mut unh = Segment::new("UNH", "MessageHeader");
        unh.set_field(Field::Data(DataElement::new("0062", "ref", 1, "ME0001")));
        let mut s009 = CompositeElement::new("S009", "id", 2);
        for (k, v) in ["ORDERS", "D", "96A", "UN"].into_iter().enumerate() {
            s009.set_component(DataElement::new("x", "x", k + 1, v));
        }
        unh.set_field(Field::Composite(s009));

        let id = MessageIdentifier::from_unh(&unh);
        assert_eq!(id.message_type, "ORDERS");
        assert_eq!(id.version.as_deref(), Some("D96A"));
        assert_eq!(id.reference.as_deref(), Some("ME0001"));
        assert_eq!(id.key(None), TransactionSetKey::new("ORDERS").with_version("D96A"));
    }
}
