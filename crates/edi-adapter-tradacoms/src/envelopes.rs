//! TRADACOMS envelope templates (STX/END, BAT/EOB, MHD/MTR)

use edi_ir::{Format, Segment};
use edi_schema::{DataType, TemplateComposite, TemplateDataElement, TemplateEnvelope, TemplateSegment, TransactionSetKey};

/// Characters of the MHD type field naming the message
pub const MESSAGE_TYPE_LENGTH: usize = 6;

fn an(id: &str, name: &str, position: usize, max: usize) -> TemplateDataElement {
    TemplateDataElement::new(id, name, position, DataType::Alphanumeric, 1, max)
}

fn num(id: &str, name: &str, position: usize, max: usize) -> TemplateDataElement {
    TemplateDataElement::new(id, name, position, DataType::Numeric(0), 1, max)
}

fn party(id: &str, name: &str, position: usize) -> TemplateComposite {
    TemplateComposite::new(id, name, position)
        .required()
        .with(an(&format!("{id}1"), "Code", 1, 14))
        .with(an(&format!("{id}2"), "Name", 2, 35))
}

/// STX start of transmission
pub fn stx() -> TemplateSegment {
    TemplateSegment::new("STX", "StartOfTransmission")
        .required()
        .with_composite(
            TemplateComposite::new("STDS", "SyntaxRulesIdentifier", 1)
                .required()
                .with(an("STDS1", "Identifier", 1, 4).required())
                .with(num("STDS2", "Version", 2, 1).required()),
        )
        .with_composite(party("FROM", "TransmissionSender", 2))
        .with_composite(party("UNTO", "TransmissionRecipient", 3))
        .with_composite(
            TemplateComposite::new("TRDT", "DateAndTimeOfTransmission", 4)
                .required()
                .with(TemplateDataElement::new("TRDT1", "Date", 1, DataType::Date, 6, 6).required())
                .with(TemplateDataElement::new("TRDT2", "Time", 2, DataType::Time, 4, 6)),
        )
        .with_element(an("SNRF", "SendersTransmissionReference", 5, 14).required())
        .with_element(an("RCRF", "ReceiversTransmissionReference", 6, 14))
        .with_element(an("APRF", "ApplicationReference", 7, 14))
        .with_element(an("PRCD", "TransmissionPriorityCode", 8, 1))
}

/// END end of transmission
pub fn end() -> TemplateSegment {
    TemplateSegment::new("END", "EndOfTransmission")
        .required()
        .with_element(num("NMST", "NumberOfMessages", 1, 5).required())
}

/// BAT batch header
pub fn bat() -> TemplateSegment {
    TemplateSegment::new("BAT", "BatchHeader").with_element(an("BTRF", "BatchReference", 1, 14).required())
}

/// EOB end of batch
pub fn eob() -> TemplateSegment {
    TemplateSegment::new("EOB", "EndOfBatch").with_element(num("NOLI", "NumberOfMessagesInBatch", 1, 5).required())
}

/// MHD message header
pub fn mhd() -> TemplateSegment {
    TemplateSegment::new("MHD", "MessageHeader")
        .required()
        .with_element(num("MSRF", "MessageReference", 1, 12).required())
        .with_composite(
            TemplateComposite::new("TYPE", "TypeOfMessage", 2)
                .required()
                .with(an("TYPE1", "MessageType", 1, 6).required())
                .with(num("TYPE2", "VersionNumber", 2, 1)),
        )
}

/// MTR message trailer
pub fn mtr() -> TemplateSegment {
    TemplateSegment::new("MTR", "MessageTrailer")
        .required()
        .with_element(num("NOSG", "NumberOfSegmentsInMessage", 1, 10).required())
}

/// Control segment templates for a TRADACOMS transmission
pub fn tradacoms_envelope() -> TemplateEnvelope {
    TemplateEnvelope {
        format: Format::Tradacoms,
        service_advice: None,
        header: stx(),
        trailer: end(),
        group_header: Some(bat()),
        group_trailer: Some(eob()),
        set_header: Some(mhd()),
        set_trailer: Some(mtr()),
    }
}

/// Template lookup key for a message: the first six characters of the MHD
/// type and its version, with the STX parties
pub fn message_key(mhd: &Segment, stx: Option<&Segment>) -> TransactionSetKey {
    let type_field = mhd.component(2, 1).unwrap_or_default();
    let message_type: String = type_field.chars().take(MESSAGE_TYPE_LENGTH).collect();
    let mut key = TransactionSetKey::new(message_type);
    if let Some(version) = mhd.component(2, 2) {
        key = key.with_version(version);
    }
    if let Some(stx) = stx {
        if let (Some(sender), Some(receiver)) = (stx.component(2, 1), stx.component(3, 1)) {
            key = key.with_parties(sender, receiver);
        }
    }
    key
}
