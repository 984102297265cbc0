//! Validation of a whole envelope against templates loaded from YAML

use edi_ir::{
    CompositeElement, DataElement, Delimiters, DocumentErrors, Envelope, ErrorCode, ErrorLevel, Field, Format,
    FunctionalGroup, Group, Node, Segment, TransactionSet,
};
use edi_schema::{SchemaLoader, SchemaRegistry, TemplateEnvelope, TemplateSegment};
use edi_validation::validate_envelope;

const SCHEMA: &str = r"
transaction_sets:
  - id: ORDERS
    name: PurchaseOrder
    version: D96A
    body:
      - kind: table
        id: heading
        children:
          - kind: segment
            id: BGM
            required: true
            elements:
              - position: 1
                id: C002
                required: true
                components:
                  - { position: 1, id: '1001', type: ID, max_length: 3, required: true, codes: ['220'] }
          - kind: segment
            id: DTM
            max_use: 35
            elements:
              - position: 1
                id: C507
                components:
                  - { position: 1, id: '2005', type: ID, max_length: 3, codes: ['137'] }
                  - { position: 2, id: '2380', type: DT, max_length: 35 }
";

fn envelope_template() -> TemplateEnvelope {
    TemplateEnvelope {
        format: Format::Edifact,
        service_advice: None,
        header: TemplateSegment::new("UNB", "InterchangeHeader").required(),
        trailer: TemplateSegment::new("UNZ", "InterchangeTrailer").required(),
        group_header: None,
        group_trailer: None,
        set_header: Some(TemplateSegment::new("UNH", "MessageHeader").required()),
        set_trailer: Some(TemplateSegment::new("UNT", "MessageTrailer").required()),
    }
}

fn composite(id: &str, position: usize, values: &[(&str, &str)]) -> Field {
    let mut c = CompositeElement::new(id, id, position);
    for (i, (element_id, value)) in values.iter().enumerate() {
        c.set_component(DataElement::new(*element_id, *element_id, i + 1, *value));
    }
    Field::Composite(c)
}

fn interchange(date: &str, with_trailer: bool) -> Envelope {
    let mut bgm = Segment::new("BGM", "BeginningOfMessage").at(3, 60);
    bgm.set_field(composite("C002", 1, &[("1001", "220")]));
    let mut dtm = Segment::new("DTM", "DateTimePeriod").at(4, 80);
    dtm.set_field(composite("C507", 1, &[("2005", "137"), ("2380", date)]));

    let mut heading = Group::new("heading", "Heading");
    heading.children.push(Node::Segment(bgm));
    heading.children.push(Node::Segment(dtm));

    let mut ts = TransactionSet::new("ORDERS", "PurchaseOrder");
    ts.version = Some("D96A".to_string());
    ts.header = Some(Segment::new("UNH", "MessageHeader").at(2, 30));
    ts.body.push(Node::Table(heading));
    ts.trailer = Some(Segment::new("UNT", "MessageTrailer").at(5, 100));

    let mut group = FunctionalGroup::implicit();
    group.transaction_sets.push(ts);

    let mut env = Envelope::new(Format::Edifact, Delimiters::edifact());
    env.header = Some(Segment::new("UNB", "InterchangeHeader").at(1, 0));
    env.groups.push(group);
    if with_trailer {
        env.trailer = Some(Segment::new("UNZ", "InterchangeTrailer").at(6, 120));
    }
    env
}

fn registry() -> anyhow::Result<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    SchemaLoader::new().load_from_yaml(SCHEMA)?.register(&registry);
    Ok(registry)
}

#[test]
fn test_valid_interchange_has_no_errors() -> anyhow::Result<()> {
    let registry = registry()?;
    let mut errors = DocumentErrors::new(ErrorLevel::Situation);
    assert!(validate_envelope(&interchange("20240115", true), Some(&envelope_template()), &registry, &mut errors));
    assert!(errors.is_empty(), "{errors}");
    Ok(())
}

#[test]
fn test_bad_date_and_missing_trailer_are_reported() -> anyhow::Result<()> {
    let registry = registry()?;
    let mut errors = DocumentErrors::new(ErrorLevel::Situation);
    let ok = validate_envelope(&interchange("20241301", false), Some(&envelope_template()), &registry, &mut errors);
    assert!(!ok);

    let date = errors.with_code(ErrorCode::InvalidDate).next().expect("date error");
    assert_eq!(date.segment_id, "DTM");
    assert_eq!(date.byte_offset, 80);
    assert_eq!(date.offending.as_deref(), Some("20241301"));

    let trailer = errors.with_code(ErrorCode::MandatorySegmentMissing).next().expect("trailer error");
    assert!(trailer.description.contains("UNZ"));
    Ok(())
}

#[test]
fn test_unknown_transaction_set_is_skipped() -> anyhow::Result<()> {
    let registry = registry()?;
    let mut env = interchange("20240115", true);
    env.groups[0].transaction_sets[0].id = "INVOIC".to_string();
    let mut errors = DocumentErrors::new(ErrorLevel::Situation);
    assert!(validate_envelope(&env, None, &registry, &mut errors));
    Ok(())
}

#[test]
fn test_errors_serialize_for_reporting() -> anyhow::Result<()> {
    let registry = registry()?;
    let mut errors = DocumentErrors::new(ErrorLevel::Situation);
    validate_envelope(&interchange("bad", true), None, &registry, &mut errors);
    let json = serde_json::to_value(&errors)?;
    assert_eq!(json["records"][0]["code"], "InvalidDate");
    Ok(())
}
