//! Drives the tokenizer facade, matcher and body parser together

use anyhow::Result;
use edi_ir::{Delimiters, ErrorCode, ErrorLevel, Node, Segment};
use edi_parser::{
    BodyParser, DocumentHandler, Flow, NullHandler, Outcome, ParserConfig, Tokenizer, Verdict, is_this_you,
};
use edi_schema::{SchemaLoader, SchemaLookup, SchemaRegistry, TransactionSetKey};
use std::io::Write;

const SCHEMA: &str = r"
code_lists:
  - name: qualifiers
    codes: [BY, SU]
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
      - kind: loop
        id: SG2
        max_use: 5
        children:
          - kind: segment
            id: NAD
            required: true
            elements:
              - { position: 1, id: '3035', name: PartyQualifier, type: ID, max_length: 3, required: true, code_list: qualifiers }
          - kind: segment
            id: BIN
            elements:
              - { position: 1, id: '0001', name: Length, type: N, max_length: 9 }
              - { position: 2, id: '0002', name: Payload, type: B, max_length: 99 }
";

fn registry() -> Result<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    SchemaLoader::new().load_from_yaml(SCHEMA)?.register(&registry);
    Ok(registry)
}

struct Recorder {
    seen: Vec<String>,
    halt_on: Option<&'static str>,
}

impl DocumentHandler for Recorder {
    fn start_segment(&mut self, segment: &Segment) -> Flow {
        self.seen.push(segment.id.clone());
        if self.halt_on == Some(segment.id.as_str()) { Flow::Halt } else { Flow::Continue }
    }
}

#[test]
fn test_body_with_binary_payload_and_recovery() -> Result<()> {
    let registry = registry()?;
    let template = registry.transaction_set(&TransactionSetKey::new("ORDERS").with_version("D96A"))?;
    let text = "BGM+220'NAD+BY'BIN+5+a'b+c'ZZZ'NAD+SU'UNT+6+1'";
    let mut tokenizer = Tokenizer::new(text.as_bytes(), Delimiters::edifact(), &ParserConfig::default());
    let mut recorder = Recorder { seen: Vec::new(), halt_on: None };

    let mut body = BodyParser::new(&template, true);
    let outcome = body.parse_until(&mut tokenizer, &mut recorder, &["UNT"])?;
    assert_eq!(outcome, Outcome::Yielded);
    assert_eq!(tokenizer.segment_id(), "UNT");
    assert_eq!(recorder.seen, vec!["BGM", "NAD", "BIN", "NAD"]);

    let errors = tokenizer.errors().records();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code, ErrorCode::UnrecognizedSegment);
    assert_eq!(errors[0].byte_offset, 27);

    let children = body.finish();
    let loops: Vec<&Node> = children.get_all("SG2").collect();
    assert_eq!(loops.len(), 2);
    let bin = loops[0]
        .children()
        .and_then(|c| c.get("BIN"))
        .and_then(Node::as_segment)
        .map(|s| s.field(2).cloned());
    let Some(Some(edi_ir::Field::Data(payload))) = bin else {
        panic!("BIN payload missing");
    };
    assert_eq!(payload.value, edi_ir::Value::Binary(b"a'b+c".to_vec()));
    Ok(())
}

#[test]
fn test_binary_payload_with_escape_and_terminator_bytes() -> Result<()> {
    let registry = registry()?;
    let template = registry.transaction_set(&TransactionSetKey::new("ORDERS").with_version("D96A"))?;
    let text = "BGM+220'NAD+BY'BIN+6+?'x'?+'NAD+SU'UNT+5+1'";
    let mut tokenizer = Tokenizer::new(text.as_bytes(), Delimiters::edifact(), &ParserConfig::default());
    let mut recorder = Recorder { seen: Vec::new(), halt_on: None };

    let mut body = BodyParser::new(&template, true);
    assert_eq!(body.parse_until(&mut tokenizer, &mut recorder, &["UNT"])?, Outcome::Yielded);
    assert_eq!(recorder.seen, vec!["BGM", "NAD", "BIN", "NAD"]);
    assert!(tokenizer.errors().is_empty(), "{:?}", tokenizer.errors().records());
    assert_eq!(tokenizer.segment_offset(), text.find("UNT").unwrap_or_default());

    let children = body.finish();
    let payload = children
        .get("SG2")
        .and_then(Node::children)
        .and_then(|c| c.get("BIN"))
        .and_then(Node::as_segment)
        .and_then(|s| s.field(2).cloned());
    let Some(edi_ir::Field::Data(payload)) = payload else {
        panic!("BIN payload missing");
    };
    assert_eq!(payload.value, edi_ir::Value::Binary(b"?'x'?+".to_vec()));
    Ok(())
}

#[test]
fn test_halt_stops_after_notification() -> Result<()> {
    let registry = registry()?;
    let template = registry.transaction_set(&TransactionSetKey::new("ORDERS").with_version("D96A"))?;
    let mut tokenizer = Tokenizer::new(&b"BGM+220'NAD+BY'NAD+SU'UNT+4+1'"[..], Delimiters::edifact(), &ParserConfig::default());
    let mut recorder = Recorder { seen: Vec::new(), halt_on: Some("NAD") };
    let mut body = BodyParser::new(&template, true);
    assert_eq!(body.parse(&mut tokenizer, &mut recorder)?, Outcome::Halted);
    assert_eq!(recorder.seen, vec!["BGM", "NAD"]);
    assert_eq!(tokenizer.position(), 2);
    Ok(())
}

#[test]
fn test_matcher_does_not_disturb_reading() -> Result<()> {
    let registry = registry()?;
    let template = registry.transaction_set(&TransactionSetKey::new("ORDERS").with_version("D96A"))?;
    let Some(nad) = template.tables[1].lead_segment() else {
        panic!("loop without lead");
    };
    let config = ParserConfig::default();

    let mut plain = Tokenizer::new(&b"NAD+XX+1:2'"[..], Delimiters::edifact(), &config);
    plain.next_segment("")?;
    let mut expected = Vec::new();
    while plain.has_more_elements() {
        expected.push(plain.next_data_element().to_string());
    }

    let mut candidate = Tokenizer::new(&b"NAD+XX+1:2'"[..], Delimiters::edifact(), &config);
    candidate.next_segment("")?;
    assert!(matches!(is_this_you(&mut candidate, &nad.elements), Verdict::Mismatch(_)));
    let mut seen = Vec::new();
    while candidate.has_more_elements() {
        seen.push(candidate.next_data_element().to_string());
    }
    assert_eq!(seen, expected);
    Ok(())
}

#[test]
fn test_minimum_level_drops_lax_errors() -> Result<()> {
    let registry = registry()?;
    let template = registry.transaction_set(&TransactionSetKey::new("ORDERS").with_version("D96A"))?;
    let config = ParserConfig {
        error_level: ErrorLevel::Integrity,
        ..ParserConfig::default()
    };
    let mut tokenizer = Tokenizer::new(&b"BGM+220+X'QQQ'UNT+3+1'"[..], Delimiters::edifact(), &config);
    let mut body = BodyParser::new(&template, true);
    body.parse_until(&mut tokenizer, &mut NullHandler, &["UNT"])?;
    // too many data elements (requirement) is dropped, the unknown segment is kept
    let errors = tokenizer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors.records()[0].code, ErrorCode::UnrecognizedSegment);
    Ok(())
}

#[test]
fn test_config_file_round_trip() -> Result<()> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    writeln!(file, "prevalidate: false\nfail_on_errors: true\nbinary_segments: [BDS]")?;
    let config = ParserConfig::load(file.path())?;
    assert!(!config.prevalidate);
    assert!(config.fail_on_errors);
    assert!(config.is_binary_segment("BDS"));
    assert!(!config.is_binary_segment("BIN"));
    Ok(())
}
