use anyhow::Result;
use edi_adapter_ach::layouts::register_defaults;
use edi_adapter_ach::{AchParser, AchSerializer};
use edi_ir::{ErrorCode, ErrorLevel, Node};
use edi_parser::ParserConfig;
use edi_schema::SchemaRegistry;

fn record(text: &str) -> String {
    format!("{text:<94}")
}

/// Two batches (PPD with an addenda, CCD debit) and filler to one block
fn records() -> Vec<String> {
    let mut records = vec![
        record("101 09100001912345678902401011200A094101FIRST BANK             ACME CORP"),
        record("5200ACME CORP                           1234567890PPDPAYROLL   240101240102   1091000010000001"),
        record("622091000019123456789        0000012500EMP001         JOHN DOE                1091000010000001"),
        record("705PAYROLL JANUARY                                                                 00010000001"),
        record("820000000200091000010000000000000000000125001234567890                         091000010000001"),
        record("5225ACME CORP                           1234567890CCDVENDOR PAY240101240102   1091000010000002"),
        record("627021000021987654321        0000004000VEND17         SUPPLIES INC            0091000010000002"),
        record("822500000100021000020000000040000000000000001234567890                         091000010000002"),
        record("9000002000001000000030011200003000000004000000000012500"),
    ];
    records.resize(10, "9".repeat(94));
    records
}

fn parser() -> AchParser<SchemaRegistry> {
    let registry = SchemaRegistry::new();
    register_defaults(&registry);
    AchParser::new(ParserConfig::default(), registry)
}

#[test]
fn test_file_round_trip() -> Result<()> {
    let text = records().join("\n") + "\n";
    let doc = parser().parse_document(text.as_bytes())?;
    assert!(doc.errors.is_empty(), "{:?}", doc.errors.records());

    let batches: Vec<_> = doc.envelope.transaction_sets().collect();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].id, "PPD");
    assert_eq!(batches[1].id, "CCD");

    let entry = batches[0].body.get("entry").and_then(Node::children).unwrap();
    let addenda = entry.get("7").and_then(Node::as_segment).unwrap();
    assert_eq!(addenda.text(3), Some("PAYROLL JANUARY"));

    let out = AchSerializer::new().serialize(&doc.envelope)?;
    assert_eq!(String::from_utf8(out)?, text);
    Ok(())
}

#[test]
fn test_crlf_and_contiguous_files_keep_their_layout() -> Result<()> {
    for separator in ["\r\n", ""] {
        let text = records().join(separator) + separator;
        let doc = parser().parse_document(text.as_bytes())?;
        assert!(doc.errors.is_empty(), "{:?}", doc.errors.records());
        assert_eq!(AchSerializer::new().serialize(&doc.envelope)?, text.as_bytes());
    }
    Ok(())
}

#[test]
fn test_unknown_entry_class_is_kept_untemplated() -> Result<()> {
    let text = records()
        .iter()
        .map(|r| r.replace("1234567890CCDVENDOR", "1234567890XYZVENDOR"))
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    let doc = parser().parse_document(text.as_bytes())?;
    let errors = doc.errors.records();
    assert_eq!(errors.len(), 1, "{errors:?}");
    assert_eq!(errors[0].code, ErrorCode::UnknownTransactionSet);
    assert_eq!(errors[0].level, ErrorLevel::Fatal);

    let out = AchSerializer::new().serialize(&doc.envelope)?;
    assert_eq!(String::from_utf8(out)?, text);
    Ok(())
}

#[test]
fn test_entry_count_mismatch() -> Result<()> {
    let mut records = records();
    records[4] = records[4].replacen("820000000200", "820000000900", 1);
    let doc = parser().parse_document(records.join("\n").as_bytes())?;
    let mismatch = doc
        .errors
        .with_code(ErrorCode::ControlCountMismatch)
        .next()
        .unwrap();
    assert_eq!(mismatch.segment_id, "8");
    assert_eq!(mismatch.offending.as_deref(), Some("000009"));
    assert_eq!(mismatch.byte_offset, 4 * 95);
    Ok(())
}
