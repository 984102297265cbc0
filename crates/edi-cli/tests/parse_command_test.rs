use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const SCHEMA: &str = r"
code_lists:
  - name: party_qualifiers
    codes: [BY, SU]
transaction_sets:
  - id: ORDERS
    name: Purchase order
    body:
      - kind: segment
        id: BGM
        required: true
        elements:
          - { position: 1, id: '1001', name: DocumentName, type: AN, max_length: 3 }
          - { position: 2, id: '1004', name: DocumentNumber, type: AN, max_length: 35 }
      - kind: loop
        id: SG2
        max_use: 99
        children:
          - kind: segment
            id: NAD
            required: true
            elements:
              - { position: 1, id: '3035', name: PartyQualifier, type: ID, max_length: 3, required: true, code_list: party_qualifiers }
";

const ORDERS: &str = "UNA:+.? 'UNB+UNOC:3+SENDER:14+RECEIVER:14+240315:0930+42'\
UNH+1+ORDERS:D:96A:UN'BGM+220+PO-77'NAD+BY'NAD+SU'UNT+5+1'UNZ+1+42'";

fn cargo_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_edi"))
}

fn write_temp_file(extension: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("edi-cli-")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("temporary file should be creatable");
    file.write_all(content.as_bytes()).expect("temporary file should be writable");
    file
}

fn run_edi(args: &[&str]) -> Output {
    Command::new(cargo_bin()).args(args).output().expect("run edi")
}

fn path(file: &NamedTempFile) -> String {
    file.path().to_string_lossy().into_owned()
}

#[test]
fn parse_command_writes_xml_to_stdout() {
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", ORDERS);

    let output = run_edi(&["parse", &path(&input), "--schema", &path(&schema)]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    let stdout = String::from_utf8(output.stdout).expect("stdout should be UTF-8");
    assert!(stdout.starts_with("<?xml"));
    assert!(stdout.contains("<envelope format=\"EDIFACT\">"));
    assert!(stdout.contains("<loop id=\"SG2\""));
    assert!(
        stderr.contains("Parse summary: format=EDIFACT, transaction_sets=1, errors=0"),
        "stderr: {stderr}"
    );
}

#[test]
fn parse_command_writes_edi_back() {
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", ORDERS);

    let output = run_edi(&["parse", &path(&input), "-s", &path(&schema), "--output", "edi"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).expect("stdout should be UTF-8");
    assert!(stdout.starts_with("UNA:+.? '"));
    assert!(stdout.contains("BGM+220+PO-77'"));
    assert!(stdout.ends_with("UNZ+1+42'"));
}

#[test]
fn parse_command_reports_recorded_errors_without_failing() {
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", &ORDERS.replace("UNT+5+1", "UNT+4+1"));

    let output = run_edi(&["parse", &path(&input), "-s", &path(&schema)]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr: {stderr}");
    assert!(stderr.contains("(value '4')"), "stderr: {stderr}");
    assert!(stderr.contains("errors=1"), "stderr: {stderr}");
}

#[test]
fn fail_on_errors_config_rejects_the_document() {
    let config = write_temp_file("yaml", "fail_on_errors: true\n");
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", &ORDERS.replace("NAD+SU", "NAD+ZZ"));

    let output = run_edi(&[
        "--config",
        &path(&config),
        "parse",
        &path(&input),
        "-s",
        &path(&schema),
        "--errors-json",
    ]);

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("\"InvalidCodeValue\""), "stderr: {stderr}");
}

#[test]
fn invalid_config_returns_fatal_exit_code() {
    let bad_config = write_temp_file("yaml", "color: neon");
    let input = write_temp_file("edi", ORDERS);

    let output = run_edi(&["--config", &path(&bad_config), "parse", &path(&input)]);

    assert_eq!(output.status.code(), Some(3));
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("ERROR:"),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn x12_input_is_refused() {
    let input = write_temp_file("edi", "ISA*00*          *00*          *ZZ*SENDER         *ZZ*RECEIVER       *240101*1200*U*00401*000000001*0*P*>~");

    let output = run_edi(&["parse", &path(&input)]);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("X12"));
}

#[test]
fn missing_input_file_is_fatal() {
    let output = run_edi(&["parse", "/nonexistent/edi-cli-input.edi"]);
    assert_eq!(output.status.code(), Some(3));
}
