use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::NamedTempFile;

const SCHEMA: &str = r"
transaction_sets:
  - id: ORDERS
    name: Order details
    body:
      - kind: segment
        id: CLO
        required: true
        elements:
          - { position: 1, id: CLOC, name: CustomerLocation, type: AN, max_length: 17, required: true }
      - kind: segment
        id: ORD
        required: true
        elements:
          - { position: 1, id: ORNO, name: OrderNumber, type: AN, max_length: 17, required: true }
      - kind: loop
        id: OLD
        max_use: 9999
        children:
          - kind: segment
            id: OLD
            required: true
            elements:
              - { position: 1, id: SEQA, name: LineNumber, type: N, max_length: 10, required: true }
              - { position: 2, id: QTYO, name: Quantity, type: N, max_length: 15 }
";

const FILE: &str = "STX=ANA:1+5000000000000:BUYER+5010000000000:SUPPLIER+240301:083000+TX42'\
MHD=1+ORDERS:9'CLO=5000000000017'ORD=PO100'OLD=1+12'OLD=2+3'MTR=6'\
END=1'";

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
fn validate_command_accepts_a_clean_file() {
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", FILE);

    let output = run_edi(&["validate", &path(&input), "--schema", &path(&schema)]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.trim_end().ends_with(": valid"), "stdout: {stdout}");
}

#[test]
fn validate_command_lists_errors_and_exits_one() {
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", &FILE.replace("OLD=2+3", "OLD=X+3"));

    let output = run_edi(&["validate", &path(&input), "-s", &path(&schema)]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("'OLD'"), "stdout: {stdout}");
    assert!(stdout.contains("(value 'X')"), "stdout: {stdout}");
    assert!(String::from_utf8_lossy(&output.stderr).contains("1 error(s)"));
}

#[test]
fn validate_command_prints_errors_as_json() {
    let schema = write_temp_file("yaml", SCHEMA);
    let input = write_temp_file("edi", &FILE.replace("MTR=6", "MTR=7"));

    let output = run_edi(&["validate", &path(&input), "-s", &path(&schema), "--errors-json"]);

    assert_eq!(output.status.code(), Some(1));
    let errors: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should contain valid JSON");
    let first = &errors["records"][0];
    assert_eq!(first["code"], "ControlCountMismatch");
    assert_eq!(first["segment_id"], "MTR");
    assert_eq!(first["offending"], "7");
}

#[test]
fn validate_command_without_a_schema_flags_the_message() {
    let input = write_temp_file("edi", FILE);

    let output = run_edi(&["validate", &path(&input), "--format", "tradacoms"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ORDERS"));
}
