use serde_json::Value;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const FIXTURE: &str = r#"id: demoDocument
title: Demo
sheets:
  - title: common
    rows:
      - [KEY, English, Vietnamese]
      - [hello, Hello, Xin chào]
      - [hello, Hi, ""]
      - ["", Orphan, ""]
  - title: errors
    rows:
      - [KEY]
      - [not_found]
"#;

fn write_fixture(path: &Path) {
    std::fs::write(path, FIXTURE).expect("write fixture");
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(assert_cmd::cargo::cargo_bin!("sheets-i18n-cli"))
        .args(args)
        .env_remove("SHEETS_I18N_USER_TOKEN")
        .output()
        .expect("run sheets-i18n-cli")
}

fn parse_stdout_json(output: &std::process::Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).expect("stdout utf8");
    serde_json::from_str(&stdout).expect("valid json")
}

#[test]
fn cli_validate_reports_issues_per_sheet() {
    let tmp = tempdir().expect("tempdir");
    let fixture = tmp.path().join("doc.yaml");
    write_fixture(&fixture);

    let output = run_cli(&["validate", "--fixture", fixture.to_str().expect("path utf8")]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let payload = parse_stdout_json(&output);
    assert_eq!(payload["isValid"], false);
    let sheets: Vec<&str> = payload["validationIssues"]
        .as_array()
        .expect("issues array")
        .iter()
        .filter_map(|issue| issue["sheetTitle"].as_str())
        .collect();
    assert_eq!(sheets, vec!["common", "errors"]);
}

#[test]
fn cli_fix_all_repairs_and_writes_the_fixture_back() {
    let tmp = tempdir().expect("tempdir");
    let fixture = tmp.path().join("doc.yaml");
    write_fixture(&fixture);
    let fixture_arg = fixture.to_str().expect("path utf8");

    let fix = run_cli(&["fix", "--all", "--fixture", fixture_arg]);
    assert!(fix.status.success(), "stderr: {:?}", fix.stderr);
    let payload = parse_stdout_json(&fix);
    assert_eq!(payload["spreadsheet"]["isValid"], true);

    let validate = run_cli(&["validate", "--fixture", fixture_arg]);
    assert!(validate.status.success(), "stderr: {:?}", validate.stderr);
    assert_eq!(parse_stdout_json(&validate)["isValid"], true);
}

#[test]
fn cli_export_writes_one_file_per_language() {
    let tmp = tempdir().expect("tempdir");
    let fixture = tmp.path().join("doc.json");
    std::fs::write(
        &fixture,
        r#"{"id":"demoDocument","title":"Demo","sheets":[{"title":"common","rows":[["KEY","English","Vietnamese"],["button.save","Save",""]]}]}"#,
    )
    .expect("write fixture");
    let out = tmp.path().join("locales");

    let output = run_cli(&[
        "export",
        "--fixture",
        fixture.to_str().expect("path utf8"),
        "--out",
        out.to_str().expect("path utf8"),
        "--fallback",
        "English",
    ]);
    assert!(output.status.success(), "stderr: {:?}", output.stderr);

    let vietnamese: Value = serde_json::from_str(
        &std::fs::read_to_string(out.join("Vietnamese.json")).expect("vietnamese file"),
    )
    .expect("valid json");
    assert_eq!(vietnamese["common"]["button"]["save"], "Save");
    assert!(out.join("English.json").exists());
}

#[test]
fn cli_errors_are_structured_envelopes_on_stderr() {
    let output = run_cli(&["validate"]);
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr).expect("stderr utf8");
    let envelope_line = stderr
        .lines()
        .rev()
        .find(|line| line.starts_with('{'))
        .expect("error envelope on stderr");
    let envelope: Value = serde_json::from_str(envelope_line).expect("envelope json");
    assert_eq!(envelope["code"], "DOCUMENT_REQUIRED");
}
