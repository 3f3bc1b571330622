//! E2E CLI tests for error reporting: exit status, error codes on stderr,
//! and the JSON error envelope.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn boq_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("boq"));
    cmd.current_dir(dir);
    cmd.env("BOQ_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join(".xdg"));
    cmd.env_remove("FORMAT");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    boq_cmd(dir.path()).arg("init").assert().success();
    dir
}

fn create_project(dir: &Path) -> String {
    let output = boq_cmd(dir)
        .args(["project", "create", "--name", "Depot", "--code", "DP", "--json"])
        .output()
        .expect("run");
    assert!(output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).expect("json");
    value["id"].as_str().expect("id").to_string()
}

#[test]
fn commands_before_init_fail_with_not_initialized() {
    let dir = TempDir::new().expect("tempdir");
    boq_cmd(dir.path())
        .args(["project", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E1001]"))
        .stderr(predicate::str::contains("boq init"));
}

#[test]
fn init_twice_needs_force() {
    let dir = initialized();
    boq_cmd(dir.path()).arg("init").assert().failure();
    boq_cmd(dir.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn missing_bill_reports_its_code() {
    let dir = initialized();
    boq_cmd(dir.path())
        .args(["bill", "show", "bil-ffffffffffff"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2002]"));
}

#[test]
fn json_errors_use_the_error_envelope() {
    let dir = initialized();
    let output = boq_cmd(dir.path())
        .args(["section", "recalc", "sec-ffffffffffff", "--json"])
        .output()
        .expect("run");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let value: Value = serde_json::from_slice(&output.stderr).expect("json error on stderr");
    assert_eq!(value["error"]["error_code"], "E2003");
}

#[test]
fn out_of_range_contingency_is_invalid_input() {
    let dir = initialized();
    let project = create_project(dir.path());
    boq_cmd(dir.path())
        .args([
            "bill",
            "create",
            "--project",
            &project,
            "--number",
            "1",
            "--title",
            "Works",
            "--contingency",
            "150",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2101]"));

    let listed = boq_cmd(dir.path())
        .args(["bill", "list", "--project", &project, "--json"])
        .output()
        .expect("run");
    let value: Value = serde_json::from_slice(&listed.stdout).expect("json");
    assert_eq!(value.as_array().map(Vec::len), Some(0));
}

#[test]
fn bad_import_file_writes_nothing() {
    let dir = initialized();
    let project = create_project(dir.path());
    let file = dir.path().join("items.json");
    std::fs::write(
        &file,
        serde_json::json!([
            {"project_id": project, "description": "Good", "quantity": "1", "rate": "10"},
            {"project_id": project, "description": "", "quantity": "1", "rate": "10"},
        ])
        .to_string(),
    )
    .expect("write");

    boq_cmd(dir.path())
        .args(["item", "import", "--file", file.to_str().expect("utf8")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E2101]"));

    let listed = boq_cmd(dir.path())
        .args(["item", "list", "--project", &project, "--json"])
        .output()
        .expect("run");
    let value: Value = serde_json::from_slice(&listed.stdout).expect("json");
    assert_eq!(value.as_array().map(Vec::len), Some(0));
}
