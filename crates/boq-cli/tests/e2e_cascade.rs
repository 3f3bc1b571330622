//! E2E CLI tests for the totals cascade.
//!
//! Each test runs the `boq` binary as a subprocess in an isolated temp
//! directory and reads its `--json` output.

use assert_cmd::Command;
use rust_decimal::Decimal;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

/// Build a Command targeting the boq binary, rooted in `dir`.
fn boq_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("boq"));
    cmd.current_dir(dir);
    cmd.env("BOQ_LOG", "error");
    cmd.env("XDG_CONFIG_HOME", dir.join(".xdg"));
    cmd.env_remove("FORMAT");
    cmd
}

fn init(dir: &Path) {
    boq_cmd(dir).args(["init"]).assert().success();
}

/// Run a command with `--json` and parse stdout, failing loudly on error.
fn json(dir: &Path, args: &[&str]) -> Value {
    let output = boq_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("boq should not crash");
    assert!(
        output.status.success(),
        "{args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid JSON on stdout")
}

fn id_of(value: &Value) -> String {
    value["id"].as_str().expect("id field").to_string()
}

fn dec_field(value: &Value, field: &str) -> Decimal {
    value[field]
        .as_str()
        .unwrap_or_else(|| panic!("{field} should be a decimal string: {value}"))
        .parse()
        .expect("decimal")
}

fn dec(raw: &str) -> Decimal {
    raw.parse().expect("valid decimal literal")
}

struct Fixture {
    dir: TempDir,
    project: String,
    bill: String,
    section: String,
}

fn fixture(contingency: &str) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    init(dir.path());
    let project = id_of(&json(
        dir.path(),
        &["project", "create", "--name", "Clinic", "--code", "CL", "--budget", "5000"],
    ));
    let bill = id_of(&json(
        dir.path(),
        &[
            "bill",
            "create",
            "--project",
            &project,
            "--number",
            "1",
            "--title",
            "Substructure",
            "--contingency",
            contingency,
        ],
    ));
    let section = id_of(&json(
        dir.path(),
        &[
            "section", "create", "--project", &project, "--bill", &bill, "--code", "A", "--title",
            "Excavation",
        ],
    ));
    Fixture {
        dir,
        project,
        bill,
        section,
    }
}

fn add_item(f: &Fixture, quantity: &str, rate: &str) -> String {
    id_of(&json(
        f.dir.path(),
        &[
            "item",
            "create",
            "--project",
            &f.project,
            "--section",
            &f.section,
            "--description",
            "Line",
            "--quantity",
            quantity,
            "--rate",
            rate,
        ],
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn item_writes_cascade_to_section_and_bill() {
    let f = fixture("10");
    let first = add_item(&f, "2", "500");
    let second = add_item(&f, "1", "1000");

    let section = json(f.dir.path(), &["section", "show", &f.section]);
    assert_eq!(dec_field(&section, "total_amount"), dec("2000"));
    assert_eq!(section["item_count"], 2);

    let bill = json(f.dir.path(), &["bill", "show", &f.bill]);
    assert_eq!(dec_field(&bill, "subtotal_amount"), dec("2000"));
    assert_eq!(dec_field(&bill, "contingency_amount"), dec("200"));
    assert_eq!(dec_field(&bill, "total_amount"), dec("2200"));

    let updated = json(f.dir.path(), &["item", "update", &second, "--rate", "1500"]);
    assert_eq!(dec_field(&updated, "amount"), dec("1500"));
    let bill = json(f.dir.path(), &["bill", "show", &f.bill]);
    assert_eq!(dec_field(&bill, "total_amount"), dec("2750"));

    json(f.dir.path(), &["item", "delete", &first]);
    let section = json(f.dir.path(), &["section", "show", &f.section]);
    assert_eq!(dec_field(&section, "total_amount"), dec("1500"));
    assert_eq!(section["item_count"], 1);
    let bill = json(f.dir.path(), &["bill", "show", &f.bill]);
    assert_eq!(dec_field(&bill, "total_amount"), dec("1650"));
}

#[test]
fn contingency_command_rederives_totals() {
    let f = fixture("0");
    add_item(&f, "4", "250");

    let totals = json(f.dir.path(), &["bill", "contingency", &f.bill, "7.5"]);
    assert_eq!(dec_field(&totals, "subtotal_amount"), dec("1000"));
    assert_eq!(dec_field(&totals, "contingency_amount"), dec("75"));
    assert_eq!(dec_field(&totals, "total_amount"), dec("1075"));

    let stats = json(f.dir.path(), &["project", "stats", &f.project]);
    assert_eq!(dec_field(&stats, "total_amount"), dec("1075"));
    assert_eq!(dec_field(&stats, "budget_remaining"), dec("3925"));
}

#[test]
fn bulk_import_creates_items_in_one_go() {
    let f = fixture("0");
    let other = id_of(&json(
        f.dir.path(),
        &[
            "section", "create", "--project", &f.project, "--bill", &f.bill, "--code", "B",
            "--title", "Concrete",
        ],
    ));

    let file = f.dir.path().join("items.json");
    std::fs::write(
        &file,
        serde_json::json!([
            {"project_id": f.project, "section_id": f.section, "description": "Trench",
             "quantity": "10", "rate": "35"},
            {"project_id": f.project, "section_id": other, "description": "Blinding",
             "quantity": "2", "rate": "100"},
            {"project_id": f.project, "section_id": f.section, "description": "Disposal",
             "item_type": "LUMP_SUM", "amount": "150"},
        ])
        .to_string(),
    )
    .expect("write import file");

    let created = json(
        f.dir.path(),
        &["item", "import", "--file", file.to_str().expect("utf8 path")],
    );
    assert_eq!(created.as_array().map(Vec::len), Some(3));

    let a = json(f.dir.path(), &["section", "show", &f.section]);
    assert_eq!(dec_field(&a, "total_amount"), dec("500"));
    let bill = json(f.dir.path(), &["bill", "show", &f.bill]);
    assert_eq!(dec_field(&bill, "subtotal_amount"), dec("700"));
    assert_eq!(bill["item_count"], 3);

    let lump = json(
        f.dir.path(),
        &["item", "list", "--bill", &f.bill, "--type", "lump_sum"],
    );
    assert_eq!(lump.as_array().map(Vec::len), Some(1));
}

#[test]
fn section_delete_orphans_items_until_reconcile() {
    let f = fixture("10");
    let item = add_item(&f, "2", "500");

    json(f.dir.path(), &["section", "delete", &f.section]);

    let orphan = json(f.dir.path(), &["item", "show", &item]);
    assert!(orphan["section_id"].is_null());

    let stale = json(f.dir.path(), &["bill", "show", &f.bill]);
    assert_eq!(dec_field(&stale, "total_amount"), dec("1100"));

    let repaired = json(f.dir.path(), &["bill", "reconcile", &f.bill]);
    assert_eq!(dec_field(&repaired, "total_amount"), dec("0"));
    assert_eq!(repaired["section_count"], 0);
}

#[test]
fn copy_and_reorder_sections() {
    let f = fixture("0");
    add_item(&f, "3", "100");
    let target = id_of(&json(
        f.dir.path(),
        &[
            "bill", "create", "--project", &f.project, "--number", "2", "--title", "Frame",
        ],
    ));

    let copy = json(
        f.dir.path(),
        &["section", "copy", &f.section, "--to-bill", &target],
    );
    assert_ne!(id_of(&copy), f.section);
    assert_eq!(dec_field(&copy, "total_amount"), dec("300"));

    let extra = id_of(&json(
        f.dir.path(),
        &[
            "section", "create", "--project", &f.project, "--bill", &target, "--code", "Z",
            "--title", "Finishes",
        ],
    ));
    json(
        f.dir.path(),
        &[
            "section",
            "reorder",
            &format!("{extra}=0"),
            &format!("{}=1", id_of(&copy)),
        ],
    );
    let listed = json(f.dir.path(), &["section", "list", "--bill", &target]);
    let codes: Vec<&str> = listed
        .as_array()
        .expect("array")
        .iter()
        .map(|s| s["section_code"].as_str().expect("code"))
        .collect();
    assert_eq!(codes, ["Z", "A"]);
}

#[test]
fn text_mode_lists_bills_as_rows() {
    let f = fixture("10");
    add_item(&f, "1", "100");

    boq_cmd(f.dir.path())
        .env("FORMAT", "text")
        .args(["bill", "list", "--project", &f.project])
        .assert()
        .success()
        .stdout(predicates::str::contains("ID\tORDER\tNUMBER"))
        .stdout(predicates::str::contains("Substructure\t100.00\t10\t110.00"));
}
