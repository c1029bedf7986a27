mod common;

use assert_cmd::Command;
use common::{SOMATOMETRIA_CSV, TestWorkspace};
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;

fn csv_ingest(workspace: &TestWorkspace) -> Command {
    let mut cmd = Command::cargo_bin("csv-ingest").expect("binary exists");
    cmd.arg("--store").arg(workspace.store_dir());
    cmd.env_remove("CSV_INGEST_STORE");
    cmd
}

fn json_output(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("valid JSON output")
}

#[test]
fn ingest_prints_report_and_upload_is_listed() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("people.csv", "name,age\nAnn,30\nBo,x\nCy,\n");

    let report = json_output(csv_ingest(&workspace).arg("ingest").arg(&file));
    assert_eq!(report["success"], true);
    assert_eq!(report["kind"], "generic");
    assert_eq!(report["rowsProcessed"], 3);
    assert_eq!(report["columnsCreated"], 2);
    let table_name = report["tableName"].as_str().expect("table name").to_string();
    assert!(table_name.starts_with("people_"));

    let uploads = json_output(csv_ingest(&workspace).arg("uploads"));
    assert_eq!(uploads.as_array().map(Vec::len), Some(1));
    assert_eq!(uploads[0]["status"], "completed");
    assert_eq!(uploads[0]["original_filename"], "people.csv");

    let detail = json_output(csv_ingest(&workspace).args(["show", "1"]));
    assert_eq!(detail["columns"][1]["column_type"], "VARCHAR(255)");
    assert_eq!(detail["rows"].as_array().map(Vec::len), Some(3));

    let rows = json_output(csv_ingest(&workspace).args(["rows", &table_name, "--limit", "2"]));
    assert_eq!(rows.as_array().map(Vec::len), Some(2));
    assert_eq!(rows[0]["row_data"]["name"], "Ann");
}

#[test]
fn non_csv_file_is_rejected_before_any_upload() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("notes.txt", "a,b\n1,2\n");

    csv_ingest(&workspace)
        .arg("ingest")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("only CSV files are allowed"));

    let uploads = json_output(csv_ingest(&workspace).arg("uploads"));
    assert_eq!(uploads, Value::Array(Vec::new()));
}

#[test]
fn declared_content_type_admits_other_extensions() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("export.txt", "a,b\n1,2\n");

    csv_ingest(&workspace)
        .args(["ingest", "--content-type", "text/csv"])
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("\"rowsProcessed\": 1"));
}

#[test]
fn oversized_file_is_rejected() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("big.csv", "a,b\n1,2\n3,4\n");

    csv_ingest(&workspace)
        .args(["ingest", "--max-bytes", "4"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("exceeding the 4 byte limit"));
}

#[test]
fn empty_file_fails_and_is_recorded_as_error() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("empty.csv", "name,age\n");

    csv_ingest(&workspace)
        .arg("ingest")
        .arg(&file)
        .assert()
        .failure()
        .stderr(contains("file is empty"));

    let uploads = json_output(csv_ingest(&workspace).arg("uploads"));
    assert_eq!(uploads[0]["status"], "error");
    assert_eq!(uploads[0]["error_message"], "file is empty");
    assert_eq!(workspace.staged_file_count(), 0);
}

#[test]
fn somatometria_upload_is_listed_and_counted() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("grupo.csv", SOMATOMETRIA_CSV);

    let report = json_output(csv_ingest(&workspace).arg("ingest").arg(&file));
    assert_eq!(report["kind"], "somatometria");
    assert_eq!(report["tableName"], "somatometria");

    let records = json_output(csv_ingest(&workspace).arg("somatometria"));
    assert_eq!(records.as_array().map(Vec::len), Some(2));
    assert!(records[0]["peso"].is_number());

    let stats = json_output(csv_ingest(&workspace).arg("stats"));
    assert_eq!(stats["totalFiles"], 1);
    assert_eq!(stats["totalRecords"], 2);
    assert_eq!(stats["completedUploads"], 1);
    assert_eq!(stats["somatometriaRecords"], 2);

    csv_ingest(&workspace)
        .args(["somatometria", "--table"])
        .assert()
        .success()
        .stdout(contains("no_control").and(contains("A002")));
}

#[test]
fn table_output_renders_uploads_and_stats() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("cities.csv", "city,population\nLeon,1500000\n");
    csv_ingest(&workspace).arg("ingest").arg(&file).assert().success();

    csv_ingest(&workspace)
        .args(["uploads", "--table"])
        .assert()
        .success()
        .stdout(contains("cities.csv").and(contains("completed")));
    csv_ingest(&workspace)
        .args(["show", "1", "--table"])
        .assert()
        .success()
        .stdout(contains("population").and(contains("INTEGER")));
    csv_ingest(&workspace)
        .args(["stats", "--table"])
        .assert()
        .success()
        .stdout(contains("total_files"));
}

#[test]
fn clear_removes_everything() {
    let workspace = TestWorkspace::new();
    let file = workspace.write("cities.csv", "city\nLeon\n");
    csv_ingest(&workspace).arg("ingest").arg(&file).assert().success();

    csv_ingest(&workspace)
        .arg("clear")
        .assert()
        .success()
        .stdout(contains("\"success\": true"));

    let stats = json_output(csv_ingest(&workspace).arg("stats"));
    assert_eq!(stats["totalFiles"], 0);
    assert_eq!(stats["recentUploads"], Value::Array(Vec::new()));
}

#[test]
fn unknown_upload_is_reported() {
    let workspace = TestWorkspace::new();
    csv_ingest(&workspace)
        .args(["show", "42"])
        .assert()
        .failure()
        .stderr(contains("Upload 42 not found"));
}
