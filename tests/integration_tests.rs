//! Integration tests for the dirflow CLI

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use tempfile::TempDir;

const RULES: &str = r#"
rules:
  "**/*.txt":
    processors: [count_chars]
  "**/":
    post_processors: [summarize, propagate]
"#;

fn dirflow() -> Command {
    Command::cargo_bin("dirflow").unwrap()
}

/// data/group1/file.txt ("abc") and data/group2/file.txt ("hello")
fn data_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("data/group1")).unwrap();
    fs::create_dir_all(dir.path().join("data/group2")).unwrap();
    fs::write(dir.path().join("data/group1/file.txt"), "abc").unwrap();
    fs::write(dir.path().join("data/group2/file.txt"), "hello").unwrap();
    fs::write(dir.path().join("rules.yaml"), RULES).unwrap();
    dir
}

fn summary_for<'a>(report: &'a Value, path: &str) -> &'a Value {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["processor"] == "summarize" && r["path"] == path)
        .unwrap_or_else(|| panic!("no summary for {path}"))
}

#[test]
fn test_cli_help() {
    dirflow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rule-driven directory traversal"));
}

#[test]
fn test_cli_version() {
    dirflow()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("dirflow"));

    dirflow()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_invalid_subcommand() {
    dirflow()
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_processors_lists_builtins() {
    dirflow()
        .arg("processors")
        .assert()
        .success()
        .stdout(predicate::str::contains("count_chars"))
        .stdout(predicate::str::contains("persist_history"));

    let output = dirflow().args(["processors", "--json"]).output().unwrap();
    assert!(output.status.success());
    let catalog: Value = serde_json::from_slice(&output.stdout).unwrap();
    let summarize = catalog
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "summarize")
        .unwrap();
    assert_eq!(summarize["phases"], serde_json::json!(["post"]));
    assert_eq!(summarize["source"], "builtin");
}

#[test]
fn test_template_then_validate() {
    let dir = TempDir::new().unwrap();

    dirflow()
        .current_dir(dir.path())
        .args(["template", "starter.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("toml rule template"));
    assert!(dir.path().join("starter.toml").exists());

    dirflow()
        .current_dir(dir.path())
        .args(["template", "starter.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    dirflow()
        .current_dir(dir.path())
        .args(["validate", "--rules", "starter.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

#[test]
fn test_validate_rejects_unknown_processor() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.yaml"), "rules:\n  \"*.txt\": [no_such_thing]\n").unwrap();

    dirflow()
        .current_dir(dir.path())
        .args(["validate", "--rules", "bad.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no_such_thing"));
}

#[test]
fn test_run_json_aggregates_upwards() {
    let dir = data_tree();

    let output = dirflow()
        .current_dir(dir.path())
        .args(["run", "data", "--rules", "rules.yaml", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["failures"], 0);
    assert_eq!(report["cancelled"], false);
    assert_eq!(report["nodes_visited"], 5);

    let group1 = summary_for(&report, "group1");
    assert_eq!(group1["count"], 1);
    assert_eq!(group1["chars"], 3);

    let root = summary_for(&report, ".");
    assert_eq!(root["count"], 2);
    assert_eq!(root["chars"], 8);
}

#[test]
fn test_run_writes_report_file() {
    let dir = data_tree();

    dirflow()
        .current_dir(dir.path())
        .args(["run", "data", "--rules", "rules.yaml", "--output", "report.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nodes visited"));

    let written = fs::read_to_string(dir.path().join("report.json")).unwrap();
    let report: Value = serde_json::from_str(&written).unwrap();
    assert!(report["run_id"].is_string());
}

#[test]
fn test_strict_exits_non_zero_on_failures() {
    let dir = data_tree();
    // match_lines without a pattern fails on every file
    fs::write(
        dir.path().join("failing.yaml"),
        "rules:\n  \"**/*.txt\": match_lines\n",
    )
    .unwrap();

    dirflow()
        .current_dir(dir.path())
        .args(["run", "data", "--rules", "failing.yaml"])
        .assert()
        .success();

    dirflow()
        .current_dir(dir.path())
        .args(["run", "data", "--rules", "failing.yaml", "--strict"])
        .assert()
        .failure();

    dirflow()
        .current_dir(dir.path())
        .args(["run", "data", "--rules", "failing.yaml", "--fail-fast"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("match_lines"));
}

#[test]
fn test_run_missing_root_fails() {
    let dir = data_tree();

    dirflow()
        .current_dir(dir.path())
        .args(["run", "nope", "--rules", "rules.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
}

#[test]
fn test_settings_file_limits_depth() {
    let dir = data_tree();
    fs::write(dir.path().join("shallow.toml"), "[engine]\nmax_depth = 1\n").unwrap();

    dirflow()
        .current_dir(dir.path())
        .args(["--settings", "shallow.toml", "run", "data", "--rules", "rules.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("depth"));
}

#[test]
fn test_settings_prints_merged_layers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("deep.toml"), "[engine]\nmax_depth = 7\n").unwrap();

    let output = dirflow()
        .current_dir(dir.path())
        .args(["--settings", "deep.toml", "settings", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let merged: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(merged["engine"]["max_depth"], 7);
    assert_eq!(merged["engine"]["fail_fast"], false);

    dirflow()
        .arg("settings")
        .assert()
        .success()
        .stdout(predicate::str::contains("[engine]"));
}

#[test]
fn test_run_progress_goes_to_stderr() {
    let dir = data_tree();

    let output = dirflow()
        .current_dir(dir.path())
        .args(["run", "data", "--rules", "rules.yaml", "--json", "--progress"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("inline count_chars group1/file.txt"), "{stderr}");
    assert!(stderr.contains("100%"), "{stderr}");
    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["failures"], 0);
}
