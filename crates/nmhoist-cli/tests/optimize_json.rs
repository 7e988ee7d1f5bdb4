//! Integration tests for `nmhoist optimize` and `nmhoist tree` on fixture listings.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const LISTING: &str = r#"{
    "name": "fixture",
    "version": "1.0.0",
    "dependencies": {
        "a": {
            "name": "a",
            "version": "1.0.0",
            "_dependencies": { "b": "^1.0.0" },
            "dependencies": {
                "b": {
                    "name": "b",
                    "version": "1.0.0",
                    "_dependencies": { "c": "^1.0.0" },
                    "dependencies": {
                        "c": {
                            "name": "c",
                            "version": "1.0.0",
                            "_dependencies": { "b": "^1.0.0" },
                            "scripts": { "postinstall": "node build.js" },
                            "dependencies": { "b": {} }
                        }
                    }
                }
            }
        },
        "d": {
            "name": "d",
            "version": "1.0.0",
            "_dependencies": { "b": "^1.0.0" },
            "dependencies": {
                "b": { "name": "b", "version": "1.0.0" }
            }
        }
    }
}"#;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-p", "nmhoist-cli", "--bin", "nmhoist", "--"]);
    cmd
}

fn project(listing: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("package.json"), "{}").unwrap();
    fs::write(dir.path().join("listing.json"), listing).unwrap();
    dir
}

fn run_json(dir: &Path, args: &[&str]) -> (Output, serde_json::Value) {
    let output = cargo_bin()
        .arg("--cwd")
        .arg(dir)
        .arg("--json")
        .args(args)
        .output()
        .expect("Failed to run nmhoist");
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    (output, json)
}

#[test]
fn test_optimize_json_reports_plan() {
    let dir = project(LISTING);
    let (output, json) = run_json(dir.path(), &["optimize", "--listing", "listing.json"]);
    assert!(output.status.success(), "optimize should succeed");

    assert_eq!(json["schema_version"].as_u64(), Some(1));
    assert_eq!(json["ok"], true);
    assert!(json["apply"].is_null(), "nothing is applied without --apply");

    let report = &json["report"];
    assert_eq!(report["converged"], true);
    assert_eq!(report["iterations"].as_u64(), Some(4));
    let actions: Vec<&str> = report["decisions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["move", "move", "move", "remove"]);

    let moves = json["plan"]["moves"].as_array().unwrap();
    let modules: Vec<&str> = moves.iter().map(|m| m["module"].as_str().unwrap()).collect();
    assert_eq!(modules, vec!["b", "c"]);
    let removals = json["plan"]["removals"].as_array().unwrap();
    assert_eq!(removals.len(), 1);
    assert!(removals[0]["path"]
        .as_str()
        .unwrap()
        .ends_with(&format!("a{0}node_modules{0}b", std::path::MAIN_SEPARATOR)));

    let hooks = json["hooks"].as_array().unwrap();
    assert_eq!(hooks.len(), 1);
    assert_eq!(hooks[0]["hooks"][0][0], "postinstall");

    assert_eq!(json["original_tree"].as_array().unwrap().len(), 6);
    assert_eq!(json["optimized_tree"].as_array().unwrap().len(), 5);
    let added: Vec<&str> = json["optimized_tree"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["marker"] == "+")
        .map(|m| m["label"].as_str().unwrap())
        .collect();
    assert_eq!(added.len(), 2);
}

#[test]
fn test_optimize_dry_run_touches_nothing() {
    let dir = project(LISTING);
    let (output, json) = run_json(
        dir.path(),
        &["optimize", "--listing", "listing.json", "--dry-run"],
    );
    assert!(output.status.success());

    let apply = &json["apply"];
    assert_eq!(apply["dry_run"], true);
    assert_eq!(apply["actions"].as_array().unwrap().len(), 3);
    assert!(apply["failures"].as_array().unwrap().is_empty());
    assert!(json["scan_after"].is_null());
    assert!(!dir.path().join("node_modules").exists());
}

#[test]
fn test_optimize_writes_report_file() {
    let dir = project(LISTING);
    let (output, json) = run_json(
        dir.path(),
        &["optimize", "--listing", "listing.json", "--report", "report.json"],
    );
    assert!(output.status.success());

    let written = fs::read_to_string(dir.path().join("report.json")).unwrap();
    let written: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(written["plan"], json["plan"]);
}

#[test]
fn test_iteration_cap_is_reported() {
    let dir = project(LISTING);
    let (output, json) = run_json(
        dir.path(),
        &["optimize", "--listing", "listing.json", "--max-iterations", "1"],
    );
    assert!(output.status.success(), "a capped run is not an error");
    assert_eq!(json["report"]["converged"], false);
    assert_eq!(json["report"]["iterations"].as_u64(), Some(1));
    let last = json["report"]["decisions"].as_array().unwrap().last().unwrap();
    assert_eq!(last["action"], "stopped");
}

#[test]
fn test_unresolved_reference_fails() {
    let dir = project(
        r#"{ "dependencies": { "a": { "name": "a", "version": "1.0.0", "dependencies": { "ghost": {} } } } }"#,
    );
    let output = cargo_bin()
        .arg("--cwd")
        .arg(dir.path())
        .args(["optimize", "--listing", "listing.json"])
        .output()
        .expect("Failed to run nmhoist");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ghost"), "stderr should name the reference: {stderr}");
}

#[test]
fn test_invalid_ignore_pattern_fails() {
    let dir = project(LISTING);
    let output = cargo_bin()
        .arg("--cwd")
        .arg(dir.path())
        .args(["optimize", "--listing", "listing.json", "--ignore", "a/b"])
        .output()
        .expect("Failed to run nmhoist");
    assert!(!output.status.success());
}

#[test]
fn test_tree_json_lists_modules() {
    let dir = project(LISTING);
    let (output, json) = run_json(dir.path(), &["tree", "--listing", "listing.json"]);
    assert!(output.status.success());

    let modules = json["modules"].as_array().unwrap();
    assert_eq!(modules.len(), 6);
    assert_eq!(modules[0]["depth"].as_u64(), Some(0));
    // children are listed by name: a, a > b, a > b > c, d, d > b
    assert!(modules[1]["label"].as_str().unwrap().starts_with(". > a@1.0.0"));
    assert!(modules[4]["label"].as_str().unwrap().starts_with(". > d@1.0.0"));

    let c = &modules[3];
    assert_eq!(c["dependencies"][0]["name"], "b");
    assert_eq!(c["dependencies"][0]["status"], "satisfied");
}

#[cfg(unix)]
#[test]
fn test_failed_dedupe_stops_before_listing() {
    let dir = project(LISTING);
    fs::write(dir.path().join("nmhoist.json"), r#"{ "package_manager": "false" }"#).unwrap();
    let output = cargo_bin()
        .arg("--cwd")
        .arg(dir.path())
        .args(["optimize", "--dedupe"])
        .output()
        .expect("Failed to run nmhoist");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("false dedupe"), "stderr should name the command: {stderr}");
}

#[test]
fn test_dedupe_is_skipped_with_listing() {
    let dir = project(LISTING);
    let (output, json) = run_json(
        dir.path(),
        &["optimize", "--listing", "listing.json", "--dedupe"],
    );
    assert!(output.status.success());
    assert_eq!(json["report"]["iterations"].as_u64(), Some(4));
}
