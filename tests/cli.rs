//! Integration tests for the command-line interface.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const DOCUMENT: &str = r#"import React from "react";

function Greeting({ name }) {
  return <h1>Hello, {name}!</h1>;
}

export default function App() {
  return <Greeting name="world" />;
}
"#;

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_artifact-patcher"))
        .args(args)
        .env("NO_COLOR", "1")
        .env_remove("ARTIFACT_PATCHER_LOG")
        .output()
        .unwrap()
}

fn setup(edits: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("App.jsx"), DOCUMENT).unwrap();
    fs::write(dir.path().join("edits.txt"), edits).unwrap();
    dir
}

fn path_arg(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

const GOOD_EDIT: &str = "<<<<<<< SEARCH\n  return <h1>Hello, {name}!</h1>;\n=======\n  return <h1>Welcome, {name}!</h1>;\n>>>>>>> REPLACE\n";

#[test]
fn test_help_lists_subcommands() {
    let output = run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("apply"));
    assert!(stdout.contains("compress"));
    assert!(stdout.contains("classify"));
}

#[test]
fn test_apply_writes_document() {
    let dir = setup(GOOD_EDIT);
    let document = path_arg(&dir, "App.jsx");
    let edits = path_arg(&dir, "edits.txt");

    let output = run(&["apply", "--document", &document, "--edits", &edits]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("edit #1: applied (exact, 1.00)"), "{stdout}");
    let written = fs::read_to_string(dir.path().join("App.jsx")).unwrap();
    assert!(written.contains("Welcome, {name}!"));
}

#[test]
fn test_dry_run_leaves_document() {
    let dir = setup(GOOD_EDIT);
    let document = path_arg(&dir, "App.jsx");
    let edits = path_arg(&dir, "edits.txt");

    let output = run(&["apply", "-d", &document, "-e", &edits, "--dry-run", "--diff"]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("DRY RUN"));
    assert!(stdout.contains("+  return <h1>Welcome, {name}!</h1>;"), "{stdout}");
    assert!(stdout.contains("-  return <h1>Hello, {name}!</h1>;"), "{stdout}");
    assert_eq!(fs::read_to_string(dir.path().join("App.jsx")).unwrap(), DOCUMENT);
}

#[test]
fn test_json_report() {
    let dir = setup(GOOD_EDIT);
    let document = path_arg(&dir, "App.jsx");
    let edits = path_arg(&dir, "edits.txt");

    let output = run(&["apply", "-d", &document, "-e", &edits, "--json", "-n"]);
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["total"], 1);
    assert_eq!(report["succeeded"], 1);
    assert_eq!(report["written"], false);
    assert_eq!(report["edits"][0]["strategy"], "exact");
}

#[test]
fn test_total_failure_exits_nonzero() {
    let dir = setup("<<<<<<< SEARCH\nconst nothing = \"here\" + somewhere;\n=======\nconst x = 1;\n>>>>>>> REPLACE\n");
    let document = path_arg(&dir, "App.jsx");
    let edits = path_arg(&dir, "edits.txt");

    let output = run(&["apply", "-d", &document, "-e", &edits]);
    assert_eq!(output.status.code(), Some(1));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("match not found"), "{stderr}");
    assert_eq!(fs::read_to_string(dir.path().join("App.jsx")).unwrap(), DOCUMENT);
}

#[test]
fn test_full_rewrite_is_reported() {
    let rewrite = format!("```jsx\n{DOCUMENT}```\n");
    let dir = setup(&rewrite);
    let document = path_arg(&dir, "App.jsx");
    let edits = path_arg(&dir, "edits.txt");

    let output = run(&["apply", "-d", &document, "-e", &edits]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("full document rewrite"), "{stderr}");
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = setup(GOOD_EDIT);
    fs::write(dir.path().join("engine.toml"), "[matcher]\nfuzzy_threshold = 3.0\n").unwrap();
    let document = path_arg(&dir, "App.jsx");
    let edits = path_arg(&dir, "edits.txt");
    let config = path_arg(&dir, "engine.toml");

    let output = run(&["apply", "-d", &document, "-e", &edits, "-c", &config]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid engine config"), "{stderr}");
    assert!(stderr.contains("fuzzy_threshold"), "{stderr}");
}

#[test]
fn test_compress_prints_code_and_stats() {
    let dir = TempDir::new().unwrap();
    let mut body = String::from("function Big() {\n");
    for i in 0..60 {
        body.push_str(&format!("  const value{i} = compute({i}, \"label {i}\");\n"));
    }
    body.push_str("  return null;\n}\n\nfunction Small() {\n  return 1;\n}\n");
    let file = dir.path().join("big.js");
    fs::write(&file, &body).unwrap();

    let output = run(&[
        "compress",
        "--file",
        file.to_str().unwrap(),
        "--intent",
        "style",
        "--min-lines",
        "0",
    ]);
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("function Big() { /* 63 lines hidden */ }"), "{stdout}");
    assert!(stdout.contains("function Small() {\n  return 1;\n}"));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 hidden (structural, intent style)"), "{stderr}");
    assert_eq!(fs::read_to_string(Path::new(&file)).unwrap(), body);
}

#[test]
fn test_classify_prints_intent() {
    let output = run(&["classify", "the", "login", "button", "doesn't", "work"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("intent: bugfix"), "{stdout}");
    assert!(stdout.contains("confidence:"));
}
