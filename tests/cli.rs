// Copyright (c) Ken Kocienda and other contributors.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

//! End-to-end tests of the `pygrapher` binary.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn pygrapher(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pygrapher"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run pygrapher")
}

fn write(root: &Path, rel: &str, source: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, source).unwrap();
}

fn def_paths(doc: &Value) -> Vec<String> {
    doc["Defs"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["Path"].as_str().unwrap().to_string())
        .collect()
}

const FOO_GRAPH: &str = concat!(
    r#"{"Defs":["#,
    r#"{"Data":null,"DefEnd":0,"DefStart":0,"Docstring":"","Exported":true,"File":"m.py","Kind":"module","Name":"m","Path":"m"},"#,
    r#"{"Data":null,"DefEnd":7,"DefStart":4,"Docstring":"","Exported":true,"File":"m.py","Kind":"function","Name":"foo","Path":"m/foo"}"#,
    r#"],"Refs":["#,
    r#"{"Def":true,"DefFile":"m.py","DefPath":"m","End":0,"File":"m.py","Start":0,"ToBuiltin":false},"#,
    r#"{"Def":true,"DefFile":"m.py","DefPath":"m/foo","End":7,"File":"m.py","Start":4,"ToBuiltin":false}"#,
    r#"]}"#,
);

#[test]
fn single_function_graph_is_byte_exact() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "m.py", "def foo(): pass\n");

    let out = pygrapher(&["--dir", dir.path().to_str().unwrap(), "--files", "m.py"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_eq!(stdout, format!("{}\n", FOO_GRAPH));
}

#[test]
fn directory_run_matches_explicit_files() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "m.py", "def foo(): pass\n");

    let out = pygrapher(&["--dir", dir.path().to_str().unwrap()]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8(out.stdout).unwrap(), format!("{}\n", FOO_GRAPH));
}

#[test]
fn pretty_output_parses_to_the_same_document() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "m.py", "def foo(): pass\n");

    let out = pygrapher(&["--dir", dir.path().to_str().unwrap(), "--files", "m.py", "--pretty"]);
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("\n  \"Defs\": ["));
    let pretty: Value = serde_json::from_str(&stdout).unwrap();
    let compact: Value = serde_json::from_str(FOO_GRAPH).unwrap();
    assert_eq!(pretty, compact);
}

#[test]
fn empty_directory_exits_nonzero_with_message() {
    let dir = TempDir::new().unwrap();

    let out = pygrapher(&["--dir", dir.path().to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("target directory must not be empty"), "stderr: {}", stderr);
}

#[test]
fn missing_directory_exits_nonzero_with_message() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nowhere");

    let out = pygrapher(&["--dir", missing.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("target directory not found"), "stderr: {}", stderr);
}

#[test]
fn process_batches_merge_worker_output() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.py", "A = 1\n");
    write(dir.path(), "b.py", "from a import A\nprint(A)\n");
    write(dir.path(), "c.py", "def c():\n    return 1\n");

    let out = pygrapher(&[
        "--dir",
        dir.path().to_str().unwrap(),
        "--isolation",
        "process",
        "--batch-size",
        "1",
        "--jobs",
        "2",
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let doc: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(def_paths(&doc), vec!["a", "a/A", "b", "c", "c/c"]);
    let refs = doc["Refs"].as_array().unwrap();
    assert!(refs
        .iter()
        .any(|r| r["File"] == "b.py" && r["DefPath"] == "a/A" && r["DefFile"] == "a.py"));
    assert!(refs
        .iter()
        .any(|r| r["File"] == "b.py" && r["DefPath"] == "print" && r["ToBuiltin"] == true));
}

#[test]
fn maxfiles_caps_discovery() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.py", "A = 1\n");
    write(dir.path(), "b.py", "B = 2\n");

    let out = pygrapher(&[
        "--dir",
        dir.path().to_str().unwrap(),
        "--maxfiles",
        "1",
        "--isolation",
        "in-process",
    ]);
    assert!(out.status.success());
    let doc: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(def_paths(&doc), vec!["a", "a/A"]);
}

#[test]
fn diagnostics_stay_off_stdout() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "m.py", "def foo(): pass\n");

    let out = pygrapher(&["--dir", dir.path().to_str().unwrap(), "--verbose", "--isolation", "in-process"]);
    assert!(out.status.success());
    let doc: Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(def_paths(&doc), vec!["m", "m/foo"]);
}
