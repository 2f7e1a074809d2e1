use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
};
use tempfile::TempDir;

fn bin_path() -> PathBuf {
    if let Some(path) = option_env!("CARGO_BIN_EXE_go-immutable") {
        return PathBuf::from(path);
    }
    let mut fallback = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    fallback.push("target");
    fallback.push("debug");
    fallback.push("go-immutable");
    if cfg!(windows) {
        fallback.set_extension("exe");
    }
    assert!(
        fallback.exists(),
        "binary path not set by cargo test and fallback {fallback:?} not found"
    );
    fallback
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create dirs");
    }
    fs::write(path, contents).expect("write fixture");
}

fn module() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write(root, "go.mod", "module go-immutable\n\ngo 1.21\n");
    write(
        root,
        "example/example.go",
        "package example

import \"go-immutable/example/mod1\"

func test() {
\tx := 1
\tmod1.Touch(x)
\tx = 2
}
",
    );
    write(
        root,
        "example/mod1/mod1.go",
        "package mod1\n\nfunc Touch(mutX int) {}\n",
    );
    dir
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(bin_path())
        .current_dir(dir)
        .args(args)
        .env_remove("GO_IMMUTABLE_LOG_LEVEL")
        .env_remove("GO_IMMUTABLE_LOG_FORMAT")
        .env("NO_COLOR", "1")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run go-immutable")
}

#[test]
fn reports_findings_and_exits_with_one() {
    let dir = module();
    let output = run(dir.path(), &["./..."]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout,
        "example/example.go:7:13: Argument 'x' should be prefixed with 'mut' or 'Mut'\n\
         example/example.go:8:2: Variable 'x' should be prefixed with 'mut' or 'Mut'\n"
    );
}

#[test]
fn clean_package_exits_with_zero() {
    let dir = module();
    let output = run(dir.path(), &["./example/mod1"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(output.stdout.is_empty());
}

#[test]
fn json_output_is_an_array() {
    let dir = module();
    let output = run(dir.path(), &["--format", "json", "./example"]);
    assert_eq!(output.status.code(), Some(1));
    let value: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is json");
    let entries = value.as_array().expect("array");
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["kind"], "Argument");
    assert_eq!(entries[1]["name"], "x");
}

#[test]
fn exemptions_from_flags_and_config() {
    let dir = module();
    let output = run(dir.path(), &["--exempt", "x", "./..."]);
    assert_eq!(output.status.code(), Some(0));

    write(dir.path(), "immutable.toml", "[naming]\nexempt = [\"x\"]\n");
    let output = run(dir.path(), &["./..."]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn load_failures_exit_with_two() {
    let dir = module();
    let output = run(dir.path(), &["./missing"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    write(dir.path(), "broken/broken.go", "package broken\n\nfunc {\n");
    let output = run(dir.path(), &["./..."]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("broken.go"));
}

#[test]
fn malformed_config_is_fatal() {
    let dir = module();
    write(dir.path(), "immutable.toml", "[naming]\nexempt = 3\n");
    let output = run(dir.path(), &["./..."]);
    assert_eq!(output.status.code(), Some(2));
}
