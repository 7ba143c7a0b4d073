//! Smoke tests that drive the compiled `scrib` binary.
//!
//! Only offline commands are exercised: init, status, argument validation,
//! and fast-failing provider errors. Anything that would reach a live
//! embedding or generation endpoint is covered by the in-process tests in
//! `tests/pipeline.rs` instead.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn scrib_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("scrib");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    // The embedding endpoint points at a port nothing listens on, with
    // retries off, so provider calls fail fast instead of hanging.
    let config_content = format!(
        r#"[db]
path = "{root}/data/scrib.sqlite"

[embedding]
provider = "ollama"
base_url = "http://127.0.0.1:9"
max_retries = 0

[output]
dir = "{root}/output"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("scrib.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_scrib(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = scrib_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run scrib binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_scrib(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("scrib.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_scrib(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_scrib(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_status_with_no_threads() {
    let (_tmp, config_path) = setup_test_env();

    run_scrib(&config_path, &["init"]);
    let (stdout, _, success) = run_scrib(&config_path, &["status"]);
    assert!(success, "status failed");
    assert!(
        stdout.contains("No threads yet"),
        "Expected empty-state message, got: {}",
        stdout
    );
}

#[test]
fn test_status_unknown_thread_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_scrib(&config_path, &["init"]);
    let (_, stderr, success) = run_scrib(&config_path, &["status", "nonexistent"]);
    assert!(!success, "status for a missing thread should fail");
    assert!(
        stderr.contains("No checkpoint found"),
        "Should report missing checkpoint, got: {}",
        stderr
    );
}

#[test]
fn test_run_requires_items_file() {
    let (_tmp, config_path) = setup_test_env();

    run_scrib(&config_path, &["init"]);
    let (_, stderr, success) = run_scrib(&config_path, &["run", "https://youtube.com/@creator"]);
    assert!(!success, "run without --items should fail");
    assert!(
        stderr.contains("--items"),
        "Should point at the --items flag, got: {}",
        stderr
    );
}

#[test]
fn test_run_rejects_unsupported_host() {
    let (_tmp, config_path) = setup_test_env();

    run_scrib(&config_path, &["init"]);
    let (_, stderr, success) = run_scrib(
        &config_path,
        &[
            "run",
            "https://example.com/profile",
            "--items",
            "items.json",
        ],
    );
    assert!(!success, "run with an unsupported host should fail");
    assert!(
        stderr.contains("Unsupported platform"),
        "Should name the unsupported host, got: {}",
        stderr
    );
}

#[test]
fn test_resume_unknown_thread_errors() {
    let (_tmp, config_path) = setup_test_env();

    run_scrib(&config_path, &["init"]);
    let (_, stderr, success) = run_scrib(&config_path, &["resume", "ghost"]);
    assert!(!success, "resume of a missing thread should fail");
    assert!(
        stderr.contains("No checkpoint found"),
        "Should report missing checkpoint, got: {}",
        stderr
    );
}

#[test]
fn test_search_fails_fast_without_backend() {
    let (_tmp, config_path) = setup_test_env();

    run_scrib(&config_path, &["init"]);
    let (_, _, success) = run_scrib(&config_path, &["search", "youtube_creator", "hooks"]);
    assert!(!success, "search without a live embedding backend should fail");
}
