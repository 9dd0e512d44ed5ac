//! CLI Integration Tests (Blackbox)
//!
//! These tests run the xgrab binary and check its external behaviour:
//! argument parsing, help output and exit codes. They never need an X
//! server; every capture here is expected to fail before reaching one.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn xgrab() -> Command {
    Command::new(env!("CARGO_BIN_EXE_xgrab"))
}

/// A config file inside `dir` so the binary never writes to $HOME.
fn config_file(dir: &TempDir, content: &str) -> String {
    let path = dir.path().join("xgrab.toml");
    fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn test_help_flag_produces_output() {
    let output = xgrab()
        .arg("--help")
        .output()
        .expect("Failed to execute xgrab --help");

    assert!(output.status.success(), "xgrab --help should exit successfully");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("--region"));
    assert!(stdout.contains("--no-shm"));
}

#[test]
fn test_version_flag() {
    let output = xgrab().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("xgrab"));
}

#[test]
fn test_malformed_region_is_rejected() {
    let output = xgrab().args(["--region", "1,2,3"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_missing_display_fails() {
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, "[capture]\nuse_shm = true\n");

    let output = xgrab()
        .env_remove("DISPLAY")
        .args(["--config", &config, "--region", "0,0,10,10"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("DISPLAY"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_unreachable_display_fails() {
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, "");

    let output = xgrab()
        .args(["--config", &config, "--display", ":4242", "--region", "0,0,10,10"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    assert!(!dir.path().join("xgrab.png").exists());
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let config = config_file(&dir, "[capture]\nmax_pixels = 0\n");

    let output = xgrab().args(["--config", &config]).output().unwrap();
    assert!(!output.status.success());
}
