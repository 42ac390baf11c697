//! Command-line surface of the streamsql binary.

use std::process::Command;

fn streamsql(home: &std::path::Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_streamsql"));
    command
        .env("HOME", home)
        .env_remove("STREAMHOUSE_API_URL")
        .env_remove("RUST_LOG");
    command
}

#[test]
fn test_help_lists_subcommands() {
    let home = tempfile::tempdir().unwrap();
    let output = streamsql(home.path()).arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("query"));
    assert!(stdout.contains("shell"));
    assert!(stdout.contains("--api-url"));
}

#[test]
fn test_query_help_lists_formats() {
    let home = tempfile::tempdir().unwrap();
    let output = streamsql(home.path())
        .args(["query", "--help"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--changelog"));
    assert!(stdout.contains("csv"));
}

#[test]
fn test_invalid_format_is_rejected() {
    let home = tempfile::tempdir().unwrap();
    let output = streamsql(home.path())
        .args(["query", "SELECT 1", "--format", "xml"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}

#[test]
fn test_unreachable_gateway_fails_query() {
    let home = tempfile::tempdir().unwrap();
    let output = streamsql(home.path())
        .args(["--api-url", "http://127.0.0.1:1", "query", "SELECT 1"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to execute statement"));
}

#[test]
fn test_broken_config_file_is_reported() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("sql.toml");
    std::fs::write(&config, "colored = \"sometimes\"").unwrap();

    let output = streamsql(home.path())
        .arg("--config")
        .arg(&config)
        .args(["query", "SELECT 1"])
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to load configuration"));
}
