//! CLI integration tests for pg-neo4j-migrate.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions that need no live stores.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the pg-neo4j-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("pg-neo4j-migrate").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("export"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("matrix"))
        .stdout(predicate::str::contains("compare"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_compare_subcommand_help() {
    cmd()
        .args(["compare", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--candidate"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pg-neo4j-migrate"));
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_missing_config_file_fails() {
    cmd()
        .args(["--config", "/nonexistent/config.yaml", "matrix"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_config_exits_with_config_code() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "relational: [not a mapping").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "export"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn test_incomplete_config_is_rejected() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "relational:\n  host: ''\n  database: d\n  user: u\n  password: p\ngraph:\n  host: h\n  user: u\n  password: p"
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "export"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("relational.host"));
}

#[test]
fn test_compare_requires_candidate() {
    cmd().arg("compare").assert().failure();
}
