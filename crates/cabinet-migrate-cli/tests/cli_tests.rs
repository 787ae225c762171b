//! CLI integration tests for cabinet-migrate.
//!
//! These tests cover argument parsing, help output, and exit codes for
//! failures that happen before any connection is opened.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

/// Get a command for the cabinet-migrate binary.
fn cmd() -> Command {
    Command::cargo_bin("cabinet-migrate").unwrap()
}

/// A configuration that passes validation. Nothing listens on the staging
/// port, so only commands that fail earlier should be run against it.
fn valid_config() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
remote:
  base_url: http://127.0.0.1:9/DocuWare/Platform
  username: migrator
  password: secret
  organization: Example Org
staging:
  host: 127.0.0.1
  port: 9
  database: migration
  user: postgres
  ssl_mode: disable
"#
    )
    .unwrap();
    file
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
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("stage"))
        .stdout(predicate::str::contains("init-schema"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--delay-ms"));
}

#[test]
fn test_stage_subcommand_help() {
    cmd()
        .args(["stage", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--input"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cabinet-migrate"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_and_defaults() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_unknown_verbosity_exits_with_code_1() {
    let config = valid_config();

    cmd()
        .args(["--verbosity", "loud", "--config"])
        .arg(config.path())
        .arg("status")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown verbosity"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // A missing file is an IO error, not a config error
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "remote:").unwrap();
    writeln!(file, "  base_url: https://dms.example.com").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1);
}

#[test]
fn test_invalid_ssl_mode_exits_with_code_1() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
remote:
  base_url: https://dms.example.com/DocuWare/Platform
  username: migrator
  password: secret
  organization: Example Org
staging:
  host: localhost
  database: migration
  user: postgres
  ssl_mode: sometimes
"#
    )
    .unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "status"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid ssl_mode"));
}

// =============================================================================
// Stage Input Tests
// =============================================================================

#[test]
fn test_stage_missing_input_exits_with_code_7() {
    let config = valid_config();

    cmd()
        .arg("--config")
        .arg(config.path())
        .args(["stage", "--input", "no_such_records.json"])
        .assert()
        .code(7);
}

#[test]
fn test_stage_malformed_input_exits_with_code_1() {
    let config = valid_config();
    let mut input = NamedTempFile::new().unwrap();
    writeln!(input, "{{\"object_id\": \"A1\"").unwrap();

    cmd()
        .arg("--config")
        .arg(config.path())
        .arg("stage")
        .arg("--input")
        .arg(input.path())
        .assert()
        .code(1);
}

#[test]
fn test_stage_empty_object_id_exits_with_code_1() {
    let config = valid_config();
    let mut input = NamedTempFile::new().unwrap();
    writeln!(
        input,
        r#"[{{"object_id": "", "destination_cabinet_id": "C", "source_path": "/docs/a.pdf"}}]"#
    )
    .unwrap();

    cmd()
        .arg("--config")
        .arg(config.path())
        .arg("stage")
        .arg("--input")
        .arg(input.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("empty object_id"));
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test the staging database"));
}

#[test]
fn test_init_schema_command_exists() {
    cmd()
        .args(["init-schema", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Create the staging table"));
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
