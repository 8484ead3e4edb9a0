//! CLI integration tests

use std::process::{Command, Output};

fn portal(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_portal"))
        .args(args)
        .env_remove("PORTAL_API_URL")
        .env_remove("PORTAL_CONFIG")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = portal(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("rotation portal"), "Should show app description");
    assert!(stdout.contains("projects"), "Should show projects command");
    assert!(stdout.contains("users"), "Should show users command");
    assert!(stdout.contains("rotations"), "Should show rotations command");
    assert!(stdout.contains("emails"), "Should show emails command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = portal(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("portal"), "Should show binary name");
}

/// Test projects subcommand listing
#[test]
fn test_projects_help() {
    let output = portal(&["projects", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Projects help should succeed");
    for command in ["list", "mine", "upload", "download", "set-cogs", "submit-mark"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test set-cogs requires at least one assignment
#[test]
fn test_set_cogs_requires_assignments() {
    let output = portal(&["projects", "set-cogs", "2018", "1"]);
    assert!(!output.status.success(), "set-cogs without assignments should fail");
}

/// Test mine accepts the role option
#[test]
fn test_projects_mine_help() {
    let output = portal(&["projects", "mine", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Mine help should succeed");
    assert!(stdout.contains("--role"), "Should show role option");
    assert!(stdout.contains("cogs"), "Should list cogs role");
}

/// Test emails set requires subject and content
#[test]
fn test_emails_set_help() {
    let output = portal(&["emails", "set", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Emails set help should succeed");
    assert!(stdout.contains("--subject"), "Should show subject option");
    assert!(stdout.contains("--content"), "Should show content option");
}

/// Test an unreachable server is reported as an error
#[test]
fn test_unreachable_server_fails() {
    let output = portal(&[
        "--api-url",
        "http://127.0.0.1:9",
        "--config",
        "/nonexistent/portal.toml",
        "users",
        "me",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Command should fail without a server");
    assert!(stderr.contains("Failed to fetch current user"), "Should explain the failure");
}

/// Test an invalid API URL is rejected before any request
#[test]
fn test_invalid_api_url() {
    let output = portal(&[
        "--api-url",
        "not a url",
        "--config",
        "/nonexistent/portal.toml",
        "rotations",
        "latest",
    ]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to create client"));
}

/// Test the resolved configuration is logged at debug level
#[test]
fn test_debug_logs_resolved_config() {
    let output = Command::new(env!("CARGO_BIN_EXE_portal"))
        .args([
            "--api-url",
            "not a url",
            "--config",
            "/nonexistent/portal.toml",
            "users",
            "me",
        ])
        .env_remove("PORTAL_API_URL")
        .env_remove("PORTAL_CONFIG")
        .env("RUST_LOG", "debug")
        .output()
        .expect("Failed to execute command");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Resolved CLI configuration"), "Should log resolved config");
}
