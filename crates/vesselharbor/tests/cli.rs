//! Binary-level checks: argument parsing, output streams and exit codes

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV_VARS: &[&str] = &[
    "VESSELHARBOR_API_URL",
    "VESSELHARBOR_SERVER_NAME",
    "VESSELHARBOR_SERVER_PORT",
    "VESSELHARBOR_USERNAME",
    "VESSELHARBOR_PASSWORD",
    "VESSELHARBOR_API_KEY",
    "VESSELHARBOR_VERBOSE",
    "VESSELHARBOR_LOG_LEVEL",
    "RUST_LOG",
];

/// Command isolated from the user's config, `.env` and environment
fn vesselharbor(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("vesselharbor").unwrap();
    cmd.current_dir(dir.path())
        .env("VESSELHARBOR_CONFIG_DIR", dir.path())
        .env("NO_COLOR", "1");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn help_documents_exit_codes() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Exit codes:"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("interactive"));
}

#[test]
fn no_command_prints_hint() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("vesselharbor --help"));
}

#[test]
fn unknown_command_is_a_generic_failure() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir).arg("frobnicate").assert().code(1);
}

#[test]
fn config_url_round_trips_through_the_file() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["config", "set-url", "https://api.example.com"])
        .assert()
        .success();

    vesselharbor(&dir)
        .args(["config", "get-url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://api.example.com"));

    assert!(dir.path().join("config.toml").exists());
}

#[test]
fn flags_override_the_config_file() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["config", "set-url", "https://api.example.com"])
        .assert()
        .success();

    vesselharbor(&dir)
        .args(["--server", "h", "--port", "9", "config", "get-url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("http://h:9"));
}

#[test]
fn invalid_port_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["config", "set-port", "not-a-port"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid server port"));
}

#[test]
fn missing_credentials_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["org", "list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No credentials configured"));
}

#[test]
fn status_without_session_succeeds() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["auth", "status"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Not logged in"));
}

#[test]
fn unreachable_server_is_a_network_error() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["--api-url", "http://127.0.0.1:9", "--api-key", "key-1", "org", "list"])
        .assert()
        .code(4);
}

#[test]
fn interactive_requires_a_terminal() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .args(["--api-key", "key-1", "interactive"])
        .assert()
        .code(3);
}

#[test]
fn logout_clears_the_session_despite_a_bad_port() {
    let dir = TempDir::new().unwrap();
    let credentials = dir.path().join("credentials.json");
    std::fs::write(
        &credentials,
        r#"{"mode":"api_key","api_url":"http://h:9","access_token":"key-1"}"#,
    )
    .unwrap();

    vesselharbor(&dir)
        .env("VESSELHARBOR_SERVER_PORT", "abc")
        .args(["auth", "logout"])
        .assert()
        .success();

    assert!(!credentials.exists());
}

#[test]
fn set_port_repairs_a_bad_port_in_the_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("config.toml"), "server_port = \"abc\"\n").unwrap();

    vesselharbor(&dir)
        .args(["config", "set-port", "9000"])
        .assert()
        .success();

    let contents = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(contents.contains("9000"));
    assert!(!contents.contains("abc"));
}

#[test]
fn server_commands_reject_a_bad_port() {
    let dir = TempDir::new().unwrap();
    vesselharbor(&dir)
        .env("VESSELHARBOR_SERVER_PORT", "abc")
        .args(["--api-key", "key-1", "org", "list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Invalid server port"));
}
