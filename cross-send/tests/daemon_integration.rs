//! Integration tests for cross-send

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_once_with_empty_schedule_exits_cleanly() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("cross-send")
        .unwrap()
        .env("CROSSCAST_CONFIG", dir.path().join("config.toml"))
        .env("CROSSCAST_DB_PATH", dir.path().join("send.db"))
        .arg("--once")
        .assert()
        .success();
}

#[test]
fn test_zero_poll_interval_is_rejected() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("cross-send")
        .unwrap()
        .env("CROSSCAST_CONFIG", dir.path().join("config.toml"))
        .env("CROSSCAST_DB_PATH", dir.path().join("send.db"))
        .args(["--poll-interval", "0", "--once"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains(
            "Poll interval must be at least 1 second",
        ));
}
