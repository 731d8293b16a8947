//! Integration tests for cross-drafts

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn cross_drafts(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cross-drafts").unwrap();
    cmd.env("CROSSCAST_CONFIG", dir.path().join("config.toml"))
        .env("CROSSCAST_DB_PATH", dir.path().join("drafts.db"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_list_without_drafts() {
    let dir = TempDir::new().unwrap();

    cross_drafts(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    cross_drafts(&dir)
        .args(["list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_unknown_draft_is_invalid_input() {
    let dir = TempDir::new().unwrap();

    for args in [
        vec!["show", "missing"],
        vec!["delete", "missing"],
        vec!["publish", "missing"],
        vec!["schedule", "missing", "2h"],
    ] {
        cross_drafts(&dir)
            .args(&args)
            .assert()
            .failure()
            .code(3)
            .stderr(predicate::str::contains("Draft not found"));
    }
}

#[test]
fn test_schedule_rejects_bad_time() {
    let dir = TempDir::new().unwrap();

    cross_drafts(&dir)
        .args(["schedule", "some-id", "whenever you feel like it"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("Could not parse schedule time"));
}
