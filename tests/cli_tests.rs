// CLI behaviour through the compiled binary
// Uses the file state store so no GitHub access is needed

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn ring_rollout() -> Command {
    Command::cargo_bin("ring-rollout").unwrap()
}

/// Repository-like temp dir with one flag file and a file-store config.
fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("flags")).unwrap();
    fs::write(root.join("flags/app.json"), r#"{"beta":true}"#).unwrap();

    let config = format!(
        r#"
[store]
kind = "file"
state_dir = '{state}'

[publish]
enabled = false

[[rings]]
name = "flags"
pattern = "flags/*.json"
source_root = '{source}'
target_root = '{target}'
wait_durations = ["1h", "1h"]
"#,
        state = root.join("state").display(),
        source = root.display(),
        target = root.join("rings").display(),
    );
    fs::write(root.join("ring-rollout.toml"), config).unwrap();
    dir
}

#[test]
fn no_arguments_prints_usage() {
    ring_rollout()
        .assert()
        .success()
        .stdout(predicate::str::contains("ring-rollout start --version"))
        .stdout(predicate::str::contains("ring-rollout tick"));
}

#[test]
fn help_lists_subcommands() {
    ring_rollout()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("tick"))
        .stdout(predicate::str::contains("dispatch"));
}

#[test]
fn start_requires_a_version() {
    ring_rollout()
        .arg("start")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--version"));
}

#[test]
fn init_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();

    ring_rollout()
        .current_dir(dir.path())
        .args(["init", "--dry-run", "--labels"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN"))
        .stdout(predicate::str::contains("[[rings]]"))
        .stdout(predicate::str::contains("Would create"));

    assert!(!dir.path().join("ring-rollout.toml").exists());
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = workspace();

    ring_rollout()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn status_with_no_rollouts() {
    let dir = workspace();

    ring_rollout()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No active rollouts"));
}

#[test]
fn start_then_status_and_tick() {
    let dir = workspace();

    ring_rollout()
        .current_dir(dir.path())
        .args(["start", "--version", "abc123", "--no-publish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("abc123"));

    assert_eq!(
        fs::read_to_string(dir.path().join("rings/0/.rollout-version"))
            .unwrap()
            .trim(),
        "abc123"
    );
    assert!(dir.path().join("rings/0/flags/app.json").exists());

    ring_rollout()
        .current_dir(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("flags"))
        .stdout(predicate::str::contains("ring 0 of 2"));

    // Still inside the first hour: nothing moves.
    ring_rollout()
        .current_dir(dir.path())
        .arg("tick")
        .assert()
        .success()
        .stdout(predicate::str::contains("wait"));
    assert!(!dir.path().join("rings/1").exists());
}

#[test]
fn bad_schedule_is_rejected_at_load() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("ring-rollout.toml"),
        r#"
[store]
kind = "file"

[[rings]]
name = "flags"
pattern = "*.json"
target_root = "rings"
wait_durations = ["5q"]
"#,
    )
    .unwrap();

    ring_rollout()
        .current_dir(dir.path())
        .arg("tick")
        .assert()
        .failure()
        .stderr(predicate::str::contains("5q"));
}
