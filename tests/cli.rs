//! End-to-end runs of the `repokit` binary

mod common;

use assert_cmd::prelude::*;
use common::test_fixtures::UpstreamRepo;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn repokit(workspace: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("repokit").expect("binary is built");
    cmd.env_remove("REPOKIT_CONFIG")
        .env_remove("REPOKIT_PASSWORD")
        .env("REPOKIT_WORKSPACE", workspace.path())
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_unsupported_repo_type_exits_with_error() {
    let workspace = TempDir::new().unwrap();
    repokit(&workspace)
        .args(["ping", "cvs", "cvs://example.com/module"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Unsupported repository type: 'cvs'"));
}

#[test]
fn test_create_prepares_project_directory() {
    let workspace = TempDir::new().unwrap();
    repokit(&workspace)
        .args(["create", "git", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Prepared project 5"));

    assert_file_exists!(workspace.path().join("project_5"));
}

#[test]
fn test_workspace_flag_overrides_environment() {
    let workspace = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    repokit(&workspace)
        .arg("--workspace")
        .arg(other.path())
        .args(["create", "svn", "8"])
        .assert()
        .success();

    assert_file_exists!(other.path().join("project_8"));
    assert_file_not_exists!(workspace.path().join("project_8"));
}

#[test]
fn test_transfer_history_is_empty_json() {
    let workspace = TempDir::new().unwrap();
    repokit(&workspace)
        .args(["log", "ftp", "7"])
        .assert()
        .success()
        .stdout(predicate::str::diff("[]\n"));

    repokit(&workspace)
        .args(["branches", "sftp", "1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("virtual\n"));
}

#[test]
fn test_missing_config_file_is_reported() {
    let workspace = TempDir::new().unwrap();
    repokit(&workspace)
        .arg("--config")
        .arg(workspace.path().join("absent.yaml"))
        .args(["branches", "ftp", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_config_file_sets_synthetic_branch() {
    let workspace = TempDir::new().unwrap();
    let config = workspace.path().join("repokit.yaml");
    fs::write(&config, "transfer:\n  synthetic_branch: mirror\n").unwrap();

    repokit(&workspace)
        .arg("--config")
        .arg(&config)
        .args(["branches", "ftp", "1"])
        .assert()
        .success()
        .stdout(predicate::str::diff("mirror\n"));
}

#[test]
fn test_history_before_follow_fails() {
    let workspace = TempDir::new().unwrap();
    repokit(&workspace)
        .args(["log", "git", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Working copy error"));
}

#[test]
fn test_follow_then_log_and_tags() {
    let upstream = UpstreamRepo::with_history();
    let workspace = TempDir::new().unwrap();

    repokit(&workspace)
        .args(["follow", "git", "11", &upstream.url(), "main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Project 11 is at main"));

    let output = repokit(&workspace)
        .args(["log", "git", "11", "-n", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let history: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["message"], "Update app");
    assert_eq!(entries[0]["branch"], "main");

    repokit(&workspace)
        .args(["log", "git", "11", "--branch", "feature", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start feature"));

    repokit(&workspace)
        .args(["tags", "git", "11"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tag\": \"v1.1\""));
}

#[test]
fn test_remote_branches_lists_upstream_heads() {
    let upstream = UpstreamRepo::with_history();
    let workspace = TempDir::new().unwrap();

    repokit(&workspace)
        .args(["remote-branches", "git", &upstream.url()])
        .assert()
        .success()
        .stdout(predicate::str::contains("feature").and(predicate::str::contains("main")));

    repokit(&workspace)
        .args(["ping", "git", &upstream.url()])
        .assert()
        .success();
}
