//! Command line behavior of the `bbtask` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ENV: [&str; 5] = [
    "BBTASK_CONFIG",
    "BITBUCKET_URL",
    "BITBUCKET_USERNAME",
    "BITBUCKET_PASSWORD",
    "BITBUCKET_TOKEN",
];

fn bbtask() -> Command {
    let mut cmd = Command::cargo_bin("bbtask").unwrap();
    for name in ENV {
        cmd.env_remove(name);
    }
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_tasks() {
    bbtask()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("project-info"))
        .stdout(predicate::str::contains("branch-permissions"))
        .stdout(predicate::str::contains("application-link"))
        .stdout(predicate::str::contains("directory-sync"))
        .stdout(predicate::str::contains("git-init"));
}

#[test]
fn test_missing_credentials_report_failure() {
    bbtask()
        .args(["project-info", "--url", "https://bitbucket.invalid"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"failed\": true"))
        .stdout(predicate::str::contains("\"changed\": false"))
        .stdout(predicate::str::contains("token"));
}

#[test]
fn test_invalid_url_is_rejected_before_any_request() {
    bbtask()
        .args(["project-info", "--url", "not a url", "--token", "secret"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"failed\": true"));
}

#[test]
fn test_unknown_state_is_a_usage_error() {
    bbtask()
        .args(["repo", "--project-key", "FOO", "--repository", "bar", "--state", "gone"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("gone"));
}

#[test]
fn test_git_init_runs_without_a_server() {
    let temp = TempDir::new().unwrap();
    let repodir = temp.path().join("repo");

    bbtask()
        .args(["git-init", "--repodir"])
        .arg(&repodir)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"changed\": true"));

    assert!(repodir.join(".git").is_dir());
}

#[test]
fn test_check_mode_and_yaml_output() {
    let temp = TempDir::new().unwrap();
    let repodir = temp.path().join("repo");

    bbtask()
        .args(["--check", "--format", "yaml", "git-init", "--repodir"])
        .arg(&repodir)
        .assert()
        .success()
        .stdout(predicate::str::contains("changed: true"));

    assert!(!repodir.exists());
}

#[test]
fn test_git_commit_requires_a_message() {
    let temp = TempDir::new().unwrap();

    bbtask()
        .args(["git-commit", "--repodir"])
        .arg(temp.path())
        .assert()
        .code(1)
        .stdout(predicate::str::contains("message"));
}
