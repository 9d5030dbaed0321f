//! Shared test helpers for integration tests
//!
//! This module provides common utilities used across all test files.

#![allow(dead_code)]

use assert_cmd::cargo;
use assert_cmd::Command;
use tempfile::TempDir;

/// Helper to get an hrw command
pub fn hrw() -> Command {
    Command::new(cargo::cargo_bin!("hrw"))
}

/// hrw command running inside `tmp`, isolated from the user's environment
pub fn hrw_in(tmp: &TempDir) -> Command {
    let mut cmd = hrw();
    cmd.current_dir(tmp.path())
        .env_remove("HRW_ACTOR")
        .env_remove("HRW_LOG")
        .env("XDG_CONFIG_HOME", tmp.path().join(".user-config"))
        .env("HOME", tmp.path());
    cmd
}

/// Helper to create an empty test project in a temp directory
pub fn setup_empty_project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    hrw_in(&tmp).arg("init").assert().success();
    tmp
}

/// Project with a staff member `s1`, sales manager `m1` and HR manager `h1`
pub fn setup_test_project() -> TempDir {
    let tmp = setup_empty_project();
    add_member(&tmp, "s1", "Sam Staff", &[]);
    add_member(&tmp, "m1", "Mira Sales", &["approve-sales"]);
    add_member(&tmp, "h1", "Hal Hr", &["manage-hr"]);
    tmp
}

pub fn add_member(tmp: &TempDir, id: &str, name: &str, capabilities: &[&str]) {
    let mut cmd = hrw_in(tmp);
    cmd.args(["team", "add", id, "--name", name]);
    if !capabilities.is_empty() {
        cmd.args(["--capability", &capabilities.join(",")]);
    }
    cmd.assert().success();
}

/// Create a request as `owner` and return its full id
pub fn create_request(tmp: &TempDir, owner: &str, extra: &[&str]) -> String {
    let output = hrw_in(tmp)
        .args(["--as", owner, "-o", "tsv", "request", "new"])
        .args(extra)
        .args(["--signature", &format!("sig:{}", owner)])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "request new failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create an "other" request with a title
pub fn create_other_request(tmp: &TempDir, owner: &str, title: &str) -> String {
    create_request(tmp, owner, &["--kind", "other", "--title", title])
}

/// Decide a stage; returns the finished command for assertions
pub fn decide(
    tmp: &TempDir,
    verb: &str,
    actor: &str,
    id: &str,
    stage: &str,
) -> assert_cmd::assert::Assert {
    hrw_in(tmp)
        .args(["--as", actor, verb, id, "--stage", stage])
        .args(["--signature", &format!("sig:{}", actor)])
        .assert()
}
