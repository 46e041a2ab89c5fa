//! Integration tests for the `tunnelctl` CLI binary.
//!
//! Everything runs against the in-process simulated platform with a
//! one-millisecond step delay, so no test depends on the host's VPN setup.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tunnelctl` binary with env isolation.
///
/// Points config directories at a nonexistent path and clears the
/// variables the CLI reads, so tests never touch the user's setup.
fn tunnelctl_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tunnelctl");
    cmd.env("HOME", "/tmp/tunnelctl-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tunnelctl-cli-test-nonexistent")
        .env("TUNNELCTL_PLATFORM__STEP_DELAY_MS", "1")
        .env_remove("TUNNELCTL_CONFIG")
        .env_remove("TUNNELCTL_OUTPUT")
        .env_remove("TUNNELCTL_PLATFORM__EXISTING_CONFIGURATIONS")
        .env_remove("TUNNELCTL_PLATFORM__ENTITLED")
        .env_remove("TUNNELCTL_PLATFORM__DENY_INSTALL")
        .env_remove("RUST_LOG")
        .timeout(Duration::from_secs(30));
    cmd
}

/// Run a session with `script` on stdin and return its stdout.
fn session(script: &str) -> String {
    let output = tunnelctl_cmd()
        .args(["--output", "json", "session"])
        .write_stdin(script)
        .output()
        .unwrap();
    assert!(output.status.success(), "session failed: {output:?}");
    String::from_utf8(output.stdout).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = tunnelctl_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "Expected 'Usage' in output:\n{stderr}");
}

#[test]
fn test_help_flag() {
    tunnelctl_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("session")
            .and(predicate::str::contains("up"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    tunnelctl_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tunnelctl"));
}

#[test]
fn test_completions_bash() {
    tunnelctl_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tunnelctl"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    tunnelctl_cmd()
        .args(["--config", "/tmp/somewhere/tunnelctl.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere/tunnelctl.toml"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let path_arg = path.to_str().unwrap();

    tunnelctl_cmd()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    tunnelctl_cmd()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already exists"));

    tunnelctl_cmd()
        .args(["--config", path_arg, "config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn test_config_show_reflects_file_and_env() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[controller]\nrestart_timeout_secs = 7\n").unwrap();

    tunnelctl_cmd()
        .args(["--config", path.to_str().unwrap(), "--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"restart_timeout_secs\": 7")
                .and(predicate::str::contains("\"step_delay_ms\": 1")),
        );
}

#[test]
fn test_invalid_config_is_a_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[controller]\nsubscriber_buffer = 0\n").unwrap();

    tunnelctl_cmd()
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("subscriber_buffer"));
}

// ── up ──────────────────────────────────────────────────────────────

#[test]
fn test_up_connects_and_tears_down() {
    tunnelctl_cmd()
        .args(["--output", "json", "up", "--hold", "0"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"status\":\"connecting\"")
                .and(predicate::str::contains("\"status\":\"connected\""))
                .and(predicate::str::contains("\"status\":\"disconnected\""))
                .and(predicate::str::contains("\"event\":\"down\"")),
        );
}

#[test]
fn test_up_without_entitlement_reports_no_tunnel() {
    tunnelctl_cmd()
        .env("TUNNELCTL_PLATFORM__ENTITLED", "false")
        .args(["--output", "json", "up", "--hold", "0"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"status\":\"no_tunnel\"")
                .and(predicate::str::contains("\"status\":\"connected\"").not()),
        );
}

#[test]
fn test_up_refuses_multiple_configurations() {
    tunnelctl_cmd()
        .env("TUNNELCTL_PLATFORM__EXISTING_CONFIGURATIONS", "2")
        .args(["up", "--hold", "0"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("Found 2 VPN configurations"));
}

#[test]
fn test_up_reports_declined_install() {
    tunnelctl_cmd()
        .env("TUNNELCTL_PLATFORM__DENY_INSTALL", "true")
        .args(["up", "--hold", "0"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("declined"));
}

// ── session ─────────────────────────────────────────────────────────

#[test]
fn test_session_start_stop() {
    let out = session("up\nwait connected\nstatus\nstop\nwait disconnected\nquit\n");

    assert!(out.contains("\"event\":\"started\""), "{out}");
    assert!(out.contains("\"event\":\"reached\",\"message\":\"connected\""), "{out}");
    assert!(out.contains("\"start_requested\":true"), "{out}");
    assert!(out.contains("\"message\":\"disconnected\""), "{out}");
}

#[test]
fn test_session_restart_publishes_restarting() {
    let out = session("up\nwait connected\nrestart\nwait connected\nquit\n");

    assert!(out.contains("\"status\":\"restarting\""), "{out}");
    assert!(out.contains("restarted tunnelctl"), "{out}");
    assert!(!out.contains("\"event\":\"error\""), "{out}");
}

#[test]
fn test_session_stop_cancels_a_running_restart() {
    // Slow enough steps that `stop` lands while the restart waits on the
    // old extension.
    let output = tunnelctl_cmd()
        .env("TUNNELCTL_PLATFORM__STEP_DELAY_MS", "50")
        .args(["--output", "json", "session"])
        .write_stdin(
            "up\nwait connected\nrestart\nwait restarting\nstop\nwait disconnected\nquit\n",
        )
        .output()
        .unwrap();
    assert!(output.status.success(), "session failed: {output:?}");
    let out = String::from_utf8(output.stdout).unwrap();

    assert!(out.contains("\"message\":\"restarting\""), "{out}");
    assert!(out.contains("cancelled by stop"), "{out}");
    assert!(out.contains("\"message\":\"disconnected\""), "{out}");
    assert!(!out.contains("restarted tunnelctl"), "{out}");
    assert!(!out.contains("\"event\":\"error\""), "{out}");
}

#[test]
fn test_session_keeps_going_after_errors() {
    let out = session("bogus\nvpn\nprobe\non-demand on\nstatus\n");

    assert!(out.contains("unrecognized command"), "{out}");
    assert!(out.contains("has not been started"), "{out}");
    assert!(out.contains("No VPN configuration"), "{out}");
    assert!(out.contains("\"event\":\"current\""), "{out}");
}

#[test]
fn test_session_on_demand_after_install() {
    let out = session("start\non-demand on\non-demand on\ninstalled\nremove-on-demand\nquit\n");

    assert!(out.contains("\"changed\":true"), "{out}");
    assert!(out.contains("\"changed\":false"), "{out}");
    assert!(out.contains("\"installed\":true"), "{out}");
    assert!(out.contains("rules removed"), "{out}");
}
