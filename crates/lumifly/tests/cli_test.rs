//! Integration tests for the `lumifly` CLI binary.
//!
//! Fleet commands run with `--simulate`, so no module has to be listening.
//! stdin is never a terminal here, which is what the confirmation tests rely on.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `lumifly` binary with env isolation.
///
/// Clears `LUMIFLY_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real roster.
fn lumifly_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("lumifly");
    cmd.env("HOME", "/tmp/lumifly-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/lumifly-cli-test-nonexistent")
        .env_remove("LUMIFLY_CONFIG")
        .env_remove("LUMIFLY_OUTPUT")
        .env_remove("RUST_LOG")
        .arg("--color")
        .arg("never");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Write a roster of `count` modules on ports from 5000.
fn write_roster(dir: &Path, count: usize) -> std::path::PathBuf {
    let path = dir.join("fleet.toml");
    let mut toml = String::from("[defaults]\ntimeout_secs = 2\n");
    for i in 0..count {
        toml.push_str(&format!(
            "\n[[devices]]\nname = \"hall-{}\"\nendpoint = \"opc.tcp://localhost:{}/\"\n",
            i + 1,
            5000 + i
        ));
    }
    std::fs::write(&path, toml).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cargo_bin_cmd!("lumifly").output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    lumifly_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("probe")
            .and(predicate::str::contains("read"))
            .and(predicate::str::contains("relays"))
            .and(predicate::str::contains("shell")),
    );
}

#[test]
fn test_version_flag() {
    lumifly_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("lumifly"));
}

#[test]
fn test_invalid_subcommand() {
    let output = lumifly_cmd().arg("dance").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    lumifly_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    lumifly_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    lumifly_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("lumifly"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    lumifly_cmd()
        .args(["config", "path", "--config", "/tmp/somewhere/fleet.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/somewhere/fleet.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("fleet.toml");

    lumifly_cmd()
        .args(["config", "init", "--count", "3", "--base-port", "4900"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 3 modules"));
    assert!(path.is_file());

    lumifly_cmd()
        .args(["config", "show", "-o", "plain"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("opc.tcp://localhost:4900/")
                .and(predicate::str::contains("opc.tcp://localhost:4902/")),
        );
}

#[test]
fn test_config_init_refuses_to_overwrite_without_yes() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 1);
    let output = lumifly_cmd()
        .args(["config", "init"])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("already exists"));
}

#[test]
fn test_missing_roster_is_a_config_error() {
    let output = lumifly_cmd().arg("probe").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("Fleet roster not found"));
}

#[test]
fn test_malformed_roster_names_the_field() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.toml");
    std::fs::write(&path, "[[devices]]\nendpoint = \"http://localhost:4840/\"\n").unwrap();
    let output = lumifly_cmd()
        .args(["probe", "--simulate"])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("devices[0].endpoint"));
}

// ── Fleet commands (simulated) ──────────────────────────────────────

#[test]
fn test_probe_uses_sample_roster_when_simulating() {
    let output = lumifly_cmd()
        .args(["probe", "--simulate", "-o", "plain"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 12);
    assert!(stdout.contains("opc.tcp://localhost:4840/\ton"));
    assert!(stdout.contains("opc.tcp://localhost:4851/\ton"));
}

#[test]
fn test_probe_reports_offline_module() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 3);
    lumifly_cmd()
        .args(["probe", "--simulate", "-o", "json"])
        .args(["--sim-offline", "opc.tcp://localhost:5001/"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"reachable\": false")
                .and(predicate::str::contains("\"kind\": \"connection\"")),
        );
}

#[test]
fn test_read_fresh_fleet_is_dark() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 2);
    lumifly_cmd()
        .args(["read", "--simulate", "-o", "plain"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "opc.tcp://localhost:5000/\t0\tfalse\tfalse",
        ));
}

#[test]
fn test_set_applies_to_every_module() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 3);
    lumifly_cmd()
        .args(["set", "5000", "--simulate", "-y"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("3 succeeded / 0 failed")
                .and(predicate::str::contains("dim=5000 front=true back=true")),
        );
}

#[test]
fn test_set_isolates_unreachable_module() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 3);
    let output = lumifly_cmd()
        .args(["set", "5000", "--simulate", "-y"])
        .args(["--sim-offline", "opc.tcp://localhost:5001/"])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 succeeded / 1 failed"), "{stdout}");
    assert!(stdout.contains("opc.tcp://localhost:5001/"), "{stdout}");
}

#[test]
fn test_set_json_report_includes_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 3);
    let output = lumifly_cmd()
        .args(["set", "5000", "--simulate", "-y", "-o", "json"])
        .args(["--sim-offline", "opc.tcp://localhost:5001/"])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9), "{}", combined_output(&output));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["succeeded"], 2);
    assert_eq!(
        report["summary"]["failures"][0]["endpoint"],
        "opc.tcp://localhost:5001/"
    );
    assert!(report["summary"]["failures"][0]["reason"].is_string());
}

#[test]
fn test_set_plain_report_gives_reason_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 3);
    let output = lumifly_cmd()
        .args(["set", "5000", "--simulate", "-y", "-o", "plain"])
        .args(["--sim-offline", "opc.tcp://localhost:5001/"])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(9), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let failed = stdout
        .lines()
        .find(|l| l.starts_with("opc.tcp://localhost:5001/\t"))
        .unwrap();
    assert_eq!(failed.split('\t').count(), 3, "{failed}");
    assert!(failed.contains("connection error"), "{failed}");
    assert!(stdout.contains("2 succeeded / 1 failed"), "{stdout}");
}

#[test]
fn test_logs_have_no_color_codes_when_color_is_off() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 2);
    let output = lumifly_cmd()
        .args(["off", "--simulate", "-y", "-vv"])
        .args(["--sim-offline", "opc.tcp://localhost:5001/"])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!stderr.is_empty(), "expected log output");
    assert!(!stderr.contains('\u{1b}'), "{stderr}");
}

#[test]
fn test_set_with_every_module_offline_is_a_connection_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 2);
    let output = lumifly_cmd()
        .args(["off", "--simulate", "-y"])
        .args([
            "--sim-offline",
            "opc.tcp://localhost:5000/,opc.tcp://localhost:5001/",
        ])
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("0 succeeded / 2 failed"));
}

#[test]
fn test_out_of_range_dim_is_rejected_before_contact() {
    for dim in ["-1", "10001"] {
        let output = lumifly_cmd()
            .args(["set", dim, "--simulate", "-y"])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(2), "dim {dim}");
        let text = combined_output(&output);
        assert!(text.contains("dim"), "{text}");
        assert!(!text.contains("succeeded"), "{text}");
    }
}

#[test]
fn test_negative_delay_is_rejected() {
    let output = lumifly_cmd()
        .args(["on", "--delay", "-1", "--simulate", "-y"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_delay_and_manual_conflict() {
    let output = lumifly_cmd()
        .args(["on", "--delay", "1", "--manual", "--simulate"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_batch_without_yes_needs_a_terminal() {
    let output = lumifly_cmd().args(["on", "--simulate"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("requires confirmation"));
}

#[test]
fn test_manual_without_terminal_is_refused() {
    let output = lumifly_cmd()
        .args(["set", "100", "--manual", "--simulate", "-y"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("interactive terminal"));
}

#[test]
fn test_shell_without_terminal_is_refused() {
    let output = lumifly_cmd().args(["shell", "--simulate"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_relays_only_reports_relay_plan() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 2);
    lumifly_cmd()
        .args(["relays", "off", "--simulate", "-y", "-o", "json"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"relays_only\"")
                .and(predicate::str::contains("\"status\": \"applied\"")),
        );
}

#[test]
fn test_delayed_batch_with_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 3);
    lumifly_cmd()
        .args(["on", "--delay", "0.01", "--concurrency", "2", "--simulate", "-y", "-o", "plain"])
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("opc.tcp://localhost:5002/\tapplied"));
}

#[test]
fn test_zero_concurrency_is_a_usage_error() {
    let output = lumifly_cmd()
        .args(["probe", "--simulate", "--concurrency", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[cfg(not(feature = "opcua"))]
#[test]
fn test_live_mode_needs_opcua_feature() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_roster(dir.path(), 1);
    let output = lumifly_cmd()
        .arg("probe")
        .arg("--config")
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    assert!(combined_output(&output).contains("--simulate"));
}
