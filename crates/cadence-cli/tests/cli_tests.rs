//! Integration tests for the `cadence` CLI binary.
//!
//! These use `assert_cmd` and `predicates` to exercise the check, expand,
//! and next subcommands through the actual binary.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use predicates::prelude::*;

fn cadence() -> Command {
    Command::cargo_bin("cadence").unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Check subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_prints_the_normalized_rule() {
    cadence()
        .args(["check", "--rule", "RRULE:FREQ=WEEKLY;BYDAY=MO,FR;COUNT=6;X-IGNORED=1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FREQ=WEEKLY;COUNT=6;BYDAY=MO,FR"));
}

#[test]
fn check_rejects_an_unsupported_frequency() {
    cadence()
        .args(["check", "--rule", "FREQ=HOURLY"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HOURLY"));
}

#[test]
fn check_rejects_a_rule_that_fails_validation() {
    cadence()
        .args(["check", "--rule", "FREQ=MONTHLY;BYMONTHDAY=32"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("BYMONTHDAY"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Expand subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn expand_prints_one_line_per_occurrence() {
    cadence()
        .args([
            "expand",
            "--rule",
            "FREQ=DAILY;COUNT=3",
            "--start",
            "2025-01-01T09:00:00Z",
            "--end",
            "2025-01-01T09:30:00Z",
            "--from",
            "2025-01-01T00:00:00Z",
            "--to",
            "2025-01-10T00:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-01T09:00:00"))
        .stdout(predicate::str::contains("2025-01-02T09:00:00"))
        .stdout(predicate::str::contains("2025-01-03T09:00:00"));
}

#[test]
fn expand_json_emits_a_parseable_array() {
    let output = cadence()
        .args([
            "expand",
            "--rule",
            "FREQ=DAILY;COUNT=3",
            "--start",
            "2025-01-01T09:00:00Z",
            "--end",
            "2025-01-01T09:30:00Z",
            "--from",
            "2025-01-01T00:00:00Z",
            "--to",
            "2025-01-10T00:00:00Z",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let parsed: serde_json::Value =
        serde_json::from_slice(&output).expect("stdout must be valid JSON");
    let occurrences = parsed.as_array().expect("must be an array");
    assert_eq!(occurrences.len(), 3);
    assert_eq!(
        occurrences[0]["start"],
        serde_json::json!("2025-01-01T09:00:00Z")
    );
}

#[test]
fn expand_respects_the_max_cap() {
    let output = cadence()
        .args([
            "expand",
            "--rule",
            "FREQ=DAILY",
            "--start",
            "2025-01-01T09:00:00Z",
            "--end",
            "2025-01-01T09:30:00Z",
            "--from",
            "2025-01-01T00:00:00Z",
            "--to",
            "2026-01-01T00:00:00Z",
            "--max",
            "5",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines = String::from_utf8(output).expect("utf-8 stdout");
    assert_eq!(lines.lines().count(), 5);
}

// ─────────────────────────────────────────────────────────────────────────────
// Next subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn next_prints_the_first_occurrence_strictly_after() {
    cadence()
        .args([
            "next",
            "--rule",
            "FREQ=DAILY;COUNT=5",
            "--start",
            "2025-01-01T09:00:00Z",
            "--end",
            "2025-01-01T09:30:00Z",
            "--after",
            "2025-01-02T09:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2025-01-03T09:00:00"));
}

#[test]
fn next_reports_an_exhausted_series_as_none() {
    cadence()
        .args([
            "next",
            "--rule",
            "FREQ=DAILY;COUNT=2",
            "--start",
            "2025-01-01T09:00:00Z",
            "--end",
            "2025-01-01T09:30:00Z",
            "--after",
            "2025-01-02T09:00:00Z",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("none"));
}
