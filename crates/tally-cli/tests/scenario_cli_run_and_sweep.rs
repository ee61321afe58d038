//! End-to-end `tally` invocations over the backtest fixture panel.
//!
//! Validates that:
//! - `config-hash` is stable under key reordering.
//! - `run` prints a deterministic summary and checkpoints daily rows.
//! - unused config keys warn by default and fail with `--strict-config`.
//! - `sweep` prints one line per commission variant, in grid order.
//! - basket targets run through the same command.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("tally-backtest")
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn write_yaml(dir: &Path, name: &str, body: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, body).unwrap();
    p.to_str().unwrap().to_string()
}

#[allow(deprecated)]
fn tally() -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env("RUST_LOG", "warn");
    cmd
}

fn run_args(config: &str, targets: &str) -> Vec<String> {
    vec![
        "--config".to_string(),
        config.to_string(),
        "--prices".to_string(),
        fixture("prices.csv").to_str().unwrap().to_string(),
        "--targets".to_string(),
        fixture(targets).to_str().unwrap().to_string(),
    ]
}

// ---- Scenario 1: config hash ----

#[test]
fn config_hash_ignores_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_yaml(
        dir.path(),
        "a.yaml",
        "ledger:\n  commission_per_share: 0.01\n  track_unsized: false\n",
    );
    let b = write_yaml(
        dir.path(),
        "b.yaml",
        "ledger:\n  track_unsized: false\n  commission_per_share: 0.01\n",
    );

    let out_a = tally().args(["config-hash", &a]).output().unwrap();
    let out_b = tally().args(["config-hash", &b]).output().unwrap();
    assert!(out_a.status.success());
    assert_eq!(out_a.stdout, out_b.stdout);

    let text = String::from_utf8(out_a.stdout).unwrap();
    assert!(text.starts_with("config_hash="));
    assert!(text.contains(r#"{"ledger":{"commission_per_share":0.01,"track_unsized":false}}"#));
}

// ---- Scenario 2: single run with checkpointed rows ----

#[test]
fn run_prints_summary_and_writes_rows() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_yaml(dir.path(), "base.yaml", "ledger:\n  commission_per_share: 0.005\n");
    let rows = dir.path().join("rows.csv");

    tally()
        .arg("run")
        .args(run_args(&cfg, "targets.csv"))
        .args(["--out", rows.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("days=5\n"))
        .stdout(predicate::str::contains("total_pl=745.25\n"))
        .stdout(predicate::str::contains("cancelled=false\n"))
        .stdout(predicate::str::contains("rows_path="));

    let written = std::fs::read_to_string(&rows).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 6, "header plus one line per day");
    assert!(lines[0].starts_with("date,pl_long,pl_short,pl,"));
    assert!(lines[5].starts_with("2024-01-08,"));
}

#[test]
fn run_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_yaml(dir.path(), "base.yaml", "{}\n");

    let first = tally().arg("run").args(run_args(&cfg, "targets.csv")).output().unwrap();
    let second = tally().arg("run").args(run_args(&cfg, "targets.csv")).output().unwrap();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout, "run_id and summary must repeat");
}

// ---- Scenario 3: unused keys ----

#[test]
fn typo_warns_by_default_and_fails_when_strict() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_yaml(dir.path(), "typo.yaml", "ledger:\n  comission_per_share: 0.0\n");

    tally()
        .arg("run")
        .args(run_args(&cfg, "targets.csv"))
        .assert()
        .success()
        .stderr(predicate::str::contains("/ledger/comission_per_share"));

    tally()
        .arg("run")
        .args(run_args(&cfg, "targets.csv"))
        .arg("--strict-config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_UNUSED_KEYS"));
}

// ---- Scenario 4: sweep ----

#[test]
fn sweep_prints_one_line_per_variant_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_yaml(
        dir.path(),
        "sweep.yaml",
        "sweep:\n  commission_per_share: [0.0, 0.005, 0.01]\n",
    );

    let out = tally().arg("sweep").args(run_args(&cfg, "targets.csv")).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let text = String::from_utf8(out.stdout).unwrap();
    let variants: Vec<&str> = text.lines().filter(|l| l.starts_with("variant=")).collect();
    assert_eq!(variants.len(), 3);
    assert!(variants[0].starts_with("variant=0 commission_per_share=0 "));
    assert!(variants[1].starts_with("variant=1 commission_per_share=0.005 "));
    assert!(variants[1].contains(" total_pl=745.25 "));
    assert!(variants[2].starts_with("variant=2 commission_per_share=0.01 "));
}

// ---- Scenario 5: basket book and bad inputs ----

#[test]
fn basket_targets_run_through_the_same_command() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_yaml(dir.path(), "base.yaml", "{}\n");

    tally()
        .arg("run")
        .args(run_args(&cfg, "basket_targets.csv"))
        .arg("--basket")
        .assert()
        .success()
        .stdout(predicate::str::contains("days=5\n"));
}

#[test]
fn missing_price_file_fails_with_its_path() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_yaml(dir.path(), "base.yaml", "{}\n");

    tally()
        .args(["run", "--config", &cfg])
        .args(["--prices", "/no/such/prices.csv"])
        .args(["--targets", fixture("targets.csv").to_str().unwrap()])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/no/such/prices.csv"));
}
