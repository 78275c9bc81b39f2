//! Tests for CLI argument parsing and the stayscore binary

use assert_cmd::Command;
use clap::Parser;
use predicates::prelude::*;
use stayscore::cli::{Cli, Commands};
use stayscore::config::RAW_BUCKET_VAR;
use stayscore::pipeline::StageName;
use std::path::PathBuf;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::*;

/// The binary with a clean environment, run from `dir` so no stray `.env` is picked up.
fn stayscore(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stayscore").unwrap();
    cmd.env_clear().current_dir(dir.path()).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_cli_run_flags() {
    let cli = Cli::parse_from([
        "stayscore",
        "run",
        "--from-stage",
        "train",
        "--store-root",
        "/data/store",
        "--tracking-log",
        "runs.jsonl",
    ]);

    match cli.command() {
        Commands::Run(args) => {
            assert_eq!(args.from_stage, Some(StageName::Train));
            let overrides = args.overrides();
            assert_eq!(overrides.store_root, Some(PathBuf::from("/data/store")));
            assert_eq!(overrides.tracking_log, Some(PathBuf::from("runs.jsonl")));
            assert_eq!(overrides.work_dir, None);
        }
        Commands::Stages => panic!("expected the run command"),
    }
}

#[test]
fn test_cli_stages_subcommand() {
    let cli = Cli::parse_from(["stayscore", "stages"]);
    assert!(matches!(cli.command(), Commands::Stages));
}

#[test]
fn test_stages_lists_pipeline() {
    let temp = TempDir::new().unwrap();
    stayscore(&temp)
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("publish-cleaned"))
        .stdout(predicate::str::contains("batch-score"))
        .stdout(predicate::str::contains("transform.cleaned_path"));
}

#[test]
fn test_help_names_required_environment() {
    let temp = TempDir::new().unwrap();
    stayscore(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("RAW_BUCKET"))
        .stdout(predicate::str::contains("PREDICTIONS_BUCKET"));
}

#[test]
fn test_run_without_buckets_fails_fast() {
    let temp = TempDir::new().unwrap();
    stayscore(&temp)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains(RAW_BUCKET_VAR));

    // Nothing was written before configuration was rejected
    assert!(!temp.path().join("store").exists());
    assert!(!temp.path().join("work").exists());
}

#[test]
fn test_publish_cleaned_rejected_as_start() {
    let temp = TempDir::new().unwrap();
    stayscore(&temp)
        .args(["run", "--from-stage", "publish-cleaned"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot start a run"));
}

#[test]
fn test_full_run_from_env_file() {
    let temp = TempDir::new().unwrap();
    write_raw_listings(&temp.path().join("listings.csv"), 120);

    let env_file: String = bucket_vars()
        .into_iter()
        .map(|(name, value)| format!("{}={}\n", name, value))
        .collect();
    std::fs::write(temp.path().join(".env"), env_file).unwrap();

    stayscore(&temp)
        .args([
            "run",
            "--store-root",
            "store",
            "--work-dir",
            "work",
            "--raw-source",
            "listings.csv",
            "--tracking-log",
            "runs.jsonl",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("RUN SUMMARY"))
        .stdout(predicate::str::contains("predictions/predictions.csv"));

    assert!(temp.path().join("store").join(MODELS).join("model").join("model.json").exists());
    let log = std::fs::read_to_string(temp.path().join("runs.jsonl")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[test]
fn test_resume_without_artifacts_fails() {
    let temp = TempDir::new().unwrap();
    let mut cmd = stayscore(&temp);
    for (name, value) in bucket_vars() {
        cmd.env(name, value);
    }
    cmd.args(["run", "--from-stage", "batch-score", "--store-root", "store"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("RUN SUMMARY"))
        .stderr(predicate::str::contains("batch-score"));
}
