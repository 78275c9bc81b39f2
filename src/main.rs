//! stayscore: checkpointed training and batch scoring CLI
//!
//! Reads bucket configuration from the environment (optionally a `.env`
//! file), runs the pipeline against a filesystem object store and prints a
//! run summary.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use stayscore::cli::{Cli, Commands, RunArgs};
use stayscore::config::PipelineConfig;
use stayscore::pipeline::{
    standard_pipeline, JsonlRunTracker, NoopTracker, RunTracker, StageEnv,
};
use stayscore::report::{render_stage_table, RunSummary};
use stayscore::storage::LocalObjectStore;
use stayscore::utils::{
    print_banner, print_completion, print_config, print_failure, print_info, print_step_header,
    print_success,
};

fn main() -> ExitCode {
    // A missing .env file is normal; the environment may already be complete
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command() {
        Commands::Stages => list_stages(),
        Commands::Run(args) => run(&args),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            print_failure(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn list_stages() -> Result<ExitCode> {
    let pipeline = standard_pipeline(Box::new(NoopTracker), None)?;
    print_step_header(1, "Pipeline stages");
    println!();
    for line in render_stage_table(pipeline.stages()).lines() {
        println!("    {}", line);
    }
    println!();
    print_info("Every other hand-off goes through the object store under fixed keys");
    Ok(ExitCode::SUCCESS)
}

fn run(args: &RunArgs) -> Result<ExitCode> {
    // Configuration is resolved before any stage runs
    let config = PipelineConfig::from_env(args.overrides())?;

    print_banner(env!("CARGO_PKG_VERSION"));
    print_config(&config, args.from_stage);

    let tracker: Box<dyn RunTracker> = match &config.tracking_log {
        Some(path) => Box::new(JsonlRunTracker::new(path)),
        None => Box::new(NoopTracker),
    };
    let pipeline = standard_pipeline(tracker, args.from_stage)?;

    std::fs::create_dir_all(&config.work_dir).with_context(|| {
        format!("failed to create work directory '{}'", config.work_dir.display())
    })?;
    let store = LocalObjectStore::new(&config.store_root);
    let env = StageEnv::new(&config, &store);

    print_step_header(1, "Running pipeline");
    let names: Vec<String> = pipeline.stage_names().iter().map(|s| s.to_string()).collect();
    print_info(&names.join(" → "));

    match pipeline.run(&env) {
        Ok(report) => {
            print_success("All stages finished");
            print_step_header(2, "Summary");
            RunSummary::from_report(&report).display();
            print_completion();
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            print_step_header(2, "Summary");
            RunSummary::from_report(&failure.report).display();
            println!();
            print_failure(&failure.error.to_string());
            Ok(ExitCode::FAILURE)
        }
    }
}
