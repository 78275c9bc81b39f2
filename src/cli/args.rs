//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{
    ConfigOverrides, STORE_ROOT_VAR, TRACKING_LOG_VAR, RAW_SOURCE_VAR, WORK_DIR_VAR,
};
use crate::pipeline::StageName;

/// stayscore - Train and batch-score a listing rating classifier through checkpointed stages
#[derive(Parser, Debug)]
#[command(name = "stayscore")]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "Required environment (a .env file in the working directory is read first):\n  RAW_BUCKET, CLEANED_BUCKET, MODELS_BUCKET, PREDICTIONS_BUCKET"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Options of a pipeline run.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Start the run at this stage, reusing artifacts earlier runs left in storage.
    /// Options: "ingest" (default), "transform", "train", "batch-score"
    #[arg(long, value_parser = validate_start_stage)]
    pub from_stage: Option<StageName>,

    /// Root directory of the object store (buckets are subdirectories)
    #[arg(long, env = STORE_ROOT_VAR)]
    pub store_root: Option<PathBuf>,

    /// Scratch directory for files between compute and upload
    #[arg(long, env = WORK_DIR_VAR)]
    pub work_dir: Option<PathBuf>,

    /// Raw listings CSV copied into the raw bucket by the ingest stage.
    /// Defaults to <work-dir>/listings2025-03.csv
    #[arg(long, env = RAW_SOURCE_VAR)]
    pub raw_source: Option<PathBuf>,

    /// Append one JSON line per training run to this file
    #[arg(long, env = TRACKING_LOG_VAR)]
    pub tracking_log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline (the default when no subcommand is given)
    Run(RunArgs),

    /// List the stages in execution order with their inputs and outputs
    Stages,
}

impl Cli {
    /// The subcommand to execute, defaulting to a full run.
    pub fn command(&self) -> Commands {
        match &self.command {
            Some(Commands::Run(args)) => Commands::Run(args.clone()),
            Some(Commands::Stages) => Commands::Stages,
            None => Commands::Run(RunArgs::default()),
        }
    }
}

impl RunArgs {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            store_root: self.store_root.clone(),
            work_dir: self.work_dir.clone(),
            raw_source: self.raw_source.clone(),
            tracking_log: self.tracking_log.clone(),
        }
    }
}

/// Validator for from_stage parameter
fn validate_start_stage(s: &str) -> Result<StageName, String> {
    let stage: StageName = s.parse()?;
    if stage == StageName::PublishCleaned {
        Err(format!(
            "'{}' cannot start a run: its input is produced locally by '{}'",
            stage,
            StageName::Transform
        ))
    } else {
        Ok(stage)
    }
}
