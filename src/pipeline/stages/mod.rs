//! The five concrete stages and the standard pipeline built from them

mod ingest;
mod publish;
mod score;
mod train;
mod transform;

use std::path::Path;

use tracing::info;

pub use ingest::Ingest;
pub use publish::PublishCleaned;
pub use score::BatchScore;
pub use train::Train;
pub use transform::{Transform, CLEANED_HANDLE};

use super::context::RunContext;
use super::orchestrator::Pipeline;
use super::stage::{Stage, StageEnv, StageName};
use super::tracking::RunTracker;
use crate::error::{PipelineError, Result};

/// The full Ingest → BatchScore pipeline, optionally starting part-way.
///
/// Starting at a later stage reuses the artifacts earlier runs left in
/// storage. A stage that depends on a local handle (PublishCleaned) cannot
/// be a starting point; the contract check rejects it.
pub fn standard_pipeline(tracker: Box<dyn RunTracker>, from: Option<StageName>) -> Result<Pipeline> {
    let from = from.unwrap_or(StageName::Ingest);
    let all: Vec<Box<dyn Stage>> = vec![
        Box::new(Ingest),
        Box::new(Transform),
        Box::new(PublishCleaned),
        Box::new(Train::new(tracker)),
        Box::new(BatchScore),
    ];
    let stages: Vec<Box<dyn Stage>> = all.into_iter().filter(|s| s.name() >= from).collect();

    Pipeline::new(stages).map_err(|e| match e {
        PipelineError::DataContract(msg) => PipelineError::Configuration(format!(
            "cannot start a run at '{}': {}",
            from, msg
        )),
        other => other,
    })
}

/// Upload a local file and record it in the run ledger.
pub(crate) fn publish(
    ctx: &mut RunContext,
    env: &StageEnv<'_>,
    stage: StageName,
    local: &Path,
    bucket: &str,
    key: &str,
) -> Result<()> {
    env.store.put(local, bucket, key)?;
    info!(stage = %stage, bucket, key, "artifact uploaded");
    ctx.record_published(stage, bucket, key);
    Ok(())
}

/// Download `bucket/key` into the stage's scratch area and return the path.
pub(crate) fn fetch(env: &StageEnv<'_>, stage: StageName, bucket: &str, key: &str) -> Result<std::path::PathBuf> {
    let local = env.config.scratch(stage, key);
    env.store.get(bucket, key, &local)?;
    info!(stage = %stage, bucket, key, "artifact downloaded");
    Ok(local)
}
