use tracing::info;

use super::publish;
use crate::config::keys;
use crate::error::{PipelineError, Result};
use crate::pipeline::clean::RAW_COLUMNS;
use crate::pipeline::context::RunContext;
use crate::pipeline::loader::read_header;
use crate::pipeline::stage::{Stage, StageEnv, StageName};

/// Copy the raw record set, unchanged, into the raw bucket.
///
/// Only the header is inspected: a source missing a column cleaning needs
/// is rejected here rather than after upload.
pub struct Ingest;

impl Stage for Ingest {
    fn name(&self) -> StageName {
        StageName::Ingest
    }

    fn run(&self, ctx: &mut RunContext, env: &StageEnv<'_>) -> Result<()> {
        let source = &env.config.raw_source;
        if !source.is_file() {
            return Err(PipelineError::Configuration(format!(
                "raw source '{}' does not exist",
                source.display()
            )));
        }

        let header = read_header(source)?;
        let missing: Vec<&str> = RAW_COLUMNS
            .iter()
            .filter(|col| !header.iter().any(|h| h == *col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(PipelineError::contract(format!(
                "raw source '{}' lacks required column(s): {}",
                source.display(),
                missing.join(", ")
            )));
        }
        info!(source = %source.display(), columns = header.len(), "raw source accepted");

        publish(ctx, env, self.name(), source, &env.config.buckets.raw, keys::RAW_TABLE)
    }
}
