use super::publish;
use super::transform::CLEANED_HANDLE;
use crate::config::keys;
use crate::error::Result;
use crate::pipeline::context::RunContext;
use crate::pipeline::stage::{HandleKey, Stage, StageEnv, StageName};

/// Upload the modeling table so later stages (and later runs) can read it.
pub struct PublishCleaned;

impl Stage for PublishCleaned {
    fn name(&self) -> StageName {
        StageName::PublishCleaned
    }

    fn reads(&self) -> &[HandleKey] {
        &[CLEANED_HANDLE]
    }

    fn run(&self, ctx: &mut RunContext, env: &StageEnv<'_>) -> Result<()> {
        let local = ctx.take_handle(CLEANED_HANDLE)?;
        publish(
            ctx,
            env,
            self.name(),
            &local,
            &env.config.buckets.cleaned,
            keys::CLEANED_TABLE,
        )
    }
}
