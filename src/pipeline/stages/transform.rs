use tracing::{debug, info};

use super::fetch;
use crate::config::keys;
use crate::error::Result;
use crate::pipeline::clean::clean_listings;
use crate::pipeline::context::RunContext;
use crate::pipeline::loader::{load_raw_table, save_table};
use crate::pipeline::missing::analyze_missing_values;
use crate::pipeline::stage::{HandleKey, Stage, StageEnv, StageName};

/// Local path of the modeling table, consumed by [`super::PublishCleaned`].
pub const CLEANED_HANDLE: HandleKey = HandleKey::new(StageName::Transform, "cleaned_path");

/// Clean the raw record set into the modeling table.
pub struct Transform;

impl Stage for Transform {
    fn name(&self) -> StageName {
        StageName::Transform
    }

    fn writes(&self) -> &[HandleKey] {
        &[CLEANED_HANDLE]
    }

    fn run(&self, ctx: &mut RunContext, env: &StageEnv<'_>) -> Result<()> {
        let raw_path = fetch(env, self.name(), &env.config.buckets.raw, keys::RAW_TABLE)?;
        let raw = load_raw_table(&raw_path)?;

        for (column, ratio) in analyze_missing_values(&raw)?
            .into_iter()
            .filter(|(_, ratio)| *ratio > 0.0)
        {
            debug!(column = %column, missing_pct = ratio * 100.0, "raw column has gaps");
        }

        let mut cleaned = clean_listings(&raw)?;

        let out = env.config.scratch(self.name(), keys::CLEANED_TABLE);
        save_table(&mut cleaned, &out)?;
        info!(
            rows = cleaned.height(),
            columns = cleaned.width(),
            path = %out.display(),
            "modeling table written"
        );

        ctx.put_handle(CLEANED_HANDLE, out)
    }
}
