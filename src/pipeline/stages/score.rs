use tracing::info;

use super::{fetch, publish};
use crate::config::keys;
use crate::error::{PipelineError, Result};
use crate::pipeline::context::RunContext;
use crate::pipeline::features::FeatureMatrix;
use crate::pipeline::forest::{RandomForest, DECISION_THRESHOLD};
use crate::pipeline::label::{label_values, LABEL};
use crate::pipeline::loader::{load_table, read_header, save_table};
use crate::pipeline::metrics::{
    class_metrics, performance_frame, predictions_frame, roc_auc, roc_auc_frame,
};
use crate::pipeline::stage::{Stage, StageEnv, StageName};

/// Score the holdout with the persisted model and publish predictions and metrics.
pub struct BatchScore;

/// Explain how a holdout header differs from the model's feature list.
fn describe_mismatch(expected: &[String], found: &[String]) -> String {
    let missing: Vec<&str> = expected
        .iter()
        .filter(|name| !found.contains(name))
        .map(String::as_str)
        .collect();
    let extra: Vec<&str> = found
        .iter()
        .filter(|name| !expected.contains(name))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() || !extra.is_empty() {
        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing [{}]", missing.join(", ")));
        }
        if !extra.is_empty() {
            parts.push(format!("unexpected [{}]", extra.join(", ")));
        }
        return format!("holdout columns differ from the model: {}", parts.join("; "));
    }

    let pos = expected
        .iter()
        .zip(found)
        .position(|(a, b)| a != b)
        .unwrap_or(0);
    format!(
        "holdout columns are reordered: position {} holds '{}' but the model expects '{}'",
        pos, found[pos], expected[pos]
    )
}

impl Stage for BatchScore {
    fn name(&self) -> StageName {
        StageName::BatchScore
    }

    fn run(&self, ctx: &mut RunContext, env: &StageEnv<'_>) -> Result<()> {
        let stage = self.name();
        let models = &env.config.buckets.models;
        let predictions = &env.config.buckets.predictions;

        let x_path = fetch(env, stage, models, keys::HOLDOUT_FEATURES)?;
        let y_path = fetch(env, stage, models, keys::HOLDOUT_LABELS)?;
        let model_path = fetch(env, stage, models, keys::MODEL)?;

        let model = RandomForest::load(&model_path)?;

        let header = read_header(&x_path)?;
        if header != model.feature_names {
            return Err(PipelineError::contract(describe_mismatch(
                &model.feature_names,
                &header,
            )));
        }

        let holdout_x = load_table(&x_path)?;
        let holdout_y = load_table(&y_path)?;
        if holdout_x.height() != holdout_y.height() {
            return Err(PipelineError::contract(format!(
                "holdout features have {} rows but labels have {}",
                holdout_x.height(),
                holdout_y.height()
            )));
        }

        let actual = label_values(&holdout_y, LABEL)?;
        let features = FeatureMatrix::from_frame(&holdout_x, &model.feature_names)?;

        let probabilities = model.predict_proba(&features)?;
        let predicted: Vec<i32> = probabilities
            .iter()
            .map(|&p| i32::from(p > DECISION_THRESHOLD))
            .collect();

        let per_class = class_metrics(&actual, &predicted)?;
        let auc = roc_auc(&actual, &probabilities)?;
        info!(rows = actual.len(), roc_auc = auc, "holdout scored");

        let outputs = [
            (
                keys::PREDICTIONS,
                predictions_frame(&actual, &predicted, &probabilities)?,
            ),
            (keys::PERFORMANCE_BY_CLASS, performance_frame(&per_class)?),
            (keys::ROC_AUC, roc_auc_frame(auc)?),
        ];
        for (key, mut df) in outputs {
            let path = env.config.scratch(stage, key);
            save_table(&mut df, &path)?;
            publish(ctx, env, stage, &path, predictions, key)?;
        }
        Ok(())
    }
}
