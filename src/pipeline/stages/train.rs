use polars::prelude::*;
use tracing::info;

use super::{fetch, publish};
use crate::config::keys;
use crate::error::Result;
use crate::pipeline::clean::validate_modeling_table;
use crate::pipeline::context::RunContext;
use crate::pipeline::features::FeatureMatrix;
use crate::pipeline::forest::{ForestParams, RandomForest};
use crate::pipeline::label::{class_counts, label_values, LABEL};
use crate::pipeline::loader::{load_table, save_table};
use crate::pipeline::split::{stratified_split, HOLDOUT_FRACTION};
use crate::pipeline::stage::{Stage, StageEnv, StageName};
use crate::pipeline::tracking::{notify, RunTracker, TrainingRunRecord};
use crate::utils::progress::{create_progress_bar, finish_with_success, finish_with_warning};

/// Split the modeling table, persist the holdout, fit and persist the forest.
pub struct Train {
    tracker: Box<dyn RunTracker>,
    params: ForestParams,
}

impl Train {
    pub fn new(tracker: Box<dyn RunTracker>) -> Self {
        Self {
            tracker,
            params: ForestParams::default(),
        }
    }

    /// Override the forest hyperparameters (smaller forests in tests and benches).
    pub fn with_params(mut self, params: ForestParams) -> Self {
        self.params = params;
        self
    }
}

fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec(
        "idx".into(),
        rows.iter().map(|&r| r as IdxSize).collect(),
    );
    Ok(df.take(&idx)?)
}

impl Stage for Train {
    fn name(&self) -> StageName {
        StageName::Train
    }

    fn run(&self, ctx: &mut RunContext, env: &StageEnv<'_>) -> Result<()> {
        let stage = self.name();
        let models = &env.config.buckets.models;

        let table_path = fetch(env, stage, &env.config.buckets.cleaned, keys::CLEANED_TABLE)?;
        let table = load_table(&table_path)?;
        validate_modeling_table(&table)?;

        let labels = label_values(&table, LABEL)?;
        let features = FeatureMatrix::all_except(&table, LABEL)?;
        let partition = stratified_split(&labels, HOLDOUT_FRACTION, self.params.seed)?;
        info!(
            train_rows = partition.train.len(),
            holdout_rows = partition.holdout.len(),
            features = features.n_features(),
            "modeling table split"
        );

        // The holdout is persisted before fitting so evaluation never depends on the fit
        let mut holdout_x = take_rows(
            &table.select(features.names.iter().map(|s| s.as_str()))?,
            &partition.holdout,
        )?;
        let mut holdout_y = take_rows(&table.select([LABEL])?, &partition.holdout)?;

        let x_path = env.config.scratch(stage, keys::HOLDOUT_FEATURES);
        save_table(&mut holdout_x, &x_path)?;
        publish(ctx, env, stage, &x_path, models, keys::HOLDOUT_FEATURES)?;

        let y_path = env.config.scratch(stage, keys::HOLDOUT_LABELS);
        save_table(&mut holdout_y, &y_path)?;
        publish(ctx, env, stage, &y_path, models, keys::HOLDOUT_LABELS)?;

        let train_x = features.select_rows(&partition.train);
        let train_y: Vec<i32> = partition.train.iter().map(|&i| labels[i]).collect();
        let (negatives, positives) = class_counts(&train_y);
        info!(negatives, positives, "fitting random forest");

        let pb = create_progress_bar(self.params.n_estimators as u64, "   Fitting trees");
        let forest = match RandomForest::fit(&train_x, &train_y, &self.params, Some(&pb)) {
            Ok(forest) => {
                finish_with_success(&pb, &format!("Fitted {} trees", forest.trees.len()));
                forest
            }
            Err(e) => {
                finish_with_warning(&pb, "Forest fitting failed");
                return Err(e);
            }
        };

        let model_path = env.config.scratch(stage, keys::MODEL);
        forest.save(&model_path)?;
        publish(ctx, env, stage, &model_path, models, keys::MODEL)?;

        let ranked = forest.ranked_importances();
        let mut importance = df! {
            "feature" => ranked.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
            "importance" => ranked.iter().map(|(_, v)| *v).collect::<Vec<f64>>(),
        }?;
        let importance_path = env.config.scratch(stage, keys::FEATURE_IMPORTANCE);
        save_table(&mut importance, &importance_path)?;
        publish(ctx, env, stage, &importance_path, models, keys::FEATURE_IMPORTANCE)?;

        if let Some((top, score)) = ranked.first() {
            info!(feature = %top, importance = score, "most important feature");
        }

        notify(
            self.tracker.as_ref(),
            &TrainingRunRecord::new(
                &self.params,
                partition.train.len(),
                partition.holdout.len(),
                features.n_features(),
            ),
        );
        Ok(())
    }
}
