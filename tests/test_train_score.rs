//! Integration tests for the train and batch-score stages

use polars::prelude::*;
use stayscore::config::{keys, PipelineConfig};
use stayscore::pipeline::clean::clean_listings;
use stayscore::pipeline::forest::RandomForest;
use stayscore::pipeline::label::LABEL;
use stayscore::pipeline::stages::{BatchScore, Train};
use stayscore::pipeline::{
    JsonlRunTracker, NoopTracker, Pipeline, RunFailure, RunReport, RunState, Stage, StageEnv,
    StageName,
};
use stayscore::storage::{MemoryObjectStore, ObjectStore};
use stayscore::PipelineError;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::*;

const ROWS: usize = 200;

/// A store holding a freshly cleaned modeling table, as PublishCleaned leaves it.
fn seeded_store(temp: &TempDir) -> (PipelineConfig, MemoryObjectStore, DataFrame) {
    let config = test_config(temp.path());
    let mut cleaned = clean_listings(&create_raw_listings(ROWS, 5)).unwrap();
    let path = temp.path().join("cleaned.csv");
    write_csv(&mut cleaned, &path);

    let store = MemoryObjectStore::new();
    store.put(&path, CLEANED, keys::CLEANED_TABLE).unwrap();
    (config, store, cleaned)
}

fn train_and_score(config: &PipelineConfig, store: &MemoryObjectStore) -> RunReport {
    let stages: Vec<Box<dyn Stage>> = vec![
        Box::new(Train::new(Box::new(NoopTracker)).with_params(small_forest())),
        Box::new(BatchScore),
    ];
    let env = StageEnv::new(config, store);
    Pipeline::new(stages).unwrap().run(&env).unwrap()
}

fn score_only(config: &PipelineConfig, store: &MemoryObjectStore) -> Result<RunReport, RunFailure> {
    let stages: Vec<Box<dyn Stage>> = vec![Box::new(BatchScore)];
    let env = StageEnv::new(config, store);
    Pipeline::new(stages).unwrap().run(&env)
}

fn object_frame(store: &MemoryObjectStore, temp: &TempDir, bucket: &str, key: &str) -> DataFrame {
    let path = temp.path().join("inspect").join(key);
    store.get(bucket, key, &path).unwrap();
    read_csv(&path)
}

#[test]
fn test_train_and_score_publish_every_artifact() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);

    let report = train_and_score(&config, &store);
    assert_eq!(
        report.history,
        vec![
            RunState::Running(StageName::Train),
            RunState::Running(StageName::BatchScore),
            RunState::Done
        ]
    );

    for key in [
        keys::HOLDOUT_FEATURES,
        keys::HOLDOUT_LABELS,
        keys::MODEL,
        keys::FEATURE_IMPORTANCE,
    ] {
        assert!(store.exists(MODELS, key).unwrap(), "missing {}", key);
    }
    for key in [keys::PREDICTIONS, keys::PERFORMANCE_BY_CLASS, keys::ROC_AUC] {
        assert!(store.exists(PREDICTIONS, key).unwrap(), "missing {}", key);
    }
    assert_eq!(report.published.len(), 7);
}

#[test]
fn test_holdout_partition_shape() {
    let temp = TempDir::new().unwrap();
    let (config, store, cleaned) = seeded_store(&temp);
    train_and_score(&config, &store);

    let x = object_frame(&store, &temp, MODELS, keys::HOLDOUT_FEATURES);
    let y = object_frame(&store, &temp, MODELS, keys::HOLDOUT_LABELS);

    let expected_rows = (cleaned.height() as f64 * 0.2).ceil() as usize;
    assert_eq!(x.height(), expected_rows);
    assert_eq!(y.height(), expected_rows);
    assert_eq!(names(&y), vec![LABEL.to_string()]);

    // Holdout features keep the modeling table's column order, minus the label
    let expected: Vec<String> = names(&cleaned).into_iter().filter(|n| n != LABEL).collect();
    assert_eq!(names(&x), expected);

    // The model was fitted on exactly those columns, in that order
    let model_path = temp.path().join("model.json");
    store.get(MODELS, keys::MODEL, &model_path).unwrap();
    let model = RandomForest::load(&model_path).unwrap();
    assert_eq!(model.feature_names, expected);
}

#[test]
fn test_feature_importance_ranked() {
    let temp = TempDir::new().unwrap();
    let (config, store, cleaned) = seeded_store(&temp);
    train_and_score(&config, &store);

    let importance = object_frame(&store, &temp, MODELS, keys::FEATURE_IMPORTANCE);
    assert_eq!(names(&importance), vec!["feature", "importance"]);
    assert_eq!(importance.height(), cleaned.width() - 1);

    let values = f64_values(&importance, "importance");
    assert!(values.iter().all(|v| *v >= 0.0));
    assert!(values.windows(2).all(|w| w[0] >= w[1]), "importances must be sorted descending");
    assert!((values.iter().sum::<f64>() - 1.0).abs() < 1e-6);
}

#[test]
fn test_predictions_and_metrics() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);
    train_and_score(&config, &store);

    let predictions = object_frame(&store, &temp, PREDICTIONS, keys::PREDICTIONS);
    assert_eq!(names(&predictions), vec!["actual", "predicted", "probability"]);
    let predicted = f64_values(&predictions, "predicted");
    let probability = f64_values(&predictions, "probability");
    for (p, prob) in predicted.iter().zip(&probability) {
        assert!((0.0..=1.0).contains(prob));
        assert_eq!(*p, if *prob > 0.5 { 1.0 } else { 0.0 });
    }

    let per_class = object_frame(&store, &temp, PREDICTIONS, keys::PERFORMANCE_BY_CLASS);
    assert_eq!(names(&per_class), vec!["class", "metric", "value"]);
    assert_eq!(per_class.height(), 4);
    let metrics: Vec<String> = per_class
        .column("metric")
        .unwrap()
        .str()
        .unwrap()
        .into_no_null_iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(metrics, vec!["precision", "recall", "precision", "recall"]);

    let auc = object_frame(&store, &temp, PREDICTIONS, keys::ROC_AUC);
    assert_eq!(names(&auc), vec!["metric", "value"]);
    let value = f64_values(&auc, "value")[0];
    // Ratings follow a hidden quality score the features expose
    assert!(value > 0.5, "AUC {} should beat chance", value);
}

#[test]
fn test_batch_score_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);
    train_and_score(&config, &store);

    let first: Vec<String> = [keys::PREDICTIONS, keys::PERFORMANCE_BY_CLASS, keys::ROC_AUC]
        .iter()
        .map(|k| object_text(&store, PREDICTIONS, k))
        .collect();

    score_only(&config, &store).unwrap();

    let second: Vec<String> = [keys::PREDICTIONS, keys::PERFORMANCE_BY_CLASS, keys::ROC_AUC]
        .iter()
        .map(|k| object_text(&store, PREDICTIONS, k))
        .collect();
    assert_eq!(first, second);
}

#[test]
fn test_training_is_reproducible() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);

    train_and_score(&config, &store);
    let model_a = object_text(&store, MODELS, keys::MODEL);
    let holdout_a = object_text(&store, MODELS, keys::HOLDOUT_FEATURES);

    train_and_score(&config, &store);
    assert_eq!(object_text(&store, MODELS, keys::MODEL), model_a);
    assert_eq!(object_text(&store, MODELS, keys::HOLDOUT_FEATURES), holdout_a);
}

#[test]
fn test_reordered_holdout_columns_rejected() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);
    train_and_score(&config, &store);

    let x = object_frame(&store, &temp, MODELS, keys::HOLDOUT_FEATURES);
    let mut order = names(&x);
    order.swap(0, 1);
    let mut swapped = x.select(order.iter().map(|s| s.as_str())).unwrap();
    let path = temp.path().join("swapped.csv");
    write_csv(&mut swapped, &path);
    store.put(&path, MODELS, keys::HOLDOUT_FEATURES).unwrap();

    let failure = score_only(&config, &store).unwrap_err();
    assert_eq!(failure.error.stage(), Some(StageName::BatchScore));
    assert!(matches!(failure.error.root(), PipelineError::DataContract(_)));
    assert!(failure.error.to_string().contains("reordered"));
}

#[test]
fn test_dropped_holdout_column_rejected() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);
    train_and_score(&config, &store);

    let x = object_frame(&store, &temp, MODELS, keys::HOLDOUT_FEATURES);
    let mut trimmed = x.drop("price").unwrap();
    let path = temp.path().join("trimmed.csv");
    write_csv(&mut trimmed, &path);
    store.put(&path, MODELS, keys::HOLDOUT_FEATURES).unwrap();

    let failure = score_only(&config, &store).unwrap_err();
    assert!(failure.error.to_string().contains("missing [price]"));
}

#[test]
fn test_label_row_mismatch_rejected() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);
    train_and_score(&config, &store);

    let y = object_frame(&store, &temp, MODELS, keys::HOLDOUT_LABELS);
    let mut short = y.head(Some(y.height() - 1));
    let path = temp.path().join("short.csv");
    write_csv(&mut short, &path);
    store.put(&path, MODELS, keys::HOLDOUT_LABELS).unwrap();

    let failure = score_only(&config, &store).unwrap_err();
    assert!(matches!(failure.error.root(), PipelineError::DataContract(_)));
    assert!(failure.error.to_string().contains("rows"));
}

#[test]
fn test_score_without_model_fails_on_storage() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);

    let failure = score_only(&config, &store).unwrap_err();
    assert_eq!(failure.error.stage(), Some(StageName::BatchScore));
    assert!(matches!(failure.error.root(), PipelineError::Storage(_)));
    assert_eq!(
        failure.report.final_state(),
        Some(RunState::Failed(StageName::BatchScore))
    );
}

#[test]
fn test_train_records_tracking_entry() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);
    let log = temp.path().join("tracking").join("runs.jsonl");

    let stages: Vec<Box<dyn Stage>> = vec![Box::new(
        Train::new(Box::new(JsonlRunTracker::new(&log))).with_params(small_forest()),
    )];
    let env = StageEnv::new(&config, &store);
    Pipeline::new(stages).unwrap().run(&env).unwrap();

    let runs = JsonlRunTracker::new(&log).read_all().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].n_estimators, small_forest().n_estimators);
    assert_eq!(runs[0].seed, 42);
    let rated = ROWS - (0..ROWS).filter(|i| i % 17 == 5).count();
    assert_eq!(runs[0].train_rows + runs[0].holdout_rows, rated);
}

#[test]
fn test_tracker_failure_does_not_fail_training() {
    let temp = TempDir::new().unwrap();
    let (config, store, _) = seeded_store(&temp);

    // A directory cannot be opened for appending
    let log = temp.path().join("not-a-file");
    std::fs::create_dir_all(&log).unwrap();

    let stages: Vec<Box<dyn Stage>> = vec![Box::new(
        Train::new(Box::new(JsonlRunTracker::new(&log))).with_params(small_forest()),
    )];
    let env = StageEnv::new(&config, &store);
    let report = Pipeline::new(stages).unwrap().run(&env).unwrap();
    assert!(report.succeeded());
    assert!(store.exists(MODELS, keys::MODEL).unwrap());
}
