//! Experiment tracking port
//!
//! Training notifies a [`RunTracker`] once a model is fitted. Tracking is an
//! observer: a tracker that fails is logged and otherwise ignored.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::forest::ForestParams;
use crate::error::Result;

/// What one successful training run logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRunRecord {
    pub recorded_at: DateTime<Utc>,
    pub model_type: String,
    pub n_estimators: usize,
    pub seed: u64,
    pub train_rows: usize,
    pub holdout_rows: usize,
    pub feature_count: usize,
}

impl TrainingRunRecord {
    pub fn new(params: &ForestParams, train_rows: usize, holdout_rows: usize, feature_count: usize) -> Self {
        Self {
            recorded_at: Utc::now(),
            model_type: "random_forest".to_string(),
            n_estimators: params.n_estimators,
            seed: params.seed,
            train_rows,
            holdout_rows,
            feature_count,
        }
    }
}

pub trait RunTracker: Send + Sync {
    fn record(&self, run: &TrainingRunRecord) -> Result<()>;
}

/// Discards every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl RunTracker for NoopTracker {
    fn record(&self, _run: &TrainingRunRecord) -> Result<()> {
        Ok(())
    }
}

/// Appends one JSON object per line to a log file.
#[derive(Debug, Clone)]
pub struct JsonlRunTracker {
    path: PathBuf,
}

impl JsonlRunTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every record in the log, oldest first.
    pub fn read_all(&self) -> Result<Vec<TrainingRunRecord>> {
        let content = std::fs::read_to_string(&self.path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }
}

impl RunTracker for JsonlRunTracker {
    fn record(&self, run: &TrainingRunRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut line = serde_json::to_string(run)?;
        line.push('\n');
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Hand `run` to `tracker`, downgrading any failure to a warning.
pub fn notify(tracker: &dyn RunTracker, run: &TrainingRunRecord) {
    if let Err(e) = tracker.record(run) {
        tracing::warn!(error = %e, "experiment tracking failed; continuing without it");
    }
}
