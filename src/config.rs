//! Run configuration
//!
//! Built once at process start from the environment (plus optional CLI
//! overrides) and passed by reference into the orchestrator and every stage.
//! All required values are checked before the first stage runs.

use std::path::PathBuf;

use crate::error::{PipelineError, Result};
use crate::pipeline::StageName;

/// Environment variable holding the raw bucket identifier
pub const RAW_BUCKET_VAR: &str = "RAW_BUCKET";
/// Environment variable holding the cleaned bucket identifier
pub const CLEANED_BUCKET_VAR: &str = "CLEANED_BUCKET";
/// Environment variable holding the models bucket identifier
pub const MODELS_BUCKET_VAR: &str = "MODELS_BUCKET";
/// Environment variable holding the predictions bucket identifier
pub const PREDICTIONS_BUCKET_VAR: &str = "PREDICTIONS_BUCKET";

pub const STORE_ROOT_VAR: &str = "STAYSCORE_STORE_ROOT";
pub const WORK_DIR_VAR: &str = "STAYSCORE_WORK_DIR";
pub const RAW_SOURCE_VAR: &str = "STAYSCORE_RAW_SOURCE";
pub const TRACKING_LOG_VAR: &str = "STAYSCORE_TRACKING_LOG";

const DEFAULT_STORE_ROOT: &str = "store";
const DEFAULT_WORK_DIR: &str = "data";

/// Object keys every run reads and writes. Fixed per pipeline, not per run.
pub mod keys {
    pub const RAW_TABLE: &str = "listings2025-03.csv";
    pub const CLEANED_TABLE: &str = "cleaned_listings.csv";
    pub const HOLDOUT_FEATURES: &str = "test/X_test.csv";
    pub const HOLDOUT_LABELS: &str = "test/y_test.csv";
    pub const MODEL: &str = "model/model.json";
    pub const FEATURE_IMPORTANCE: &str = "model/feature_importance.csv";
    pub const PERFORMANCE_BY_CLASS: &str = "metrics/performance_by_class.csv";
    pub const ROC_AUC: &str = "metrics/roc_auc.csv";
    pub const PREDICTIONS: &str = "predictions/predictions.csv";
}

/// The four storage partitions a run touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buckets {
    pub raw: String,
    pub cleaned: String,
    pub models: String,
    pub predictions: String,
}

/// Everything a run needs to know about its surroundings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub buckets: Buckets,
    /// Root directory of the filesystem object store
    pub store_root: PathBuf,
    /// Shared scratch directory for files between compute and upload
    pub work_dir: PathBuf,
    /// Raw CSV the ingest stage copies into the raw bucket
    pub raw_source: PathBuf,
    /// JSON-lines experiment log; `None` disables tracking
    pub tracking_log: Option<PathBuf>,
}

/// Values that take precedence over the environment (normally CLI flags).
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub store_root: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub raw_source: Option<PathBuf>,
    pub tracking_log: Option<PathBuf>,
}

impl PipelineConfig {
    /// Build from the process environment.
    pub fn from_env(overrides: ConfigOverrides) -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok(), overrides)
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// Every missing bucket is reported in a single error so an operator can
    /// fix the environment in one pass.
    pub fn from_lookup<F>(lookup: F, overrides: ConfigOverrides) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        let mut bucket = |name: &'static str| match read(name) {
            Some(value) => value.trim().to_string(),
            None => {
                missing.push(name);
                String::new()
            }
        };

        let buckets = Buckets {
            raw: bucket(RAW_BUCKET_VAR),
            cleaned: bucket(CLEANED_BUCKET_VAR),
            models: bucket(MODELS_BUCKET_VAR),
            predictions: bucket(PREDICTIONS_BUCKET_VAR),
        };

        if !missing.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "missing required environment variable(s): {}",
                missing.join(", ")
            )));
        }

        for (name, value) in [
            (RAW_BUCKET_VAR, &buckets.raw),
            (CLEANED_BUCKET_VAR, &buckets.cleaned),
            (MODELS_BUCKET_VAR, &buckets.models),
            (PREDICTIONS_BUCKET_VAR, &buckets.predictions),
        ] {
            if value.contains('/') || value == "." || value == ".." {
                return Err(PipelineError::Configuration(format!(
                    "{} must be a plain bucket identifier, got '{}'",
                    name, value
                )));
            }
        }

        let store_root = overrides
            .store_root
            .or_else(|| read(STORE_ROOT_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_ROOT));
        let work_dir = overrides
            .work_dir
            .or_else(|| read(WORK_DIR_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR));
        let raw_source = overrides
            .raw_source
            .or_else(|| read(RAW_SOURCE_VAR).map(PathBuf::from))
            .unwrap_or_else(|| work_dir.join(keys::RAW_TABLE));
        let tracking_log = overrides
            .tracking_log
            .or_else(|| read(TRACKING_LOG_VAR).map(PathBuf::from));

        Ok(Self {
            buckets,
            store_root,
            work_dir,
            raw_source,
            tracking_log,
        })
    }

    /// Local scratch path for an artifact file owned by `stage`.
    ///
    /// Each stage gets its own subdirectory, and `/`-separated keys map to
    /// nested paths, so no two stages ever share a working file.
    pub fn scratch(&self, stage: StageName, key: &str) -> PathBuf {
        key.split('/')
            .fold(self.work_dir.join(stage.as_str()), |path, segment| path.join(segment))
    }
}
