//! Error taxonomy for pipeline runs
//!
//! Every failure a run can hit falls into one of four classes: bad
//! configuration, storage hand-off failure, a broken data contract between
//! stages, or a computation that cannot proceed on the data it was given.
//! The orchestrator wraps whichever of these a stage returns in
//! [`PipelineError::Stage`] so the message always names the failing stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::StageName;

/// Result alias used throughout the library.
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Top-level error type for pipeline runs.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required environment value is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Object store put/get failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Schema, column order, or handle contract between stages was violated.
    #[error("data contract violation: {0}")]
    DataContract(String),

    /// The data is valid but the requested computation cannot be carried out.
    #[error("computation error: {0}")]
    Computation(String),

    /// Attribution wrapper added by the orchestrator.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: StageName,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("dataframe error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn contract(msg: impl Into<String>) -> Self {
        PipelineError::DataContract(msg.into())
    }

    pub fn computation(msg: impl Into<String>) -> Self {
        PipelineError::Computation(msg.into())
    }

    /// Attribute this error to a stage. Already-attributed errors are left alone.
    pub fn in_stage(self, stage: StageName) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, with stage attribution stripped.
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// The stage this error is attributed to, if any.
    pub fn stage(&self) -> Option<StageName> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Failures at the object store boundary.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object '{bucket}/{key}' not found")]
    NotFound { bucket: String, key: String },

    #[error("permission denied for '{bucket}/{key}'")]
    PermissionDenied { bucket: String, key: String },

    #[error("I/O failure on '{bucket}/{key}': {source}")]
    Io {
        bucket: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    #[error("local file '{}' unavailable: {source}", path.display())]
    LocalFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Classify an I/O error raised while touching `bucket/key`.
    pub fn from_io(bucket: &str, key: &str, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => StorageError::PermissionDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::Io {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            },
        }
    }
}
