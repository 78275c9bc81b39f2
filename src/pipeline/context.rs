//! Per-run scratch space shared between stages
//!
//! Local artifact handles (paths to files a stage produced but has not
//! published) are written once by their producer and taken once by their
//! consumer. Everything a stage publishes to storage is recorded in the
//! ledger so the run report can list it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::stage::{HandleKey, StageName};
use crate::error::{PipelineError, Result};

/// One object written to storage during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    pub stage: StageName,
    pub bucket: String,
    pub key: String,
}

#[derive(Debug, Default)]
pub struct RunContext {
    handles: BTreeMap<HandleKey, PathBuf>,
    consumed: Vec<HandleKey>,
    published: Vec<PublishedArtifact>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a handle. Each key may be written once per run.
    pub fn put_handle(&mut self, key: HandleKey, path: impl Into<PathBuf>) -> Result<()> {
        if self.handles.contains_key(&key) || self.consumed.contains(&key) {
            return Err(PipelineError::contract(format!(
                "handle '{}' was already written in this run",
                key
            )));
        }
        self.handles.insert(key, path.into());
        Ok(())
    }

    /// Remove and return a handle. Each key may be read once per run.
    pub fn take_handle(&mut self, key: HandleKey) -> Result<PathBuf> {
        match self.handles.remove(&key) {
            Some(path) => {
                self.consumed.push(key);
                Ok(path)
            }
            None if self.consumed.contains(&key) => Err(PipelineError::contract(format!(
                "handle '{}' was already consumed",
                key
            ))),
            None => Err(PipelineError::contract(format!(
                "handle '{}' was never written; did stage '{}' run?",
                key, key.producer
            ))),
        }
    }

    /// Handles written but not yet consumed.
    pub fn pending_handles(&self) -> Vec<HandleKey> {
        self.handles.keys().copied().collect()
    }

    pub fn record_published(&mut self, stage: StageName, bucket: &str, key: &str) {
        self.published.push(PublishedArtifact {
            stage,
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
    }

    pub fn published(&self) -> &[PublishedArtifact] {
        &self.published
    }

    pub fn into_published(self) -> Vec<PublishedArtifact> {
        self.published
    }

    /// Peek at a handle without consuming it.
    pub fn handle(&self, key: HandleKey) -> Option<&Path> {
        self.handles.get(&key).map(PathBuf::as_path)
    }
}
