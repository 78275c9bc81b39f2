//! Stage abstraction shared by every step of a run

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::context::RunContext;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::storage::ObjectStore;

/// The fixed, ordered set of stages a run is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageName {
    Ingest,
    Transform,
    PublishCleaned,
    Train,
    BatchScore,
}

impl StageName {
    /// All stages in execution order.
    pub const ALL: [StageName; 5] = [
        StageName::Ingest,
        StageName::Transform,
        StageName::PublishCleaned,
        StageName::Train,
        StageName::BatchScore,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageName::Ingest => "ingest",
            StageName::Transform => "transform",
            StageName::PublishCleaned => "publish-cleaned",
            StageName::Train => "train",
            StageName::BatchScore => "batch-score",
        }
    }

    /// The stage that follows this one, `None` for the last.
    pub fn next(&self) -> Option<StageName> {
        let idx = Self::ALL.iter().position(|s| s == self)?;
        Self::ALL.get(idx + 1).copied()
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StageName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        StageName::ALL
            .iter()
            .find(|stage| stage.as_str() == normalized)
            .copied()
            .ok_or_else(|| {
                format!(
                    "Unknown stage: '{}'. Use one of: {}",
                    s,
                    StageName::ALL
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            })
    }
}

/// Name of a local artifact handle carried in the [`RunContext`].
///
/// The producing stage is part of the key so a handle can only be written by
/// the stage that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleKey {
    pub producer: StageName,
    pub name: &'static str,
}

impl HandleKey {
    pub const fn new(producer: StageName, name: &'static str) -> Self {
        Self { producer, name }
    }
}

impl fmt::Display for HandleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.producer, self.name)
    }
}

/// Shared collaborators handed to every stage.
#[derive(Clone, Copy)]
pub struct StageEnv<'a> {
    pub config: &'a PipelineConfig,
    pub store: &'a dyn ObjectStore,
}

impl<'a> StageEnv<'a> {
    pub fn new(config: &'a PipelineConfig, store: &'a dyn ObjectStore) -> Self {
        Self { config, store }
    }
}

/// One unit of the pipeline with declared inputs and outputs.
///
/// `reads`/`writes` list the context handles the stage consumes and
/// produces; [`super::Pipeline::new`] checks them before anything runs.
/// Storage artifacts are not declared here: they are addressed by fixed keys.
pub trait Stage {
    fn name(&self) -> StageName;

    fn reads(&self) -> &[HandleKey] {
        &[]
    }

    fn writes(&self) -> &[HandleKey] {
        &[]
    }

    fn run(&self, ctx: &mut RunContext, env: &StageEnv<'_>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(StageName::Ingest.next(), Some(StageName::Transform));
        assert_eq!(StageName::Transform.next(), Some(StageName::PublishCleaned));
        assert_eq!(StageName::PublishCleaned.next(), Some(StageName::Train));
        assert_eq!(StageName::Train.next(), Some(StageName::BatchScore));
        assert_eq!(StageName::BatchScore.next(), None);
    }

    #[test]
    fn test_stage_name_from_str() {
        assert_eq!("train".parse::<StageName>().unwrap(), StageName::Train);
        assert_eq!("batch_score".parse::<StageName>().unwrap(), StageName::BatchScore);
        assert_eq!("Publish-Cleaned".parse::<StageName>().unwrap(), StageName::PublishCleaned);
        assert!("deploy".parse::<StageName>().is_err());
    }

    #[test]
    fn test_handle_key_display() {
        let key = HandleKey::new(StageName::Transform, "cleaned_path");
        assert_eq!(key.to_string(), "transform.cleaned_path");
    }
}
