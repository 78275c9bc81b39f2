//! Pipeline orchestrator - a reducer over an ordered list of stages

use std::collections::BTreeSet;
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info};

use super::context::{PublishedArtifact, RunContext};
use super::stage::{HandleKey, Stage, StageEnv, StageName};
use crate::error::{PipelineError, Result};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum RunState {
    Running(StageName),
    Done,
    Failed(StageName),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Running(stage) => write!(f, "{}", stage),
            RunState::Done => write!(f, "done"),
            RunState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageRecord {
    pub stage: StageName,
    pub succeeded: bool,
    pub duration: Duration,
}

/// Everything a finished (or failed) run leaves behind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub history: Vec<RunState>,
    pub stages: Vec<StageRecord>,
    pub published: Vec<PublishedArtifact>,
}

impl RunReport {
    pub fn final_state(&self) -> Option<RunState> {
        self.history.last().copied()
    }

    pub fn succeeded(&self) -> bool {
        self.final_state() == Some(RunState::Done)
    }
}

/// A failed run: the error (attributed to its stage) plus what ran before it.
#[derive(Debug)]
pub struct RunFailure {
    pub error: PipelineError,
    pub report: RunReport,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// An ordered, contract-checked list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Assemble a pipeline, rejecting it if stage order breaks the handle contracts.
    ///
    /// Stages must appear in [`StageName`] order, each at most once, and every
    /// handle a stage reads must be written by an earlier stage of this pipeline.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Result<Self> {
        verify_contracts(&stages)?;
        Ok(Self { stages })
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn stages(&self) -> &[Box<dyn Stage>] {
        &self.stages
    }

    /// Run every stage in order. The first failure ends the run.
    ///
    /// Artifacts published before the failure stay in storage; re-running
    /// overwrites them by key.
    pub fn run(&self, env: &StageEnv<'_>) -> std::result::Result<RunReport, RunFailure> {
        let mut ctx = RunContext::new();
        let mut report = RunReport::default();

        for stage in &self.stages {
            let name = stage.name();
            report.history.push(RunState::Running(name));
            info!(stage = %name, "stage started");

            let start = Instant::now();
            let outcome = stage.run(&mut ctx, env);
            let duration = start.elapsed();

            report.stages.push(StageRecord {
                stage: name,
                succeeded: outcome.is_ok(),
                duration,
            });

            if let Err(err) = outcome {
                let err = err.in_stage(name);
                error!(stage = %name, error = %err, "stage failed");
                report.history.push(RunState::Failed(name));
                report.published = ctx.into_published();
                return Err(RunFailure { error: err, report });
            }
            info!(stage = %name, elapsed_ms = duration.as_millis() as u64, "stage finished");
        }

        report.history.push(RunState::Done);
        report.published = ctx.into_published();
        Ok(report)
    }
}

fn verify_contracts(stages: &[Box<dyn Stage>]) -> Result<()> {
    if stages.is_empty() {
        return Err(PipelineError::contract("a pipeline needs at least one stage"));
    }

    let mut previous: Option<StageName> = None;
    let mut written: BTreeSet<HandleKey> = BTreeSet::new();

    for stage in stages {
        let name = stage.name();
        if let Some(prev) = previous {
            if name <= prev {
                return Err(PipelineError::contract(format!(
                    "stage '{}' cannot run after '{}'",
                    name, prev
                )));
            }
        }

        for key in stage.reads() {
            if !written.contains(key) {
                return Err(PipelineError::contract(format!(
                    "stage '{}' reads handle '{}' but no earlier stage in this run writes it",
                    name, key
                )));
            }
        }

        for key in stage.writes() {
            if key.producer != name {
                return Err(PipelineError::contract(format!(
                    "stage '{}' declares handle '{}' owned by '{}'",
                    name, key, key.producer
                )));
            }
            written.insert(*key);
        }

        previous = Some(name);
    }

    Ok(())
}
