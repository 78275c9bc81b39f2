//! Pipeline module - the stages of a run and the logic they plug in

pub mod clean;
pub mod context;
pub mod features;
pub mod fields;
pub mod forest;
pub mod label;
pub mod loader;
pub mod metrics;
pub mod missing;
pub mod orchestrator;
pub mod split;
pub mod stage;
pub mod stages;
pub mod tracking;

pub use context::{PublishedArtifact, RunContext};
pub use forest::{ForestParams, RandomForest};
pub use orchestrator::{Pipeline, RunFailure, RunReport, RunState, StageRecord};
pub use stage::{HandleKey, Stage, StageEnv, StageName};
pub use stages::standard_pipeline;
pub use tracking::{JsonlRunTracker, NoopTracker, RunTracker};
