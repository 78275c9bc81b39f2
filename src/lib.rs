//! stayscore: checkpointed training and batch scoring for listing ratings
//!
//! A run is a fixed sequence of stages (ingest, transform, publish-cleaned,
//! train, batch-score). Every artifact one stage hands to another goes
//! through an object store, so any run can be resumed from the last
//! checkpoint that made it to storage.

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod storage;
pub mod utils;

pub use error::{PipelineError, Result, StorageError};
