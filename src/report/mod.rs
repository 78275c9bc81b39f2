//! Report module - summarizing runs

pub mod summary;

pub use summary::*;
