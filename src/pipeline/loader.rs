//! Table I/O for pipeline artifacts
//!
//! Every artifact table is a headered CSV. Raw input is read with every
//! column as text so cleaning decides how each field is parsed; modeling
//! tables and holdout partitions are read with inferred numeric types.

use std::fs::File;
use std::path::Path;

use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Load the raw record set with every column typed as text.
pub fn load_raw_table(path: &Path) -> Result<DataFrame> {
    // A zero-row inference window makes polars type every column as String
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect()?;
    Ok(df)
}

/// Load a numeric artifact table (modeling table, holdout partition, report).
pub fn load_table(path: &Path) -> Result<DataFrame> {
    let df = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(None)
        .finish()?
        .collect()?;
    Ok(df)
}

/// Read only the header of a CSV file.
pub fn read_header(path: &Path) -> Result<Vec<String>> {
    let schema = LazyCsvReader::new(path)
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()?
        .collect_schema()?;
    Ok(schema.iter_names().map(|name| name.to_string()).collect())
}

/// Write a table as CSV, creating parent directories as needed.
pub fn save_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)?;
    Ok(())
}

/// Ensure every listed column exists, naming all that do not.
pub fn require_columns(df: &DataFrame, required: &[&str]) -> Result<()> {
    let present: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let missing: Vec<&str> = required
        .iter()
        .filter(|name| !present.iter().any(|p| p == *name))
        .copied()
        .collect();

    if !missing.is_empty() {
        return Err(PipelineError::contract(format!(
            "required column(s) missing: {}. Available columns: {:?}",
            missing.join(", "),
            present
        )));
    }
    Ok(())
}

/// Column names of a frame, in order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}
