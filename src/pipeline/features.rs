//! Column-major numeric feature matrix

use polars::prelude::*;

use super::loader::column_names;
use crate::error::{PipelineError, Result};

/// Feature values pulled out of a frame in a fixed column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    /// One vector per feature, all of length `rows`
    pub columns: Vec<Vec<f64>>,
    pub rows: usize,
}

impl FeatureMatrix {
    /// Extract `names` from `df` in the given order.
    ///
    /// Every column must be numeric or boolean with no null or non-finite
    /// value; the first offending column is named in the error.
    pub fn from_frame(df: &DataFrame, names: &[String]) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());

        for name in names {
            let col = df.column(name).map_err(|_| {
                PipelineError::contract(format!("feature column '{}' not found", name))
            })?;

            let dtype = col.dtype();
            if !dtype.is_primitive_numeric() && dtype != &DataType::Boolean {
                return Err(PipelineError::contract(format!(
                    "feature column '{}' must be numeric or boolean, found {}",
                    name, dtype
                )));
            }

            if col.null_count() > 0 {
                return Err(PipelineError::contract(format!(
                    "feature column '{}' contains {} missing value(s)",
                    name,
                    col.null_count()
                )));
            }

            let values: Vec<f64> = col
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();

            if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                return Err(PipelineError::contract(format!(
                    "feature column '{}' has a non-finite value at row {}",
                    name, row
                )));
            }

            columns.push(values);
        }

        Ok(Self {
            names: names.to_vec(),
            columns,
            rows: df.height(),
        })
    }

    /// Every column of `df` except `exclude`, in frame order.
    pub fn all_except(df: &DataFrame, exclude: &str) -> Result<Self> {
        let names: Vec<String> = column_names(df)
            .into_iter()
            .filter(|name| name != exclude)
            .collect();
        Self::from_frame(df, &names)
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// A new matrix holding only `rows`, in the order given.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| rows.iter().map(|&r| col[r]).collect())
                .collect(),
            rows: rows.len(),
        }
    }

    /// Values of one row, in feature order.
    pub fn row(&self, idx: usize) -> Vec<f64> {
        self.columns.iter().map(|col| col[idx]).collect()
    }
}
