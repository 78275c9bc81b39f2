//! Missing value analysis, indicator flags and median imputation

use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Fraction of null cells per column, sorted descending.
pub fn analyze_missing_values(df: &DataFrame) -> Result<Vec<(String, f64)>> {
    // Handle empty DataFrame
    if df.height() == 0 {
        return Ok(Vec::new());
    }

    let rows = df.height() as f64;
    let mut missing_ratios: Vec<(String, f64)> = df
        .get_columns()
        .iter()
        .map(|col| (col.name().to_string(), col.null_count() as f64 / rows))
        .collect();

    // Sort by missing ratio descending
    missing_ratios.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    Ok(missing_ratios)
}

/// Columns holding at least one null.
pub fn columns_with_missing(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| col.null_count() > 0)
        .map(|col| col.name().to_string())
        .collect()
}

/// 0/1 indicator of which values are missing. Must be taken before imputation.
pub fn missing_indicator(values: &[Option<f64>]) -> Vec<i32> {
    values.iter().map(|v| i32::from(v.is_none())).collect()
}

/// Median of the observed values, `None` if nothing was observed.
///
/// Even-length inputs average the two middle values.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut observed: Vec<f64> = values.iter().flatten().copied().collect();
    if observed.is_empty() {
        return None;
    }
    observed.sort_by(|a, b| a.total_cmp(b));

    let mid = observed.len() / 2;
    if observed.len() % 2 == 0 {
        Some((observed[mid - 1] + observed[mid]) / 2.0)
    } else {
        Some(observed[mid])
    }
}

/// Fill missing values with the column median.
///
/// A column with no observed values has no median, which is reported
/// against `column` rather than silently filled.
pub fn impute_median(values: &[Option<f64>], column: &str) -> Result<Vec<f64>> {
    let fill = median(values).ok_or_else(|| {
        PipelineError::computation(format!(
            "column '{}' has no observed values after label filtering; cannot impute a median",
            column
        ))
    })?;
    Ok(values.iter().map(|v| v.unwrap_or(fill)).collect())
}
