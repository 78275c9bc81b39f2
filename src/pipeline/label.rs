//! Binary label derivation and validation
//!
//! The label is derived by thresholding a continuous rating. Once the label
//! exists the rating is removed, so it can never leak into the features.

use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Continuous column the label is derived from
pub const LABEL_SOURCE: &str = "review_scores_rating";

/// Binary target column of the modeling table
pub const LABEL: &str = "high_rating";

/// Ratings at or above this value are labeled 1
pub const LABEL_THRESHOLD: f64 = 4.5;

/// Tolerance for floating point comparison when checking binary 0/1 values
const TOLERANCE: f64 = 1e-9;

/// Threshold a rating into the binary label.
pub fn derive_label(rating: f64) -> i32 {
    i32::from(rating >= LABEL_THRESHOLD)
}

/// Validate that the label column exists, has no nulls, and is binary 0/1.
///
/// Handles labels that round-tripped through CSV as integers or floats.
pub fn validate_binary_label(df: &DataFrame, label: &str) -> Result<()> {
    let label_col = df
        .column(label)
        .map_err(|_| PipelineError::contract(format!("label column '{}' not found", label)))?;

    if label_col.len() == 0 {
        return Err(PipelineError::contract(format!("label column '{}' is empty", label)));
    }

    if label_col.null_count() > 0 {
        return Err(PipelineError::contract(format!(
            "label column '{}' contains {} null value(s)",
            label,
            label_col.null_count()
        )));
    }

    if !label_col.dtype().is_primitive_numeric() && label_col.dtype() != &DataType::Boolean {
        return Err(PipelineError::contract(format!(
            "label column '{}' must be numeric, found {}",
            label,
            label_col.dtype()
        )));
    }

    // Cast to Float64 first to handle both integer and float types uniformly
    let float_col = label_col.cast(&DataType::Float64)?;
    let unique = float_col.unique()?;
    let unique_values: Vec<f64> = unique.f64()?.into_iter().flatten().collect();

    let valid = unique_values
        .iter()
        .all(|&v| v.abs() < TOLERANCE || (v - 1.0).abs() < TOLERANCE);

    if !valid {
        return Err(PipelineError::contract(format!(
            "label column '{}' must be binary (0/1). Found {} unique values: {:?}",
            label,
            unique_values.len(),
            unique_values
        )));
    }

    Ok(())
}

/// Extract a validated binary label column as integers.
pub fn label_values(df: &DataFrame, label: &str) -> Result<Vec<i32>> {
    validate_binary_label(df, label)?;
    let values = df
        .column(label)?
        .cast(&DataType::Float64)?
        .f64()?
        .into_iter()
        .map(|v| i32::from(v.unwrap_or(0.0) > 0.5))
        .collect();
    Ok(values)
}

/// Count of `(negatives, positives)`.
pub fn class_counts(labels: &[i32]) -> (usize, usize) {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    (labels.len() - positives, positives)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_label_threshold() {
        assert_eq!(derive_label(4.6), 1);
        assert_eq!(derive_label(4.5), 1);
        assert_eq!(derive_label(4.4), 0);
        assert_eq!(derive_label(0.0), 0);
    }

    #[test]
    fn test_validate_binary_int_label() {
        let df = df! { "high_rating" => [0i64, 1, 1, 0] }.unwrap();
        assert!(validate_binary_label(&df, LABEL).is_ok());
        assert_eq!(label_values(&df, LABEL).unwrap(), vec![0, 1, 1, 0]);
    }

    #[test]
    fn test_validate_binary_float_label() {
        let df = df! { "high_rating" => [0.0f64, 1.0, 1.0] }.unwrap();
        assert_eq!(label_values(&df, LABEL).unwrap(), vec![0, 1, 1]);
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let df = df! { "high_rating" => [0i32, 1, 2] }.unwrap();
        let err = validate_binary_label(&df, LABEL).unwrap_err();
        assert!(matches!(err, PipelineError::DataContract(_)));
        assert!(err.to_string().contains("binary"));
    }

    #[test]
    fn test_null_label_rejected() {
        let df = df! { "high_rating" => [Some(0i32), None, Some(1)] }.unwrap();
        assert!(validate_binary_label(&df, LABEL)
            .unwrap_err()
            .to_string()
            .contains("null"));
    }

    #[test]
    fn test_missing_label_rejected() {
        let df = df! { "price" => [1.0f64] }.unwrap();
        assert!(validate_binary_label(&df, LABEL)
            .unwrap_err()
            .to_string()
            .contains("not found"));
    }

    #[test]
    fn test_class_counts() {
        assert_eq!(class_counts(&[0, 1, 1, 0, 1]), (2, 3));
    }
}
