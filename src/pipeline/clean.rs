//! Raw listing table -> modeling table
//!
//! The cleaning function is deterministic: the same raw bytes always
//! produce the same modeling table, column for column. Output columns are
//! laid out as scalar features in raw-selection order, the reconstructed
//! bathroom count, the label, the missingness flags, then the one-hot
//! indicator columns.

use std::collections::BTreeSet;

use polars::prelude::*;
use tracing::{debug, info};

use super::features::FeatureMatrix;
use super::fields::{
    numeric_with_text_fallback, parse_currency, parse_flag, parse_number, percent_to_fraction,
    present,
};
use super::label::{derive_label, validate_binary_label, LABEL, LABEL_SOURCE};
use super::loader::require_columns;
use super::missing::{columns_with_missing, impute_median, missing_indicator};
use crate::error::{PipelineError, Result};

/// Raw columns the transform reads. Any other raw column is ignored.
pub const RAW_COLUMNS: [&str; 16] = [
    "review_scores_rating",
    "host_response_time",
    "host_response_rate",
    "host_acceptance_rate",
    "host_identity_verified",
    "host_listings_count",
    "room_type",
    "accommodates",
    "bedrooms",
    "bathrooms",
    "bathrooms_text",
    "price",
    "instant_bookable",
    "minimum_nights",
    "maximum_nights",
    "number_of_reviews_ltm",
];

/// Bathroom count rebuilt from `bathrooms` with a `bathrooms_text` fallback
pub const BATHROOMS: &str = "clean_bathrooms";

/// Categorical columns and the prefix of their indicator columns
pub const CATEGORICAL_COLUMNS: [(&str, &str); 3] = [
    ("host_response_time", "response_time"),
    ("room_type", "room"),
    ("instant_bookable", "bookable"),
];

/// Numeric features that get a `_missing` flag and a median fill, in flag order.
pub const MEDIAN_IMPUTED: [&str; 10] = [
    "price",
    "host_acceptance_rate",
    "host_response_rate",
    "bedrooms",
    "host_listings_count",
    BATHROOMS,
    "accommodates",
    "minimum_nights",
    "maximum_nights",
    "number_of_reviews_ltm",
];

/// Flag-valued feature; missing values are flagged then filled with 0.
const VERIFIED: &str = "host_identity_verified";

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Percent,
    Currency,
    Number,
    Flag,
}

/// Scalar features in raw-selection order.
const SCALAR_FIELDS: [(&str, FieldKind); 10] = [
    ("host_response_rate", FieldKind::Percent),
    ("host_acceptance_rate", FieldKind::Percent),
    ("host_identity_verified", FieldKind::Flag),
    ("host_listings_count", FieldKind::Number),
    ("accommodates", FieldKind::Number),
    ("bedrooms", FieldKind::Number),
    ("price", FieldKind::Currency),
    ("minimum_nights", FieldKind::Number),
    ("maximum_nights", FieldKind::Number),
    ("number_of_reviews_ltm", FieldKind::Number),
];

/// Suffix of the missingness indicator columns
pub const MISSING_SUFFIX: &str = "_missing";

fn parse_field(kind: FieldKind, value: Option<&str>) -> Option<f64> {
    match kind {
        FieldKind::Percent => percent_to_fraction(value),
        FieldKind::Currency => parse_currency(value),
        FieldKind::Number => parse_number(value),
        FieldKind::Flag => parse_flag(value).map(|b| if b { 1.0 } else { 0.0 }),
    }
}

/// A raw column as owned text cells.
fn text_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    let values = col
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    Ok(values)
}

/// Cells of `values` at the row positions in `keep`.
fn select_rows<'a>(values: &'a [Option<String>], keep: &[usize]) -> Vec<Option<&'a str>> {
    keep.iter().map(|&i| values[i].as_deref()).collect()
}

/// Expand a categorical column into 0/1 indicator columns.
///
/// Levels are sorted, the first level is dropped as the reference, and a
/// `<prefix>_nan` indicator for missing values is always emitted.
pub fn one_hot(values: &[Option<&str>], prefix: &str) -> Vec<Column> {
    let cells: Vec<Option<&str>> = values.iter().map(|v| present(*v)).collect();
    let levels: BTreeSet<&str> = cells.iter().flatten().copied().collect();

    let mut columns: Vec<Column> = levels
        .iter()
        .skip(1)
        .map(|level| {
            let indicator: Vec<i32> = cells
                .iter()
                .map(|cell| i32::from(*cell == Some(*level)))
                .collect();
            Column::new(format!("{}_{}", prefix, level).into(), indicator)
        })
        .collect();

    let missing: Vec<i32> = cells.iter().map(|cell| i32::from(cell.is_none())).collect();
    columns.push(Column::new(format!("{}_nan", prefix).into(), missing));
    columns
}

fn values_of<'a>(parsed: &'a [(&str, Vec<Option<f64>>)], name: &str) -> &'a [Option<f64>] {
    parsed
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| v.as_slice())
        .unwrap_or(&[])
}

/// Turn the raw record set into the modeling table.
pub fn clean_listings(raw: &DataFrame) -> Result<DataFrame> {
    require_columns(raw, &RAW_COLUMNS)?;

    // Rows without a rating cannot be labeled and are dropped first
    let ratings: Vec<Option<f64>> = text_column(raw, LABEL_SOURCE)?
        .iter()
        .map(|v| parse_number(v.as_deref()))
        .collect();
    let keep: Vec<usize> = ratings
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.map(|_| i))
        .collect();
    info!(
        rows = raw.height(),
        kept = keep.len(),
        dropped = raw.height() - keep.len(),
        "filtered rows without {}",
        LABEL_SOURCE
    );

    if keep.is_empty() {
        return Err(PipelineError::computation(format!(
            "no row has a usable '{}'; nothing to label",
            LABEL_SOURCE
        )));
    }

    let labels: Vec<i32> = keep
        .iter()
        .filter_map(|&i| ratings[i])
        .map(derive_label)
        .collect();

    // Parse the scalar features on the surviving rows
    let mut parsed: Vec<(&str, Vec<Option<f64>>)> = Vec::with_capacity(SCALAR_FIELDS.len() + 1);
    for (name, kind) in SCALAR_FIELDS {
        let text = text_column(raw, name)?;
        let values = select_rows(&text, &keep)
            .into_iter()
            .map(|v| parse_field(kind, v))
            .collect();
        parsed.push((name, values));
    }

    let bathrooms = text_column(raw, "bathrooms")?;
    let bathrooms_text = text_column(raw, "bathrooms_text")?;
    let clean_bathrooms: Vec<Option<f64>> = keep
        .iter()
        .map(|&i| numeric_with_text_fallback(bathrooms[i].as_deref(), bathrooms_text[i].as_deref()))
        .collect();
    parsed.push((BATHROOMS, clean_bathrooms));

    // Flags are taken before any fill so missingness survives imputation
    let mut flag_order: Vec<&str> = MEDIAN_IMPUTED[..5].to_vec();
    flag_order.push(VERIFIED);
    flag_order.extend_from_slice(&MEDIAN_IMPUTED[5..]);

    let flags: Vec<Column> = flag_order
        .iter()
        .map(|name| {
            Column::new(
                format!("{}{}", name, MISSING_SUFFIX).into(),
                missing_indicator(values_of(&parsed, name)),
            )
        })
        .collect();

    let mut columns: Vec<Column> = Vec::new();
    for (name, values) in &parsed {
        let column = if *name == VERIFIED {
            let filled: Vec<i32> = values
                .iter()
                .map(|v| i32::from(v.unwrap_or(0.0) > 0.5))
                .collect();
            Column::new((*name).into(), filled)
        } else {
            Column::new((*name).into(), impute_median(values, name)?)
        };
        columns.push(column);
    }
    columns.push(Column::new(LABEL.into(), labels));
    columns.extend(flags);

    for (name, prefix) in CATEGORICAL_COLUMNS {
        let text = text_column(raw, name)?;
        columns.extend(one_hot(&select_rows(&text, &keep), prefix));
    }

    let df = DataFrame::new(columns)?;
    validate_modeling_table(&df)?;
    debug!(columns = df.width(), rows = df.height(), "modeling table built");
    Ok(df)
}

/// Check the modeling table invariants.
///
/// Every column must be numeric with no missing value, the label must be
/// binary, and at least one feature column must remain.
pub fn validate_modeling_table(df: &DataFrame) -> Result<()> {
    let gaps = columns_with_missing(df);
    if !gaps.is_empty() {
        return Err(PipelineError::contract(format!(
            "modeling table has missing values in: {}",
            gaps.join(", ")
        )));
    }

    validate_binary_label(df, LABEL)?;

    if df.get_column_names().iter().any(|n| n.as_str() == LABEL_SOURCE) {
        return Err(PipelineError::contract(format!(
            "modeling table still carries '{}', which leaks the label",
            LABEL_SOURCE
        )));
    }

    let features = FeatureMatrix::all_except(df, LABEL)?;
    if features.n_features() == 0 {
        return Err(PipelineError::contract("modeling table has no feature columns"));
    }
    Ok(())
}
