//! Holdout evaluation: per-class precision/recall and ROC-AUC

use polars::prelude::*;

use crate::error::{PipelineError, Result};

/// Tie tolerance when ranking probabilities
const TIE_EPSILON: f64 = 1e-10;

/// One `(class, metric, value)` row of the long-format performance report.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetric {
    pub class: i32,
    pub metric: &'static str,
    pub value: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Precision and recall for both classes, class 0 first.
///
/// A class that is never predicted (or never present) scores 0.0 rather
/// than dividing by zero.
pub fn class_metrics(actual: &[i32], predicted: &[i32]) -> Result<Vec<ClassMetric>> {
    if actual.len() != predicted.len() {
        return Err(PipelineError::contract(format!(
            "{} actual labels but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }

    let mut rows = Vec::with_capacity(4);
    for class in [0, 1] {
        let true_pos = actual
            .iter()
            .zip(predicted)
            .filter(|(&a, &p)| a == class && p == class)
            .count();
        let predicted_pos = predicted.iter().filter(|&&p| p == class).count();
        let actual_pos = actual.iter().filter(|&&a| a == class).count();

        rows.push(ClassMetric {
            class,
            metric: "precision",
            value: ratio(true_pos, predicted_pos),
        });
        rows.push(ClassMetric {
            class,
            metric: "recall",
            value: ratio(true_pos, actual_pos),
        });
    }
    Ok(rows)
}

/// Long-format table with columns `class`, `metric`, `value`.
pub fn performance_frame(metrics: &[ClassMetric]) -> Result<DataFrame> {
    let df = DataFrame::new(vec![
        Column::new(
            "class".into(),
            metrics.iter().map(|m| m.class).collect::<Vec<i32>>(),
        ),
        Column::new(
            "metric".into(),
            metrics.iter().map(|m| m.metric).collect::<Vec<&str>>(),
        ),
        Column::new(
            "value".into(),
            metrics.iter().map(|m| m.value).collect::<Vec<f64>>(),
        ),
    ])?;
    Ok(df)
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores share the average of their ranks. Both classes must be
/// present; otherwise the curve is undefined.
pub fn roc_auc(actual: &[i32], probabilities: &[f64]) -> Result<f64> {
    if actual.len() != probabilities.len() {
        return Err(PipelineError::contract(format!(
            "{} actual labels but {} probabilities",
            actual.len(),
            probabilities.len()
        )));
    }

    let total_pos = actual.iter().filter(|&&y| y == 1).count() as f64;
    let total_neg = actual.len() as f64 - total_pos;
    if total_pos == 0.0 || total_neg == 0.0 {
        return Err(PipelineError::computation(
            "ROC-AUC is undefined when the holdout contains a single class",
        ));
    }

    let mut sorted_pairs: Vec<(f64, i32)> = probabilities
        .iter()
        .copied()
        .zip(actual.iter().copied())
        .collect();
    sorted_pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = sorted_pairs.len();
    let mut rank_sum_pos = 0.0;
    let mut i = 0;
    while i < n {
        let current_value = sorted_pairs[i].0;
        let mut j = i;
        while j < n && (sorted_pairs[j].0 - current_value).abs() < TIE_EPSILON {
            j += 1;
        }

        // Ranks are 1-based; the group spans ranks i+1..=j
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        let group_pos = sorted_pairs[i..j].iter().filter(|(_, y)| *y == 1).count();
        rank_sum_pos += avg_rank * group_pos as f64;

        i = j;
    }

    let u = rank_sum_pos - total_pos * (total_pos + 1.0) / 2.0;
    Ok(u / (total_pos * total_neg))
}

/// Single-row `metric`, `value` table holding the AUC.
pub fn roc_auc_frame(auc: f64) -> Result<DataFrame> {
    let df = df! {
        "metric" => ["roc_auc"],
        "value" => [auc],
    }?;
    Ok(df)
}

/// Per-row prediction records: `actual`, `predicted`, `probability`.
pub fn predictions_frame(actual: &[i32], predicted: &[i32], probabilities: &[f64]) -> Result<DataFrame> {
    if actual.len() != predicted.len() || actual.len() != probabilities.len() {
        return Err(PipelineError::contract(format!(
            "prediction columns disagree in length: {} actual, {} predicted, {} probabilities",
            actual.len(),
            predicted.len(),
            probabilities.len()
        )));
    }
    let df = df! {
        "actual" => actual,
        "predicted" => predicted,
        "probability" => probabilities,
    }?;
    Ok(df)
}
