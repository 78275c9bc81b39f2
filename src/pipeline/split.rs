//! Stratified, seeded train/holdout split

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::error::{PipelineError, Result};

/// Fraction of rows withheld for evaluation
pub const HOLDOUT_FRACTION: f64 = 0.2;

/// Seed shared by the split and the estimator
pub const RANDOM_SEED: u64 = 42;

/// Disjoint row positions of the two partitions, each in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub holdout: Vec<usize>,
}

/// Split row positions into train and holdout, stratified on `labels`.
///
/// The holdout size is `ceil(n * fraction)`. Each class contributes
/// `floor(n_class * fraction)` rows, and leftover holdout slots go to the
/// classes with the largest fractional remainder (ties to the lower class).
/// Rows are drawn from a per-class shuffle driven by `seed`, so the same
/// labels always yield the same partition.
pub fn stratified_split(labels: &[i32], fraction: f64, seed: u64) -> Result<Partition> {
    let n = labels.len();
    if !(0.0..1.0).contains(&fraction) || fraction == 0.0 {
        return Err(PipelineError::computation(format!(
            "holdout fraction must be in (0, 1), got {}",
            fraction
        )));
    }

    let mut classes: Vec<i32> = labels.to_vec();
    classes.sort_unstable();
    classes.dedup();

    let members: Vec<Vec<usize>> = classes
        .iter()
        .map(|&c| (0..n).filter(|&i| labels[i] == c).collect())
        .collect();

    if let Some((class, rows)) = classes
        .iter()
        .zip(&members)
        .find(|(_, rows)| rows.len() < 2)
    {
        return Err(PipelineError::computation(format!(
            "cannot stratify on label: class {} has only {} row(s), at least 2 are required",
            class,
            rows.len()
        )));
    }

    // Guard against products like 0.2 * n landing a hair above an integer
    let n_holdout = (n as f64 * fraction - 1e-9).ceil() as usize;
    let n_train = n - n_holdout;
    if n_holdout < classes.len() || n_train < classes.len() {
        return Err(PipelineError::computation(format!(
            "cannot stratify {} rows into {} train / {} holdout rows across {} classes",
            n,
            n_train,
            n_holdout,
            classes.len()
        )));
    }

    let ideal: Vec<f64> = members
        .iter()
        .map(|rows| rows.len() as f64 * n_holdout as f64 / n as f64)
        .collect();
    let mut per_class: Vec<usize> = ideal.iter().map(|x| x.floor() as usize).collect();

    let mut order: Vec<usize> = (0..classes.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = ideal[a] - ideal[a].floor();
        let rb = ideal[b] - ideal[b].floor();
        rb.total_cmp(&ra).then(a.cmp(&b))
    });
    let mut remaining = n_holdout - per_class.iter().sum::<usize>();
    for &c in order.iter().cycle() {
        if remaining == 0 {
            break;
        }
        // Leave every class at least one training row
        if per_class[c] + 1 < members[c].len() {
            per_class[c] += 1;
            remaining -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut holdout = Vec::with_capacity(n_holdout);
    let mut train = Vec::with_capacity(n_train);

    for (rows, &take) in members.iter().zip(&per_class) {
        let mut shuffled = rows.clone();
        shuffled.shuffle(&mut rng);
        holdout.extend_from_slice(&shuffled[..take]);
        train.extend_from_slice(&shuffled[take..]);
    }

    holdout.sort_unstable();
    train.sort_unstable();
    Ok(Partition { train, holdout })
}
