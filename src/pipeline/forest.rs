//! Random forest classifier for binary labels
//!
//! Trees are grown on bootstrap resamples. A resample is represented as
//! per-row draw counts, so every impurity calculation works on
//! `(value, target, weight)` tuples where the weight is the draw count.
//! Each node considers a random subset of `max_features` features and
//! splits at the midpoint between adjacent distinct values.
//!
//! Trees are fitted in parallel; tree `i` draws from its own RNG seeded
//! with `seed + i`, so the fitted forest does not depend on thread
//! scheduling.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::features::FeatureMatrix;
use super::split::RANDOM_SEED;
use crate::error::{PipelineError, Result};

/// Probability above which a row is predicted positive
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Values closer than this are treated as equal when placing thresholds
const VALUE_EPSILON: f64 = 1e-10;

/// Hyperparameters of the ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    /// Features drawn per split; `None` uses `floor(sqrt(n_features))`
    pub max_features: Option<usize>,
    pub min_samples_split: usize,
    /// `None` grows trees until leaves are pure
    pub max_depth: Option<usize>,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_features: None,
            min_samples_split: 2,
            max_depth: None,
            seed: RANDOM_SEED,
        }
    }
}

impl ForestParams {
    /// Number of candidate features per split for a matrix of `n_features`.
    pub fn features_per_split(&self, n_features: usize) -> usize {
        let k = self
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().floor() as usize);
        k.clamp(1, n_features.max(1))
    }
}

/// A tree node. Children are indices into [`DecisionTree::nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        positive_fraction: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    /// Root is at index 0
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Probability of the positive class for one row.
    ///
    /// Values `<=` the threshold go left.
    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { positive_fraction } => return *positive_fraction,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
            }
        }
        walk(&self.nodes, 0)
    }

    fn check(&self, n_features: usize) -> std::result::Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        ));
                    }
                    // Children are always appended after their parent
                    if *left <= idx || *right <= idx || *left >= self.nodes.len() || *right >= self.nodes.len() {
                        return Err(format!("node {} has out-of-range children", idx));
                    }
                }
                Node::Leaf { positive_fraction } => {
                    if !(0.0..=1.0).contains(positive_fraction) {
                        return Err(format!("leaf {} has probability {}", idx, positive_fraction));
                    }
                }
            }
        }
        Ok(())
    }
}

/// A fitted forest together with the feature order it was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub feature_names: Vec<String>,
    pub params: ForestParams,
    pub trees: Vec<DecisionTree>,
    /// Mean decrease in impurity, normalized to sum to 1
    pub feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fit a forest on `x` against binary `y`.
    ///
    /// `progress`, when given, is advanced once per finished tree.
    pub fn fit(
        x: &FeatureMatrix,
        y: &[i32],
        params: &ForestParams,
        progress: Option<&ProgressBar>,
    ) -> Result<Self> {
        if x.rows != y.len() {
            return Err(PipelineError::contract(format!(
                "feature matrix has {} rows but label has {}",
                x.rows,
                y.len()
            )));
        }
        if x.rows == 0 {
            return Err(PipelineError::computation("cannot fit a forest on zero rows"));
        }
        if x.n_features() == 0 {
            return Err(PipelineError::computation("cannot fit a forest without features"));
        }
        if params.n_estimators == 0 {
            return Err(PipelineError::computation("n_estimators must be at least 1"));
        }
        if let Some(bad) = y.iter().find(|&&v| v != 0 && v != 1) {
            return Err(PipelineError::contract(format!(
                "label must be binary (0/1), found {}",
                bad
            )));
        }
        let positives = y.iter().filter(|&&v| v == 1).count();
        if positives == 0 || positives == y.len() {
            return Err(PipelineError::computation(
                "training labels contain a single class",
            ));
        }

        let finished = AtomicU64::new(0);
        let fitted: Vec<(DecisionTree, Vec<f64>)> = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let seed = params.seed.wrapping_add(i as u64);
                let fitted = TreeBuilder::new(x, y, params, seed).build();
                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(pb) = progress {
                    pb.set_position(done);
                }
                fitted
            })
            .collect();

        let mut importances = vec![0.0; x.n_features()];
        let mut contributing = 0usize;
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, tree_importance) in fitted {
            // Stumps with a lone root carry no split information
            if tree.nodes.len() > 1 {
                let total: f64 = tree_importance.iter().sum();
                if total > 0.0 {
                    for (acc, v) in importances.iter_mut().zip(&tree_importance) {
                        *acc += v / total;
                    }
                    contributing += 1;
                }
            }
            trees.push(tree);
        }
        if contributing > 0 {
            let total: f64 = importances.iter().sum();
            for v in &mut importances {
                *v /= total;
            }
        }

        Ok(Self {
            feature_names: x.names.clone(),
            params: params.clone(),
            trees,
            feature_importances: importances,
        })
    }

    /// Reject a feature list that differs from the training order.
    pub fn check_feature_order(&self, names: &[String]) -> Result<()> {
        if names == self.feature_names.as_slice() {
            return Ok(());
        }
        if names.len() != self.feature_names.len() {
            return Err(PipelineError::contract(format!(
                "model expects {} features but got {}",
                self.feature_names.len(),
                names.len()
            )));
        }
        match self
            .feature_names
            .iter()
            .zip(names)
            .position(|(expected, found)| expected != found)
        {
            Some(pos) => Err(PipelineError::contract(format!(
                "feature order differs from training at position {}: expected '{}', found '{}'",
                pos, self.feature_names[pos], names[pos]
            ))),
            None => Ok(()),
        }
    }

    /// Positive-class probability per row, the mean over all trees.
    pub fn predict_proba(&self, x: &FeatureMatrix) -> Result<Vec<f64>> {
        self.check_feature_order(&x.names)?;
        let n_trees = self.trees.len() as f64;
        let probabilities = (0..x.rows)
            .into_par_iter()
            .map(|idx| {
                let row = x.row(idx);
                self.trees.iter().map(|t| t.predict_row(&row)).sum::<f64>() / n_trees
            })
            .collect();
        Ok(probabilities)
    }

    /// Hard 0/1 predictions at [`DECISION_THRESHOLD`].
    pub fn predict(&self, x: &FeatureMatrix) -> Result<Vec<i32>> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| i32::from(p > DECISION_THRESHOLD))
            .collect())
    }

    /// `(feature, importance)` pairs sorted by importance, descending.
    pub fn ranked_importances(&self) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self
            .feature_names
            .iter()
            .cloned()
            .zip(self.feature_importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Load a serialized forest and check it is internally consistent.
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        let n_features = self.feature_names.len();
        if n_features == 0 {
            return Err(PipelineError::contract("model artifact lists no features"));
        }
        if self.trees.is_empty() {
            return Err(PipelineError::contract("model artifact contains no trees"));
        }
        if self.feature_importances.len() != n_features {
            return Err(PipelineError::contract(format!(
                "model artifact has {} importances for {} features",
                self.feature_importances.len(),
                n_features
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(n_features).map_err(|msg| {
                PipelineError::contract(format!("model artifact tree {}: {}", i, msg))
            })?;
        }
        Ok(())
    }
}

/// Best split found for one node.
struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree from a bootstrap resample.
struct TreeBuilder<'a> {
    x: &'a FeatureMatrix,
    y: &'a [i32],
    /// Bootstrap draw count per row
    weights: Vec<f64>,
    params: &'a ForestParams,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    total_weight: f64,
}

impl<'a> TreeBuilder<'a> {
    fn new(x: &'a FeatureMatrix, y: &'a [i32], params: &'a ForestParams, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut weights = vec![0.0; x.rows];
        for _ in 0..x.rows {
            weights[rng.gen_range(0..x.rows)] += 1.0;
        }
        Self {
            x,
            y,
            weights,
            params,
            rng,
            nodes: Vec::new(),
            importances: vec![0.0; x.n_features()],
            total_weight: x.rows as f64,
        }
    }

    fn build(mut self) -> (DecisionTree, Vec<f64>) {
        let root: Vec<usize> = (0..self.x.rows).filter(|&i| self.weights[i] > 0.0).collect();
        self.nodes.push(Node::Leaf {
            positive_fraction: 0.0,
        });

        // Explicit stack: unlimited depth must not overflow the thread stack
        let mut pending = vec![(0usize, root, 0usize)];
        while let Some((node_idx, rows, depth)) = pending.pop() {
            let (events, non_events) = self.class_weights(&rows);
            let node_weight = events + non_events;
            let positive_fraction = if node_weight > 0.0 {
                events / node_weight
            } else {
                0.0
            };

            let can_split = rows.len() >= self.params.min_samples_split
                && events > 0.0
                && non_events > 0.0
                && self.params.max_depth.map_or(true, |max| depth < max);

            let candidate = if can_split {
                self.best_split(&rows, events, non_events)
            } else {
                None
            };

            match candidate {
                Some(c) => {
                    self.importances[c.feature] += node_weight / self.total_weight * c.gain;
                    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
                        .iter()
                        .partition(|&&r| self.x.columns[c.feature][r] <= c.threshold);

                    let left = self.nodes.len();
                    let right = left + 1;
                    self.nodes.push(Node::Leaf {
                        positive_fraction: 0.0,
                    });
                    self.nodes.push(Node::Leaf {
                        positive_fraction: 0.0,
                    });
                    self.nodes[node_idx] = Node::Split {
                        feature: c.feature,
                        threshold: c.threshold,
                        left,
                        right,
                    };
                    pending.push((right, right_rows, depth + 1));
                    pending.push((left, left_rows, depth + 1));
                }
                None => {
                    self.nodes[node_idx] = Node::Leaf { positive_fraction };
                }
            }
        }

        (DecisionTree { nodes: self.nodes }, self.importances)
    }

    fn class_weights(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(e, n), &r| {
            if self.y[r] == 1 {
                (e + self.weights[r], n)
            } else {
                (e, n + self.weights[r])
            }
        })
    }

    /// Search a random feature subset for the largest Gini reduction.
    ///
    /// Features that are constant within the node do not count toward the
    /// subset size, so the search draws further features until it has seen
    /// `max_features` usable ones or run out.
    fn best_split(&mut self, rows: &[usize], events: f64, non_events: f64) -> Option<Candidate> {
        let n_features = self.x.n_features();
        let wanted = self.params.features_per_split(n_features);

        let mut order: Vec<usize> = (0..n_features).collect();
        order.shuffle(&mut self.rng);

        let parent_gini = gini_impurity(events, non_events);
        let mut best: Option<Candidate> = None;
        let mut visited = 0;

        for feature in order {
            if visited >= wanted {
                break;
            }
            let column = &self.x.columns[feature];
            let mut sorted_pairs: Vec<(f64, i32, f64)> = rows
                .iter()
                .map(|&r| (column[r], self.y[r], self.weights[r]))
                .collect();
            sorted_pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let (lo, hi) = (sorted_pairs[0].0, sorted_pairs[sorted_pairs.len() - 1].0);
            if (hi - lo).abs() < VALUE_EPSILON {
                continue;
            }
            visited += 1;

            if let Some((idx, gain)) = find_best_split(&sorted_pairs, parent_gini, events, non_events) {
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    let (a, b) = (sorted_pairs[idx].0, sorted_pairs[idx + 1].0);
                    let mut threshold = (a + b) / 2.0;
                    // Midpoint can round up to the right value
                    if threshold >= b {
                        threshold = a;
                    }
                    best = Some(Candidate {
                        feature,
                        threshold,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Gini impurity for binary classification: 2p(1-p).
fn gini_impurity(events: f64, non_events: f64) -> f64 {
    let total = events + non_events;
    if total == 0.0 {
        return 0.0;
    }
    let p = events / total;
    2.0 * p * (1.0 - p)
}

/// Split position maximizing the weighted Gini reduction.
///
/// `sorted_pairs` holds `(value, target, weight)` sorted by value. Returns
/// the index of the last row on the left side and the gain, or `None` if no
/// split between distinct values reduces impurity.
fn find_best_split(
    sorted_pairs: &[(f64, i32, f64)],
    parent_gini: f64,
    total_events: f64,
    total_non_events: f64,
) -> Option<(usize, f64)> {
    let n = sorted_pairs.len();
    let total_weight = total_events + total_non_events;

    let mut best_gain = 0.0;
    let mut best_split_idx = None;
    let mut left_events = 0.0f64;
    let mut left_non_events = 0.0f64;

    for i in 0..n - 1 {
        let (value, target, weight) = sorted_pairs[i];
        if target == 1 {
            left_events += weight;
        } else {
            left_non_events += weight;
        }

        if (value - sorted_pairs[i + 1].0).abs() < VALUE_EPSILON {
            continue;
        }

        let right_events = total_events - left_events;
        let right_non_events = total_non_events - left_non_events;
        let left_prop = (left_events + left_non_events) / total_weight;
        let right_prop = (right_events + right_non_events) / total_weight;

        let weighted_gini = left_prop * gini_impurity(left_events, left_non_events)
            + right_prop * gini_impurity(right_events, right_non_events);
        let gain = parent_gini - weighted_gini;

        if gain > best_gain + 1e-12 {
            best_gain = gain;
            best_split_idx = Some(i);
        }
    }

    best_split_idx.map(|idx| (idx, best_gain))
}
