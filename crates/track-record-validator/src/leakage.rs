//! Adversarial leakage check
//!
//! Trains a shallow decision tree to tell two feature sets apart. If it can
//! (held-out accuracy at or above the threshold) something other than chance
//! separates them, typically a temporal signal leaking across a split.

use analysis_core::{AnalysisError, AnalysisResult};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeakageConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub n_folds: usize,
    /// Accuracy at or above this flags leakage
    pub accuracy_threshold: f64,
    /// Minimum rows per feature set
    pub min_samples_per_set: usize,
    /// Fixed seed for the fold shuffle
    pub seed: u64,
}

impl Default for LeakageConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            min_samples_leaf: 2,
            n_folds: 5,
            accuracy_threshold: 0.55,
            min_samples_per_set: 5,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageCheck {
    pub passes: bool,
    /// Cross-validated accuracy of the adversarial classifier
    pub accuracy: f64,
    pub n_samples: usize,
}

/// Check whether `features_a` and `features_b` are distinguishable.
///
/// Every row must have the same, non-zero number of finite features.
/// Too few rows to cross-validate passes with chance accuracy.
pub fn check_leakage(
    features_a: &[Vec<f64>],
    features_b: &[Vec<f64>],
    config: &LeakageConfig,
) -> AnalysisResult<LeakageCheck> {
    let n_features = features_a
        .first()
        .or_else(|| features_b.first())
        .map(|row| row.len())
        .unwrap_or(0);

    for row in features_a.iter().chain(features_b) {
        if row.len() != n_features || n_features == 0 {
            return Err(AnalysisError::InvalidData(format!(
                "feature rows must share a non-zero width (expected {}, got {})",
                n_features,
                row.len()
            )));
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidData(
                "feature rows contain non-finite values".to_string(),
            ));
        }
    }

    let n_samples = features_a.len() + features_b.len();
    let min_rows = config.min_samples_per_set.max(config.n_folds);
    if features_a.len() < min_rows || features_b.len() < min_rows {
        warn!(
            a = features_a.len(),
            b = features_b.len(),
            "Too few samples for adversarial validation, passing at chance"
        );
        return Ok(LeakageCheck {
            passes: true,
            accuracy: 0.5,
            n_samples,
        });
    }

    let x: Vec<&[f64]> = features_a
        .iter()
        .chain(features_b)
        .map(|row| row.as_slice())
        .collect();
    let y: Vec<u8> = std::iter::repeat(0u8)
        .take(features_a.len())
        .chain(std::iter::repeat(1u8).take(features_b.len()))
        .collect();

    let mut order: Vec<usize> = (0..n_samples).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    order.shuffle(&mut rng);

    let n_folds = config.n_folds.max(2);
    let mut correct = 0usize;
    for fold in 0..n_folds {
        let mut train = Vec::with_capacity(n_samples);
        let mut test = Vec::with_capacity(n_samples / n_folds + 1);
        for (pos, &idx) in order.iter().enumerate() {
            if pos % n_folds == fold {
                test.push(idx);
            } else {
                train.push(idx);
            }
        }

        let tree = DecisionTree::fit(&x, &y, &train, config);
        correct += test.iter().filter(|&&i| tree.predict(x[i]) == y[i]).count();
    }

    let accuracy = correct as f64 / n_samples as f64;
    debug!(accuracy, n_samples, "Adversarial validation complete");

    Ok(LeakageCheck {
        passes: accuracy < config.accuracy_threshold,
        accuracy,
        n_samples,
    })
}

/// Gini-impurity classification tree over two classes.
#[derive(Debug)]
enum TreeNode {
    Leaf {
        class: u8,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

#[derive(Debug)]
struct DecisionTree {
    root: TreeNode,
}

impl DecisionTree {
    fn fit(x: &[&[f64]], y: &[u8], indices: &[usize], config: &LeakageConfig) -> Self {
        Self {
            root: build_node(x, y, indices, 0, config),
        }
    }

    fn predict(&self, row: &[f64]) -> u8 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { class } => return *class,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn class_counts(y: &[u8], indices: &[usize]) -> (usize, usize) {
    let ones = indices.iter().filter(|&&i| y[i] == 1).count();
    (indices.len() - ones, ones)
}

fn gini(zeros: usize, ones: usize) -> f64 {
    let n = (zeros + ones) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let p0 = zeros as f64 / n;
    let p1 = ones as f64 / n;
    1.0 - p0 * p0 - p1 * p1
}

fn build_node(
    x: &[&[f64]],
    y: &[u8],
    indices: &[usize],
    depth: usize,
    config: &LeakageConfig,
) -> TreeNode {
    let (zeros, ones) = class_counts(y, indices);
    let majority = if ones > zeros { 1 } else { 0 };

    if depth >= config.max_depth
        || zeros == 0
        || ones == 0
        || indices.len() < 2 * config.min_samples_leaf
    {
        return TreeNode::Leaf { class: majority };
    }

    let parent_impurity = gini(zeros, ones);
    let n = indices.len() as f64;
    let n_features = x[indices[0]].len();

    let mut best: Option<(usize, f64, f64)> = None;
    for feature in 0..n_features {
        let mut sorted = indices.to_vec();
        sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let (mut left_zeros, mut left_ones) = (0usize, 0usize);
        for pos in 0..sorted.len() - 1 {
            if y[sorted[pos]] == 1 {
                left_ones += 1;
            } else {
                left_zeros += 1;
            }
            let left_n = pos + 1;
            let right_n = sorted.len() - left_n;
            let here = x[sorted[pos]][feature];
            let next = x[sorted[pos + 1]][feature];
            if left_n < config.min_samples_leaf
                || right_n < config.min_samples_leaf
                || here == next
            {
                continue;
            }

            let weighted = (left_n as f64 * gini(left_zeros, left_ones)
                + right_n as f64 * gini(zeros - left_zeros, ones - left_ones))
                / n;
            let gain = parent_impurity - weighted;
            if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                best = Some((feature, (here + next) / 2.0, gain));
            }
        }
    }

    match best {
        Some((feature, threshold, _)) => {
            let (left, right): (Vec<usize>, Vec<usize>) = indices
                .iter()
                .partition(|&&i| x[i][feature] <= threshold);
            TreeNode::Split {
                feature,
                threshold,
                left: Box::new(build_node(x, y, &left, depth + 1, config)),
                right: Box::new(build_node(x, y, &right, depth + 1, config)),
            }
        }
        None => TreeNode::Leaf { class: majority },
    }
}
