use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::types::NUM_OUTCOMES;

/// Hyperparameters for the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Features considered per split (sqrt of the feature count by default)
    pub max_features: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_features: 1,
            min_samples_split: 2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    /// Class distribution indexed by outcome code
    Leaf { distribution: [f64; NUM_OUTCOMES] },
}

impl Node {
    fn leaf(counts: [usize; NUM_OUTCOMES]) -> Self {
        let total: usize = counts.iter().sum();
        let distribution = counts.map(|c| c as f64 / total.max(1) as f64);
        Node::Leaf { distribution }
    }

    fn predict(&self, features: &[f64]) -> &[f64; NUM_OUTCOMES] {
        match self {
            Node::Leaf { distribution } => distribution,
            Node::Split { feature, threshold, left, right } => {
                let value = features.get(*feature).copied().unwrap_or(0.0);
                if value <= *threshold {
                    left.predict(features)
                } else {
                    right.predict(features)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            Node::Leaf { .. } => 1,
            Node::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    fn is_consistent(&self, n_features: usize) -> bool {
        match self {
            Node::Leaf { distribution } => {
                let sum: f64 = distribution.iter().sum();
                distribution.iter().all(|p| p.is_finite() && *p >= 0.0) && (sum - 1.0).abs() < 1e-6
            }
            Node::Split { feature, threshold, left, right } => {
                *feature < n_features
                    && threshold.is_finite()
                    && left.is_consistent(n_features)
                    && right.is_consistent(n_features)
            }
        }
    }
}

/// Bagged ensemble of Gini decision trees.
///
/// Each tree is grown to purity on a bootstrap sample; class probabilities
/// are the mean of the leaf distributions reached by every tree. Leaves
/// store distributions over all outcome codes, so the output order never
/// depends on which classes happened to appear in training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Node>,
    n_features: usize,
    n_classes: usize,
}

impl RandomForest {
    /// Fit a forest. `features` is n x k, `labels` holds outcome codes.
    /// Callers must not pass an empty set.
    pub fn fit(features: &Array2<f64>, labels: &Array1<usize>, params: &ForestParams) -> Self {
        let n = features.nrows();
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_trees.max(1))
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                grow(features, labels, &sample, params, &mut rng)
            })
            .collect();

        Self {
            trees,
            n_features: features.ncols(),
            n_classes: NUM_OUTCOMES,
        }
    }

    pub fn predict_proba(&self, features: &[f64]) -> [f64; NUM_OUTCOMES] {
        let mut sum = [0.0; NUM_OUTCOMES];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict(features)) {
                *acc += p;
            }
        }

        let total: f64 = sum.iter().sum();
        if total > 0.0 {
            sum.map(|s| s / total)
        } else {
            [1.0 / NUM_OUTCOMES as f64; NUM_OUTCOMES]
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(Node::depth).max().unwrap_or(0)
    }

    /// Structural check used when loading an externally stored forest.
    pub fn validate(&self, expected_features: usize) -> Result<(), String> {
        if self.n_classes != NUM_OUTCOMES {
            return Err(format!("expected {} classes, found {}", NUM_OUTCOMES, self.n_classes));
        }
        if self.n_features != expected_features {
            return Err(format!(
                "expected {} features, found {}",
                expected_features, self.n_features
            ));
        }
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        if !self.trees.iter().all(|t| t.is_consistent(self.n_features)) {
            return Err("malformed tree".to_string());
        }
        Ok(())
    }
}

fn class_counts(labels: &Array1<usize>, sample: &[usize]) -> [usize; NUM_OUTCOMES] {
    let mut counts = [0usize; NUM_OUTCOMES];
    for &i in sample {
        if let Some(c) = counts.get_mut(labels[i]) {
            *c += 1;
        }
    }
    counts
}

fn gini(counts: &[usize; NUM_OUTCOMES]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

fn grow(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    sample: &[usize],
    params: &ForestParams,
    rng: &mut StdRng,
) -> Node {
    let counts = class_counts(labels, sample);
    let is_pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
    if is_pure || sample.len() < params.min_samples_split {
        return Node::leaf(counts);
    }

    let mut order: Vec<usize> = (0..features.ncols()).collect();
    order.shuffle(rng);

    // Constant features don't count towards max_features
    let mut best: Option<(usize, f64, f64)> = None;
    let mut evaluated = 0;
    for feature in order {
        if evaluated >= params.max_features.max(1) {
            break;
        }
        if let Some((threshold, impurity)) = best_split(features, labels, sample, feature) {
            evaluated += 1;
            if best.map_or(true, |(_, _, b)| impurity < b) {
                best = Some((feature, threshold, impurity));
            }
        }
    }

    let Some((feature, threshold, _)) = best else {
        return Node::leaf(counts);
    };

    let (left, right): (Vec<usize>, Vec<usize>) = sample
        .iter()
        .copied()
        .partition(|&i| features[[i, feature]] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(features, labels, &left, params, rng)),
        right: Box::new(grow(features, labels, &right, params, rng)),
    }
}

/// Best threshold on one feature by weighted Gini impurity, or `None`
/// when the feature is constant over the sample.
fn best_split(
    features: &Array2<f64>,
    labels: &Array1<usize>,
    sample: &[usize],
    feature: usize,
) -> Option<(f64, f64)> {
    let mut values: Vec<f64> = sample.iter().map(|&i| features[[i, feature]]).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup();
    if values.len() < 2 {
        return None;
    }

    let n = sample.len() as f64;
    let mut best: Option<(f64, f64)> = None;
    for pair in values.windows(2) {
        let threshold = (pair[0] + pair[1]) / 2.0;
        let mut left = [0usize; NUM_OUTCOMES];
        let mut right = [0usize; NUM_OUTCOMES];
        for &i in sample {
            let counts = if features[[i, feature]] <= threshold { &mut left } else { &mut right };
            if let Some(c) = counts.get_mut(labels[i]) {
                *c += 1;
            }
        }
        let n_left = left.iter().sum::<usize>() as f64;
        let n_right = right.iter().sum::<usize>() as f64;
        let impurity = (n_left * gini(&left) + n_right * gini(&right)) / n;
        if best.map_or(true, |(_, b)| impurity < b) {
            best = Some((threshold, impurity));
        }
    }
    best
}
