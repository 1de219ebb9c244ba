//! Random forest regression
//!
//! Each tree is a CART regression tree grown on a bootstrap sample of the
//! training rows, splitting on the threshold that maximizes the reduction in
//! squared error. Predictions average the trees. Trees are fitted in
//! parallel with rayon; each tree owns an RNG seeded from the base seed and
//! its index, so a fitted forest does not depend on the thread count.

use super::{check_training_input, check_width, Regressor};
use crate::error::ModelError;
use ndarray::{ArrayView1, ArrayView2};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Nodes whose target variance falls below this are not split further
const MIN_IMPURITY: f64 = 1e-12;

/// Splits must improve the squared-error proxy by more than this
const MIN_GAIN: f64 = 1e-12;

/// Hyperparameters for [`RandomForestRegressor`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter(
                "n_estimators must be at least 1".to_string(),
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidParameter(
                "min_samples_leaf must be at least 1".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidParameter(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if self.max_depth == Some(0) {
            return Err(ModelError::InvalidParameter(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree stored as a flat node array (root at index 0)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

impl RegressionTree {
    /// Grow a tree on the rows listed in `samples` (duplicates allowed)
    fn grow(
        x: ArrayView2<'_, f64>,
        y: &[f64],
        samples: &mut [usize],
        params: &ForestParams,
    ) -> Self {
        let mut builder = TreeBuilder {
            x: x.view(),
            y,
            params,
            nodes: Vec::new(),
        };
        builder.build(samples, 0);
        Self {
            nodes: builder.nodes,
        }
    }

    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
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

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    /// Structural check used when a tree comes from an untrusted file
    fn is_well_formed(&self, n_features: usize) -> bool {
        let len = self.nodes.len();
        len > 0
            && self.nodes.iter().enumerate().all(|(i, node)| match node {
                Node::Leaf { value } => value.is_finite(),
                // children are always pushed after their parent
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    *feature < n_features
                        && !threshold.is_nan()
                        && *left > i
                        && *right > i
                        && *left < len
                        && *right < len
                }
            })
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    x: ArrayView2<'a, f64>,
    y: &'a [f64],
    params: &'a ForestParams,
    nodes: Vec<Node>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let idx = self.nodes.len();
        let n = samples.len();
        let (sum, sum_sq) = samples.iter().fold((0.0, 0.0), |(s, q), &i| {
            (s + self.y[i], q + self.y[i] * self.y[i])
        });
        let mean = sum / n as f64;
        self.nodes.push(Node::Leaf { value: mean });

        let variance = sum_sq / n as f64 - mean * mean;
        let at_max_depth = self.params.max_depth.is_some_and(|d| depth >= d);
        if n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || at_max_depth
            || variance <= MIN_IMPURITY
        {
            return idx;
        }

        let Some(split) = self.best_split(samples, sum) else {
            return idx;
        };

        let x = self.x;
        let mid = partition(samples, |i| x[[i, split.feature]] <= split.threshold);
        let (left_samples, right_samples) = samples.split_at_mut(mid);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);

        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    /// Exhaustive search over sorted feature values.
    ///
    /// Maximizes `S_l^2/n_l + S_r^2/n_r - S^2/n`, which equals the reduction
    /// in total squared error.
    fn best_split(&self, samples: &[usize], total: f64) -> Option<BestSplit> {
        let n = samples.len();
        let min_leaf = self.params.min_samples_leaf;
        let parent_score = total * total / n as f64;
        let mut best: Option<BestSplit> = None;
        let mut ordered: Vec<(f64, f64)> = Vec::with_capacity(n);

        for feature in 0..self.x.ncols() {
            ordered.clear();
            ordered.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            for k in 0..n - 1 {
                left_sum += ordered[k].1;
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf {
                    continue;
                }
                if n_right < min_leaf {
                    break;
                }
                let (lo, hi) = (ordered[k].0, ordered[k + 1].0);
                if lo >= hi {
                    continue;
                }

                let right_sum = total - left_sum;
                let gain = left_sum * left_sum / n_left as f64
                    + right_sum * right_sum / n_right as f64
                    - parent_score;
                if gain > MIN_GAIN && best.as_ref().map_or(true, |b| gain > b.gain) {
                    let mut threshold = lo + (hi - lo) / 2.0;
                    if threshold >= hi {
                        threshold = lo;
                    }
                    best = Some(BestSplit {
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

/// Move every element satisfying `goes_left` to the front; returns the count
fn partition(samples: &mut [usize], goes_left: impl Fn(usize) -> bool) -> usize {
    let mut mid = 0;
    for i in 0..samples.len() {
        if goes_left(samples[i]) {
            samples.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

fn bootstrap_sample(n_samples: usize, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = Uniform::from(0..n_samples);
    (0..n_samples).map(|_| dist.sample(&mut rng)).collect()
}

/// Bagged ensemble of regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    n_features: Option<usize>,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            n_features: None,
            trees: Vec::new(),
        }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    /// Returns false if the forest claims to be fitted but its trees are
    /// inconsistent with its declared width
    pub fn is_consistent(&self) -> bool {
        match self.n_features {
            None => self.trees.is_empty(),
            Some(width) => {
                !self.trees.is_empty() && self.trees.iter().all(|t| t.is_well_formed(width))
            }
        }
    }
}

impl Default for RandomForestRegressor {
    fn default() -> Self {
        Self::new(ForestParams::default())
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[f64]) -> Result<(), ModelError> {
        check_training_input(x, y)?;
        self.params.validate()?;

        let n = x.nrows();
        let params = &self.params;
        let trees: Vec<RegressionTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|i| {
                let mut samples = bootstrap_sample(n, params.seed.wrapping_add(i as u64));
                RegressionTree::grow(x, y, &mut samples, params)
            })
            .collect();

        self.trees = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, ModelError> {
        check_width(self.n_features, x)?;
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }

        let n_trees = self.trees.len() as f64;
        Ok(x.outer_iter()
            .map(|row| self.trees.iter().map(|t| t.predict_row(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}
