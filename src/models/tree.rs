//! Histogram-binned decision trees shared by the forest and boosting models
//!
//! Feature values are mapped once per fit onto at most [`MAX_BINS`] quantile
//! bins. Split search then walks per-node histograms instead of sorting, and a
//! split on bin `b` of feature `f` sends a row left when its value is at most
//! the bin's upper threshold.

use faer::Mat;
use rand::seq::index::sample as sample_indices;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on bins per feature (candidate thresholds are one fewer)
pub const MAX_BINS: usize = 64;

const MIN_GAIN: f64 = 1e-12;

/// Quantile-binned view of a training matrix
#[derive(Debug, Clone)]
pub struct BinnedMatrix {
    n_rows: usize,
    /// Ascending split thresholds per feature
    thresholds: Vec<Vec<f64>>,
    /// Bin code per feature, per row
    codes: Vec<Vec<u8>>,
}

impl BinnedMatrix {
    pub fn from_matrix(x: &Mat<f64>) -> Self {
        let n_rows = x.nrows();
        let mut thresholds = Vec::with_capacity(x.ncols());
        let mut codes = Vec::with_capacity(x.ncols());

        for j in 0..x.ncols() {
            let column: Vec<f64> = (0..n_rows).map(|i| x[(i, j)]).collect();
            let cuts = candidate_thresholds(&column);
            let column_codes = column
                .iter()
                .map(|v| cuts.partition_point(|t| t < v) as u8)
                .collect();
            thresholds.push(cuts);
            codes.push(column_codes);
        }

        Self {
            n_rows,
            thresholds,
            codes,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_features(&self) -> usize {
        self.thresholds.len()
    }

    fn n_bins(&self, feature: usize) -> usize {
        self.thresholds[feature].len() + 1
    }
}

/// Split thresholds for one feature column.
///
/// Columns with few distinct values split at midpoints between neighbours;
/// wider columns split at evenly spaced quantiles.
fn candidate_thresholds(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() <= 1 {
        return Vec::new();
    }

    let mut cuts: Vec<f64> = if distinct.len() <= MAX_BINS {
        distinct.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect()
    } else {
        let n = sorted.len();
        (1..MAX_BINS).map(|k| sorted[k * n / MAX_BINS]).collect()
    };
    cuts.dedup();

    // A cut at the maximum would send every row left
    let max = distinct[distinct.len() - 1];
    cuts.retain(|c| *c < max);
    cuts
}

/// Impurity measure used to score splits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Weighted Gini impurity over a 0/1 target
    Gini,
    /// Weighted squared error over a continuous target
    SquaredError,
}

impl Criterion {
    /// Node cost from the weighted target sum and total weight. Only
    /// differences between costs are meaningful.
    fn node_cost(&self, sum: f64, weight: f64) -> f64 {
        if weight <= 0.0 {
            return 0.0;
        }
        match self {
            Criterion::Gini => 2.0 * sum * (weight - sum) / weight,
            Criterion::SquaredError => -sum * sum / weight,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Features considered per split; all when `None`
    pub max_features: Option<usize>,
    pub criterion: Criterion,
}

/// Per-row target values and weights for tree growing
pub struct NodeTargets<'a> {
    pub value: &'a [f64],
    pub weight: &'a [f64],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A fitted tree stored as a flat node array rooted at index 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<Node>,
}

impl DecisionTree {
    /// Leaf value reached by row `row` of `x`
    pub fn predict_row(&self, x: &Mat<f64>, row: usize) -> f64 {
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
                    idx = if x[(row, *feature)] <= *threshold {
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
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }
}

struct SplitCandidate {
    feature: usize,
    bin: usize,
    gain: f64,
}

struct TreeBuilder<'a, R: Rng + ?Sized> {
    binned: &'a BinnedMatrix,
    targets: &'a NodeTargets<'a>,
    params: &'a TreeParams,
    leaf_value: &'a dyn Fn(&[usize]) -> f64,
    rng: &'a mut R,
    nodes: Vec<Node>,
    importance: Vec<f64>,
}

impl<R: Rng + ?Sized> TreeBuilder<'_, R> {
    fn build(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: 0.0 });

        match self.best_split(&samples, depth) {
            None => {
                self.nodes[idx] = Node::Leaf {
                    value: (self.leaf_value)(&samples),
                };
            }
            Some(split) => {
                self.importance[split.feature] += split.gain;
                let codes = &self.binned.codes[split.feature];
                let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = samples
                    .into_iter()
                    .partition(|&i| codes[i] as usize <= split.bin);
                let threshold = self.binned.thresholds[split.feature][split.bin];

                let left = self.build(left_rows, depth + 1);
                let right = self.build(right_rows, depth + 1);
                self.nodes[idx] = Node::Split {
                    feature: split.feature,
                    threshold,
                    left,
                    right,
                };
            }
        }

        idx
    }

    fn best_split(&mut self, samples: &[usize], depth: usize) -> Option<SplitCandidate> {
        let min_leaf = self.params.min_samples_leaf.max(1);
        if depth >= self.params.max_depth || samples.len() < 2 * min_leaf {
            return None;
        }

        let (mut total_sum, mut total_weight) = (0.0, 0.0);
        for &i in samples {
            total_sum += self.targets.weight[i] * self.targets.value[i];
            total_weight += self.targets.weight[i];
        }
        let criterion = self.params.criterion;
        let parent_cost = criterion.node_cost(total_sum, total_weight);
        if criterion == Criterion::Gini && parent_cost <= MIN_GAIN {
            return None;
        }

        let n_features = self.binned.n_features();
        let features: Vec<usize> = match self.params.max_features {
            Some(k) if k < n_features => sample_indices(&mut *self.rng, n_features, k.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        };

        let mut best: Option<SplitCandidate> = None;
        for feature in features {
            let n_bins = self.binned.n_bins(feature);
            if n_bins < 2 {
                continue;
            }

            let codes = &self.binned.codes[feature];
            let mut sums = vec![0.0; n_bins];
            let mut weights = vec![0.0; n_bins];
            let mut counts = vec![0usize; n_bins];
            for &i in samples {
                let b = codes[i] as usize;
                let w = self.targets.weight[i];
                sums[b] += w * self.targets.value[i];
                weights[b] += w;
                counts[b] += 1;
            }

            let (mut left_sum, mut left_weight, mut left_count) = (0.0, 0.0, 0usize);
            for b in 0..n_bins - 1 {
                left_sum += sums[b];
                left_weight += weights[b];
                left_count += counts[b];
                let right_count = samples.len() - left_count;
                if left_count < min_leaf || right_count < min_leaf {
                    continue;
                }
                if counts[b] == 0 && b > 0 {
                    // Same partition as the previous bin
                    continue;
                }

                let gain = parent_cost
                    - criterion.node_cost(left_sum, left_weight)
                    - criterion.node_cost(total_sum - left_sum, total_weight - left_weight);
                if gain > MIN_GAIN && best.as_ref().map_or(true, |s| gain > s.gain) {
                    best = Some(SplitCandidate { feature, bin: b, gain });
                }
            }
        }

        best
    }
}

/// Grow a tree over `samples` (row indices into `binned`).
///
/// Returns the tree and the unnormalised impurity decrease credited to each
/// feature.
pub fn grow_tree<R: Rng + ?Sized>(
    binned: &BinnedMatrix,
    samples: Vec<usize>,
    targets: &NodeTargets<'_>,
    params: &TreeParams,
    leaf_value: &dyn Fn(&[usize]) -> f64,
    rng: &mut R,
) -> (DecisionTree, Vec<f64>) {
    let mut builder = TreeBuilder {
        binned,
        targets,
        params,
        leaf_value,
        rng,
        nodes: Vec::new(),
        importance: vec![0.0; binned.n_features()],
    };
    builder.build(samples, 0);

    (
        DecisionTree {
            nodes: builder.nodes,
        },
        builder.importance,
    )
}

/// Scale values to sum to one; all-zero input is left unchanged
pub fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}
