//! Distance-weighted k-nearest neighbours under the Manhattan metric

use anyhow::Result;
use faer::Mat;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_features, Classifier, ModelKind, TrainingSet, FAIL_LABEL};

/// Upper bound on the neighbourhood size
pub const MAX_NEIGHBORS: usize = 20;

/// Neighbourhood size for a training set of `n` rows: `min(floor(sqrt(n)), 20)`
pub fn neighbors_for(n: usize) -> usize {
    ((n as f64).sqrt() as usize).clamp(1, MAX_NEIGHBORS)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    /// Fixed neighbourhood size; derived from the training size when `None`
    pub n_neighbors: Option<usize>,
    k: usize,
    /// Row-major training matrix
    train_x: Vec<f64>,
    train_fail: Vec<bool>,
    n_features: Option<usize>,
}

impl KNearestNeighbors {
    pub fn k(&self) -> usize {
        self.k
    }

    fn train_row(&self, i: usize) -> &[f64] {
        let p = self.n_features.unwrap_or(0);
        &self.train_x[i * p..(i + 1) * p]
    }
}

impl Classifier for KNearestNeighbors {
    fn kind(&self) -> ModelKind {
        ModelKind::Knn
    }

    fn fit(&mut self, data: &TrainingSet<'_>, _rng: &mut dyn RngCore) -> Result<()> {
        data.require_both_classes()?;
        let n = data.n_samples();
        let p = data.n_features();

        self.k = self.n_neighbors.unwrap_or_else(|| neighbors_for(n)).min(n).max(1);
        self.train_x = (0..n)
            .flat_map(|i| (0..p).map(move |j| (i, j)))
            .map(|(i, j)| data.x[(i, j)])
            .collect();
        self.train_fail = data.y.iter().map(|&label| label == FAIL_LABEL).collect();
        self.n_features = Some(p);
        Ok(())
    }

    /// Fraction of inverse-distance weight held by failing neighbours. When
    /// any neighbour matches exactly, only exact matches vote.
    fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        check_features(self.kind(), self.n_features, x)?;
        let p = x.ncols();
        let n_train = self.train_fail.len();

        let mut out = Vec::with_capacity(x.nrows());
        for i in 0..x.nrows() {
            let mut distances: Vec<(f64, usize)> = (0..n_train)
                .map(|t| {
                    let row = self.train_row(t);
                    let d: f64 = (0..p).map(|j| (x[(i, j)] - row[j]).abs()).sum();
                    (d, t)
                })
                .collect();
            distances.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            let neighbours = &distances[..self.k.min(n_train)];

            let exact: Vec<&(f64, usize)> = neighbours.iter().filter(|(d, _)| *d == 0.0).collect();
            let (fail_weight, total_weight) = if exact.is_empty() {
                neighbours.iter().fold((0.0, 0.0), |(f, t), (d, idx)| {
                    let w = 1.0 / d;
                    (f + if self.train_fail[*idx] { w } else { 0.0 }, t + w)
                })
            } else {
                let fails = exact.iter().filter(|(_, idx)| self.train_fail[*idx]).count();
                (fails as f64, exact.len() as f64)
            };

            out.push(if total_weight > 0.0 {
                fail_weight / total_weight
            } else {
                0.0
            });
        }

        Ok(out)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "n_neighbors": self.k,
            "weights": "distance",
            "metric": "manhattan",
        })
    }
}
