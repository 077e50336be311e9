//! Gradient boosted regression trees on the binomial log-loss
//!
//! Each stage fits a squared-error tree to the residuals `y - p` of a row
//! subsample, then replaces every leaf with the Newton step
//! `sum(r) / sum(p * (1 - p))` over the rows that reached it.

use anyhow::Result;
use faer::Mat;
use rand::seq::index::sample as sample_indices;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::tree::{grow_tree, normalize, BinnedMatrix, Criterion, DecisionTree, NodeTargets, TreeParams};
use super::{check_features, Classifier, ModelKind, TrainingSet};

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub subsample: f64,
    /// Initial log-odds of failure
    init: f64,
    trees: Vec<DecisionTree>,
    importances: Option<Vec<f64>>,
    n_features: Option<usize>,
}

impl Default for GradientBoosting {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            learning_rate: 0.05,
            max_depth: 4,
            min_samples_leaf: 10,
            subsample: 0.8,
            init: 0.0,
            trees: Vec::new(),
            importances: None,
            n_features: None,
        }
    }
}

impl GradientBoosting {
    fn decision_function(&self, x: &Mat<f64>, row: usize) -> f64 {
        self.init
            + self
                .trees
                .iter()
                .map(|t| self.learning_rate * t.predict_row(x, row))
                .sum::<f64>()
    }
}

impl Classifier for GradientBoosting {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn fit(&mut self, data: &TrainingSet<'_>, rng: &mut dyn RngCore) -> Result<()> {
        data.require_both_classes()?;
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            anyhow::bail!("subsample must be in (0, 1], got {}", self.subsample);
        }

        let n = data.n_samples();
        let p = data.n_features();
        let binned = BinnedMatrix::from_matrix(data.x);
        let y: Vec<f64> = (0..n).map(|i| data.target(i)).collect();
        let unit_weight = vec![1.0; n];

        let prior = y.iter().sum::<f64>() / n as f64;
        let init = (prior / (1.0 - prior)).ln();
        let mut raw = vec![init; n];

        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            max_features: None,
            criterion: Criterion::SquaredError,
        };
        let in_bag = ((self.subsample * n as f64) as usize).clamp(1, n);

        let mut trees = Vec::with_capacity(self.n_estimators);
        let mut importances = vec![0.0; p];

        for stage in 0..self.n_estimators {
            let prob: Vec<f64> = raw.iter().map(|&f| sigmoid(f)).collect();
            let residual: Vec<f64> = y.iter().zip(&prob).map(|(t, q)| t - q).collect();

            let mut samples = if in_bag < n {
                sample_indices(rng, n, in_bag).into_vec()
            } else {
                (0..n).collect()
            };
            samples.sort_unstable();

            let targets = NodeTargets {
                value: &residual,
                weight: &unit_weight,
            };
            let newton_step = |rows: &[usize]| {
                let numerator: f64 = rows.iter().map(|&i| residual[i]).sum();
                let denominator: f64 = rows.iter().map(|&i| prob[i] * (1.0 - prob[i])).sum();
                if denominator.abs() < 1e-150 {
                    0.0
                } else {
                    numerator / denominator
                }
            };

            let (tree, mut gains) = grow_tree(&binned, samples, &targets, &params, &newton_step, rng);
            for (i, f) in raw.iter_mut().enumerate() {
                *f += self.learning_rate * tree.predict_row(data.x, i);
            }

            normalize(&mut gains);
            for (total, g) in importances.iter_mut().zip(&gains) {
                *total += g;
            }
            trees.push(tree);

            if (stage + 1) % 50 == 0 {
                let loss: f64 = y
                    .iter()
                    .zip(&raw)
                    .map(|(t, f)| (1.0 + f.exp()).ln() - t * f)
                    .sum::<f64>()
                    / n as f64;
                log::debug!("gradient boosting stage {}: train log-loss {:.5}", stage + 1, loss);
            }
        }
        normalize(&mut importances);

        self.init = init;
        self.trees = trees;
        self.importances = Some(importances);
        self.n_features = Some(p);
        Ok(())
    }

    fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        check_features(self.kind(), self.n_features, x)?;
        Ok((0..x.nrows())
            .map(|i| sigmoid(self.decision_function(x, i)))
            .collect())
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.importances.clone()
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "n_estimators": self.n_estimators,
            "learning_rate": self.learning_rate,
            "max_depth": self.max_depth,
            "min_samples_leaf": self.min_samples_leaf,
            "subsample": self.subsample,
            "loss": "log_loss",
            "criterion": "friedman_mse",
        })
    }
}
