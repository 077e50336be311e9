//! Random forest of class-weighted Gini trees

use anyhow::{Context, Result};
use faer::Mat;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::tree::{grow_tree, normalize, BinnedMatrix, Criterion, DecisionTree, NodeTargets, TreeParams};
use super::{check_features, Classifier, ModelKind, TrainingSet};

fn default_jobs() -> usize {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub bootstrap: bool,
    /// Worker threads used while fitting; not part of the fitted model
    #[serde(skip, default = "default_jobs")]
    pub jobs: usize,
    trees: Vec<DecisionTree>,
    importances: Option<Vec<f64>>,
    n_features: Option<usize>,
    class_weights: Option<(f64, f64)>,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 8,
            min_samples_leaf: 10,
            bootstrap: true,
            jobs: default_jobs(),
            trees: Vec::new(),
            importances: None,
            n_features: None,
            class_weights: None,
        }
    }
}

impl RandomForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, data: &TrainingSet<'_>, rng: &mut dyn RngCore) -> Result<()> {
        data.require_both_classes()?;
        let n = data.n_samples();
        let p = data.n_features();

        let binned = BinnedMatrix::from_matrix(data.x);
        let value: Vec<f64> = (0..n).map(|i| data.target(i)).collect();
        let class_weight: Vec<f64> = (0..n).map(|i| data.sample_weight(i)).collect();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            max_features: Some(((p as f64).sqrt() as usize).max(1)),
            criterion: Criterion::Gini,
        };

        // Seeds are fixed before any tree is grown so results do not depend on `jobs`
        let seeds: Vec<u64> = (0..self.n_estimators).map(|_| rng.next_u64()).collect();
        let bootstrap = self.bootstrap;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs.max(1))
            .build()
            .context("Failed to build worker pool for random forest")?;

        let grown: Vec<(DecisionTree, Vec<f64>)> = pool.install(|| {
            seeds
                .par_iter()
                .map(|&seed| {
                    let mut tree_rng = StdRng::seed_from_u64(seed);
                    let mut weight = class_weight.clone();
                    let samples: Vec<usize> = if bootstrap {
                        let mut counts = vec![0usize; n];
                        for _ in 0..n {
                            counts[tree_rng.gen_range(0..n)] += 1;
                        }
                        for (w, c) in weight.iter_mut().zip(&counts) {
                            *w *= *c as f64;
                        }
                        (0..n).filter(|&i| counts[i] > 0).collect()
                    } else {
                        (0..n).collect()
                    };

                    let targets = NodeTargets {
                        value: &value,
                        weight: &weight,
                    };
                    let leaf = |rows: &[usize]| {
                        let total: f64 = rows.iter().map(|&i| weight[i]).sum();
                        let fail: f64 = rows.iter().map(|&i| weight[i] * value[i]).sum();
                        if total > 0.0 {
                            fail / total
                        } else {
                            0.0
                        }
                    };
                    grow_tree(&binned, samples, &targets, &params, &leaf, &mut tree_rng)
                })
                .collect()
        });

        let mut importances = vec![0.0; p];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, mut gains) in grown {
            normalize(&mut gains);
            for (total, g) in importances.iter_mut().zip(&gains) {
                *total += g;
            }
            trees.push(tree);
        }
        normalize(&mut importances);

        log::debug!(
            "random forest: {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len().max(1) as f64
        );

        self.trees = trees;
        self.importances = Some(importances);
        self.n_features = Some(p);
        self.class_weights = Some((data.class_weights.pass, data.class_weights.fail));
        Ok(())
    }

    fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        check_features(self.kind(), self.n_features, x)?;
        let n_trees = self.trees.len().max(1) as f64;
        Ok((0..x.nrows())
            .map(|i| self.trees.iter().map(|t| t.predict_row(x, i)).sum::<f64>() / n_trees)
            .collect())
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.importances.clone()
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "n_estimators": self.n_estimators,
            "max_depth": self.max_depth,
            "min_samples_leaf": self.min_samples_leaf,
            "max_features": "sqrt",
            "bootstrap": self.bootstrap,
            "criterion": "gini",
            "class_weight": self.class_weights.map(|(pass, fail)| json!({"-1": pass, "1": fail})),
            "n_jobs": self.jobs,
        })
    }
}
