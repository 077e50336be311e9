//! L2-regularised logistic regression fitted by penalised IRLS
//!
//! Minimises `sum_i s_i * logloss_i + ||w||^2 / (2C)` with class weights
//! `s_i`. The intercept is not penalised. Each iteration solves the Newton
//! system with a Cholesky factorisation and halves the step until the
//! objective decreases.

use anyhow::Result;
use faer::prelude::*;
use faer::{Mat, Side};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{check_features, Classifier, ModelKind, TrainingSet};

const MAX_STEP_HALVINGS: usize = 30;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// `log(1 + exp(z))` without overflow
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iter: usize,
    pub tol: f64,
    coefficients: Option<Vec<f64>>,
    intercept: f64,
    n_iter: usize,
    class_weights: Option<(f64, f64)>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 0.1,
            max_iter: 2000,
            tol: 1e-8,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
            class_weights: None,
        }
    }
}

impl LogisticRegression {
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Newton iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn objective(&self, eta: &[f64], y: &[f64], s: &[f64], beta: &[f64], p: usize) -> f64 {
        let data: f64 = eta
            .iter()
            .zip(y)
            .zip(s)
            .map(|((e, t), w)| w * (softplus(*e) - t * e))
            .sum();
        let penalty: f64 = beta[..p].iter().map(|b| b * b).sum::<f64>() / (2.0 * self.c);
        data + penalty
    }
}

/// Linear predictor for every row, with the intercept stored last in `beta`
fn linear_predictor(x: &Mat<f64>, beta: &[f64]) -> Vec<f64> {
    let p = x.ncols();
    (0..x.nrows())
        .map(|i| beta[p] + (0..p).map(|j| x[(i, j)] * beta[j]).sum::<f64>())
        .collect()
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::LogisticRegression
    }

    fn fit(&mut self, data: &TrainingSet<'_>, _rng: &mut dyn RngCore) -> Result<()> {
        data.require_both_classes()?;
        if self.c <= 0.0 {
            anyhow::bail!("C must be positive, got {}", self.c);
        }

        let n = data.n_samples();
        let p = data.n_features();
        let x = data.x;
        let y: Vec<f64> = (0..n).map(|i| data.target(i)).collect();
        let s: Vec<f64> = (0..n).map(|i| data.sample_weight(i)).collect();
        let design = Mat::from_fn(n, p + 1, |i, j| if j < p { x[(i, j)] } else { 1.0 });

        let mut beta = vec![0.0; p + 1];
        let mut eta = linear_predictor(x, &beta);
        let mut loss = self.objective(&eta, &y, &s, &beta, p);
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let prob: Vec<f64> = eta.iter().map(|&e| sigmoid(e)).collect();
            let curvature: Vec<f64> = prob
                .iter()
                .zip(&s)
                .map(|(q, w)| (w * q * (1.0 - q)).max(1e-12))
                .collect();

            let mut gradient = Mat::<f64>::zeros(p + 1, 1);
            for i in 0..n {
                let r = s[i] * (prob[i] - y[i]);
                for j in 0..=p {
                    gradient[(j, 0)] += design[(i, j)] * r;
                }
            }
            for j in 0..p {
                gradient[(j, 0)] += beta[j] / self.c;
            }

            let weighted = Mat::from_fn(n, p + 1, |i, j| design[(i, j)] * curvature[i]);
            let mut hessian = design.transpose() * &weighted;
            for j in 0..p {
                hessian[(j, j)] += 1.0 / self.c;
            }

            let llt = hessian
                .cholesky(Side::Lower)
                .map_err(|e| anyhow::anyhow!("Newton system is not positive definite: {:?}", e))?;
            let delta = llt.solve(&gradient);

            let mut step = 1.0;
            let mut improvement = None;
            for _ in 0..MAX_STEP_HALVINGS {
                let candidate: Vec<f64> = (0..=p).map(|j| beta[j] - step * delta[(j, 0)]).collect();
                let candidate_eta = linear_predictor(x, &candidate);
                let candidate_loss = self.objective(&candidate_eta, &y, &s, &candidate, p);
                if candidate_loss <= loss {
                    improvement = Some(loss - candidate_loss);
                    beta = candidate;
                    eta = candidate_eta;
                    loss = candidate_loss;
                    break;
                }
                step *= 0.5;
            }

            let Some(improvement) = improvement else {
                log::debug!("logistic regression: no descent step at iter {}", iterations);
                break;
            };
            log::debug!(
                "logistic regression iter {}: objective {:.6} (step {})",
                iterations,
                loss,
                step
            );

            let max_delta = (0..=p)
                .map(|j| (step * delta[(j, 0)]).abs())
                .fold(0.0, f64::max);
            if max_delta < self.tol || improvement <= self.tol * loss.abs().max(1.0) {
                break;
            }
        }

        self.intercept = beta[p];
        beta.truncate(p);
        self.coefficients = Some(beta);
        self.n_iter = iterations;
        self.class_weights = Some((data.class_weights.pass, data.class_weights.fail));
        Ok(())
    }

    fn predict_proba(&self, x: &Mat<f64>) -> Result<Vec<f64>> {
        let coefficients = self.coefficients.as_deref();
        check_features(self.kind(), coefficients.map(|c| c.len()), x)?;
        let mut beta = coefficients.map(|c| c.to_vec()).unwrap_or_default();
        beta.push(self.intercept);
        Ok(linear_predictor(x, &beta).into_iter().map(sigmoid).collect())
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        self.coefficients
            .as_ref()
            .map(|c| c.iter().map(|v| v.abs()).collect())
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "C": self.c,
            "penalty": "l2",
            "max_iter": self.max_iter,
            "tol": self.tol,
            "solver": "irls",
            "class_weight": self.class_weights.map(|(pass, fail)| json!({"-1": pass, "1": fail})),
        })
    }
}
