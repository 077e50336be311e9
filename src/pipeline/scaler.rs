//! Standard scaler (z-score normalization) for feature matrices
//!
//! `z = (x - mean) / std`, with the population standard deviation of the
//! training matrix. Constant features get a unit scale so they pass through
//! centred instead of dividing by zero.

use anyhow::Result;
use faer::Mat;
use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineError;

/// Fitted per-feature mean and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub n_features: usize,
    pub n_samples_seen: usize,
}

impl StandardScaler {
    /// Fit on the columns of `x`
    pub fn fit(x: &Mat<f64>) -> Result<Self> {
        let (rows, cols) = (x.nrows(), x.ncols());
        if rows == 0 {
            anyhow::bail!("Cannot fit StandardScaler on empty data");
        }

        let mut mean = vec![0.0; cols];
        let mut scale = vec![1.0; cols];
        for j in 0..cols {
            let m = (0..rows).map(|i| x[(i, j)]).sum::<f64>() / rows as f64;
            let var = (0..rows).map(|i| (x[(i, j)] - m).powi(2)).sum::<f64>() / rows as f64;
            let std = var.sqrt();
            mean[j] = m;
            scale[j] = if std == 0.0 || !std.is_finite() { 1.0 } else { std };
        }

        Ok(Self {
            mean,
            scale,
            n_features: cols,
            n_samples_seen: rows,
        })
    }

    fn check_width(&self, x: &Mat<f64>) -> Result<(), PipelineError> {
        if x.ncols() != self.n_features {
            return Err(PipelineError::FeatureMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }
        Ok(())
    }

    pub fn transform(&self, x: &Mat<f64>) -> Result<Mat<f64>> {
        self.check_width(x)?;
        Ok(Mat::from_fn(x.nrows(), x.ncols(), |i, j| {
            (x[(i, j)] - self.mean[j]) / self.scale[j]
        }))
    }

    /// Map standardized values back to original units
    pub fn inverse_transform(&self, x: &Mat<f64>) -> Result<Mat<f64>> {
        self.check_width(x)?;
        Ok(Mat::from_fn(x.nrows(), x.ncols(), |i, j| {
            x[(i, j)] * self.scale[j] + self.mean[j]
        }))
    }

    /// Original-unit value of a single standardized entry of feature `j`
    pub fn inverse_value(&self, j: usize, z: f64) -> f64 {
        z * self.scale[j] + self.mean[j]
    }
}
