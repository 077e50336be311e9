//! Class-conditional Gaussian imputation of missing measurements
//!
//! Each missing cell is replaced with a draw from a normal distribution
//! centred on the median of its feature within the row's class, scaled by
//! the class-conditional sample standard deviation.

use anyhow::Result;
use polars::prelude::*;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::table::{distinct_in_order, feature_columns, float_values, label_values, require_column};

/// Median and spread of the present values of one (class, feature) slice
#[derive(Debug, Clone, PartialEq)]
pub struct SliceStatistics {
    /// Median of present values, `None` when none are present
    pub median: Option<f64>,
    /// Sample standard deviation (ddof = 1), `None` with fewer than two present values
    pub std_dev: Option<f64>,
    pub present: usize,
    pub missing: usize,
}

impl SliceStatistics {
    /// Compute slice statistics. `None` and NaN entries both count as missing.
    pub fn from_values(values: impl IntoIterator<Item = Option<f64>>) -> Self {
        let mut present_values = Vec::new();
        let mut missing = 0;
        for value in values {
            match value {
                Some(v) if !v.is_nan() => present_values.push(v),
                _ => missing += 1,
            }
        }

        Self {
            std_dev: sample_std(&present_values),
            median: median(&mut present_values),
            present: present_values.len(),
            missing,
        }
    }

    /// A slice is imputable when it has missing cells and both statistics are defined
    pub fn can_impute(&self) -> bool {
        self.missing > 0 && self.median.is_some() && self.std_dev.is_some()
    }
}

/// Median of the values; the mean of the two middle values for even counts.
/// Reorders `values`.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = values.len() / 2;
    let m = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };
    (!m.is_nan()).then_some(m)
}

/// Sample standard deviation (ddof = 1). A single sample has no defined spread.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    let std = (sum_sq / (n - 1) as f64).sqrt();
    (!std.is_nan()).then_some(std)
}

/// A (class, feature) slice whose missing cells could not be filled
#[derive(Debug, Clone, PartialEq)]
pub struct UnresolvedSlice {
    pub label: i32,
    pub feature: String,
    pub missing: usize,
    pub present: usize,
}

/// Counts describing one imputation pass
#[derive(Debug, Clone, Default)]
pub struct ImputationSummary {
    /// Feature columns with at least one missing cell
    pub columns_with_missing: usize,
    /// Missing cells across those columns before imputation
    pub cells_missing: usize,
    pub cells_filled: usize,
    pub unresolved: Vec<UnresolvedSlice>,
}

impl ImputationSummary {
    /// Cells still missing after imputation (includes rows without a label)
    pub fn cells_unresolved(&self) -> usize {
        self.cells_missing - self.cells_filled
    }
}

/// Fills missing measurements with class-conditional normal draws.
///
/// The imputer holds no random state; the generator is passed to
/// [`ClassConditionalImputer::impute`] so callers control seeding.
#[derive(Debug, Clone)]
pub struct ClassConditionalImputer {
    label_column: String,
}

impl ClassConditionalImputer {
    pub fn new(label_column: impl Into<String>) -> Self {
        Self {
            label_column: label_column.into(),
        }
    }

    pub fn label_column(&self) -> &str {
        &self.label_column
    }

    /// Impute missing cells of every `feature_*` column.
    ///
    /// Classes are visited in order of first appearance and, within a class,
    /// features in table order, so a seeded generator reproduces the same
    /// output. Null and NaN cells are both missing. Columns without missing
    /// cells, and columns where no slice could be filled, come back unchanged
    /// with their original dtype; a column that received draws is written
    /// back as Float64. Slices with fewer than two present values keep their
    /// missing cells. Drawn values are not clipped.
    pub fn impute<R: Rng + ?Sized>(
        &self,
        df: &DataFrame,
        rng: &mut R,
    ) -> Result<(DataFrame, ImputationSummary)> {
        require_column(df, &self.label_column)?;
        let labels = label_values(df, &self.label_column)?;
        let classes = distinct_in_order(&labels);

        let mut summary = ImputationSummary::default();

        // Only columns with a missing cell somewhere in the table take part
        let mut targets: Vec<(String, Vec<Option<f64>>, usize)> = Vec::new();
        for name in feature_columns(df) {
            if name == self.label_column {
                continue;
            }
            let values = float_values(df, &name)?;
            let missing = values.iter().filter(|v| v.is_none()).count();
            if missing == 0 {
                continue;
            }
            summary.cells_missing += missing;
            targets.push((name, values, 0));
        }
        summary.columns_with_missing = targets.len();

        if targets.is_empty() {
            return Ok((df.clone(), summary));
        }

        for class in classes {
            let rows: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, label)| **label == Some(class))
                .map(|(idx, _)| idx)
                .collect();

            for (feature, values, filled) in targets.iter_mut() {
                let stats = SliceStatistics::from_values(rows.iter().map(|&idx| values[idx]));

                if let (true, Some(median), Some(std_dev)) =
                    (stats.can_impute(), stats.median, stats.std_dev)
                {
                    let normal = Normal::new(median, std_dev).map_err(|e| {
                        anyhow::anyhow!(
                            "Invalid sampling distribution for '{}' (class {}): {}",
                            feature,
                            class,
                            e
                        )
                    })?;
                    for &idx in &rows {
                        if values[idx].is_none() {
                            values[idx] = Some(normal.sample(rng));
                        }
                    }
                    *filled += stats.missing;
                    summary.cells_filled += stats.missing;
                } else if stats.missing > 0 {
                    log::debug!(
                        "Leaving {} missing cell(s) of '{}' for class {} ({} present value(s))",
                        stats.missing,
                        feature,
                        class,
                        stats.present
                    );
                    summary.unresolved.push(UnresolvedSlice {
                        label: class,
                        feature: feature.clone(),
                        missing: stats.missing,
                        present: stats.present,
                    });
                }
            }
        }

        let mut result = df.clone();
        for (feature, values, filled) in targets {
            if filled > 0 {
                result.with_column(Column::new(feature.as_str().into(), values))?;
            }
        }

        log::debug!(
            "Imputed {} of {} missing cell(s) across {} column(s)",
            summary.cells_filled,
            summary.cells_missing,
            summary.columns_with_missing
        );

        Ok((result, summary))
    }
}
