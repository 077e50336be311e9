//! Descriptive statistics over the imputed observation table

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;

use super::imputer::median;
use super::table::{distinct_in_order, feature_columns, float_values, label_values};

/// Category counts for a label-like column
#[derive(Debug, Clone, PartialEq)]
pub struct QualitativeSummary {
    pub column: String,
    /// (category, count) in order of first appearance
    pub counts: Vec<(i32, usize)>,
    pub most_frequent: Vec<i32>,
    pub least_frequent: Vec<i32>,
}

impl QualitativeSummary {
    pub fn num_categories(&self) -> usize {
        self.counts.len()
    }

    /// Count of a single category (0 when absent)
    pub fn count_of(&self, category: i32) -> usize {
        self.counts
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

/// Min, max and median of a numeric column
#[derive(Debug, Clone, PartialEq)]
pub struct QuantitativeSummary {
    pub column: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
}

/// Count categories of an integer column. Ties for most/least frequent are
/// listed in order of first appearance.
pub fn qualitative_summary(df: &DataFrame, column: &str) -> Result<QualitativeSummary> {
    let values = label_values(df, column)?;
    let categories = distinct_in_order(&values);

    if categories.is_empty() {
        anyhow::bail!("Column '{}' has no categories to summarize", column);
    }

    let counts: Vec<(i32, usize)> = categories
        .iter()
        .map(|&c| (c, values.iter().filter(|v| **v == Some(c)).count()))
        .collect();

    let max = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
    let min = counts.iter().map(|(_, n)| *n).min().unwrap_or(0);

    Ok(QualitativeSummary {
        column: column.to_string(),
        most_frequent: counts.iter().filter(|(_, n)| *n == max).map(|(c, _)| *c).collect(),
        least_frequent: counts.iter().filter(|(_, n)| *n == min).map(|(c, _)| *c).collect(),
        counts,
    })
}

/// Min, max and median of the present values of a numeric column
pub fn quantitative_summary(df: &DataFrame, column: &str) -> Result<QuantitativeSummary> {
    let mut present: Vec<f64> = float_values(df, column)?.into_iter().flatten().collect();

    let min = present.iter().copied().reduce(f64::min);
    let max = present.iter().copied().reduce(f64::max);

    Ok(QuantitativeSummary {
        column: column.to_string(),
        min,
        max,
        median: median(&mut present),
    })
}

/// The first `n` measurement columns
pub fn leading_feature_columns(df: &DataFrame, n: usize) -> Vec<String> {
    feature_columns(df).into_iter().take(n).collect()
}

/// Pairwise-complete Pearson correlation matrix over `columns`.
///
/// Each pair uses only rows where both values are present. Entries are NaN
/// when a pair has fewer than two complete rows or zero variance.
pub fn correlation_matrix(df: &DataFrame, columns: &[String]) -> Result<Mat<f64>> {
    let data: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|name| float_values(df, name))
        .collect::<Result<_>>()?;

    let n = columns.len();
    let mut corr = Mat::<f64>::zeros(n, n);
    for i in 0..n {
        for j in 0..=i {
            let r = if i == j {
                if pearson(&data[i], &data[i]).is_some() { 1.0 } else { f64::NAN }
            } else {
                pearson(&data[i], &data[j]).unwrap_or(f64::NAN)
            };
            corr[(i, j)] = r;
            corr[(j, i)] = r;
        }
    }

    Ok(corr)
}

/// Single-pass Welford Pearson correlation over complete pairs
fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let mut n = 0.0;
    let mut mean_x = 0.0;
    let mut mean_y = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    let mut cov_xy = 0.0;

    for (x, y) in xs.iter().zip(ys.iter()) {
        if let (Some(x), Some(y)) = (x, y) {
            n += 1.0;
            let dx = x - mean_x;
            let dy = y - mean_y;
            mean_x += dx / n;
            mean_y += dy / n;
            var_x += dx * (x - mean_x);
            var_y += dy * (y - mean_y);
            cov_xy += dx * (y - mean_y);
        }
    }

    if n < 2.0 || var_x == 0.0 || var_y == 0.0 {
        return None;
    }

    Some(cov_xy / (var_x.sqrt() * var_y.sqrt()))
}
