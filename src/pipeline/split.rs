//! Train/test splitting, standardization and split artifact persistence

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use faer::Mat;
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::artifact::{load_table, save_table};
use super::scaler::StandardScaler;
use super::stage::warn;
use super::table::{feature_columns, float_values, label_values};
use crate::pipeline::{PipelineError, WarningPolicy};

/// Options controlling [`split_and_prepare_data`]
#[derive(Debug, Clone)]
pub struct SplitOptions {
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Minimum number of test rows
    pub min_test_samples: usize,
    /// Fit a [`StandardScaler`] on the training rows
    pub standardize: bool,
    pub warnings: WarningPolicy,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            min_test_samples: 30,
            standardize: true,
            warnings: WarningPolicy::default(),
        }
    }
}

/// Feature matrices and labels for both partitions
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Mat<f64>,
    pub x_test: Mat<f64>,
    pub y_train: Vec<i32>,
    pub y_test: Vec<i32>,
    pub feature_names: Vec<String>,
    pub label_column: String,
    /// Present when the matrices were standardized
    pub scaler: Option<StandardScaler>,
}

/// Metadata written next to the split artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitMetadata {
    pub train_samples: usize,
    pub test_samples: usize,
    pub features: Vec<String>,
    pub creation_date: String,
    pub has_scaler: bool,
}

/// Locations of stored split artifacts
#[derive(Debug, Clone)]
pub struct StoredSplitPaths {
    pub x_train: PathBuf,
    pub x_test: PathBuf,
    pub y_train: PathBuf,
    pub y_test: PathBuf,
    pub scaler: Option<PathBuf>,
    pub metadata: PathBuf,
}

/// Minimum dataset size for the requested split ratio
pub fn min_required_samples(min_test_samples: usize, test_size: f64) -> usize {
    (min_test_samples as f64 / test_size) as usize
}

/// Split the observation table into train and test partitions.
///
/// Features are the `feature_*` columns; columns that still contain missing
/// cells after imputation are excluded, as are rows without a label. Rows are
/// shuffled with `rng` and the first `ceil(n * test_size)` go to the test
/// partition.
pub fn split_and_prepare_data<R: Rng + ?Sized>(
    df: &DataFrame,
    target: &str,
    options: &SplitOptions,
    rng: &mut R,
) -> Result<SplitData> {
    let required = min_required_samples(options.min_test_samples, options.test_size);
    if df.height() < required {
        return Err(PipelineError::DatasetTooSmall {
            required,
            actual: df.height(),
            min_test: options.min_test_samples,
            test_size: options.test_size,
        }
        .into());
    }

    let labels = label_values(df, target)?;

    let mut feature_names = Vec::new();
    let mut feature_data: Vec<Vec<Option<f64>>> = Vec::new();
    let mut excluded = Vec::new();
    for name in feature_columns(df) {
        let values = float_values(df, &name)?;
        if values.iter().any(|v| v.is_none()) {
            excluded.push(name);
        } else {
            feature_names.push(name);
            feature_data.push(values);
        }
    }
    if !excluded.is_empty() {
        warn(
            options.warnings,
            &format!(
                "Excluding {} feature(s) with unresolved missing values: {}",
                excluded.len(),
                excluded.join(", ")
            ),
        );
    }
    if feature_names.is_empty() {
        anyhow::bail!("No complete feature columns available for training");
    }

    let mut rows: Vec<usize> = (0..df.height()).filter(|&i| labels[i].is_some()).collect();
    let unlabeled = df.height() - rows.len();
    if unlabeled > 0 {
        warn(
            options.warnings,
            &format!("Excluding {} row(s) without a label", unlabeled),
        );
    }

    rows.shuffle(rng);
    let n_test = (rows.len() as f64 * options.test_size).ceil() as usize;
    if n_test < options.min_test_samples {
        return Err(PipelineError::TestSetTooSmall {
            actual: n_test,
            minimum: options.min_test_samples,
        }
        .into());
    }
    let (test_rows, train_rows) = rows.split_at(n_test.min(rows.len()));

    let gather = |subset: &[usize]| -> Mat<f64> {
        Mat::from_fn(subset.len(), feature_data.len(), |i, j| {
            feature_data[j][subset[i]].unwrap_or(f64::NAN)
        })
    };
    let gather_labels = |subset: &[usize]| -> Vec<i32> {
        subset.iter().filter_map(|&i| labels[i]).collect()
    };

    let mut x_train = gather(train_rows);
    let mut x_test = gather(test_rows);

    let scaler = if options.standardize {
        let scaler = StandardScaler::fit(&x_train)?;
        x_train = scaler.transform(&x_train)?;
        x_test = scaler.transform(&x_test)?;
        Some(scaler)
    } else {
        None
    };

    Ok(SplitData {
        x_train,
        x_test,
        y_train: gather_labels(train_rows),
        y_test: gather_labels(test_rows),
        feature_names,
        label_column: target.to_string(),
        scaler,
    })
}

/// Build a Float64 table from a matrix and its column names
pub fn matrix_to_frame(x: &Mat<f64>, names: &[String]) -> Result<DataFrame> {
    if names.len() != x.ncols() {
        return Err(PipelineError::FeatureMismatch {
            expected: x.ncols(),
            actual: names.len(),
        }
        .into());
    }
    let columns: Vec<Column> = names
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = (0..x.nrows()).map(|i| x[(i, j)]).collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Read every column of a table into a dense matrix
pub fn frame_to_matrix(df: &DataFrame) -> Result<(Mat<f64>, Vec<String>)> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let mut data: Vec<Vec<f64>> = Vec::with_capacity(names.len());
    for name in &names {
        let values = float_values(df, name)?;
        let complete: Option<Vec<f64>> = values.into_iter().collect();
        data.push(complete.with_context(|| format!("Column '{}' contains missing values", name))?);
    }

    let x = Mat::from_fn(df.height(), names.len(), |i, j| data[j][i]);
    Ok((x, names))
}

fn labels_to_frame(labels: &[i32], name: &str) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![Column::new(name.into(), labels.to_vec())])?)
}

fn frame_to_labels(df: &DataFrame) -> Result<(Vec<i32>, String)> {
    let name = df
        .get_column_names()
        .first()
        .map(|name| name.to_string())
        .context("Label table has no columns")?;
    let labels: Option<Vec<i32>> = label_values(df, &name)?.into_iter().collect();
    Ok((labels.context("Label table contains missing values")?, name))
}

/// Persist both partitions, the optional scaler and split metadata under `base`.
///
/// Layout: `splits/{X_train,X_test,y_train,y_test}.parquet`, `scaler.json`,
/// `split_metadata.json`.
pub fn store_split_data(split: &SplitData, base: &Path) -> Result<StoredSplitPaths> {
    let store = || -> Result<StoredSplitPaths> {
        let splits_dir = base.join("splits");
        std::fs::create_dir_all(&splits_dir)
            .with_context(|| format!("Failed to create directory: {}", splits_dir.display()))?;

        let x_train = splits_dir.join("X_train.parquet");
        let x_test = splits_dir.join("X_test.parquet");
        let y_train = splits_dir.join("y_train.parquet");
        let y_test = splits_dir.join("y_test.parquet");

        save_table(&mut matrix_to_frame(&split.x_train, &split.feature_names)?, &x_train)?;
        save_table(&mut matrix_to_frame(&split.x_test, &split.feature_names)?, &x_test)?;
        save_table(&mut labels_to_frame(&split.y_train, &split.label_column)?, &y_train)?;
        save_table(&mut labels_to_frame(&split.y_test, &split.label_column)?, &y_test)?;

        let scaler = match &split.scaler {
            Some(scaler) => {
                let path = base.join("scaler.json");
                std::fs::write(&path, serde_json::to_string_pretty(scaler)?)
                    .with_context(|| format!("Failed to write scaler to {}", path.display()))?;
                Some(path)
            }
            None => {
                // A stale scaler from an earlier run would be picked up on load
                let stale = base.join("scaler.json");
                if stale.exists() {
                    std::fs::remove_file(&stale)
                        .with_context(|| format!("Failed to remove {}", stale.display()))?;
                }
                None
            }
        };

        let metadata_path = base.join("split_metadata.json");
        let metadata = SplitMetadata {
            train_samples: split.x_train.nrows(),
            test_samples: split.x_test.nrows(),
            features: split.feature_names.clone(),
            creation_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            has_scaler: split.scaler.is_some(),
        };
        std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)
            .with_context(|| format!("Failed to write {}", metadata_path.display()))?;

        Ok(StoredSplitPaths {
            x_train,
            x_test,
            y_train,
            y_test,
            scaler,
            metadata: metadata_path,
        })
    };

    store().context("Error storing split data")
}

/// Load split artifacts written by [`store_split_data`]
pub fn load_split_data(base: &Path) -> Result<SplitData> {
    let splits_dir = base.join("splits");
    if !splits_dir.exists() {
        return Err(PipelineError::SplitArtifactsMissing(splits_dir).into());
    }

    let load = || -> Result<SplitData> {
        let (x_train, feature_names) =
            frame_to_matrix(&load_table(&splits_dir.join("X_train.parquet"))?)?;
        let (x_test, test_names) = frame_to_matrix(&load_table(&splits_dir.join("X_test.parquet"))?)?;
        if test_names != feature_names {
            anyhow::bail!("Train and test feature columns differ");
        }
        let (y_train, label_column) = frame_to_labels(&load_table(&splits_dir.join("y_train.parquet"))?)?;
        let (y_test, _) = frame_to_labels(&load_table(&splits_dir.join("y_test.parquet"))?)?;

        let scaler_path = base.join("scaler.json");
        let scaler = if scaler_path.exists() {
            let text = std::fs::read_to_string(&scaler_path)
                .with_context(|| format!("Failed to read {}", scaler_path.display()))?;
            Some(serde_json::from_str(&text)?)
        } else {
            None
        };

        Ok(SplitData {
            x_train,
            x_test,
            y_train,
            y_test,
            feature_names,
            label_column,
            scaler,
        })
    };

    load().context("Error loading split data")
}

/// Read the split metadata record
pub fn load_split_metadata(base: &Path) -> Result<SplitMetadata> {
    let path = base.join("split_metadata.json");
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&text)?)
}
