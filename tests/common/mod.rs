//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tempfile::TempDir;

use waferflow::models::ModelKind;
use waferflow::pipeline::PipelineConfig;

/// Number of measurement columns in the synthetic SECOM files
pub const SYNTHETIC_WIDTH: usize = 6;

/// Observation table from the two-class scenario: class -1 has one present
/// and one missing value, class 1 has no missing value.
pub fn single_sample_frame() -> DataFrame {
    df! {
        "pass" => [-1i32, -1, 1],
        "feature_0" => [Some(10.0f64), None, Some(20.0)],
    }
    .unwrap()
}

/// Observation table from the single-class scenario with two present values
pub fn two_sample_frame() -> DataFrame {
    df! {
        "pass" => [-1i32, -1, -1],
        "feature_0" => [Some(10.0f64), None, Some(30.0)],
    }
    .unwrap()
}

/// Mixed table: a complete column, a column with missing cells in both
/// classes, and a column whose fail slice has a single present value.
pub fn mixed_frame() -> DataFrame {
    df! {
        "pass" => [-1i32, 1, -1, 1, -1, 1, -1, 1],
        "feature_0" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0],
        "feature_1" => [Some(1.5f64), None, None, Some(4.5), Some(2.5), Some(6.5), Some(3.5), None],
        "feature_2" => [Some(9.0f64), None, Some(8.0), Some(7.0), None, None, Some(6.0), None],
    }
    .unwrap()
}

/// Write synthetic label and feature files under `root/data_original`.
///
/// Failing wafers are shifted upwards on `feature_0` and `feature_1` so the
/// classifiers have signal to learn. Every seventh row misses `feature_2`,
/// and `feature_5` is constant.
pub fn write_secom_files(root: &Path, rows: usize, seed: u64) -> (PathBuf, PathBuf) {
    let dir = root.join("data_original");
    std::fs::create_dir_all(&dir).unwrap();

    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();

    let mut labels = String::new();
    let mut features = String::new();
    for i in 0..rows {
        let fail = i % 4 == 0;
        let label = if fail { 1 } else { -1 };
        let _ = writeln!(
            labels,
            "{} \"{:02}/07/2008 {:02}:{:02}:00\"",
            label,
            1 + (i / 24) % 28,
            i % 24,
            (i * 7) % 60
        );

        let shift = if fail { 3.0 } else { 0.0 };
        let mut row: Vec<String> = Vec::with_capacity(SYNTHETIC_WIDTH);
        row.push(format!("{:.4}", shift + noise.sample(&mut rng)));
        row.push(format!("{:.4}", 10.0 + 2.0 * shift + noise.sample(&mut rng)));
        if i % 7 == 3 {
            row.push("NaN".to_string());
        } else {
            row.push(format!("{:.4}", 100.0 + 5.0 * noise.sample(&mut rng)));
        }
        row.push(format!("{:.4}", rng.gen_range(-1.0..1.0)));
        row.push(format!("{}", rng.gen_range(0..5)));
        row.push("42".to_string());
        let _ = writeln!(features, "{}", row.join(" "));
    }

    let labels_path = dir.join("secom_labels.data");
    let features_path = dir.join("secom.data");
    std::fs::write(&labels_path, labels).unwrap();
    std::fs::write(&features_path, features).unwrap();
    (labels_path, features_path)
}

/// Configuration rooted at `root` sized for the synthetic files.
///
/// Uses a fixed seed, small test-set minimum and fast models.
pub fn synthetic_config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        feature_count: SYNTHETIC_WIDTH,
        seed: Some(42),
        min_test_samples: 10,
        plots: false,
        summary_features: 3,
        models: vec![ModelKind::LogisticRegression, ModelKind::Knn],
        ..PipelineConfig::rooted_at(root)
    }
}

/// Temp directory holding synthetic SECOM files plus a matching configuration
pub fn synthetic_workspace(rows: usize) -> (TempDir, PipelineConfig) {
    let temp_dir = TempDir::new().unwrap();
    write_secom_files(temp_dir.path(), rows, 7);
    let config = synthetic_config(temp_dir.path());
    (temp_dir, config)
}

/// Values of a float column, missing cells as `None`
pub fn column_values(df: &DataFrame, name: &str) -> Vec<Option<f64>> {
    df.column(name)
        .unwrap()
        .cast(&DataType::Float64)
        .unwrap()
        .as_materialized_series()
        .f64()
        .unwrap()
        .into_iter()
        .collect()
}

/// Separable two-feature training data with labels -1/1
pub fn separable_data(n: usize, seed: u64) -> (faer::Mat<f64>, Vec<i32>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.5).unwrap();
    let labels: Vec<i32> = (0..n).map(|i| if i % 3 == 0 { 1 } else { -1 }).collect();
    let jitter: Vec<f64> = (0..2 * n).map(|_| noise.sample(&mut rng)).collect();
    let x = faer::Mat::from_fn(n, 2, |i, j| {
        let centre = if labels[i] == 1 { 2.0 } else { -2.0 };
        let sign = if j == 0 { 1.0 } else { -1.0 };
        sign * centre + jitter[2 * i + j]
    });
    (x, labels)
}
