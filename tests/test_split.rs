//! Tests for train/test splitting, standardization and split artifacts

use approx::assert_abs_diff_eq;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use waferflow::pipeline::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn imputed_synthetic(rows: usize) -> (TempDir, DataFrame) {
    let (temp_dir, config) = synthetic_workspace(rows);
    let df = load_observation_table(&config).unwrap();
    let (imputed, _) = ClassConditionalImputer::new(LABEL_COLUMN)
        .impute(&df, &mut StdRng::seed_from_u64(1))
        .unwrap();
    (temp_dir, imputed)
}

fn options(test_size: f64, min_test_samples: usize, standardize: bool) -> SplitOptions {
    SplitOptions {
        test_size,
        min_test_samples,
        standardize,
        ..Default::default()
    }
}

#[test]
fn test_split_sizes_and_labels() {
    let (_temp_dir, df) = imputed_synthetic(80);
    let split = split_and_prepare_data(
        &df,
        LABEL_COLUMN,
        &options(0.25, 10, false),
        &mut StdRng::seed_from_u64(3),
    )
    .unwrap();

    assert_eq!(split.x_test.nrows(), 20);
    assert_eq!(split.x_train.nrows(), 60);
    assert_eq!(split.y_test.len(), 20);
    assert_eq!(split.y_train.len(), 60);
    assert_eq!(split.x_train.ncols(), SYNTHETIC_WIDTH);
    assert!(split.scaler.is_none());

    // Timestamp never becomes a feature
    assert!(!split.feature_names.iter().any(|n| n == TIMESTAMP_COLUMN));

    let fails = split.y_train.iter().chain(&split.y_test).filter(|&&l| l == 1).count();
    assert_eq!(fails, 20);
}

#[test]
fn test_standardized_training_columns() {
    let (_temp_dir, df) = imputed_synthetic(80);
    let split = split_and_prepare_data(
        &df,
        LABEL_COLUMN,
        &options(0.25, 10, true),
        &mut StdRng::seed_from_u64(3),
    )
    .unwrap();

    let scaler = split.scaler.as_ref().unwrap();
    assert_eq!(scaler.n_samples_seen, 60);
    for j in 0..split.x_train.ncols() {
        let mean = (0..split.x_train.nrows()).map(|i| split.x_train[(i, j)]).sum::<f64>()
            / split.x_train.nrows() as f64;
        assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-9);
    }
    // Constant feature_5 passes through centred
    assert_eq!(scaler.scale[5], 1.0);
    assert_abs_diff_eq!(split.x_test[(0, 5)], 0.0, epsilon = 1e-12);
}

#[test]
fn test_same_seed_same_partition() {
    let (_temp_dir, df) = imputed_synthetic(60);
    let opts = options(0.2, 10, true);
    let a = split_and_prepare_data(&df, LABEL_COLUMN, &opts, &mut StdRng::seed_from_u64(5)).unwrap();
    let b = split_and_prepare_data(&df, LABEL_COLUMN, &opts, &mut StdRng::seed_from_u64(5)).unwrap();

    assert_eq!(a.x_train, b.x_train);
    assert_eq!(a.y_test, b.y_test);
}

#[test]
fn test_dataset_too_small() {
    let (_temp_dir, df) = imputed_synthetic(40);
    let err = split_and_prepare_data(
        &df,
        LABEL_COLUMN,
        &options(0.2, 30, true),
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap_err();

    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::DatasetTooSmall { required, actual, .. }) => {
            assert_eq!(*required, 150);
            assert_eq!(*actual, 40);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unlabeled_rows_can_shrink_test_set() {
    let labels: Vec<Option<i32>> = (0..20)
        .map(|i| if i < 10 { Some(if i % 2 == 0 { 1 } else { -1 }) } else { None })
        .collect();
    let values: Vec<f64> = (0..20).map(|i| i as f64).collect();
    let df = DataFrame::new(vec![
        Column::new("pass".into(), labels),
        Column::new("feature_0".into(), values),
    ])
    .unwrap();

    let err = split_and_prepare_data(
        &df,
        "pass",
        &options(0.2, 4, false),
        &mut StdRng::seed_from_u64(1),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::TestSetTooSmall { actual: 2, minimum: 4 })
    ));
}

#[test]
fn test_incomplete_feature_column_excluded() {
    let df = df! {
        "pass" => [-1i32, 1, -1, 1, -1, 1, -1, 1, -1, 1],
        "feature_0" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "feature_1" => [Some(1.0f64), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0), Some(7.0), Some(8.0), Some(9.0), Some(10.0)],
    }
    .unwrap();

    let split = split_and_prepare_data(&df, "pass", &options(0.2, 2, false), &mut StdRng::seed_from_u64(1))
        .unwrap();
    assert_eq!(split.feature_names, vec!["feature_0".to_string()]);
}

#[test]
fn test_nan_feature_column_excluded() {
    let df = df! {
        "pass" => [-1i32, 1, -1, 1, -1, 1, -1, 1, -1, 1],
        "feature_0" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
        "feature_1" => [1.0f64, f64::NAN, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
    }
    .unwrap();

    let split = split_and_prepare_data(&df, "pass", &options(0.2, 2, true), &mut StdRng::seed_from_u64(1))
        .unwrap();
    assert_eq!(split.feature_names, vec!["feature_0".to_string()]);
    assert!((0..split.x_train.nrows()).all(|i| split.x_train[(i, 0)].is_finite()));
}

#[test]
fn test_store_and_load_round_trip() {
    let (temp_dir, df) = imputed_synthetic(60);
    let split = split_and_prepare_data(
        &df,
        LABEL_COLUMN,
        &options(0.2, 10, true),
        &mut StdRng::seed_from_u64(8),
    )
    .unwrap();

    let base = temp_dir.path().join("data_processed");
    let paths = store_split_data(&split, &base).unwrap();
    assert!(paths.x_train.exists());
    assert!(paths.y_test.exists());
    assert!(paths.scaler.as_ref().unwrap().exists());

    let loaded = load_split_data(&base).unwrap();
    assert_eq!(loaded.x_train, split.x_train);
    assert_eq!(loaded.x_test, split.x_test);
    assert_eq!(loaded.y_train, split.y_train);
    assert_eq!(loaded.y_test, split.y_test);
    assert_eq!(loaded.feature_names, split.feature_names);
    assert_eq!(loaded.label_column, LABEL_COLUMN);
    assert_eq!(loaded.scaler, split.scaler);

    let metadata = load_split_metadata(&base).unwrap();
    assert_eq!(metadata.train_samples, 48);
    assert_eq!(metadata.test_samples, 12);
    assert!(metadata.has_scaler);
    assert_eq!(metadata.creation_date.len(), "2024-01-01 00:00:00".len());
}

#[test]
fn test_unscaled_store_removes_stale_scaler() {
    let (temp_dir, df) = imputed_synthetic(60);
    let base = temp_dir.path().join("data_processed");

    let scaled = split_and_prepare_data(&df, LABEL_COLUMN, &options(0.2, 10, true), &mut StdRng::seed_from_u64(2))
        .unwrap();
    store_split_data(&scaled, &base).unwrap();
    assert!(base.join("scaler.json").exists());

    let raw = split_and_prepare_data(&df, LABEL_COLUMN, &options(0.2, 10, false), &mut StdRng::seed_from_u64(2))
        .unwrap();
    store_split_data(&raw, &base).unwrap();
    assert!(!base.join("scaler.json").exists());
    assert!(load_split_data(&base).unwrap().scaler.is_none());
}

#[test]
fn test_load_without_splits_is_typed_error() {
    let temp_dir = TempDir::new().unwrap();
    let err = load_split_data(temp_dir.path()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::SplitArtifactsMissing(_))
    ));
}
