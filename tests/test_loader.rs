//! Tests for raw file loading and the observation table layout

use polars::prelude::*;
use rand::SeedableRng;
use waferflow::pipeline::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_load_synthetic_observation_table() {
    let (_temp_dir, config) = synthetic_workspace(40);
    let df = load_observation_table(&config).unwrap();

    assert_eq!(df.height(), 40);
    assert_eq!(df.width(), SYNTHETIC_WIDTH + 2);
    assert_eq!(df.column(LABEL_COLUMN).unwrap().dtype(), &DataType::Int32);
    assert!(matches!(
        df.column(TIMESTAMP_COLUMN).unwrap().dtype(),
        DataType::Datetime(TimeUnit::Milliseconds, _)
    ));

    // Rows 3, 10, 17, ... miss feature_2
    let feature_2 = column_values(&df, "feature_2");
    assert_eq!(feature_2.iter().filter(|v| v.is_none()).count(), 6);
    assert!(feature_2[3].is_none());
    assert_eq!(df.column("feature_0").unwrap().null_count(), 0);
}

#[test]
fn test_label_order_preserved() {
    let (_temp_dir, config) = synthetic_workspace(8);
    let df = load_observation_table(&config).unwrap();
    let labels: Vec<Option<i32>> = df
        .column(LABEL_COLUMN)
        .unwrap()
        .as_materialized_series()
        .i32()
        .unwrap()
        .into_iter()
        .collect();

    assert_eq!(
        labels,
        vec![Some(1), Some(-1), Some(-1), Some(-1), Some(1), Some(-1), Some(-1), Some(-1)]
    );
}

#[test]
fn test_row_count_mismatch_is_typed_error() {
    let (_temp_dir, config) = synthetic_workspace(10);
    let features = std::fs::read_to_string(&config.features_path).unwrap();
    let truncated: Vec<&str> = features.lines().take(9).collect();
    std::fs::write(&config.features_path, truncated.join("\n")).unwrap();

    let err = load_observation_table(&config).unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::RowCountMismatch { labels, features }) => {
            assert_eq!(*labels, 10);
            assert_eq!(*features, 9);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_wrong_feature_width_is_malformed_row() {
    let (_temp_dir, mut config) = synthetic_workspace(5);
    config.feature_count = SYNTHETIC_WIDTH + 1;

    let err = load_observation_table(&config).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::MalformedRow { line: 1, .. })
    ));
}

#[test]
fn test_missing_input_file_names_path() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = synthetic_config(temp_dir.path());

    let err = load_observation_table(&config).unwrap_err();
    assert!(format!("{:#}", err).contains("secom_labels.data"));
}

#[test]
fn test_imputed_table_round_trip() {
    let (_temp_dir, config) = synthetic_workspace(30);
    let df = load_observation_table(&config).unwrap();
    let mut rng = rand::rngs::StdRng::seed_from_u64(9);
    let (mut imputed, _) = ClassConditionalImputer::new(LABEL_COLUMN)
        .impute(&df, &mut rng)
        .unwrap();

    let path = config.imputed_table_path();
    save_table(&mut imputed, &path).unwrap();
    let reloaded = load_table(&path).unwrap();

    assert!(reloaded.equals_missing(&imputed));
}
