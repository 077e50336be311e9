//! Integration tests for the full mung → visualize → evaluate → experiment run

use rand::rngs::StdRng;
use rand::SeedableRng;
use waferflow::models::ModelKind;
use waferflow::pipeline::*;
use waferflow::report::{read_summary_csv, ExperimentConfig, SUMMARY_FILE};

#[path = "common/mod.rs"]
mod common;

use common::*;

#[test]
fn test_full_pipeline_produces_every_artifact() {
    let (_temp_dir, config) = synthetic_workspace(200);
    let mut rng = StdRng::seed_from_u64(config.seed.unwrap());

    // Stage 1: mung
    let summary = mung_data(&config, &mut rng).unwrap();
    assert_eq!(summary.columns_with_missing, 1);
    assert_eq!(summary.cells_unresolved(), 0);
    let imputed = load_table(&config.imputed_table_path()).unwrap();
    assert_eq!(imputed.shape(), (200, SYNTHETIC_WIDTH + 2));
    assert_eq!(imputed.column("feature_2").unwrap().null_count(), 0);

    // Stage 2: visualize
    let written = visualize_data(&config).unwrap();
    assert!(config.summary_path().exists());
    assert!(config.correlations_path().exists());
    assert_eq!(written.len(), 2, "plots are disabled in the synthetic config");

    // Stage 3: evaluate
    let report = evaluate_data(&config, &mut rng).unwrap();
    assert_eq!(report.evaluations.len(), 2);
    assert!(config.processed_dir.join("splits").join("X_train.parquet").exists());
    assert!(config.processed_dir.join("scaler.json").exists());
    assert!(config.models_dir.join("logistic_regression.json").exists());
    assert!(config.models_dir.join("model_info.json").exists());

    let metrics = read_summary_csv(&config.evaluation_dir.join(SUMMARY_FILE)).unwrap();
    let logistic = metrics
        .iter()
        .find(|m| m.model_name == "logistic_regression")
        .unwrap();
    assert!(logistic.balanced_accuracy > 0.8, "{:?}", logistic);

    // Stage 4: experiment on the persisted logistic model
    let experiment = ExperimentConfig {
        feature_a: "feature_0".to_string(),
        feature_b: "feature_1".to_string(),
        steps: 5,
    };
    let results = run_experiment(&config, &experiment, ModelKind::LogisticRegression).unwrap();
    assert_eq!(results.sweep_b.values.len(), 5);
    assert!(config.experiment_dir().join("experiment_summary.txt").exists());
}

#[test]
fn test_seeded_runs_are_identical() {
    let (_first_dir, first) = synthetic_workspace(120);
    let (_second_dir, second) = synthetic_workspace(120);

    for config in [&first, &second] {
        let mut rng = StdRng::seed_from_u64(99);
        mung_data(config, &mut rng).unwrap();
        evaluate_data(config, &mut rng).unwrap();
    }

    let a = load_table(&first.imputed_table_path()).unwrap();
    let b = load_table(&second.imputed_table_path()).unwrap();
    assert!(a.equals_missing(&b));

    let a = load_split_data(&first.processed_dir).unwrap();
    let b = load_split_data(&second.processed_dir).unwrap();
    assert_eq!(a.y_test, b.y_test);
    assert_eq!(a.x_train, b.x_train);

    let a = std::fs::read_to_string(first.evaluation_dir.join(SUMMARY_FILE)).unwrap();
    let b = std::fs::read_to_string(second.evaluation_dir.join(SUMMARY_FILE)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_best_effort_stage_failure_is_recorded() {
    let (_temp_dir, config) = synthetic_workspace(50);

    // Visualize before mung: the imputed table does not exist yet
    let report = run_stage(Stage::Visualize, FailurePolicy::BestEffort, || {
        visualize_data(&config).map(|_| ())
    })
    .unwrap();

    assert!(report.outcome.is_failed());
    match &report.outcome {
        StageOutcome::Failed(message) => assert!(message.contains("secom_output.parquet")),
        StageOutcome::Completed => unreachable!(),
    }
}

#[test]
fn test_strict_stage_failure_propagates() {
    let (_temp_dir, config) = synthetic_workspace(50);
    let result = run_stage(Stage::Evaluate, FailurePolicy::Strict, || {
        evaluate_data(&config, &mut StdRng::seed_from_u64(1)).map(|_| ())
    });
    assert!(result.is_err());
}

#[test]
fn test_experiment_without_trained_model_fails() {
    let (_temp_dir, config) = synthetic_workspace(120);
    let mut rng = StdRng::seed_from_u64(5);
    mung_data(&config, &mut rng).unwrap();
    evaluate_data(&config, &mut rng).unwrap();

    // The synthetic config trains logistic regression and knn only
    let result = run_experiment(&config, &ExperimentConfig::default(), ModelKind::RandomForest);
    assert!(result.is_err());
}

#[test]
fn test_undersized_dataset_fails_evaluation() {
    let (_temp_dir, mut config) = synthetic_workspace(40);
    config.min_test_samples = 30;
    let mut rng = StdRng::seed_from_u64(5);
    mung_data(&config, &mut rng).unwrap();

    let err = evaluate_data(&config, &mut rng).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::DatasetTooSmall { .. })
    ));
}
