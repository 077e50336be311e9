//! Tests for model evaluation outputs and feature experiments

use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;
use waferflow::models::*;
use waferflow::pipeline::{PipelineError, StandardScaler, WarningPolicy};
use waferflow::report::*;

#[path = "common/mod.rs"]
mod common;

use common::*;

fn feature_names() -> Vec<String> {
    vec!["feature_0".to_string(), "feature_1".to_string()]
}

fn trained_models(temp_dir: &TempDir, kinds: &[ModelKind]) -> std::path::PathBuf {
    let models_dir = temp_dir.path().join("models");
    let (x, y) = separable_data(90, 21);
    train_classification_models(
        &x,
        &y,
        &feature_names(),
        kinds,
        &models_dir,
        1,
        &mut StdRng::seed_from_u64(22),
    )
    .unwrap();
    models_dir
}

fn options(plots: bool, bundle: bool) -> EvaluationOptions {
    EvaluationOptions {
        plots,
        bundle,
        warnings: WarningPolicy::Suppress,
    }
}

#[test]
fn test_discover_models_skips_model_info() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::Knn, ModelKind::LogisticRegression]);
    assert!(models_dir.join(MODEL_INFO_FILE).exists());

    let found = discover_models(&models_dir).unwrap();
    let names: Vec<String> = found
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["knn.json", "logistic_regression.json"]);
}

#[test]
fn test_evaluate_writes_summary_csv() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::Knn, ModelKind::LogisticRegression]);
    let evaluation_dir = temp_dir.path().join("evaluation");
    let (x_test, y_test) = separable_data(45, 23);

    let report = evaluate_models(
        &x_test,
        &y_test,
        &feature_names(),
        &models_dir,
        &evaluation_dir,
        options(false, false),
    )
    .unwrap();

    assert_eq!(report.evaluations.len(), 2);
    assert!(report.failures.is_empty());
    assert!(report.plot_paths.is_empty());
    assert!(report.bundle_path.is_none());

    let summary_path = report.summary_path.clone().unwrap();
    assert_eq!(summary_path, evaluation_dir.join(SUMMARY_FILE));
    let text = std::fs::read_to_string(&summary_path).unwrap();
    assert!(text.starts_with("model_name,balanced_accuracy,accuracy,precision,recall,f1"));

    let reread = read_summary_csv(&summary_path).unwrap();
    assert_eq!(reread.len(), 2);
    assert_eq!(reread[0].model_name, "knn");
    assert_relative_eq!(reread[0].accuracy, report.evaluations[0].metrics.accuracy, epsilon = 1e-12);
    assert!(reread.iter().all(|m| m.balanced_accuracy > 0.9));

    // Confusion counts cover the whole test set
    let c = &report.evaluations[1].confusion;
    assert_eq!(
        c.passed_correct + c.passed_incorrect + c.failed_correct + c.failed_incorrect,
        45
    );
    // Logistic regression importances are reported, sorted descending
    let top = &report.evaluations[1].top_features;
    assert_eq!(top.len(), 2);
    assert!(top[0].1 >= top[1].1);
}

#[test]
fn test_broken_model_file_is_skipped() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::Knn]);
    std::fs::write(models_dir.join("broken.json"), "{\"type\": \"svm\"}").unwrap();
    let (x_test, y_test) = separable_data(30, 24);

    let report = evaluate_models(
        &x_test,
        &y_test,
        &feature_names(),
        &models_dir,
        &temp_dir.path().join("evaluation"),
        options(false, false),
    )
    .unwrap();

    assert_eq!(report.evaluations.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "broken");
}

#[test]
fn test_plots_and_bundle() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::LogisticRegression]);
    let evaluation_dir = temp_dir.path().join("evaluation");
    let (x_test, y_test) = separable_data(30, 25);

    let report = evaluate_models(
        &x_test,
        &y_test,
        &feature_names(),
        &models_dir,
        &evaluation_dir,
        options(true, true),
    )
    .unwrap();

    let plots_dir = evaluation_dir.join("plots");
    assert!(plots_dir.join("logistic_regression_confusion_matrix.svg").exists());
    assert!(plots_dir.join("logistic_regression_feature_importance.svg").exists());
    assert!(plots_dir.join("model_comparison.svg").exists());
    assert_eq!(report.plot_paths.len(), 3);

    let bundle = report.bundle_path.clone().unwrap();
    let archive = zip::ZipArchive::new(std::fs::File::open(&bundle).unwrap()).unwrap();
    let entries: Vec<&str> = archive.file_names().collect();
    assert!(entries.contains(&SUMMARY_FILE));
    assert!(entries.contains(&"plots/model_comparison.svg"));
    // Originals stay on disk
    assert!(evaluation_dir.join(SUMMARY_FILE).exists());
}

#[test]
fn test_missing_models_dir_is_error() {
    let temp_dir = TempDir::new().unwrap();
    let (x_test, y_test) = separable_data(10, 26);
    let result = evaluate_models(
        &x_test,
        &y_test,
        &feature_names(),
        &temp_dir.path().join("nope"),
        &temp_dir.path().join("evaluation"),
        options(false, false),
    );
    assert!(result.is_err());
}

#[test]
fn test_feature_experiment_sweeps() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::LogisticRegression]);
    let model = TrainedModel::load(&models_dir.join("logistic_regression.json")).unwrap();
    let (x_test, _) = separable_data(40, 27);

    let config = ExperimentConfig {
        feature_a: "feature_0".to_string(),
        feature_b: "feature_1".to_string(),
        steps: 11,
    };
    let results =
        conduct_feature_experiments(model.classifier(), &x_test, &feature_names(), None, &config)
            .unwrap();

    assert_eq!(results.sweep_a.values.len(), 11);
    assert_eq!(results.joint.len(), 11);
    assert!(results.joint.iter().all(|row| row.len() == 11));

    // Raising feature_0 moves towards the failing cluster, so pass probability falls
    let first = results.sweep_a.pass_probability[0];
    let last = results.sweep_a.pass_probability[10];
    assert!(first > last);
    assert!(results.sweep_a.range() > 0.0);
    assert!(results.combined_range() >= results.sweep_a.range() - 1e-12);

    let output_dir = temp_dir.path().join("experiment_results");
    let written = write_experiment_outputs(&results, &output_dir, true).unwrap();
    assert!(output_dir.join(EXPERIMENT_SUMMARY_FILE).exists());
    assert!(output_dir.join("individual_feature_impacts.svg").exists());
    assert!(output_dir.join("feature_interaction_heatmap.svg").exists());
    assert_eq!(written.len(), 3);
}

#[test]
fn test_experiment_reports_original_units() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::Knn]);
    let model = TrainedModel::load(&models_dir.join("knn.json")).unwrap();
    let (x_test, _) = separable_data(20, 28);

    let scaler = StandardScaler {
        mean: vec![100.0, -5.0],
        scale: vec![10.0, 2.0],
        n_features: 2,
        n_samples_seen: 20,
    };
    let config = ExperimentConfig {
        feature_a: "feature_0".to_string(),
        feature_b: "feature_1".to_string(),
        steps: 3,
    };
    let results = conduct_feature_experiments(
        model.classifier(),
        &x_test,
        &feature_names(),
        Some(&scaler),
        &config,
    )
    .unwrap();

    let lo = (0..x_test.nrows()).map(|i| x_test[(i, 0)]).fold(f64::INFINITY, f64::min);
    assert_relative_eq!(results.sweep_a.values[0], 100.0 + 10.0 * lo, epsilon = 1e-9);
}

#[test]
fn test_experiment_unknown_feature() {
    let temp_dir = TempDir::new().unwrap();
    let models_dir = trained_models(&temp_dir, &[ModelKind::Knn]);
    let model = TrainedModel::load(&models_dir.join("knn.json")).unwrap();
    let (x_test, _) = separable_data(20, 29);

    let err = conduct_feature_experiments(
        model.classifier(),
        &x_test,
        &feature_names(),
        None,
        &ExperimentConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PipelineError>(),
        Some(PipelineError::ColumnNotFound(name)) if name == "feature_516"
    ));
}
