//! Stage bodies: mung, visualize, evaluate and experiment.
//!
//! Each stage reads what the previous one persisted, so any of them can be
//! run on its own once its inputs exist on disk.

use std::path::PathBuf;

use anyhow::{Context, Result};
use rand::RngCore;

use super::artifact::{load_table, save_table};
use super::imputer::{ClassConditionalImputer, ImputationSummary};
use super::loader::load_observation_table;
use super::split::{load_split_data, split_and_prepare_data, store_split_data, SplitOptions};
use super::stage::warn;
use super::statistics::{correlation_matrix, leading_feature_columns};
use crate::models::{train_classification_models, ModelKind, TrainedModel};
use crate::pipeline::PipelineConfig;
use crate::report::{
    conduct_feature_experiments, display_metrics, evaluate_models, render_correlations,
    render_summary, write_experiment_outputs, write_visualizations, EvaluationOptions,
    EvaluationReport, ExperimentConfig, ExperimentResults,
};
use crate::utils::{
    create_spinner, finish_with_success, print_count, print_info, print_success,
};

/// Load the raw files, impute missing measurements and persist the table
pub fn mung_data(config: &PipelineConfig, rng: &mut dyn RngCore) -> Result<ImputationSummary> {
    let df = load_observation_table(config)?;
    print_info(&format!(
        "Observation table: {} rows × {} columns",
        df.height(),
        df.width()
    ));

    let spinner = create_spinner("Imputing missing measurements...");
    let imputer = ClassConditionalImputer::new(config.label_column.as_str());
    let (mut imputed, summary) = imputer.impute(&df, rng)?;
    finish_with_success(&spinner, "Imputation complete");

    print_count(
        "feature(s) with missing values",
        summary.columns_with_missing,
        Some(&format!("({} cells)", summary.cells_missing)),
    );
    print_info(&format!("Filled {} missing cells", summary.cells_filled));
    for slice in &summary.unresolved {
        warn(
            config.warning_policy,
            &format!(
                "{} (class {}) left {} cell(s) missing: only {} present value(s)",
                slice.feature, slice.label, slice.missing, slice.present
            ),
        );
    }

    let path = config.imputed_table_path();
    save_table(&mut imputed, &path)?;
    print_success(&format!("Saved imputed table to {}", path.display()));

    Ok(summary)
}

/// Write summary statistics, correlations and plots of the imputed table
pub fn visualize_data(config: &PipelineConfig) -> Result<Vec<PathBuf>> {
    let df = load_table(&config.imputed_table_path())?;
    let features = leading_feature_columns(&df, config.summary_features);
    let mut written = Vec::new();

    let summary_path = config.summary_path();
    let summary = render_summary(&df, &config.label_column, &features)?;
    std::fs::create_dir_all(&config.processed_dir).with_context(|| {
        format!("Failed to create directory: {}", config.processed_dir.display())
    })?;
    std::fs::write(&summary_path, summary)
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    print_success(&format!("Saved summary statistics to {}", summary_path.display()));
    written.push(summary_path);

    let spinner = create_spinner("Calculating correlations...");
    let corr = correlation_matrix(&df, &features)?;
    let correlations_path = config.correlations_path();
    std::fs::write(&correlations_path, render_correlations(&features, &corr))
        .with_context(|| format!("Failed to write {}", correlations_path.display()))?;
    finish_with_success(
        &spinner,
        &format!("Saved correlations to {}", correlations_path.display()),
    );
    written.push(correlations_path);

    if config.plots {
        let plots = write_visualizations(&df, &config.label_column, &features, &config.visual_dir())?;
        print_count("plot(s) written", plots.len(), None);
        written.extend(plots);
    }

    Ok(written)
}

/// Split the imputed table, train every selected model and evaluate it
pub fn evaluate_data(config: &PipelineConfig, rng: &mut dyn RngCore) -> Result<EvaluationReport> {
    let df = load_table(&config.imputed_table_path())?;

    let options = SplitOptions {
        test_size: config.test_size,
        min_test_samples: config.min_test_samples,
        standardize: config.standardize,
        warnings: config.warning_policy,
    };
    let split = split_and_prepare_data(&df, &config.label_column, &options, rng)?;
    print_info(&format!(
        "Split: {} train / {} test rows, {} features",
        split.y_train.len(),
        split.y_test.len(),
        split.feature_names.len()
    ));
    store_split_data(&split, &config.processed_dir)?;

    // Train on what was persisted so later stages see identical inputs
    let split = load_split_data(&config.processed_dir)?;
    let outcome = train_classification_models(
        &split.x_train,
        &split.y_train,
        &split.feature_names,
        &config.models,
        &config.models_dir,
        config.jobs,
        rng,
    )?;
    if outcome.trained.is_empty() {
        anyhow::bail!("No model could be trained");
    }

    let report = evaluate_models(
        &split.x_test,
        &split.y_test,
        &split.feature_names,
        &config.models_dir,
        &config.evaluation_dir,
        EvaluationOptions {
            plots: config.plots,
            bundle: config.bundle,
            warnings: config.warning_policy,
        },
    )?;
    display_metrics(&report);

    Ok(report)
}

/// Sweep two features through a persisted model and write the results
pub fn run_experiment(
    config: &PipelineConfig,
    experiment: &ExperimentConfig,
    kind: ModelKind,
) -> Result<ExperimentResults> {
    let split = load_split_data(&config.processed_dir)?;
    let model_path = config.models_dir.join(format!("{}.json", kind.name()));
    let model = TrainedModel::load(&model_path)
        .with_context(|| format!("No trained {} model; run the evaluate stage first", kind))?;

    let spinner = create_spinner(&format!(
        "Sweeping {} and {} through {}...",
        experiment.feature_a, experiment.feature_b, kind
    ));
    let results = conduct_feature_experiments(
        model.classifier(),
        &split.x_test,
        &split.feature_names,
        split.scaler.as_ref(),
        experiment,
    )?;
    finish_with_success(&spinner, "Feature experiments complete");

    print_info(&format!(
        "{}: pass probability range {:.4}",
        results.sweep_a.feature,
        results.sweep_a.range()
    ));
    print_info(&format!(
        "{}: pass probability range {:.4}",
        results.sweep_b.feature,
        results.sweep_b.range()
    ));
    print_info(&format!(
        "Interaction strength: {:.4}",
        results.interaction_strength()
    ));

    let written = write_experiment_outputs(&results, &config.experiment_dir(), config.plots)?;
    print_success(&format!(
        "Saved {} experiment output(s) to {}",
        written.len(),
        config.experiment_dir().display()
    ));

    Ok(results)
}
