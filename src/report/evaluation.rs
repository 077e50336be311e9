//! Model evaluation on the held-out test split
//!
//! Metrics treat the passing class (`-1`) as positive. Undefined ratios
//! (zero denominators) evaluate to 0.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;
use faer::Mat;
use serde::{Deserialize, Serialize};

use super::plots::{bar_chart, grouped_bar_chart, heatmap, HeatmapScale};
use crate::models::{TrainedModel, FAIL_LABEL, MODEL_INFO_FILE, PASS_LABEL};
use crate::pipeline::{stage::warn, WarningPolicy};
use crate::utils::{print_error, print_info, print_warning};

/// Name of the CSV metrics summary inside the evaluation directory
pub const SUMMARY_FILE: &str = "summary.txt";
/// Name of the optional archive of evaluation outputs
pub const BUNDLE_FILE: &str = "evaluation_bundle.zip";

const TOP_FEATURES: usize = 20;

/// Prediction counts split by true class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub passed_correct: usize,
    pub passed_incorrect: usize,
    pub failed_correct: usize,
    pub failed_incorrect: usize,
}

impl ConfusionCounts {
    pub fn from_predictions(y_true: &[i32], y_pred: &[i32]) -> Self {
        let mut counts = Self::default();
        for (&t, &p) in y_true.iter().zip(y_pred) {
            match (t, p) {
                (PASS_LABEL, PASS_LABEL) => counts.passed_correct += 1,
                (PASS_LABEL, FAIL_LABEL) => counts.passed_incorrect += 1,
                (FAIL_LABEL, FAIL_LABEL) => counts.failed_correct += 1,
                (FAIL_LABEL, PASS_LABEL) => counts.failed_incorrect += 1,
                _ => {}
            }
        }
        counts
    }

    /// Rows are true pass/fail, columns predicted pass/fail
    pub fn as_grid(&self) -> Vec<Vec<f64>> {
        vec![
            vec![self.passed_correct as f64, self.passed_incorrect as f64],
            vec![self.failed_incorrect as f64, self.failed_correct as f64],
        ]
    }
}

/// One row of the evaluation summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub model_name: String,
    pub balanced_accuracy: f64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Score predictions against the truth with `-1` as the positive label
pub fn compute_metrics(model_name: &str, y_true: &[i32], y_pred: &[i32]) -> ModelMetrics {
    let c = ConfusionCounts::from_predictions(y_true, y_pred);

    // Positive class is a pass
    let tp = c.passed_correct;
    let fn_ = c.passed_incorrect;
    let fp = c.failed_incorrect;

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

    // Mean per-class recall over the classes present in the truth
    let mut recalls = Vec::new();
    if tp + fn_ > 0 {
        recalls.push(ratio(tp, tp + fn_));
    }
    if c.failed_correct + c.failed_incorrect > 0 {
        recalls.push(ratio(c.failed_correct, c.failed_correct + c.failed_incorrect));
    }
    let balanced_accuracy = if recalls.is_empty() {
        0.0
    } else {
        recalls.iter().sum::<f64>() / recalls.len() as f64
    };

    ModelMetrics {
        model_name: model_name.to_string(),
        balanced_accuracy,
        accuracy: ratio(correct, y_true.len()),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
        f1: ratio(2 * tp, 2 * tp + fp + fn_),
    }
}

/// Evaluation result for one model
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    pub metrics: ModelMetrics,
    pub confusion: ConfusionCounts,
    /// (feature, importance) sorted by decreasing importance
    pub top_features: Vec<(String, f64)>,
}

/// Output of [`evaluate_models`]
#[derive(Debug, Default)]
pub struct EvaluationReport {
    pub evaluations: Vec<ModelEvaluation>,
    /// Models that failed to load or predict, with the rendered error
    pub failures: Vec<(String, String)>,
    pub summary_path: Option<PathBuf>,
    pub plot_paths: Vec<PathBuf>,
    pub bundle_path: Option<PathBuf>,
}

impl EvaluationReport {
    pub fn metrics(&self) -> Vec<ModelMetrics> {
        self.evaluations.iter().map(|e| e.metrics.clone()).collect()
    }
}

/// Options for [`evaluate_models`]
#[derive(Debug, Clone, Copy)]
pub struct EvaluationOptions {
    pub plots: bool,
    pub bundle: bool,
    pub warnings: WarningPolicy,
}

/// Persisted model files in `models_dir`, sorted by name
pub fn discover_models(models_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(models_dir)
        .with_context(|| format!("Failed to read models directory: {}", models_dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension().and_then(|e| e.to_str()) == Some("json")
                && path.file_name().and_then(|n| n.to_str()) != Some(MODEL_INFO_FILE)
        })
        .collect();
    paths.sort();
    Ok(paths)
}

fn model_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("model")
        .to_string()
}

fn evaluate_one(
    path: &Path,
    x_test: &Mat<f64>,
    y_test: &[i32],
    feature_names: &[String],
) -> Result<ModelEvaluation> {
    let model = TrainedModel::load(path)?;
    let classifier = model.classifier();
    let y_pred = classifier
        .predict(x_test)
        .with_context(|| format!("Prediction failed for {}", path.display()))?;

    let name = model_stem(path);
    let mut top_features: Vec<(String, f64)> = classifier
        .feature_importance()
        .map(|values| feature_names.iter().cloned().zip(values).collect())
        .unwrap_or_default();
    top_features.sort_by(|a, b| b.1.total_cmp(&a.1));
    top_features.truncate(TOP_FEATURES);

    Ok(ModelEvaluation {
        metrics: compute_metrics(&name, y_test, &y_pred),
        confusion: ConfusionCounts::from_predictions(y_test, &y_pred),
        top_features,
    })
}

/// Evaluate every persisted model in `models_dir` on the test split.
///
/// A model that fails to load or predict is reported and skipped. Failing to
/// write the summary or a plot is a warning.
pub fn evaluate_models(
    x_test: &Mat<f64>,
    y_test: &[i32],
    feature_names: &[String],
    models_dir: &Path,
    evaluation_dir: &Path,
    options: EvaluationOptions,
) -> Result<EvaluationReport> {
    std::fs::create_dir_all(evaluation_dir)
        .with_context(|| format!("Failed to create directory: {}", evaluation_dir.display()))?;

    let mut report = EvaluationReport::default();
    for path in discover_models(models_dir)? {
        let name = model_stem(&path);
        match evaluate_one(&path, x_test, y_test, feature_names) {
            Ok(evaluation) => {
                print_confusion(&name, &evaluation.confusion);
                let c = &evaluation.confusion;
                if c.passed_correct + c.failed_incorrect == 0 {
                    warn(
                        options.warnings,
                        &format!("{}: no passes predicted, precision is ill-defined and set to 0", name),
                    );
                }
                report.evaluations.push(evaluation);
            }
            Err(err) => {
                print_error(&format!("Error evaluating {}: {:#}", name, err));
                report.failures.push((name, format!("{:#}", err)));
            }
        }
    }

    let summary_path = evaluation_dir.join(SUMMARY_FILE);
    match write_summary_csv(&report.metrics(), &summary_path) {
        Ok(()) => report.summary_path = Some(summary_path),
        Err(err) => print_warning(&format!("Could not save evaluation results: {:#}", err)),
    }

    if options.plots {
        report.plot_paths = write_evaluation_plots(&report.evaluations, evaluation_dir);
    }

    if options.bundle {
        let mut files: Vec<PathBuf> = report.summary_path.iter().cloned().collect();
        files.extend(report.plot_paths.iter().cloned());
        let bundle_path = evaluation_dir.join(BUNDLE_FILE);
        match package_evaluation_outputs(&files, &bundle_path) {
            Ok(()) => report.bundle_path = Some(bundle_path),
            Err(err) => print_warning(&format!("Could not bundle evaluation outputs: {:#}", err)),
        }
    }

    Ok(report)
}

fn print_confusion(name: &str, c: &ConfusionCounts) {
    println!();
    println!("    {} {}", style("Model:").cyan().bold(), style(name).white().bold());
    println!("      Correctly predicted passes (-1): {}", c.passed_correct);
    println!("      Incorrectly predicted passes: {}", c.passed_incorrect);
    println!("      Correctly predicted failures (1): {}", c.failed_correct);
    println!("      Incorrectly predicted failures: {}", c.failed_incorrect);
}

/// Write metrics as CSV with a header row
pub fn write_summary_csv(metrics: &[ModelMetrics], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    if metrics.is_empty() {
        writer.write_record(["model_name", "balanced_accuracy", "accuracy", "precision", "recall", "f1"])?;
    }
    for row in metrics {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_summary_csv(path: &Path) -> Result<Vec<ModelMetrics>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    reader
        .deserialize()
        .collect::<Result<Vec<ModelMetrics>, _>>()
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn write_evaluation_plots(evaluations: &[ModelEvaluation], evaluation_dir: &Path) -> Vec<PathBuf> {
    let plots_dir = evaluation_dir.join("plots");
    if let Err(err) = std::fs::create_dir_all(&plots_dir) {
        print_warning(&format!("Could not create {}: {}", plots_dir.display(), err));
        return Vec::new();
    }

    let mut written = Vec::new();
    let mut record = |path: PathBuf, result: Result<()>| match result {
        Ok(()) => written.push(path),
        Err(err) => print_warning(&format!("Could not write {}: {:#}", path.display(), err)),
    };

    let class_labels = vec!["-1 (Pass)".to_string(), "1 (Fail)".to_string()];
    for evaluation in evaluations {
        let name = &evaluation.metrics.model_name;

        let path = plots_dir.join(format!("{}_confusion_matrix.svg", name));
        let result = heatmap(
            &path,
            &format!("Confusion Matrix - {}", name),
            &class_labels,
            &class_labels,
            &evaluation.confusion.as_grid(),
            HeatmapScale::Sequential,
            true,
        );
        record(path, result);

        if !evaluation.top_features.is_empty() {
            let path = plots_dir.join(format!("{}_feature_importance.svg", name));
            let result = bar_chart(
                &path,
                &format!("Top {} Feature Importances - {}", evaluation.top_features.len(), name),
                "Importance",
                &evaluation.top_features,
            );
            record(path, result);
        }
    }

    if !evaluations.is_empty() {
        let groups: Vec<String> = evaluations.iter().map(|e| e.metrics.model_name.clone()).collect();
        let pick = |f: fn(&ModelMetrics) -> f64| -> Vec<f64> {
            evaluations.iter().map(|e| f(&e.metrics)).collect()
        };
        let series = vec![
            ("Balanced accuracy".to_string(), pick(|m| m.balanced_accuracy)),
            ("Accuracy".to_string(), pick(|m| m.accuracy)),
            ("Precision".to_string(), pick(|m| m.precision)),
            ("Recall".to_string(), pick(|m| m.recall)),
            ("F1".to_string(), pick(|m| m.f1)),
        ];
        let path = plots_dir.join("model_comparison.svg");
        let result = grouped_bar_chart(&path, "Model Comparison", &groups, &series);
        record(path, result);
    }

    written
}

/// Package evaluation outputs into a zip archive. Originals are kept.
pub fn package_evaluation_outputs(files: &[PathBuf], zip_path: &Path) -> Result<()> {
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    let zip_file = std::fs::File::create(zip_path)
        .with_context(|| format!("Failed to create zip file: {}", zip_path.display()))?;

    let mut zip = ZipWriter::new(zip_file);
    let options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Invalid file name: {}", path.display()))?;
        let entry = if path.parent().and_then(|p| p.file_name()).and_then(|n| n.to_str()) == Some("plots") {
            format!("plots/{}", filename)
        } else {
            filename.to_string()
        };
        zip.start_file(entry.as_str(), options)
            .with_context(|| format!("Failed to add {} to zip", entry))?;
        let mut content = Vec::new();
        std::fs::File::open(path)
            .with_context(|| format!("Failed to open file: {}", path.display()))?
            .read_to_end(&mut content)?;
        zip.write_all(&content)?;
    }

    zip.finish().context("Failed to finalize zip file")?;
    Ok(())
}

/// Print the metrics table
pub fn display_metrics(report: &EvaluationReport) {
    println!();
    println!(
        "    {} {}",
        style("📈").cyan(),
        style("EVALUATION SUMMARY").white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());

    if report.evaluations.is_empty() {
        print_info("No models were evaluated");
        return;
    }

    let best = report
        .evaluations
        .iter()
        .map(|e| e.metrics.balanced_accuracy)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(
        ["Model", "Balanced Acc", "Accuracy", "Precision", "Recall", "F1"]
            .iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
    );
    for evaluation in &report.evaluations {
        let m = &evaluation.metrics;
        let highlight = if m.balanced_accuracy == best { Color::Green } else { Color::White };
        table.add_row(vec![
            Cell::new(&m.model_name),
            Cell::new(format!("{:.4}", m.balanced_accuracy)).fg(highlight),
            Cell::new(format!("{:.4}", m.accuracy)),
            Cell::new(format!("{:.4}", m.precision)),
            Cell::new(format!("{:.4}", m.recall)),
            Cell::new(format!("{:.4}", m.f1)),
        ]);
    }

    for line in table.to_string().lines() {
        println!("    {}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_counts() {
        let y_true = [-1, -1, -1, 1, 1];
        let y_pred = [-1, 1, -1, 1, -1];
        let c = ConfusionCounts::from_predictions(&y_true, &y_pred);
        assert_eq!(c.passed_correct, 2);
        assert_eq!(c.passed_incorrect, 1);
        assert_eq!(c.failed_correct, 1);
        assert_eq!(c.failed_incorrect, 1);
    }

    #[test]
    fn test_metrics_pass_is_positive() {
        let y_true = [-1, -1, -1, 1, 1];
        let y_pred = [-1, 1, -1, 1, -1];
        let m = compute_metrics("m", &y_true, &y_pred);

        assert!((m.accuracy - 0.6).abs() < 1e-12);
        // tp = 2, fp = 1, fn = 1
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.balanced_accuracy - (2.0 / 3.0 + 0.5) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_division_yields_zero() {
        // Never predicts a pass
        let m = compute_metrics("m", &[-1, 1], &[1, 1]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1, 0.0);
        assert!((m.balanced_accuracy - 0.5).abs() < 1e-12);
    }
}
