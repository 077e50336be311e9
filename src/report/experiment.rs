//! Feature sweep experiments on a trained model
//!
//! Two features are swept over their test-set range while every other
//! feature is held at its test-set median, first one at a time and then
//! jointly. Sweeps run in the model's input space (already standardized
//! when a scaler was fitted); reported values are mapped back to original
//! units through the scaler.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use faer::Mat;

use super::plots::{heatmap, line_panels, HeatmapScale, LinePanel};
use crate::models::Classifier;
use crate::pipeline::imputer::median;
use crate::pipeline::scaler::StandardScaler;
use crate::pipeline::PipelineError;
use crate::utils::print_warning;

pub const EXPERIMENT_SUMMARY_FILE: &str = "experiment_summary.txt";

/// Features and resolution of an experiment
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    pub feature_a: String,
    pub feature_b: String,
    /// Points per sweep
    pub steps: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            feature_a: "feature_516".to_string(),
            feature_b: "feature_244".to_string(),
            steps: 50,
        }
    }
}

/// `steps` evenly spaced values from `start` to `end` inclusive
pub fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (steps - 1) as f64;
            (0..steps).map(|i| start + step * i as f64).collect()
        }
    }
}

/// Pass probabilities along one feature
#[derive(Debug, Clone)]
pub struct FeatureSweep {
    pub feature: String,
    /// Sweep values in original units
    pub values: Vec<f64>,
    pub pass_probability: Vec<f64>,
}

impl FeatureSweep {
    pub fn min_effect(&self) -> f64 {
        self.pass_probability.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_effect(&self) -> f64 {
        self.pass_probability.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn range(&self) -> f64 {
        self.max_effect() - self.min_effect()
    }

    /// Value with the highest pass probability (first on ties)
    pub fn strongest_value(&self) -> f64 {
        let mut best = 0;
        for (i, p) in self.pass_probability.iter().enumerate() {
            if *p > self.pass_probability[best] {
                best = i;
            }
        }
        self.values.get(best).copied().unwrap_or(f64::NAN)
    }
}

/// Results of all three experiments
#[derive(Debug, Clone)]
pub struct ExperimentResults {
    pub sweep_a: FeatureSweep,
    pub sweep_b: FeatureSweep,
    /// `joint[i][j]`: pass probability at value `i` of feature a and `j` of feature b
    pub joint: Vec<Vec<f64>>,
}

impl ExperimentResults {
    pub fn combined_min(&self) -> f64 {
        self.joint.iter().flatten().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn combined_max(&self) -> f64 {
        self.joint.iter().flatten().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn combined_range(&self) -> f64 {
        self.combined_max() - self.combined_min()
    }

    /// Joint range beyond the larger single-feature range
    pub fn interaction_strength(&self) -> f64 {
        self.combined_range() - self.sweep_a.range().max(self.sweep_b.range())
    }
}

fn column_index(feature_names: &[String], name: &str) -> Result<usize, PipelineError> {
    feature_names
        .iter()
        .position(|f| f == name)
        .ok_or_else(|| PipelineError::ColumnNotFound(name.to_string()))
}

fn pass_probabilities(model: &dyn Classifier, points: &Mat<f64>) -> Result<Vec<f64>> {
    Ok(model
        .predict_proba(points)?
        .into_iter()
        .map(|fail| 1.0 - fail)
        .collect())
}

/// Run the three sweeps against `model`
pub fn conduct_feature_experiments(
    model: &dyn Classifier,
    x_test: &Mat<f64>,
    feature_names: &[String],
    scaler: Option<&StandardScaler>,
    config: &ExperimentConfig,
) -> Result<ExperimentResults> {
    if x_test.nrows() == 0 {
        anyhow::bail!("Cannot run feature experiments on an empty test set");
    }
    if config.steps == 0 {
        anyhow::bail!("Experiment needs at least one step per sweep");
    }
    let a = column_index(feature_names, &config.feature_a)?;
    let b = column_index(feature_names, &config.feature_b)?;
    let p = x_test.ncols();

    let base: Vec<f64> = (0..p)
        .map(|j| {
            let mut column: Vec<f64> = (0..x_test.nrows()).map(|i| x_test[(i, j)]).collect();
            median(&mut column).unwrap_or(0.0)
        })
        .collect();
    let range_of = |j: usize| {
        let column = (0..x_test.nrows()).map(|i| x_test[(i, j)]);
        let (lo, hi) = column.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        linspace(lo, hi, config.steps)
    };
    let grid_a = range_of(a);
    let grid_b = range_of(b);

    let to_original = |j: usize, v: f64| scaler.map_or(v, |s| s.inverse_value(j, v));

    let sweep = |j: usize, grid: &[f64]| -> Result<FeatureSweep> {
        let points = Mat::from_fn(grid.len(), p, |i, k| if k == j { grid[i] } else { base[k] });
        Ok(FeatureSweep {
            feature: feature_names[j].clone(),
            values: grid.iter().map(|&v| to_original(j, v)).collect(),
            pass_probability: pass_probabilities(model, &points)?,
        })
    };
    let sweep_a = sweep(a, &grid_a).context("Sweep over first feature failed")?;
    let sweep_b = sweep(b, &grid_b).context("Sweep over second feature failed")?;

    let n_b = grid_b.len();
    let joint_points = Mat::from_fn(grid_a.len() * n_b, p, |row, k| {
        if k == a {
            grid_a[row / n_b]
        } else if k == b {
            grid_b[row % n_b]
        } else {
            base[k]
        }
    });
    let flat = pass_probabilities(model, &joint_points).context("Joint sweep failed")?;
    let joint = flat.chunks(n_b).map(|row| row.to_vec()).collect();

    Ok(ExperimentResults {
        sweep_a,
        sweep_b,
        joint,
    })
}

/// Render the experiment summary text
pub fn render_experiment_summary(results: &ExperimentResults, timestamp: &str) -> String {
    let rule = "=".repeat(80);
    let thin = "-".repeat(80);
    let mut out = String::new();

    let _ = writeln!(out, "FEATURE EXPERIMENTATION SUMMARY");
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Experiment Date: {}", timestamp);
    let _ = writeln!(out, "{}\n", rule);

    for (n, sweep) in [(1, &results.sweep_a), (2, &results.sweep_b)] {
        let _ = writeln!(out, "EXPERIMENT {}: VARYING {}", n, sweep.feature.to_uppercase());
        let _ = writeln!(out, "{}", thin);
        let _ = writeln!(out, "Minimum Pass Probability: {:.3}", sweep.min_effect());
        let _ = writeln!(out, "Maximum Pass Probability: {:.3}", sweep.max_effect());
        let _ = writeln!(out, "Effect Range: {:.3}", sweep.range());
        let _ = writeln!(out, "Analysis:");
        let _ = writeln!(
            out,
            "  -> {} can swing predictions by {:.1}%",
            sweep.feature,
            sweep.range() * 100.0
        );
        let _ = writeln!(
            out,
            "  -> Strongest positive effect at value {:.2}",
            sweep.strongest_value()
        );
        let _ = writeln!(out, "\n{}\n", rule);
    }

    let _ = writeln!(out, "EXPERIMENT 3: VARYING BOTH FEATURES");
    let _ = writeln!(out, "{}", thin);
    let _ = writeln!(out, "Minimum Combined Pass Probability: {:.3}", results.combined_min());
    let _ = writeln!(out, "Maximum Combined Pass Probability: {:.3}", results.combined_max());
    let _ = writeln!(out, "Combined Effect Range: {:.3}", results.combined_range());
    let _ = writeln!(out, "Analysis:");
    let _ = writeln!(
        out,
        "  -> Combined features can swing predictions by {:.1}%",
        results.combined_range() * 100.0
    );
    let _ = writeln!(
        out,
        "  -> Interaction strength: {:.1}% additional effect",
        results.interaction_strength() * 100.0
    );
    let _ = write!(out, "\n{}\n", rule);

    out
}

/// Write the summary and, when `plots` is set, the sweep charts to `output_dir`
pub fn write_experiment_outputs(
    results: &ExperimentResults,
    output_dir: &Path,
    plots: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let summary_path = output_dir.join(EXPERIMENT_SUMMARY_FILE);
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    std::fs::write(&summary_path, render_experiment_summary(results, &timestamp))
        .with_context(|| format!("Failed to write {}", summary_path.display()))?;
    let mut written = vec![summary_path];

    if plots {
        let panel = |sweep: &FeatureSweep| LinePanel {
            title: format!("{} Impact on Pass Probability", sweep.feature),
            x_label: format!("{} Value", sweep.feature),
            y_label: "Pass Probability".to_string(),
            points: sweep
                .values
                .iter()
                .copied()
                .zip(sweep.pass_probability.iter().copied())
                .collect(),
        };
        let impacts = output_dir.join("individual_feature_impacts.svg");
        match line_panels(&impacts, &[panel(&results.sweep_a), panel(&results.sweep_b)]) {
            Ok(()) => written.push(impacts),
            Err(err) => print_warning(&format!("Could not write {}: {:#}", impacts.display(), err)),
        }

        let labels = |sweep: &FeatureSweep| -> Vec<String> {
            sweep.values.iter().map(|v| format!("{:.2}", v)).collect()
        };
        let interaction = output_dir.join("feature_interaction_heatmap.svg");
        match heatmap(
            &interaction,
            &format!(
                "Combined Impact on Pass Probability ({} vs {})",
                results.sweep_a.feature, results.sweep_b.feature
            ),
            &labels(&results.sweep_a),
            &labels(&results.sweep_b),
            &results.joint,
            HeatmapScale::Diverging,
            false,
        ) {
            Ok(()) => written.push(interaction),
            Err(err) => print_warning(&format!("Could not write {}: {:#}", interaction.display(), err)),
        }
    }

    Ok(written)
}
