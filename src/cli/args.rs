//! Command-line argument definitions using clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::ModelKind;
use crate::pipeline::{FailurePolicy, PipelineConfig, WarningPolicy};
use crate::report::ExperimentConfig;

/// Waferflow - impute, explore and classify semiconductor wafer measurements
#[derive(Parser, Debug)]
#[command(name = "waferflow")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Label file: one `label "DD/MM/YYYY HH:MM:SS"` pair per row
    #[arg(long, global = true, default_value = "data_original/secom_labels.data")]
    pub labels: PathBuf,

    /// Feature file: whitespace-separated measurements, one row per wafer
    #[arg(long, global = true, default_value = "data_original/secom.data")]
    pub features: PathBuf,

    /// Number of measurements expected on every feature row
    #[arg(long, global = true, default_value = "590")]
    pub feature_count: usize,

    /// Token that marks a missing measurement
    #[arg(long, global = true, default_value = "NaN")]
    pub missing_token: String,

    /// Directory for the imputed table, statistics, plots and splits
    #[arg(long, global = true, default_value = "data_processed")]
    pub processed_dir: PathBuf,

    /// Directory for trained models
    #[arg(long, global = true, default_value = "models")]
    pub models_dir: PathBuf,

    /// Directory for evaluation and experiment outputs
    #[arg(long, global = true, default_value = "evaluation")]
    pub evaluation_dir: PathBuf,

    /// Seed for imputation draws, shuffling and ensemble training.
    /// Runs with the same seed produce identical artifacts.
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    /// Fraction of rows held out as the test set (0 < x < 1)
    #[arg(long, global = true, default_value = "0.2", value_parser = validate_test_size)]
    pub test_size: f64,

    /// Minimum number of rows in the test set
    #[arg(long, global = true, default_value = "30")]
    pub min_test_samples: usize,

    /// Skip feature standardization before training
    #[arg(long, global = true, default_value = "false")]
    pub no_standardize: bool,

    /// Skip writing SVG plots
    #[arg(long, global = true, default_value = "false")]
    pub no_plots: bool,

    /// Worker threads for ensemble training
    #[arg(short, long, global = true, default_value = "1")]
    pub jobs: usize,

    /// Abort on the first failing stage instead of continuing
    #[arg(long, global = true, default_value = "false")]
    pub strict: bool,

    /// Print stage warnings (dropped columns, unimputed slices, undefined precision)
    #[arg(long, global = true, default_value = "false")]
    pub warnings: bool,

    /// Models to train (comma-separated).
    /// Options: gradient_boosting, logistic_regression, random_forest, knn
    #[arg(
        long,
        global = true,
        value_delimiter = ',',
        default_value = "gradient_boosting,logistic_regression,random_forest,knn"
    )]
    pub models: Vec<ModelKind>,

    /// Number of leading features covered by summary statistics and plots
    #[arg(long, global = true, default_value = "4")]
    pub summary_features: usize,

    /// Package evaluation outputs into a zip archive
    #[arg(long, global = true, default_value = "false")]
    pub bundle: bool,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true, default_value = "false")]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run mung, visualize and evaluate in order (the default)
    Run,

    /// Load the raw files, impute missing values and save the table
    Mung,

    /// Write summary statistics, correlations and plots of the imputed table
    Visualize,

    /// Split the imputed table, train the selected models and evaluate them
    Evaluate,

    /// Sweep two features through a trained model
    Experiment {
        /// Trained model to probe
        #[arg(long, default_value = "random_forest")]
        model: ModelKind,

        /// First swept feature
        #[arg(long, default_value = "feature_516")]
        feature_a: String,

        /// Second swept feature
        #[arg(long, default_value = "feature_244")]
        feature_b: String,

        /// Points per sweep
        #[arg(long, default_value = "50")]
        steps: usize,
    },
}

impl Cli {
    /// The subcommand to run, with a bare invocation meaning `run`
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Run)
    }

    /// Build the pipeline configuration from the parsed flags
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            labels_path: self.labels.clone(),
            features_path: self.features.clone(),
            feature_count: self.feature_count,
            missing_token: self.missing_token.clone(),
            processed_dir: self.processed_dir.clone(),
            models_dir: self.models_dir.clone(),
            evaluation_dir: self.evaluation_dir.clone(),
            seed: self.seed,
            test_size: self.test_size,
            min_test_samples: self.min_test_samples,
            standardize: !self.no_standardize,
            plots: !self.no_plots,
            jobs: self.jobs,
            failure_policy: if self.strict {
                FailurePolicy::Strict
            } else {
                FailurePolicy::BestEffort
            },
            warning_policy: if self.warnings {
                WarningPolicy::Show
            } else {
                WarningPolicy::Suppress
            },
            models: self.models.clone(),
            summary_features: self.summary_features,
            bundle: self.bundle,
            ..PipelineConfig::default()
        }
    }
}

impl Commands {
    /// Experiment settings when this is the `experiment` subcommand
    pub fn experiment_config(&self) -> Option<(ModelKind, ExperimentConfig)> {
        match self {
            Commands::Experiment {
                model,
                feature_a,
                feature_b,
                steps,
            } => Some((
                *model,
                ExperimentConfig {
                    feature_a: feature_a.clone(),
                    feature_b: feature_b.clone(),
                    steps: *steps,
                },
            )),
            _ => None,
        }
    }
}

/// Validator for test_size parameter
fn validate_test_size(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!(
            "test_size must be between 0.0 and 1.0 (exclusive), got {}",
            value
        ))
    }
}
