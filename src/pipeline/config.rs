//! Pipeline configuration and artifact locations

use std::path::PathBuf;

use crate::models::ModelKind;
use crate::pipeline::PipelineError;

/// Name of the label column in the observation table
pub const LABEL_COLUMN: &str = "pass";

/// Name of the timestamp column in the observation table
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Prefix shared by every measurement column
pub const FEATURE_PREFIX: &str = "feature_";

/// How a failing stage affects the rest of the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report the failure and continue with the next stage
    #[default]
    BestEffort,
    /// Abort the run on the first failing stage
    Strict,
}

/// Whether stage warnings are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WarningPolicy {
    #[default]
    Suppress,
    Show,
}

/// Complete configuration for a pipeline run.
///
/// Defaults reproduce the fixed relative paths and constants of the
/// reference workflow, so `PipelineConfig::default()` run from the project
/// root behaves like the plain `waferflow` invocation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Label source file (label + timestamp per row)
    pub labels_path: PathBuf,
    /// Feature source file (fixed-width numeric rows)
    pub features_path: PathBuf,
    /// Number of measurements per feature row
    pub feature_count: usize,
    /// Token marking a missing measurement
    pub missing_token: String,
    /// Directory for the imputed table, statistics, plots and splits
    pub processed_dir: PathBuf,
    /// Directory for trained model artifacts
    pub models_dir: PathBuf,
    /// Directory for evaluation outputs
    pub evaluation_dir: PathBuf,
    /// Label column name
    pub label_column: String,
    /// Seed for the shared random generator (entropy when absent)
    pub seed: Option<u64>,
    /// Fraction of rows held out for testing
    pub test_size: f64,
    /// Minimum number of test rows
    pub min_test_samples: usize,
    /// Fit and store a standard scaler on the training split
    pub standardize: bool,
    /// Write SVG plots
    pub plots: bool,
    /// Worker threads available to ensemble training
    pub jobs: usize,
    pub failure_policy: FailurePolicy,
    pub warning_policy: WarningPolicy,
    /// Classifiers trained by the evaluation stage
    pub models: Vec<ModelKind>,
    /// Number of leading features covered by summary statistics and plots
    pub summary_features: usize,
    /// Package evaluation outputs into a zip archive
    pub bundle: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            labels_path: PathBuf::from("data_original").join("secom_labels.data"),
            features_path: PathBuf::from("data_original").join("secom.data"),
            feature_count: 590,
            missing_token: "NaN".to_string(),
            processed_dir: PathBuf::from("data_processed"),
            models_dir: PathBuf::from("models"),
            evaluation_dir: PathBuf::from("evaluation"),
            label_column: LABEL_COLUMN.to_string(),
            seed: None,
            test_size: 0.2,
            min_test_samples: 30,
            standardize: true,
            plots: true,
            jobs: 1,
            failure_policy: FailurePolicy::default(),
            warning_policy: WarningPolicy::default(),
            models: ModelKind::all().to_vec(),
            summary_features: 4,
            bundle: false,
        }
    }
}

impl PipelineConfig {
    /// Create a configuration rooted at `root` with every other value defaulted.
    ///
    /// Input files are expected under `root/data_original`, and all outputs land
    /// under `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        Self {
            labels_path: root.join(&defaults.labels_path),
            features_path: root.join(&defaults.features_path),
            processed_dir: root.join(&defaults.processed_dir),
            models_dir: root.join(&defaults.models_dir),
            evaluation_dir: root.join(&defaults.evaluation_dir),
            ..defaults
        }
    }

    /// Check value ranges that clap cannot express
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_size must be between 0 and 1 (exclusive), got {}",
                self.test_size
            )));
        }
        if self.feature_count == 0 {
            return Err(PipelineError::InvalidConfig(
                "feature_count must be at least 1".to_string(),
            ));
        }
        if self.jobs == 0 {
            return Err(PipelineError::InvalidConfig(
                "jobs must be at least 1".to_string(),
            ));
        }
        if self.models.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one model must be selected".to_string(),
            ));
        }
        Ok(())
    }

    /// Persisted imputed observation table
    pub fn imputed_table_path(&self) -> PathBuf {
        self.processed_dir
            .join("serialized")
            .join("secom_output.parquet")
    }

    pub fn summary_path(&self) -> PathBuf {
        self.processed_dir.join("summary.txt")
    }

    pub fn correlations_path(&self) -> PathBuf {
        self.processed_dir.join("correlations.txt")
    }

    /// Directory for scatter and histogram plots of the imputed table
    pub fn visual_dir(&self) -> PathBuf {
        self.processed_dir.join("plots")
    }

    /// Directory for experiment outputs
    pub fn experiment_dir(&self) -> PathBuf {
        self.evaluation_dir.join("experiment_results")
    }
}
