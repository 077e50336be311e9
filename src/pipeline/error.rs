//! Error types for the wafer analytics pipeline.
//!
//! Most functions return `anyhow::Result` with context attached at the I/O
//! boundary. The variants here cover the failures a caller may want to match
//! on: malformed input rows, undersized datasets, model misuse, and missing
//! split artifacts.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by pipeline stages.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// A row in a raw input file could not be parsed.
    ///
    /// Covers wrong field counts, non-integer labels, unparseable timestamps
    /// and non-numeric measurements. Rows are never individually recovered.
    #[error("Malformed row {line} in {}: {reason}", path.display())]
    MalformedRow {
        /// File containing the row
        path: PathBuf,
        /// One-based line number
        line: u64,
        /// What was wrong with the row
        reason: String,
    },

    /// Label and feature files hold a different number of rows.
    #[error("Label file has {labels} rows but feature file has {features} rows")]
    RowCountMismatch { labels: usize, features: usize },

    /// A required column is absent from the observation table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Dataset has fewer rows than the requested split ratio needs.
    #[error(
        "Dataset too small. Need at least {required} samples to ensure {min_test} test samples \
         with test_size={test_size}, got {actual}"
    )]
    DatasetTooSmall {
        required: usize,
        actual: usize,
        min_test: usize,
        test_size: f64,
    },

    /// Test partition ended up below the minimum size.
    #[error(
        "Test set has {actual} samples. Minimum required is {minimum}. \
         Please provide more data or adjust test_size."
    )]
    TestSetTooSmall { actual: usize, minimum: usize },

    /// Configuration values are out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Training labels contain a single class.
    #[error("Training labels contain no samples of class {0}")]
    MissingClass(i32),

    /// A model was asked to predict before being fitted.
    #[error("Model '{0}' has not been fitted")]
    NotFitted(String),

    /// Prediction input has a different width than the training data.
    #[error("Feature mismatch: expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    /// The split directory written by the evaluation stage does not exist.
    #[error("Splits directory not found at {}", .0.display())]
    SplitArtifactsMissing(PathBuf),
}
