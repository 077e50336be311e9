//! Raw SECOM file loading and label/feature joining

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::pipeline::{
    PipelineConfig, PipelineError, FEATURE_PREFIX, LABEL_COLUMN, TIMESTAMP_COLUMN,
};
use crate::utils::{create_spinner, finish_with_success};

/// Timestamp layout used by the label file
const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// One row of the label file
#[derive(Debug, Clone, PartialEq)]
pub struct LabelRecord {
    /// -1 for PASS, 1 for FAIL
    pub label: i32,
    pub timestamp: NaiveDateTime,
}

fn whitespace_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .quote(b'"')
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open input file: {}", path.display()))
}

fn malformed(path: &Path, line: u64, reason: impl Into<String>) -> PipelineError {
    PipelineError::MalformedRow {
        path: path.to_path_buf(),
        line,
        reason: reason.into(),
    }
}

/// Read the label file: a signed integer label and a quoted
/// `DD/MM/YYYY HH:MM:SS` timestamp per row, no header.
pub fn read_labels(path: &Path) -> Result<Vec<LabelRecord>> {
    let mut reader = whitespace_reader(path)?;
    let mut records = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Failed to read label row {} in {}", idx + 1, path.display()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();

        // An unquoted timestamp arrives as separate date and time tokens
        let (label, timestamp) = match fields.as_slice() {
            [label, timestamp] => (*label, timestamp.to_string()),
            [label, date, time] => (*label, format!("{} {}", date, time)),
            _ => {
                return Err(malformed(
                    path,
                    line,
                    format!("expected label and timestamp, found {} field(s)", fields.len()),
                )
                .into())
            }
        };

        let label: i32 = label
            .parse()
            .map_err(|_| malformed(path, line, format!("invalid label '{}'", label)))?;
        let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
            .map_err(|e| malformed(path, line, format!("invalid timestamp '{}': {}", timestamp, e)))?;

        records.push(LabelRecord { label, timestamp });
    }

    Ok(records)
}

/// Read the feature file: exactly `width` whitespace-separated measurements per
/// row, with `missing_token` marking an absent value.
pub fn read_features(path: &Path, width: usize, missing_token: &str) -> Result<Vec<Vec<Option<f64>>>> {
    let mut reader = whitespace_reader(path)?;
    let mut rows = Vec::new();

    for (idx, record) in reader.records().enumerate() {
        let record = record
            .with_context(|| format!("Failed to read feature row {} in {}", idx + 1, path.display()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 1);

        let mut row = Vec::with_capacity(width);
        for token in record.iter().filter(|f| !f.is_empty()) {
            if token == missing_token {
                row.push(None);
            } else {
                let value: f64 = token
                    .parse()
                    .map_err(|_| malformed(path, line, format!("invalid measurement '{}'", token)))?;
                // `NaN` and `inf` parse as floats but are not measurements
                row.push(value.is_finite().then_some(value));
            }
        }

        if row.len() != width {
            return Err(malformed(
                path,
                line,
                format!("expected {} measurements, found {}", width, row.len()),
            )
            .into());
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Name of the measurement column at `index`
pub fn feature_name(index: usize) -> String {
    format!("{}{}", FEATURE_PREFIX, index)
}

/// Join labels and measurements by row position into the observation table.
///
/// Columns: `pass` (Int32), `timestamp` (Datetime, ms) and one nullable
/// Float64 column per measurement.
pub fn join_observations(labels: &[LabelRecord], features: &[Vec<Option<f64>>]) -> Result<DataFrame> {
    if labels.len() != features.len() {
        return Err(PipelineError::RowCountMismatch {
            labels: labels.len(),
            features: features.len(),
        }
        .into());
    }

    let width = features.first().map(|row| row.len()).unwrap_or(0);
    let mut columns: Vec<Column> = Vec::with_capacity(width + 2);

    let label_values: Vec<i32> = labels.iter().map(|r| r.label).collect();
    columns.push(Column::new(LABEL_COLUMN.into(), label_values));

    let millis: Vec<i64> = labels
        .iter()
        .map(|r| r.timestamp.and_utc().timestamp_millis())
        .collect();
    let timestamps = Column::new(TIMESTAMP_COLUMN.into(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
    columns.push(timestamps);

    for col_idx in 0..width {
        let values: Vec<Option<f64>> = features.iter().map(|row| row[col_idx]).collect();
        columns.push(Column::new(feature_name(col_idx).into(), values));
    }

    DataFrame::new(columns).context("Failed to assemble observation table")
}

/// Load and join both raw files named in the configuration
pub fn load_observation_table(config: &PipelineConfig) -> Result<DataFrame> {
    let spinner = create_spinner("Reading label file...");
    let labels = read_labels(&config.labels_path)?;
    finish_with_success(&spinner, &format!("Read {} labels", labels.len()));

    let spinner = create_spinner("Reading feature file...");
    let features = read_features(
        &config.features_path,
        config.feature_count,
        &config.missing_token,
    )?;
    finish_with_success(
        &spinner,
        &format!("Read {} rows × {} measurements", features.len(), config.feature_count),
    );

    join_observations(&labels, &features)
}
