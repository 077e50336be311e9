//! Column accessors for the observation table

use anyhow::Result;
use polars::prelude::*;

use crate::pipeline::{PipelineError, FEATURE_PREFIX};

/// Look up a column, mapping absence to [`PipelineError::ColumnNotFound`]
pub fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()).into())
}

/// Label values as signed integers (missing labels stay `None`)
pub fn label_values(df: &DataFrame, name: &str) -> Result<Vec<Option<i32>>> {
    let column = require_column(df, name)?.cast(&DataType::Int32)?;
    let values = column.as_materialized_series().i32()?.into_iter().collect();
    Ok(values)
}

/// Numeric column values as `f64`. Nulls and NaN both come back as `None`.
pub fn float_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = require_column(df, name)?.cast(&DataType::Float64)?;
    let values = column
        .as_materialized_series()
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Names of all measurement columns, in table order
pub fn feature_columns(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .filter(|name| name.starts_with(FEATURE_PREFIX))
        .map(|name| name.to_string())
        .collect()
}

/// Distinct values in order of first appearance, skipping missing entries
pub fn distinct_in_order<T: PartialEq + Copy>(values: &[Option<T>]) -> Vec<T> {
    let mut distinct: Vec<T> = Vec::new();
    for value in values.iter().flatten() {
        if !distinct.contains(value) {
            distinct.push(*value);
        }
    }
    distinct
}
