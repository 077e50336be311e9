//! Parquet persistence for tables passed between stages

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Write a table to Parquet, creating parent directories as needed
pub fn save_table(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    ParquetWriter::new(file)
        .finish(df)
        .with_context(|| format!("Failed to write Parquet file: {}", path.display()))?;

    Ok(())
}

/// Read a table previously written by [`save_table`]
pub fn load_table(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        anyhow::bail!("Artifact not found: {}", path.display());
    }

    LazyFrame::scan_parquet(path, Default::default())
        .with_context(|| format!("Failed to load Parquet file: {}", path.display()))?
        .collect()
        .with_context(|| format!("Failed to read Parquet file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_round_trip_preserves_nulls() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("table.parquet");

        let mut df = df! {
            "pass" => [-1i32, 1, -1],
            "feature_0" => [Some(1.5f64), None, Some(-2.0)],
        }
        .unwrap();

        save_table(&mut df, &path).unwrap();
        let loaded = load_table(&path).unwrap();

        assert!(loaded.equals_missing(&df));
    }

    #[test]
    fn test_missing_artifact_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.parquet");

        let err = load_table(&path).unwrap_err();
        assert!(err.to_string().contains("absent.parquet"));
    }
}
