//! Text summaries and charts of the imputed observation table

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;
use faer::Mat;
use polars::prelude::*;

use super::plots::{bar_chart, file_stem, scatter_plot};
use crate::models::{FAIL_LABEL, PASS_LABEL};
use crate::pipeline::statistics::{qualitative_summary, quantitative_summary};
use crate::pipeline::table::float_values;
use crate::utils::print_warning;

fn section_rule() -> String {
    format!("\n{}\n", "-".repeat(40))
}

/// Float rendering that keeps a trailing `.0` on whole numbers
pub fn format_value(value: Option<f64>) -> String {
    match value {
        None => "nan".to_string(),
        Some(v) if v.is_nan() => "nan".to_string(),
        Some(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => format!("{:.1}", v),
        Some(v) => format!("{}", v),
    }
}

fn join_categories(categories: &[i32]) -> String {
    categories
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Qualitative statistics of the label column followed by min/max/median
/// of each listed feature
pub fn render_summary(df: &DataFrame, label_column: &str, features: &[String]) -> Result<String> {
    let qualitative = qualitative_summary(df, label_column)?;

    let mut out = section_rule();
    out.push_str("Qualitative Statistics:\n");
    let _ = write!(
        out,
        "\nFeature: `{}` - Summary Statistics\n\
         Number of Categories: {}\n\
         Most Frequent: {}\n\
         Least Frequent: {}\n",
        qualitative.column,
        qualitative.num_categories(),
        join_categories(&qualitative.most_frequent),
        join_categories(&qualitative.least_frequent)
    );
    out.push_str(&section_rule());

    out.push_str("Quantitative Statistics:\n");
    for feature in features {
        let q = quantitative_summary(df, feature)?;
        let _ = write!(
            out,
            "\nFeature: `{}` - Summary Statistics\nMin: {}\nMax: {}\nMedian: {}\n",
            q.column,
            format_value(q.min),
            format_value(q.max),
            format_value(q.median)
        );
    }

    Ok(out)
}

/// Lower-triangular correlation table, four decimals, upper triangle blank
pub fn render_correlations(names: &[String], corr: &Mat<f64>) -> String {
    let cell = |v: f64| {
        if v.is_nan() {
            "NaN".to_string()
        } else {
            format!("{:.4}", v)
        }
    };

    let label_width = names.iter().map(|n| n.len()).max().unwrap_or(0);
    let widths: Vec<usize> = (0..names.len())
        .map(|j| {
            (j..names.len())
                .map(|i| cell(corr[(i, j)]).len())
                .chain(std::iter::once(names[j].len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    let _ = write!(out, "{:label_width$}", "");
    for (name, w) in names.iter().zip(&widths) {
        let _ = write!(out, "  {:>w$}", name, w = *w);
    }
    out.push('\n');

    for (i, row_name) in names.iter().enumerate() {
        let _ = write!(out, "{:<label_width$}", row_name);
        for (j, w) in widths.iter().enumerate() {
            let text = if j <= i { cell(corr[(i, j)]) } else { String::new() };
            let _ = write!(out, "  {:>w$}", text, w = *w);
        }
        out.push('\n');
    }

    out
}

/// Scatter plots for every pair of `features` plus a pass/fail bar chart.
///
/// Returns the files written; a chart that fails to render is a warning.
pub fn write_visualizations(
    df: &DataFrame,
    label_column: &str,
    features: &[String],
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    let columns: Vec<Vec<Option<f64>>> = features
        .iter()
        .map(|f| float_values(df, f))
        .collect::<Result<_>>()?;

    for i in 0..features.len() {
        for j in (i + 1)..features.len() {
            let title = format!("{} vs {}", features[i], features[j]);
            let points: Vec<(f64, f64)> = columns[i]
                .iter()
                .zip(&columns[j])
                .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
                .collect();
            let path = output_dir.join(format!("{}.svg", file_stem(&title)));
            match scatter_plot(&path, &title, &features[i], &features[j], &points) {
                Ok(()) => written.push(path),
                Err(err) => print_warning(&format!("Could not write {}: {:#}", path.display(), err)),
            }
        }
    }

    let labels = qualitative_summary(df, label_column)?;
    let title = "Number of wafers Passed vs Failed";
    let bars = vec![
        ("-1 (Pass)".to_string(), labels.count_of(PASS_LABEL) as f64),
        ("1 (Fail)".to_string(), labels.count_of(FAIL_LABEL) as f64),
    ];
    let path = output_dir.join(format!("{}.svg", file_stem(title)));
    match bar_chart(&path, title, "Number of wafers", &bars) {
        Ok(()) => written.push(path),
        Err(err) => print_warning(&format!("Could not write {}: {:#}", path.display(), err)),
    }

    Ok(written)
}
