//! SVG charts for the visualization, evaluation and experiment stages

use std::path::Path;

use anyhow::Result;
use plotters::prelude::*;

const SIZE: (u32, u32) = (900, 650);
const FONT: &str = "sans-serif";

/// Padded axis range covering all finite values
fn axis_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (min, max) = values
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !min.is_finite() {
        return 0.0..1.0;
    }
    let pad = if max > min { (max - min) * 0.05 } else { 0.5 };
    (min - pad)..(max + pad)
}

/// File-system safe stem for a chart title
pub fn file_stem(title: &str) -> String {
    title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect::<String>()
        .split('_')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Scatter plot of paired values
pub fn scatter_plot(path: &Path, title: &str, x_label: &str, y_label: &str, points: &[(f64, f64)]) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(60)
        .build_cartesian_2d(
            axis_range(points.iter().map(|p| p.0)),
            axis_range(points.iter().map(|p| p.1)),
        )?;
    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()?;
    chart.draw_series(
        points
            .iter()
            .filter(|(x, y)| x.is_finite() && y.is_finite())
            .map(|&(x, y)| Circle::new((x, y), 2, BLUE.mix(0.6).filled())),
    )?;

    root.present()?;
    Ok(())
}

/// Vertical bar chart with one labelled bar per entry
pub fn bar_chart(path: &Path, title: &str, y_label: &str, bars: &[(String, f64)]) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let n = bars.len().max(1) as u32;
    let top = bars.iter().map(|b| b.1).fold(0.0, f64::max).max(f64::MIN_POSITIVE) * 1.1;
    let labels: Vec<String> = bars.iter().map(|b| b.0.clone()).collect();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d((0u32..n).into_segmented(), 0f64..top)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_label)
        .x_labels(bars.len().max(1))
        .x_label_formatter(&|v| match v {
            SegmentValue::CenterOf(i) => labels.get(*i as usize).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;
    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        let i = i as u32;
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
            Palette99::pick(i as usize).filled(),
        );
        bar.set_margin(0, 0, 8, 8);
        bar
    }))?;

    root.present()?;
    Ok(())
}

/// Bars grouped by category, one colour per series
pub fn grouped_bar_chart(
    path: &Path,
    title: &str,
    groups: &[String],
    series: &[(String, Vec<f64>)],
) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let n_groups = groups.len().max(1);
    let n_series = series.len().max(1) as f64;
    let group_labels = groups.to_vec();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(n_groups as f64 - 0.5), 0f64..1.05f64)?;
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_groups)
        .x_label_formatter(&|x| {
            let idx = x.round();
            if (x - idx).abs() < 1e-6 && idx >= 0.0 {
                group_labels.get(idx as usize).cloned().unwrap_or_default()
            } else {
                String::new()
            }
        })
        .y_desc("Score")
        .draw()?;

    let width = 0.8 / n_series;
    for (s, (name, values)) in series.iter().enumerate() {
        let color = Palette99::pick(s).to_rgba();
        chart
            .draw_series(values.iter().enumerate().map(|(g, v)| {
                let left = g as f64 - 0.4 + s as f64 * width;
                Rectangle::new([(left, 0.0), (left + width, *v)], color.filled())
            }))?
            .label(name.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn lerp_color(a: (f64, f64, f64), b: (f64, f64, f64), u: f64) -> RGBColor {
    RGBColor(
        (a.0 + u * (b.0 - a.0)) as u8,
        (a.1 + u * (b.1 - a.1)) as u8,
        (a.2 + u * (b.2 - a.2)) as u8,
    )
}

/// Map `t` in [0, 1] onto a red-yellow-green scale
fn diverging_color(t: f64) -> RGBColor {
    const RED: (f64, f64, f64) = (215.0, 48.0, 39.0);
    const YELLOW: (f64, f64, f64) = (255.0, 255.0, 191.0);
    const GREEN: (f64, f64, f64) = (26.0, 152.0, 80.0);

    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.5 };
    if t < 0.5 {
        lerp_color(RED, YELLOW, t / 0.5)
    } else {
        lerp_color(YELLOW, GREEN, (t - 0.5) / 0.5)
    }
}

/// Map `t` in [0, 1] onto a white-to-blue scale
fn sequential_color(t: f64) -> RGBColor {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    lerp_color((247.0, 251.0, 255.0), (8.0, 48.0, 107.0), t)
}

/// Colour scheme for [`heatmap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatmapScale {
    /// White to blue, scaled to the largest cell (counts)
    Sequential,
    /// Red to green over [0, 1] (probabilities)
    Diverging,
}

/// Grid heatmap; `values[row][col]`, with row 0 drawn at the top
pub fn heatmap(
    path: &Path,
    title: &str,
    row_labels: &[String],
    col_labels: &[String],
    values: &[Vec<f64>],
    scale: HeatmapScale,
    annotate: bool,
) -> Result<()> {
    let root = SVGBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let n_rows = values.len().max(1);
    let n_cols = values.iter().map(|r| r.len()).max().unwrap_or(1).max(1);
    let max = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max);
    let rows = row_labels.to_vec();
    let cols = col_labels.to_vec();

    let mut chart = ChartBuilder::on(&root)
        .caption(title, (FONT, 22))
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(90)
        .build_cartesian_2d(0f64..n_cols as f64, 0f64..n_rows as f64)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_labels(n_cols.min(10))
        .y_labels(n_rows.min(10))
        .x_label_formatter(&|x| {
            let idx = x.floor() as usize;
            cols.get(idx).cloned().unwrap_or_default()
        })
        .y_label_formatter(&|y| {
            let idx = y.floor() as usize;
            n_rows
                .checked_sub(idx + 1)
                .and_then(|r| rows.get(r).cloned())
                .unwrap_or_default()
        })
        .draw()?;

    for (r, row) in values.iter().enumerate() {
        let y = (n_rows - 1 - r) as f64;
        for (c, v) in row.iter().enumerate() {
            let x = c as f64;
            let color = match scale {
                HeatmapScale::Sequential => sequential_color(if max > 0.0 { v / max } else { 0.0 }),
                HeatmapScale::Diverging => diverging_color(*v),
            };
            chart.draw_series(std::iter::once(Rectangle::new(
                [(x, y), (x + 1.0, y + 1.0)],
                color.filled(),
            )))?;
            if annotate {
                let text = if v.fract() == 0.0 && v.abs() < 1e9 {
                    format!("{}", *v as i64)
                } else {
                    format!("{:.2}", v)
                };
                chart.draw_series(std::iter::once(Text::new(
                    text,
                    (x + 0.45, y + 0.5),
                    (FONT, 18).into_font().color(&BLACK),
                )))?;
            }
        }
    }

    root.present()?;
    Ok(())
}

/// One panel of [`line_panels`]
#[derive(Debug, Clone)]
pub struct LinePanel {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<(f64, f64)>,
}

/// Side-by-side line charts in a single file
pub fn line_panels(path: &Path, panels: &[LinePanel]) -> Result<()> {
    let width = 600 * panels.len().max(1) as u32;
    let root = SVGBackend::new(path, (width, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let areas = root.split_evenly((1, panels.len().max(1)));
    for (area, panel) in areas.iter().zip(panels) {
        let mut chart = ChartBuilder::on(area)
            .caption(&panel.title, (FONT, 20))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(
                axis_range(panel.points.iter().map(|p| p.0)),
                axis_range(panel.points.iter().map(|p| p.1)),
            )?;
        chart
            .configure_mesh()
            .x_desc(panel.x_label.as_str())
            .y_desc(panel.y_label.as_str())
            .draw()?;
        chart.draw_series(LineSeries::new(panel.points.iter().copied(), BLUE.stroke_width(2)))?;
    }

    root.present()?;
    Ok(())
}
