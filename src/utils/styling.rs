//! Terminal styling helpers for pipeline output

use console::{style, Emoji};
use std::path::Path;
use std::time::Duration;

use crate::pipeline::{FailurePolicy, PipelineConfig};

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static TARGET: Emoji<'_, '_> = Emoji("🎯 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static DICE: Emoji<'_, '_> = Emoji("🎲 ", "");

const CARD_WIDTH: usize = 56;

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
    ╦ ╦╔═╗╔═╗╔═╗╦═╗╔═╗╦  ╔═╗╦ ╦
    ║║║╠═╣╠╣ ║╣ ╠╦╝╠╣ ║  ║ ║║║║
    ╚╩╝╩ ╩╚  ╚═╝╩╚═╚  ╩═╝╚═╝╚╩╝
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {}",
        style("Wafer yield analytics: impute, explore, classify").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

fn card_row(icon: &Emoji<'_, '_>, label: &str, value: &str) {
    println!(
        "    │  {}{:<10}{:<width$}│",
        icon,
        label,
        truncate_string(value, CARD_WIDTH - 17),
        width = CARD_WIDTH - 17
    );
}

/// Print the configuration card
pub fn print_config(config: &PipelineConfig) {
    let line = "─".repeat(CARD_WIDTH - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(CARD_WIDTH - 20)
    );
    println!("    ├{}┤", line);
    card_row(&FOLDER, "Labels:", &truncate_path(&config.labels_path, 38));
    card_row(&FOLDER, "Features:", &truncate_path(&config.features_path, 38));
    card_row(&SAVE, "Output:", &truncate_path(&config.processed_dir, 38));
    card_row(&SAVE, "Models:", &truncate_path(&config.models_dir, 38));
    println!("    ├{}┤", line);
    card_row(&TARGET, "Target:", &config.label_column);
    card_row(&CHART, "Test size:", &format!("{:.0}%", config.test_size * 100.0));
    card_row(
        &DICE,
        "Seed:",
        &config
            .seed
            .map(|s| s.to_string())
            .unwrap_or_else(|| "entropy".to_string()),
    );
    card_row(
        &CHART,
        "Policy:",
        match config.failure_policy {
            FailurePolicy::BestEffort => "best effort",
            FailurePolicy::Strict => "strict",
        },
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a stage header
pub fn print_step_header(step_num: usize, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STAGE {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", style("⚠").yellow().bold(), style(message).yellow());
}

pub fn print_error(message: &str) {
    eprintln!("    {} {}", style("✗").red().bold(), style(message).red());
}

/// Print elapsed time for a stage
pub fn print_step_time(elapsed: Duration) {
    println!(
        "    {}",
        style(format!("⏱  {:.2}s", elapsed.as_secs_f64())).dim()
    );
}

/// Print the final completion message
pub fn print_completion(failed_stages: usize) {
    println!();
    if failed_stages == 0 {
        println!(
            "    {} {}",
            ROCKET,
            style("Waferflow run complete!").green().bold()
        );
    } else {
        println!(
            "    {} {}",
            style("⚠").yellow().bold(),
            style(format!(
                "Waferflow run finished with {} failed stage(s)",
                failed_stages
            ))
            .yellow()
            .bold()
        );
    }
    println!();
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(info) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(info).dim()
        );
    } else {
        println!("      Found {} {}", style(count).yellow().bold(), description);
    }
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

/// Keep the tail of `s`, prefixed with an ellipsis, when it exceeds `max_len` chars
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
