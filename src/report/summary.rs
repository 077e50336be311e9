//! End-of-run summary table

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::stage::{StageOutcome, StageReport};

/// Stage outcomes and timings collected over a run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, report: StageReport) {
        self.stages.push(report);
    }

    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.outcome.is_failed()).count()
    }

    pub fn total_time(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    fn format_duration(d: Duration) -> String {
        let secs = d.as_secs_f64();
        if secs < 60.0 {
            format!("{:.2}s", secs)
        } else {
            format!("{}m {:.1}s", (secs / 60.0).floor() as u64, secs % 60.0)
        }
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Outcome").add_attribute(Attribute::Bold),
            Cell::new("Time").add_attribute(Attribute::Bold),
        ]);

        for report in &self.stages {
            let outcome = match &report.outcome {
                StageOutcome::Completed => Cell::new("✅ completed").fg(Color::Green),
                StageOutcome::Failed(_) => Cell::new("❌ failed").fg(Color::Red),
            };
            table.add_row(vec![
                Cell::new(report.stage.to_string()),
                outcome,
                Cell::new(Self::format_duration(report.elapsed)),
            ]);
        }

        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(format!("{} failed", self.failed_count())).fg(if self.failed_count() == 0 {
                Color::White
            } else {
                Color::Red
            }),
            Cell::new(Self::format_duration(self.total_time())).add_attribute(Attribute::Bold),
        ]);

        for line in table.to_string().lines() {
            println!("    {}", line);
        }

        let failures: Vec<(&StageReport, &String)> = self
            .stages
            .iter()
            .filter_map(|s| match &s.outcome {
                StageOutcome::Failed(msg) => Some((s, msg)),
                StageOutcome::Completed => None,
            })
            .collect();
        if !failures.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("FAILED STAGES").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for (report, message) in failures {
                println!("      {} {}: {}", style("•").dim(), style(report.stage).yellow(), message);
            }
        }
    }
}
