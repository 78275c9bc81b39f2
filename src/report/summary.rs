//! Run summary tables

use std::time::Duration;

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::{PublishedArtifact, RunReport, RunState, Stage, StageName};

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct StageLine {
    pub stage: StageName,
    pub succeeded: bool,
    pub duration: Duration,
    pub artifacts: usize,
}

/// What a run did, shaped for display.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub lines: Vec<StageLine>,
    pub published: Vec<PublishedArtifact>,
    pub final_state: Option<RunState>,
}

impl RunSummary {
    pub fn from_report(report: &RunReport) -> Self {
        let lines = report
            .stages
            .iter()
            .map(|record| StageLine {
                stage: record.stage,
                succeeded: record.succeeded,
                duration: record.duration,
                artifacts: report
                    .published
                    .iter()
                    .filter(|a| a.stage == record.stage)
                    .count(),
            })
            .collect();
        Self {
            lines,
            published: report.published.clone(),
            final_state: report.final_state(),
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.lines.iter().map(|l| l.duration).sum()
    }

    /// Render the stage table as a string (without indentation).
    pub fn render(&self) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Stage").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
            Cell::new("Duration").add_attribute(Attribute::Bold),
            Cell::new("Artifacts").add_attribute(Attribute::Bold),
        ]);

        for line in &self.lines {
            let (status, color) = if line.succeeded {
                ("✅ done", Color::Green)
            } else {
                ("❌ failed", Color::Red)
            };
            table.add_row(vec![
                Cell::new(line.stage),
                Cell::new(status).fg(color),
                Cell::new(format_duration(line.duration)),
                Cell::new(line.artifacts),
            ]);
        }

        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(
                self.final_state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "not started".to_string()),
            )
            .add_attribute(Attribute::Bold),
            Cell::new(format_duration(self.total_duration())).add_attribute(Attribute::Bold),
            Cell::new(self.published.len()).add_attribute(Attribute::Bold),
        ]);

        table.to_string()
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

        // Indent the table
        for line in self.render().lines() {
            println!("    {}", line);
        }

        if !self.published.is_empty() {
            println!();
            println!(
                "    {} {}",
                style("📝").cyan(),
                style("PUBLISHED ARTIFACTS").white().bold()
            );
            println!("    {}", style("─".repeat(50)).dim());
            for artifact in &self.published {
                println!(
                    "        {} {}/{} {}",
                    style("•").dim(),
                    artifact.bucket,
                    artifact.key,
                    style(format!("({})", artifact.stage)).dim()
                );
            }
        }
    }
}

/// Table of stages with the context handles each one reads and writes.
pub fn render_stage_table(stages: &[Box<dyn Stage>]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Stage").add_attribute(Attribute::Bold),
        Cell::new("Reads").add_attribute(Attribute::Bold),
        Cell::new("Writes").add_attribute(Attribute::Bold),
    ]);

    let join = |keys: &[crate::pipeline::HandleKey]| {
        if keys.is_empty() {
            "-".to_string()
        } else {
            keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
        }
    };

    for (i, stage) in stages.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(stage.name()).fg(Color::Cyan),
            Cell::new(join(stage.reads())),
            Cell::new(join(stage.writes())),
        ]);
    }
    table.to_string()
}

fn format_duration(d: Duration) -> String {
    if d.as_secs() >= 60 {
        format!("{}m {:02}s", d.as_secs() / 60, d.as_secs() % 60)
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
