//! Terminal styling utilities

use console::{style, Emoji};
use std::path::Path;

use crate::config::PipelineConfig;
use crate::pipeline::StageName;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static BUCKET: Emoji<'_, '_> = Emoji("🪣 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[x] ");

const BOX_WIDTH: usize = 60;

/// Print the application banner
pub fn print_banner(version: &str) {
    let banner = r#"
     ___| |_ __ _ _   _ ___  ___ ___  _ __ ___
    / __| __/ _` | | | / __|/ __/ _ \| '__/ _ \
    \__ \ || (_| | |_| \__ \ (_| (_) | | |  __/
    |___/\__\__,_|\__, |___/\___\___/|_|  \___|
                  |___/
    "#;

    println!();
    println!("{}", style(banner).cyan().bold());
    println!(
        "    {}",
        style("Listing rating classifier, one checkpoint at a time").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print configuration card
pub fn print_config(config: &PipelineConfig, from_stage: Option<StageName>) {
    let line = "─".repeat(BOX_WIDTH - 2);
    let value_width = BOX_WIDTH - 20;

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style("⚙️  Configuration").cyan().bold(),
        " ".repeat(BOX_WIDTH - 20)
    );
    println!("    ├{}┤", line);
    for (label, value) in [
        ("Raw", config.buckets.raw.as_str()),
        ("Cleaned", config.buckets.cleaned.as_str()),
        ("Models", config.buckets.models.as_str()),
        ("Predictions", config.buckets.predictions.as_str()),
    ] {
        println!(
            "    │  {} {:<12} {:<w$}│",
            BUCKET,
            label,
            truncate_string(value, value_width - 2),
            w = value_width
        );
    }
    println!("    ├{}┤", line);
    println!(
        "    │  {} {:<12} {:<w$}│",
        FOLDER,
        "Store",
        truncate_path(&config.store_root, value_width - 2),
        w = value_width
    );
    println!(
        "    │  {} {:<12} {:<w$}│",
        FOLDER,
        "Work dir",
        truncate_path(&config.work_dir, value_width - 2),
        w = value_width
    );
    println!(
        "    │  {} {:<12} {:<w$}│",
        SAVE,
        "Tracking",
        config
            .tracking_log
            .as_deref()
            .map(|p| truncate_path(p, value_width - 2))
            .unwrap_or_else(|| "disabled".to_string()),
        w = value_width
    );
    if let Some(stage) = from_stage {
        println!(
            "    │  {} {:<12} {:<w$}│",
            ROCKET,
            "Start at",
            style(stage).yellow(),
            w = value_width
        );
    }
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: usize, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

/// Print a failure message to stderr
pub fn print_failure(message: &str) {
    eprintln!("    {} {}", CROSS, style(message).red().bold());
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("stayscore run complete!").green().bold()
    );
    println!();
}

// Helper functions

fn truncate_path(path: &Path, max_len: usize) -> String {
    let path_str = path.display().to_string();
    truncate_string(&path_str, max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
