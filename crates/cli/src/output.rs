//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use doctor_lib::{DetectorSource, DetectorStatus};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an optional timestamp, `-` when absent
pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Shorten free text for a table cell
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{kept}…")
}

/// Color a pod phase
pub fn color_phase(phase: &str) -> String {
    match phase {
        "Running" | "Succeeded" => phase.green().to_string(),
        "Pending" => phase.yellow().to_string(),
        "Failed" => phase.red().to_string(),
        _ => phase.magenta().to_string(),
    }
}

pub fn color_source(source: DetectorSource) -> String {
    let label = source.as_str();
    match source {
        DetectorSource::PodPhase => label.magenta().to_string(),
        DetectorSource::ContainerStatus => label.red().to_string(),
        DetectorSource::PodCondition => label.yellow().to_string(),
        DetectorSource::EventChecker => label.cyan().to_string(),
    }
}

pub fn color_status(status: DetectorStatus) -> String {
    match status {
        DetectorStatus::Healthy => "healthy".green().to_string(),
        DetectorStatus::Degraded => "degraded".yellow().to_string(),
        DetectorStatus::Unhealthy => "unhealthy".red().to_string(),
    }
}
