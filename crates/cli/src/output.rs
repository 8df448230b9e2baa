//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => print_json(&items),
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to render JSON: {}", e)),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Availability as a percentage, `-` when not reported
pub fn format_availability(percent: Option<f64>) -> String {
    percent
        .map(|p| format!("{:.1}%", p))
        .unwrap_or_else(|| "-".to_string())
}

/// Response time in seconds, `-` when not reported
pub fn format_seconds(seconds: Option<f64>) -> String {
    seconds
        .map(|s| format!("{:.3}s", s))
        .unwrap_or_else(|| "-".to_string())
}

pub fn format_timestamp(epoch_secs: i64) -> String {
    chrono::DateTime::from_timestamp(epoch_secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| epoch_secs.to_string())
}

/// Color instance lifecycle and component health states
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "active" | "healthy" | "executed" => status.green().to_string(),
        "booting" | "degraded" | "no_adaptation" => status.yellow().to_string(),
        "failed" | "unhealthy" | "monitor_unavailable" => status.red().to_string(),
        "shutdown" => status.dimmed().to_string(),
        _ => status.to_string(),
    }
}

/// Highlight a value that breaches its threshold
pub fn color_breach(text: String, breached: bool) -> String {
    if breached {
        text.red().bold().to_string()
    } else {
        text
    }
}
