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
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
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

/// Group the integer part of a non-negative decimal string with commas
fn group_thousands(digits: &str) -> String {
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if frac_part.is_empty() {
        grouped
    } else {
        format!("{}.{}", grouped, frac_part)
    }
}

/// Format currency with thousands separators
pub fn format_currency(amount: f64, currency: &str) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let digits = group_thousands(&format!("{:.2}", amount.abs()));
    match currency {
        "USD" => format!("{}${}", sign, digits),
        "EUR" => format!("{}€{}", sign, digits),
        "GBP" => format!("{}£{}", sign, digits),
        _ => format!("{}{} {}", sign, digits, currency),
    }
}

/// Color an R² score: green when the model explains most variance
pub fn color_r2(r2: f64) -> String {
    let formatted = format!("{:.4}", r2);
    if r2 >= 0.8 {
        formatted.green().to_string()
    } else if r2 >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(181_234.567, "USD"), "$181,234.57");
        assert_eq!(format_currency(999.0, "USD"), "$999.00");
        assert_eq!(format_currency(1_000_000.0, "EUR"), "€1,000,000.00");
        assert_eq!(format_currency(-1234.5, "USD"), "-$1,234.50");
        assert_eq!(format_currency(12.0, "CHF"), "12.00 CHF");
    }

    #[test]
    fn test_color_r2_keeps_value() {
        colored::control::set_override(false);
        assert_eq!(color_r2(0.91234), "0.9123");
    }
}
