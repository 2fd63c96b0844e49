//! Output formatting for CLI commands
//!
//! JSON and YAML rendering via serde, plus the fixed-width table helpers
//! used by list-style commands.

use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            _ => anyhow::bail!("Unsupported output format: '{}'. Use 'json', 'yaml', or 'table'.", s),
        }
    }
}

/// Prints `data` as JSON or YAML.
///
/// Tables are laid out per command, so `Table` is rejected here.
pub fn print_output_format<T: Serialize>(data: &T, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", render_json(data)?),
        OutputFormat::Yaml => println!("{}", render_yaml(data)?),
        OutputFormat::Table => anyhow::bail!("Table output is rendered by the command itself"),
    }
    Ok(())
}

pub fn render_json<T: Serialize>(data: &T) -> Result<String> {
    serde_json::to_string_pretty(data).context("Failed to serialize to JSON")
}

pub fn render_yaml<T: Serialize>(data: &T) -> Result<String> {
    serde_yaml::to_string(data).context("Failed to serialize to YAML")
}

/// Truncates to `max_len` characters, ending in `...` when shortened.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// Prints column headings followed by a dashed rule.
pub fn print_table_header(columns: &[(&str, usize)]) {
    println!();
    let header: Vec<String> =
        columns.iter().map(|(name, width)| format!("{:<width$}", name, width = width)).collect();
    println!("{}", header.join(" ").trim_end());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    println!("{}", "-".repeat(total_width.saturating_sub(1)));
}
