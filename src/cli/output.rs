//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;
use itertools::Itertools;
use serde_json::Value;

use crate::cli::args::OutputFormat;
use crate::cli::error::{CliError, CliResult};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Render a document in the requested format, without a trailing newline.
pub fn render(value: &Value, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| CliError::InvalidArgs(format!("cannot render JSON: {e}"))),
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map(|s| s.trim_end().to_string())
            .map_err(|e| CliError::InvalidArgs(format!("cannot render YAML: {e}"))),
        OutputFormat::Text => Ok(render_text(value)),
    }
}

/// Render and print a document.
pub fn output(value: &Value, format: OutputFormat) -> CliResult<()> {
    info(&render(value, format)?);
    Ok(())
}

/// Strings raw, arrays one element per line, objects as `key: value`.
pub fn render_text(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(scalar_text).join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, scalar_text(v)))
            .join("\n"),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Left-aligned columns separated by two spaces; the header row is bold.
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: Vec<String>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .join("  ")
            .trim_end()
            .to_string()
    };

    let head = line(headers.iter().map(|h| h.to_string()).collect());
    std::iter::once(head.bold().to_string())
        .chain(rows.iter().map(|r| line(r.clone())))
        .join("\n")
}
