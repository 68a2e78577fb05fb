//! Table formatting for CLI list output
//!
//! Commands describe their columns once with [`ColumnDef`] and hand rows of
//! typed [`CellValue`]s to a [`TableFormatter`], which renders them as an
//! aligned terminal table, CSV, or a markdown table.

use chrono::{DateTime, Local, Utc};
use console::style;
use tabled::{builder::Builder, settings::Style};

use crate::cli::helpers::{escape_csv, truncate_str};
use crate::cli::OutputFormat;
use crate::onboarding::validator::Severity;

/// A typed cell value with semantic meaning for formatting
#[derive(Debug, Clone)]
pub enum CellValue {
    /// Record identifier (cyan)
    Id(String),
    /// Plain text, truncated to the column width
    Text(String),
    /// Vehicle or device status with color coding
    Status(String),
    /// Worst validation severity on a row
    Severity(Option<Severity>),
    /// Yes/no marker
    Flag(bool),
    Number(i64),
    /// Float value with precision
    Float(f64, usize),
    /// DateTime displayed with time
    DateTime(DateTime<Utc>),
    Empty,
}

impl CellValue {
    /// Format for terminal output, padded to `width`
    pub fn format_tsv(&self, width: usize) -> String {
        match self {
            CellValue::Id(id) => format!("{:<width$}", style(id).cyan(), width = width),
            CellValue::Text(s) => {
                let truncated = truncate_str(s, width.saturating_sub(2));
                format!("{:<width$}", truncated, width = width)
            }
            CellValue::Status(s) => {
                let styled = match s.to_lowercase().as_str() {
                    "available" | "online" => style(s.as_str()).green(),
                    "leased" | "created" => style(s.as_str()).cyan(),
                    "service" | "unknown" => style(s.as_str()).yellow(),
                    "sold" | "offline" => style(s.as_str()).dim(),
                    _ => style(s.as_str()).white(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Severity(severity) => {
                let styled = match severity {
                    Some(Severity::Error) => style("error").red().bold(),
                    Some(Severity::Warning) => style("warning").yellow(),
                    None => style("ok").green(),
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Flag(b) => {
                let styled = if *b {
                    style("yes").green()
                } else {
                    style("no").dim()
                };
                format!("{:<width$}", styled, width = width)
            }
            CellValue::Number(n) => format!("{:>width$}", n, width = width),
            CellValue::Float(f, precision) => {
                format!("{:>width$.prec$}", f, width = width, prec = precision)
            }
            CellValue::DateTime(dt) => {
                let local: DateTime<Local> = dt.with_timezone(&Local);
                format!("{:<width$}", local.format("%Y-%m-%d %H:%M"), width = width)
            }
            CellValue::Empty => format!("{:<width$}", "-", width = width),
        }
    }

    /// Unstyled value
    pub fn raw(&self) -> String {
        match self {
            CellValue::Id(s) | CellValue::Text(s) | CellValue::Status(s) => s.clone(),
            CellValue::Severity(Some(severity)) => severity.to_string(),
            CellValue::Severity(None) => "ok".to_string(),
            CellValue::Flag(b) => (if *b { "yes" } else { "no" }).to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Float(f, precision) => format!("{:.prec$}", f, prec = precision),
            CellValue::DateTime(dt) => {
                let local: DateTime<Local> = dt.with_timezone(&Local);
                local.format("%Y-%m-%dT%H:%M:%S").to_string()
            }
            CellValue::Empty => String::new(),
        }
    }

    pub fn format_csv(&self) -> String {
        escape_csv(&self.raw())
    }

    pub fn format_md(&self) -> String {
        match self {
            CellValue::Empty => "-".to_string(),
            other => other.raw().replace('|', "\\|"),
        }
    }

    pub fn display_width(&self) -> usize {
        match self {
            CellValue::DateTime(_) => 16, // "YYYY-MM-DD HH:MM"
            CellValue::Empty => 1,
            other => other.raw().chars().count(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub header: &'static str,
    /// Maximum width in terminal output
    pub width: usize,
}

impl ColumnDef {
    pub const fn new(header: &'static str, width: usize) -> Self {
        Self { header, width }
    }
}

pub struct TableFormatter<'a> {
    columns: &'a [ColumnDef],
    entity_name: &'static str,
    show_summary: bool,
}

impl<'a> TableFormatter<'a> {
    pub fn new(columns: &'a [ColumnDef], entity_name: &'static str) -> Self {
        Self {
            columns,
            entity_name,
            show_summary: true,
        }
    }

    pub fn without_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }

    /// Print rows in the requested format; structured formats are the
    /// caller's job and fall back to the terminal table here
    pub fn output(&self, rows: &[Vec<CellValue>], format: OutputFormat) {
        match format {
            OutputFormat::Csv => self.output_csv(rows),
            OutputFormat::Md => self.output_md(rows),
            _ => self.output_tsv(rows),
        }
    }

    fn calculate_widths(&self, rows: &[Vec<CellValue>]) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                let max_content = rows
                    .iter()
                    .filter_map(|r| r.get(i))
                    .map(|v| v.display_width())
                    .max()
                    .unwrap_or(0);
                let natural = col.header.len().max(max_content.saturating_add(2));
                natural.min(col.width.max(col.header.len()))
            })
            .collect()
    }

    fn output_tsv(&self, rows: &[Vec<CellValue>]) {
        let widths = self.calculate_widths(rows);

        let header: Vec<String> = self
            .columns
            .iter()
            .zip(&widths)
            .map(|(col, width)| format!("{:<width$}", style(col.header).bold(), width = *width))
            .collect();
        println!("{}", header.join(" "));

        let total_width: usize = widths.iter().sum::<usize>() + widths.len().saturating_sub(1);
        println!("{}", "-".repeat(total_width));

        for row in rows {
            let cells: Vec<String> = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| cell.format_tsv(*width))
                .collect();
            println!("{}", cells.join(" "));
        }

        if self.show_summary {
            println!();
            println!(
                "{} {}(s) found",
                style(rows.len()).cyan(),
                self.entity_name
            );
        }
    }

    fn output_csv(&self, rows: &[Vec<CellValue>]) {
        let header: Vec<&str> = self.columns.iter().map(|c| c.header).collect();
        println!("{}", header.join(","));
        for row in rows {
            let cells: Vec<String> = row.iter().map(CellValue::format_csv).collect();
            println!("{}", cells.join(","));
        }
    }

    fn output_md(&self, rows: &[Vec<CellValue>]) {
        let mut builder = Builder::default();
        builder.push_record(self.columns.iter().map(|c| c.header.to_string()));
        for row in rows {
            builder.push_record(row.iter().map(CellValue::format_md));
        }
        let mut table = builder.build();
        table.with(Style::markdown());
        println!("{}", table);
    }
}
