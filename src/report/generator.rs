//! Markdown and JSON report generation.
//!
//! This module renders a stored dataset into a human-readable equipment
//! report: summary statistics, the type distribution and the full row listing.

use super::ReportRenderer;
use crate::analysis::category_shares;
use crate::models::{Aggregates, Dataset, DatasetReport, EquipmentRow};
use crate::service::build_report;
use anyhow::Result;
use chrono::{DateTime, Utc};

const FLOWRATE_UNIT: &str = "m³/h";
const PRESSURE_UNIT: &str = "bar";
const TEMPERATURE_UNIT: &str = "°C";

/// Renders the Markdown report.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl ReportRenderer for MarkdownRenderer {
    fn content_type(&self) -> &'static str {
        "text/markdown; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, dataset: &Dataset) -> Result<Vec<u8>> {
        Ok(generate_markdown_report(dataset, Utc::now()).into_bytes())
    }
}

/// Renders the report DTO as pretty-printed JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn content_type(&self) -> &'static str {
        "application/json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, dataset: &Dataset) -> Result<Vec<u8>> {
        generate_json_report(&build_report(dataset)).map(String::into_bytes)
    }
}

/// Generate a complete Markdown report.
pub fn generate_markdown_report(dataset: &Dataset, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    // Title
    output.push_str("# Chemical Equipment Report\n\n");

    // Metadata section
    output.push_str(&generate_metadata_section(dataset, generated_at));

    // Summary section
    output.push_str(&generate_summary_section(&dataset.aggregates));

    // Type distribution
    output.push_str(&generate_distribution_section(&dataset.aggregates));

    // Full listing
    output.push_str(&generate_rows_section(&dataset.rows));

    // Footer
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(dataset: &Dataset, generated_at: DateTime<Utc>) -> String {
    let mut section = String::new();

    section.push_str(&format!("- **Generated from:** {}\n", display_file_name(dataset)));
    section.push_str(&format!("- **Dataset ID:** {}\n", dataset.id));
    section.push_str(&format!(
        "- **Upload Date:** {}\n",
        dataset.uploaded_at.format("%d %b %Y, %H:%M UTC")
    ));
    section.push_str(&format!(
        "- **Report Generated:** {}\n",
        generated_at.format("%d %b %Y, %H:%M UTC")
    ));
    section.push('\n');

    section
}

/// Only the last path component of the uploaded name is shown.
fn display_file_name(dataset: &Dataset) -> &str {
    dataset
        .source_file_name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(&dataset.source_file_name)
}

/// Generate the summary statistics section.
fn generate_summary_section(aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Summary Statistics\n\n");
    section.push_str("| Metric | Value |\n");
    section.push_str("|:---|---:|\n");
    section.push_str(&format!("| Total Equipment | {} |\n", aggregates.row_count));
    section.push_str(&format!(
        "| Average Flowrate | {:.2} {} |\n",
        aggregates.average_flowrate, FLOWRATE_UNIT
    ));
    section.push_str(&format!(
        "| Average Pressure | {:.2} {} |\n",
        aggregates.average_pressure, PRESSURE_UNIT
    ));
    section.push_str(&format!(
        "| Average Temperature | {:.2} {} |\n",
        aggregates.average_temperature, TEMPERATURE_UNIT
    ));
    section.push('\n');

    section
}

/// Generate the equipment type distribution section.
fn generate_distribution_section(aggregates: &Aggregates) -> String {
    let mut section = String::new();

    section.push_str("## Equipment Type Distribution\n\n");

    if aggregates.category_distribution.is_empty() {
        section.push_str("No equipment rows were retained from this upload.\n\n");
        return section;
    }

    section.push_str("| Equipment Type | Count | Percentage |\n");
    section.push_str("|:---|:---:|---:|\n");

    for share in category_shares(&aggregates.category_distribution, aggregates.row_count) {
        section.push_str(&format!(
            "| {} | {} | {:.1}% |\n",
            escape_cell(&share.category),
            share.count,
            share.percentage
        ));
    }
    section.push('\n');

    section
}

/// Generate the full equipment listing.
fn generate_rows_section(rows: &[EquipmentRow]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Equipment Data\n\n");
    section.push_str("| Name | Type | Flowrate | Pressure | Temperature |\n");
    section.push_str("|:---|:---|---:|---:|---:|\n");

    for row in rows {
        section.push_str(&format!(
            "| {} | {} | {} {} | {} {} | {} {} |\n",
            escape_cell(&row.name),
            escape_cell(&row.category),
            row.flowrate,
            FLOWRATE_UNIT,
            row.pressure,
            PRESSURE_UNIT,
            row.temperature,
            TEMPERATURE_UNIT
        ));
    }
    section.push('\n');

    section
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by chemequip*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &DatasetReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
