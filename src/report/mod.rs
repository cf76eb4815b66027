//! Report rendering.
//!
//! A [`ReportRenderer`] turns one stored dataset into a byte stream. The
//! bundled renderers produce Markdown and JSON; other formats (PDF layout,
//! for instance) plug in behind the same trait.

pub mod generator;

pub use generator::{JsonRenderer, MarkdownRenderer};

use crate::models::Dataset;
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Converts a dataset into a downloadable document.
pub trait ReportRenderer: Send + Sync {
    /// MIME type of the rendered bytes.
    fn content_type(&self) -> &'static str;

    /// File extension (without dot) for downloads.
    fn file_extension(&self) -> &'static str;

    /// Render the document.
    fn render(&self, dataset: &Dataset) -> Result<Vec<u8>>;
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Markdown document (default)
    #[default]
    Markdown,
    /// JSON document
    Json,
}

impl ReportFormat {
    /// The renderer for this format.
    pub fn renderer(self) -> Box<dyn ReportRenderer> {
        match self {
            ReportFormat::Markdown => Box::new(MarkdownRenderer),
            ReportFormat::Json => Box::new(JsonRenderer),
        }
    }
}

/// Download file name for a rendered report.
pub fn report_file_name(id: u64, renderer: &dyn ReportRenderer) -> String {
    format!("equipment_report_{}.{}", id, renderer.file_extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_selects_renderer() {
        assert_eq!(ReportFormat::Markdown.renderer().file_extension(), "md");
        assert_eq!(ReportFormat::Json.renderer().file_extension(), "json");
    }

    #[test]
    fn test_report_file_name() {
        let renderer = ReportFormat::Markdown.renderer();
        assert_eq!(report_file_name(12, renderer.as_ref()), "equipment_report_12.md");
    }

    #[test]
    fn test_format_parses_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: ReportFormat,
        }

        let parsed: Wrapper = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(parsed.format, ReportFormat::Json);
    }
}
