//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::report::ReportFormat;
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Chemequip - chemical equipment CSV analytics
///
/// Ingest equipment CSV files, compute summary statistics and keep the
/// most recent uploads. Serves a JSON API and renders reports.
///
/// Examples:
///   chemequip serve --bind 0.0.0.0:8000
///   chemequip ingest ./sample_equipment_data.csv
///   chemequip history
///   chemequip report 3 --format markdown --output report.md
///   chemequip init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    ///
    /// If not specified, looks for .chemequip.toml in the current directory
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory holding persisted datasets
    #[arg(long, global = true, value_name = "DIR", env = "CHEMEQUIP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Keep datasets in memory only
    #[arg(long, global = true)]
    pub in_memory: bool,

    /// Number of most recent datasets to keep
    #[arg(long, global = true, value_name = "COUNT")]
    pub retention: Option<usize>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Top-level commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Ingest a local CSV file and print the stored dataset
    Ingest {
        /// CSV file with Equipment Name, Type, Flowrate, Pressure and Temperature columns
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the most recent datasets
    History,

    /// Print one dataset with its type breakdown
    Show {
        /// Dataset id
        id: u64,
    },

    /// Render a dataset report
    Report {
        /// Dataset id
        id: u64,

        /// Output format (markdown, json)
        #[arg(long, value_name = "FORMAT")]
        format: Option<ReportFormat>,

        /// Write the report to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Generate a default .chemequip.toml configuration file
    InitConfig,
}

/// Options for `serve`.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Socket address to listen on
    #[arg(long, value_name = "ADDR", env = "CHEMEQUIP_BIND")]
    pub bind: Option<String>,

    /// Accepted API tokens (comma-separated)
    ///
    /// When set, every request must send `Authorization: Token <token>`.
    #[arg(
        long = "token",
        value_name = "TOKENS",
        value_delimiter = ',',
        env = "CHEMEQUIP_API_TOKENS"
    )]
    pub tokens: Option<Vec<String>>,

    /// Format served by the report endpoint
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<ReportFormat>,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.retention == Some(0) {
            return Err("Retention must be at least 1".to_string());
        }

        if self.in_memory && self.data_dir.is_some() {
            return Err("Cannot use both --in-memory and --data-dir".to_string());
        }

        // Validate the ingest file if provided
        if let Command::Ingest { ref file } = self.command {
            if !file.is_file() {
                return Err(format!("CSV file does not exist: {}", file.display()));
            }
        }

        if let Command::Serve(ref serve) = self.command {
            if let Some(ref bind) = serve.bind {
                let port = bind
                    .rsplit_once(':')
                    .and_then(|(_, port)| port.parse::<u16>().ok());
                if port.is_none() {
                    return Err(format!("Bind address must include a port: {}", bind));
                }
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
