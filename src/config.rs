//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.chemequip.toml` files.

use crate::report::ReportFormat;
use crate::store::DEFAULT_RETENTION;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".chemequip.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Dataset storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Access token settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on.
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Maximum accepted upload body in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024 // 10MB
}

/// Dataset storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding persisted datasets.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Number of most recent datasets kept.
    #[serde(default = "default_retention")]
    pub retention: usize,

    /// Keep datasets in memory only (nothing survives a restart).
    #[serde(default)]
    pub in_memory: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            retention: default_retention(),
            in_memory: false,
        }
    }
}

fn default_data_dir() -> String {
    "chemequip-data".to_string()
}

fn default_retention() -> usize {
    DEFAULT_RETENTION
}

/// Access token settings.
///
/// Tokens are issued elsewhere; this only lists the ones accepted. An empty
/// list leaves the API open.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<String>,
}

/// Report generation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Format served by the report endpoint.
    #[serde(default)]
    pub format: ReportFormat,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE_NAME);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were actually given.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data_dir) = args.data_dir {
            self.storage.data_dir = data_dir.display().to_string();
        }
        if args.in_memory {
            self.storage.in_memory = true;
        }
        if let Some(retention) = args.retention {
            self.storage.retention = retention;
        }

        if let crate::cli::Command::Serve(ref serve) = args.command {
            if let Some(ref bind) = serve.bind {
                self.server.bind = bind.clone();
            }
            if let Some(ref tokens) = serve.tokens {
                self.auth.tokens = tokens.clone();
            }
            if let Some(format) = serve.format {
                self.report.format = format;
            }
        }

        // Flags always override
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Check values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        if self.storage.retention == 0 {
            bail!("storage.retention must be at least 1");
        }
        if self.server.max_upload_bytes == 0 {
            bail!("server.max_upload_bytes must be at least 1");
        }
        if self.auth.tokens.iter().any(|t| t.trim().is_empty()) {
            bail!("auth.tokens must not contain empty tokens");
        }
        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.storage.retention, 5);
        assert!(!config.storage.in_memory);
        assert!(config.auth.tokens.is_empty());
        assert_eq!(config.report.format, ReportFormat::Markdown);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
verbose = true

[server]
bind = "0.0.0.0:9000"

[storage]
data_dir = "/var/lib/chemequip"
retention = 3

[auth]
tokens = ["abc123"]

[report]
format = "json"
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert!(config.general.verbose);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.storage.data_dir, "/var/lib/chemequip");
        assert_eq!(config.storage.retention, 3);
        assert_eq!(config.auth.tokens, vec!["abc123"]);
        assert_eq!(config.report.format, ReportFormat::Json);
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let mut config = Config::default();
        config.storage.retention = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[storage]"));
        assert!(toml_str.contains("[report]"));

        let reparsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(reparsed.storage.retention, 5);
    }
}
