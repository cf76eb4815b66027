//! Chemequip - chemical equipment CSV analytics
//!
//! Ingests equipment CSV files, computes summary statistics, keeps the most
//! recent uploads and serves them over a JSON API.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, storage, bind failure, etc.)
//!   2 - Upload rejected or dataset not found

mod analysis;
mod cli;
mod config;
mod error;
mod http;
mod ingest;
mod models;
mod report;
mod service;
mod store;

use anyhow::{Context, Result};
use cli::{Args, Command};
use config::{Config, CONFIG_FILE_NAME};
use error::ServiceError;
use report::ReportFormat;
use serde::Serialize;
use service::DatasetService;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use store::DatasetStore;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    // The config file may turn on verbose logging, so read it first
    let loaded = load_config(&args);
    let config_verbose = matches!(loaded, Ok(ref config) if config.general.verbose);

    // Initialize logging
    init_logging(&args, config_verbose);

    info!("Chemequip v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let config = match loaded {
        Ok(config) => config,
        Err(e) if args.config.is_none() => {
            warn!("Failed to load config: {:#}", e);
            Config::default()
        }
        Err(e) => {
            error!("{:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    };

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle init-config: generate a default .chemequip.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize storage, retention, tokens, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config_verbose: bool) {
    let level = if config_verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        return Config::load(config_path);
    }

    // Try default location
    Ok(Config::load_default()?.unwrap_or_default())
}

/// Run the selected command. Returns the exit code (0 or 2).
async fn run(args: Args, mut config: Config) -> Result<i32> {
    config.merge_with_args(&args);
    config.validate().context("Invalid configuration")?;
    debug!("Effective config: {:?}", config);

    let store = Arc::new(open_store(&config)?);
    let service = DatasetService::new(store);

    match args.command {
        Command::Serve(_) => {
            let renderer: Arc<dyn report::ReportRenderer> = Arc::from(config.report.format.renderer());
            if config.auth.tokens.is_empty() {
                warn!("No API tokens configured; the API is open");
            }
            let state = http::AppState::new(service, renderer, config.auth.tokens.clone());
            http::serve(state, &config.server).await?;
            Ok(0)
        }
        Command::Ingest { file } => handle_ingest(&service, &file).await,
        Command::History => {
            let history = blocking(move || service.history()).await?;
            exit_with(history)
        }
        Command::Show { id } => {
            let report = blocking(move || service.get_by_id(id)).await?;
            exit_with(report)
        }
        Command::Report { id, format, output } => {
            let format = format.unwrap_or(config.report.format);
            handle_report(service, id, format, output).await
        }
        Command::InitConfig => handle_init_config().map(|_| 0),
    }
}

/// Open the configured dataset store.
fn open_store(config: &Config) -> Result<DatasetStore> {
    let retention = config.storage.retention;

    if config.storage.in_memory {
        info!("Using in-memory dataset store (retention {})", retention);
        return Ok(DatasetStore::in_memory(retention));
    }

    DatasetStore::open(&config.storage.data_dir, retention).with_context(|| {
        format!(
            "Failed to open dataset store at {}",
            config.storage.data_dir
        )
    })
}

/// Ingest one local CSV file and print the stored dataset.
async fn handle_ingest(service: &DatasetService, file: &Path) -> Result<i32> {
    let bytes = std::fs::read(file)
        .with_context(|| format!("Failed to read CSV file: {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    let service = service.clone();
    let response = blocking(move || service.upload(file_name.as_deref(), &bytes)).await?;
    exit_with(response)
}

/// Render one report to a file or stdout.
async fn handle_report(
    service: DatasetService,
    id: u64,
    format: ReportFormat,
    output: Option<PathBuf>,
) -> Result<i32> {
    let rendered = blocking(move || service.render_report(id, format.renderer().as_ref())).await?;
    let rendered = match rendered {
        Ok(rendered) => rendered,
        Err(code) => return Ok(code),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered.bytes)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            println!("✅ Report saved to: {}", path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(&rendered.bytes)
                .context("Failed to write report to stdout")?;
        }
    }

    Ok(0)
}

/// Run a service call off the async executor.
///
/// Rejected uploads and unknown ids come back as `Ok(Err(2))`; every other
/// failure is a runtime error.
async fn blocking<T, F>(f: F) -> Result<std::result::Result<T, i32>>
where
    F: FnOnce() -> std::result::Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    let outcome = tokio::task::spawn_blocking(f)
        .await
        .context("Service task failed")?;

    match outcome {
        Ok(value) => Ok(Ok(value)),
        Err(e @ ServiceError::Ingest(_)) => {
            eprintln!("⛔ Upload rejected: {}", e);
            Ok(Err(2))
        }
        Err(e) if e.is_not_found() => {
            eprintln!("⛔ {}", e);
            Ok(Err(2))
        }
        Err(e) => Err(e.into()),
    }
}

/// Print a value as pretty JSON, or pass through a rejection exit code.
fn exit_with<T: Serialize>(outcome: std::result::Result<T, i32>) -> Result<i32> {
    match outcome {
        Ok(value) => {
            let json = serde_json::to_string_pretty(&value).context("Failed to serialize output")?;
            println!("{}", json);
            Ok(0)
        }
        Err(code) => Ok(code),
    }
}
