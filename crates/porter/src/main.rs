//! Porter - authentication and role gating for the marketplace
//!
//! # Usage
//!
//! ```bash
//! # Run the server (default)
//! porter
//! porter --config /etc/porter/porter.toml
//!
//! # Validate configuration and print a summary
//! porter check --config porter.toml
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use porter_config::{Config, LogConfig, LogFormat, LogLevel, LogOutput};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Config file looked up in the working directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "porter.toml";

/// Porter - authentication and role gating for the marketplace
#[derive(Parser, Debug)]
#[command(name = "porter")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server
    Serve,

    /// Validate configuration and print a summary
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref())?;

    match cli.command {
        Some(Command::Check) => {
            // Check prints to stdout; no logging needed
            cmd::check::run(&config_path)
        }
        // No subcommand = run server (default behavior)
        Some(Command::Serve) | None => {
            let config = Config::from_file(&config_path)
                .with_context(|| format!("failed to load {}", config_path.display()))?;
            let log_level = resolve_log_level(cli.log_level.as_deref(), &config.log);
            init_logging(&log_level, &config.log)?;
            cmd::serve::run(config, &config_path).await
        }
    }
}

/// Resolve config path: CLI flag > ./porter.toml > ~/.porter/porter.toml
fn resolve_config_path(cli_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = cli_path {
        if !path.exists() {
            bail!("config file not found: {}", path.display());
        }
        return Ok(path.to_path_buf());
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }

    if let Some(home) = dirs::home_dir() {
        let path = home.join(".porter").join(DEFAULT_CONFIG_FILE);
        if path.exists() {
            return Ok(path);
        }
    }

    bail!(
        "no configuration found; pass --config or create ./{}",
        DEFAULT_CONFIG_FILE
    )
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, log: &LogConfig) -> String {
    match cli_level {
        // Unknown names are passed through as EnvFilter directives
        Some(level) => LogLevel::parse(level)
            .map(|l| l.as_str().to_string())
            .unwrap_or_else(|| level.to_string()),
        None => log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str, log: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let writer = match log.output {
        LogOutput::Stdout => BoxMakeWriter::new(std::io::stdout),
        LogOutput::Stderr => BoxMakeWriter::new(std::io::stderr),
    };

    let registry = tracing_subscriber::registry().with(filter);
    let result = match log.format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(writer),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_writer(writer))
            .try_init(),
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}
