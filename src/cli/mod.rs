//! # Command Line Interface
//!
//! `knox cert ...` saves, loads, generates and batch-imports certificates;
//! `knox store ...` inspects the configured backing store.

pub mod certs;
pub mod output;
pub mod store;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::config::{load_config, AppConfig};
use crate::observability::{init_logging, LogFormat};
use crate::services::CertificateService;
use crate::storage::{build_issuer, connect_store, StoreEngineType};

#[derive(Parser)]
#[command(name = "knox")]
#[command(about = "Manage TLS certificates in a backing store")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./knox.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Store engine override (vault, acm, file or memory)
    #[arg(long, global = true, value_name = "ENGINE")]
    pub engine: Option<StoreEngineType>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log output format (text or json)
    #[arg(long, global = true, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Certificate commands
    Cert(certs::CertArgs),

    /// Store inspection commands
    Store {
        #[command(subcommand)]
        command: store::StoreCommands,
    },
}

/// Run CLI commands
pub async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load .env before anything reads the environment
    if let Err(e) = dotenvy::dotenv() {
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let config = resolve_config(&cli)?;
    init_logging(&config.logging.level, config.logging.format, cli.verbose);
    debug!(engine = %config.store.engine, "Configuration resolved");

    let service = bootstrap(&config).await?;

    match cli.command {
        Commands::Cert(args) => certs::handle_cert_command(args, &service).await?,
        Commands::Store { command } => store::handle_store_command(command, &service).await?,
    }

    Ok(())
}

/// Loads configuration and applies command-line overrides.
fn resolve_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(engine) = cli.engine {
        config.store.engine = engine;
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Connects the store and the issuer. Any failure here ends the process.
async fn bootstrap(config: &AppConfig) -> anyhow::Result<CertificateService> {
    let store = connect_store(config)
        .await
        .with_context(|| format!("Failed to initialise the {} store", config.store.engine))?;
    let issuer = build_issuer(config).context("Failed to configure the issuance provider")?;

    Ok(CertificateService::new(store).with_issuer(issuer))
}
