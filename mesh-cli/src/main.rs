//! # syncmesh
//!
//! Keeps a fleet of Syncthing daemons mutually configured.
//!
//! ## Commands
//!
//! - `run`: Reconcile every interval until SIGINT/SIGTERM
//! - `once`: Run a single pass; exit non-zero if it fails
//! - `peers`: Discover and resolve peers without changing anything
//! - `check-config`: Print the effective configuration (API key masked)
//!
//! ## Example
//!
//! ```bash
//! # Inside the swarm, next to the syncthing service
//! STGUIAPIKEY=secret syncmesh run
//!
//! # From a config file, with JSON logs
//! syncmesh --config syncmesh.toml --log-format json run
//!
//! # What would be reconciled?
//! syncmesh peers
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mesh_controller::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check_config, once, peers, run};

/// Keeps a fleet of Syncthing daemons mutually configured.
#[derive(Parser, Debug)]
#[command(name = "syncmesh")]
#[command(version, about, long_about = None)]
struct Cli {
    /// TOML configuration file (environment variables override it)
    #[arg(long, short, global = true, env = "SYNCMESH_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile every interval until terminated
    Run {
        /// Stop after this many passes
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_passes: Option<u64>,
    },

    /// Run a single pass
    Once,

    /// Discover and resolve peers without modifying them
    Peers,

    /// Print the effective configuration
    CheckConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_logging(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = Config::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    match cli.command {
        Commands::Run { max_passes } => run::run(config, max_passes).await?,
        Commands::Once => once::run(config).await?,
        Commands::Peers => peers::run(config).await?,
        Commands::CheckConfig => check_config::run(&config)?,
    }

    Ok(())
}
