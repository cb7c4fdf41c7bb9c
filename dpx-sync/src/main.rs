//! dpx-sync - down-payment extract and submission
//!
//! `run` (the default) submits pending extract files first, then produces new
//! ones. `extract` and `submit` run one half on its own.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dpx_common::config::{resolve_config_path, Settings, CONFIG_ENV_VAR};
use dpx_sync::error::error_chain;
use dpx_sync::{Pipeline, RunMode};
use std::path::PathBuf;
use tracing::{error, info};

/// Command-line arguments for dpx-sync
#[derive(Parser, Debug)]
#[command(name = "dpx-sync")]
#[command(about = "Down-payment extract and submission", long_about = None)]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Command {
    /// Fetch, filter and write extract files
    Extract,
    /// Dispatch the newest extract file of each partition
    Submit {
        /// Select and parse only; nothing is sent or archived
        #[arg(long)]
        dry_run: bool,
    },
    /// Submit, then extract
    Run {
        #[arg(long)]
        dry_run: bool,
    },
}

impl Command {
    fn mode(self) -> (RunMode, bool) {
        match self {
            Command::Extract => (RunMode::Extract, false),
            Command::Submit { dry_run } => (RunMode::Submit, dry_run),
            Command::Run { dry_run } => (RunMode::Full, dry_run),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Configuration errors are fatal before any network activity
    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR)?;
    let settings = Settings::load(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    dpx_common::logging::init_logging(&settings.logging.level, &settings.log_file())?;

    info!("Starting dpx-sync");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());
    info!("Output root: {}", settings.output_root.display());
    info!("Partitions: {}", settings.partitions.len());

    let (mode, dry_run) = args.command.unwrap_or(Command::Run { dry_run: false }).mode();

    let pipeline = match Pipeline::from_settings(&settings, dry_run) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %error_chain(&e), "Pipeline setup failed");
            return Err(e.into());
        }
    };

    let summary = pipeline.run(mode).await;
    if summary.has_errors() {
        info!(run_id = %summary.run_id, "Run finished with errors, see log");
    }
    Ok(())
}
