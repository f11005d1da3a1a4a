//! Command-line driver for Eikonal tomography.
//!
//! Wires configuration, the JSON travel-time archive, the JSON store and
//! the reference grid builder together.
//!
//! # Subcommands
//!
//! 1. `init` -- write the configured study region to the store
//! 2. `run` -- create a run and build every event record
//! 3. `stack --run-id N [--persist]` -- per-period coverage maps
//! 4. `runs` -- list runs and their field types

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eikonal_core::{ConfigSource, EikonalConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "eikonal-engine")]
#[command(version)]
#[command(about = "Eikonal surface-wave tomography runs and stacking", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "eikonal-config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the study region to the store
    Init,
    /// Build event records for a new run
    Run,
    /// Compute per-period coverage maps of a run
    Stack {
        /// Run to stack
        #[arg(long)]
        run_id: u32,

        /// Write `Nmeasure` and `event_count` onto each period group
        #[arg(long)]
        persist: bool,
    },
    /// List runs in the store
    Runs,
}

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration loading or the subcommand fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let loaded = EikonalConfig::load_or_default(&cli.config);

    let (level, json) = loaded.as_ref().map_or_else(
        |_| ("info".to_owned(), false),
        |(c, _)| (c.logging.level.clone(), c.logging.json),
    );
    init_tracing(&level, json);

    let (config, source) = loaded?;
    if source == ConfigSource::Defaults {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }
    info!(
        config = %cli.config.display(),
        archive = %config.paths.archive.display(),
        store = %config.paths.store.display(),
        "eikonal-engine starting"
    );

    match cli.command {
        Commands::Init => commands::init(&config)?,
        Commands::Run => commands::run(&config)?,
        Commands::Stack { run_id, persist } => commands::stack_run(&config, run_id, persist)?,
        Commands::Runs => commands::runs(&config)?,
    }
    Ok(())
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}
