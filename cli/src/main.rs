// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Charmarr Storage CLI
//!
//! The `charmarr-storage` binary keeps the shared media volume of a Charmarr
//! deployment converged with its configuration.
//!
//! ## Commands
//!
//! - `charmarr-storage reconcile` - Run a single reconcile pass
//! - `charmarr-storage run` - Reconcile periodically until interrupted
//! - `charmarr-storage teardown` - Remove the shared volume (opt-in)
//! - `charmarr-storage config show|validate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, GlobalArgs, RunArgs, TeardownArgs};

/// Charmarr Storage - shared media volume operator
#[derive(Parser)]
#[command(name = "charmarr-storage")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery, including CHARMARR_STORAGE_CONFIG)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Namespace holding the shared claim
    #[arg(short, long, global = true, env = "CHARMARR_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Where the storage descriptor for consumers is written
    #[arg(
        long,
        global = true,
        env = "CHARMARR_DESCRIPTOR_PATH",
        default_value = "./charmarr-storage-descriptor.json"
    )]
    descriptor_path: PathBuf,

    /// Run against an in-memory cluster instead of the API server
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CHARMARR_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single reconcile pass and print the resulting status
    Reconcile {
        /// Act as a non-leader replica
        #[arg(long)]
        standby: bool,
    },

    /// Reconcile periodically until interrupted
    Run(RunArgs),

    /// Remove the shared volume when cleanup-on-remove is enabled
    Teardown(TeardownArgs),

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.log_format)?;

    let global = GlobalArgs {
        config: cli.config,
        namespace: cli.namespace,
        descriptor_path: cli.descriptor_path,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Reconcile { standby } => commands::reconcile::execute(&global, standby).await,
        Commands::Run(args) => commands::run::execute(&global, args).await,
        Commands::Teardown(args) => commands::teardown::execute(&global, args).await,
        Commands::Config { command } => commands::config::handle_command(command, &global).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Text => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
