// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use charmarr_storage_core::domain::volume::VolumeLocator;

use super::GlobalArgs;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate the configuration
    Validate,
}

pub async fn handle_command(command: ConfigCommand, global: &GlobalArgs) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(global, paths),
        ConfigCommand::Validate => validate(global),
    }
}

fn show(global: &GlobalArgs, show_paths: bool) -> Result<()> {
    let config = global.load_config()?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &global.config {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        match std::env::var("CHARMARR_STORAGE_CONFIG") {
            Ok(path) => println!("  2. CHARMARR_STORAGE_CONFIG: {}", path),
            Err(_) => println!("  2. CHARMARR_STORAGE_CONFIG: {}", "(not set)".dimmed()),
        }
        println!("  3. ./charmarr-storage.yaml");
        println!("  4. ~/.charmarr/storage.yaml");
        println!("  5. /etc/charmarr/storage.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();
    print!(
        "{}",
        config
            .to_yaml_string()
            .context("Failed to render configuration")?
    );
    Ok(())
}

fn validate(global: &GlobalArgs) -> Result<()> {
    println!("Validating configuration...");

    let config = global.load_config()?;
    let spec = config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());
    println!("  Backend: {}", spec.backend());
    match &spec.locator {
        VolumeLocator::StorageClass { class_name } => println!("  Storage class: {}", class_name),
        VolumeLocator::NativeNfs { server, path } => println!("  NFS export: {}:{}", server, path),
        VolumeLocator::HostPath { path } => println!("  Host path: {}", path),
    }
    println!("  Size: {} ({})", spec.capacity, spec.access_mode.as_str());
    println!("  Owner: {}", spec.owner);
    Ok(())
}
