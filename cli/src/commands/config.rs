// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::fmt::Write;
use std::path::PathBuf;

use opsbook_core::domain::inventory_config::InventoryConfigManifest;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./opsbook-config.yaml)
        #[arg(short, long, default_value = "./opsbook-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = InventoryConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. OPSBOOK_CONFIG_PATH: {}",
            std::env::var("OPSBOOK_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./opsbook-config.yaml");
        println!("  4. ~/.opsbook/config.yaml");
        println!("  5. /etc/opsbook/config.yaml");
        println!();
    }

    print!("{}", describe(&config)?);
    Ok(())
}

/// Human-readable summary of the effective configuration
fn describe(config: &InventoryConfigManifest) -> Result<String, std::fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{}", "Current configuration:".bold())?;
    writeln!(out)?;

    writeln!(out, "{}", "Deployment:".bold())?;
    writeln!(out, "  Name: {}", config.metadata.name)?;
    writeln!(out)?;

    writeln!(out, "{}", "Store:".bold())?;
    match &config.spec.database {
        Some(db) => writeln!(out, "  PostgreSQL (max {} connections)", db.max_connections)?,
        None => writeln!(out, "  In-memory")?,
    }
    writeln!(out)?;

    let scheduler = &config.spec.scheduler;
    writeln!(out, "{}", "Scheduler:".bold())?;
    writeln!(out, "  Enabled: {}", scheduler.enabled)?;
    writeln!(out, "  Endpoint: {}", scheduler.endpoint.as_deref().unwrap_or("(none)"))?;
    writeln!(out, "  Timeout: {}s", scheduler.timeout_seconds)?;
    writeln!(out, "  Transport port: {}", scheduler.transport_port)?;
    writeln!(
        out,
        "  API token: {}",
        if scheduler.api_token.is_some() { "(set)" } else { "(none)" }
    )?;
    writeln!(out)?;

    writeln!(out, "{}", "Import:".bold())?;
    writeln!(out, "  Delimiter: {:?}", config.spec.import.delimiter)?;
    writeln!(out, "  Sync strategy: {:?}", config.spec.import.sync_strategy)?;
    writeln!(out)?;

    writeln!(out, "{}", "Business Profiles:".bold())?;
    if config.spec.businesses.is_empty() {
        writeln!(out, "  {}", "(none)".dimmed())?;
    }
    for profile in &config.spec.businesses {
        writeln!(out, "  {} ({} mapped fields)", profile.business.bold(), profile.fields.len())?;
        for (raw, field) in &profile.fields {
            writeln!(out, "      - {} → {:?}", raw, field)?;
        }
    }
    writeln!(out)?;

    Ok(out)
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = InventoryConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
