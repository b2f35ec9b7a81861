// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Opsbook Inventory CLI
//!
//! The `opsbook` binary imports host batches into the inventory, maintains the
//! group hierarchy and pushes the result to the external scheduler.
//!
//! ## Commands
//!
//! - `opsbook import <FILE> --business <B>` - Reconcile a CSV/CMDB file and sync
//! - `opsbook cmdb-refresh <FILE> --business <B>` - Apply a CMDB result, full sync
//! - `opsbook sync|tree --business <B>` - Push or print the business tree
//! - `opsbook group create|update|params|delete|attach|detach` - Hierarchy maintenance
//! - `opsbook host create|access|delete` - Manual host maintenance
//! - `opsbook config show|validate|generate` - Configuration management
//! - `opsbook migrate` - Apply database migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use opsbook_cli::bootstrap::{bootstrap_subscriber, load_config, InventoryContext};
use opsbook_cli::commands::{
    self, CmdbRefreshArgs, ConfigCommand, GroupCommand, HostCommand, ImportArgs, MigrateCommand, SyncArgs, TreeArgs,
};

/// Opsbook - host inventory and scheduler synchronization
#[derive(Parser)]
#[command(name = "opsbook")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "OPSBOOK_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to the configured level
    #[arg(long, global = true, env = "OPSBOOK_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a host batch file for one business
    #[command(name = "import")]
    Import(ImportArgs),

    /// Apply a CMDB query result and push the whole tree
    #[command(name = "cmdb-refresh")]
    CmdbRefresh(CmdbRefreshArgs),

    /// Push the whole business tree to the scheduler
    #[command(name = "sync")]
    Sync(SyncArgs),

    /// Print the business tree
    #[command(name = "tree")]
    Tree(TreeArgs),

    /// Group hierarchy and membership management
    #[command(name = "group")]
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Manual host management
    #[command(name = "host")]
    Host {
        #[command(subcommand)]
        command: HostCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply inventory database migrations
    #[command(name = "migrate")]
    Migrate {
        #[command(flatten)]
        command: MigrateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    };

    // Config commands must work even when the discovered config is broken
    if let Commands::Config { command } = command {
        init_logging(cli.log_level.as_deref().unwrap_or("info"), "compact")?;
        return commands::config::handle_command(command, cli.config).await;
    }

    // Events raised while loading go to a stderr subscriber at the CLI level;
    // the configured format takes over once the manifest is known
    let bootstrap = bootstrap_subscriber(cli.log_level.as_deref().unwrap_or("info"), std::io::stderr)?;
    let config = tracing::dispatcher::with_default(&bootstrap, || load_config(cli.config))?;
    let logging = config.logging();
    init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging.format)?;
    debug!(deployment = %config.metadata.name, "Configuration loaded");

    if let Commands::Migrate { command } = command {
        return commands::migrate::execute(command, &config).await;
    }

    let ctx = InventoryContext::new(config).await?;
    match command {
        Commands::Import(args) => commands::import::import(args, &ctx).await,
        Commands::CmdbRefresh(args) => commands::import::cmdb_refresh(args, &ctx).await,
        Commands::Sync(args) => commands::sync::sync(args, &ctx).await,
        Commands::Tree(args) => commands::sync::tree(args, &ctx).await,
        Commands::Group { command } => commands::group::handle_command(command, &ctx).await,
        Commands::Host { command } => commands::host::handle_command(command, &ctx).await,
        Commands::Config { .. } | Commands::Migrate { .. } => Ok(()),
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
