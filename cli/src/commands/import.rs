// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host batch import commands
//!
//! Commands: import, cmdb-refresh

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;

use opsbook_core::application::ImportSummary;
use opsbook_core::domain::inventory_config::SyncStrategy;

use super::{print_json, print_sync};
use crate::bootstrap::InventoryContext;

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Full,
    Incremental,
    Flat,
}

impl From<StrategyArg> for SyncStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Full => SyncStrategy::Full,
            StrategyArg::Incremental => SyncStrategy::Incremental,
            StrategyArg::Flat => SyncStrategy::Flat,
        }
    }
}

#[derive(Args)]
pub struct ImportArgs {
    /// Delimited text with a header row, or a `.json` CMDB result
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Business unit the batch belongs to
    #[arg(short, long)]
    business: String,

    /// Sync strategy (default: spec.import.sync_strategy)
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Field delimiter (default: spec.import.delimiter)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct CmdbRefreshArgs {
    /// JSON array of CMDB instances
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Business unit the instances belong to
    #[arg(short, long)]
    business: String,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

pub async fn import(args: ImportArgs, ctx: &InventoryContext) -> Result<()> {
    let service = ctx.import_service(args.strategy.map(SyncStrategy::from), args.delimiter);
    let summary = service
        .import_file(&args.business, &args.file)
        .await
        .with_context(|| format!("Import of {} failed", args.file.display()))?;

    if args.json {
        print_json(&summary)
    } else {
        print_summary(&summary);
        Ok(())
    }
}

pub async fn cmdb_refresh(args: CmdbRefreshArgs, ctx: &InventoryContext) -> Result<()> {
    let body = std::fs::read(&args.file).with_context(|| format!("Failed to read {:?}", args.file))?;
    let summary = ctx
        .import_service(None, None)
        .refresh_from_cmdb(&args.business, &body)
        .await
        .context("CMDB refresh failed")?;

    if args.json {
        print_json(&summary)
    } else {
        print_summary(&summary);
        Ok(())
    }
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "{}",
        format!("✓ Inventory for '{}' reconciled", summary.business).green()
    );
    for (label, names) in [
        ("Added", &summary.added),
        ("Updated", &summary.updated),
        ("Deleted", &summary.deleted),
    ] {
        println!("  {}: {}", label.bold(), names.len());
        for name in names {
            println!("    - {}", name);
        }
    }
    print_sync(&summary.sync);
}
