// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Migrate Command
//!
//! Implements `opsbook migrate`, which applies the inventory schema migrations
//! to the PostgreSQL store named in `spec.database` (or `OPSBOOK_DATABASE_URL`).
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! opsbook migrate
//!
//! # Preview migrations without applying
//! opsbook migrate --dry-run
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use opsbook_core::domain::inventory_config::InventoryConfigManifest;
use opsbook_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Args)]
pub struct MigrateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: MigrateCommand, config: &InventoryConfigManifest) -> Result<()> {
    println!("{}", "Opsbook Migrate".bold().green());

    let database = config.spec.database.as_ref().context(
        "No database configured. Set spec.database.url or OPSBOOK_DATABASE_URL to run migrations.",
    )?;

    println!("Connecting to database...");
    let db = Database::with_max_connections(&database.url, 1)
        .await
        .context("Failed to connect to database")?;

    let applied_count = db.applied_migrations().await?;
    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    db.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
