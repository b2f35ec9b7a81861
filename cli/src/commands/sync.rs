// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tree commands
//!
//! Commands: sync, tree

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use opsbook_core::application::InventoryService;
use opsbook_core::domain::inventory::InventoryNode;

use super::{print_json, print_sync};
use crate::bootstrap::InventoryContext;

#[derive(Args)]
pub struct SyncArgs {
    /// Business unit to push
    #[arg(short, long)]
    business: String,

    /// Print the sync report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
pub struct TreeArgs {
    /// Business unit to print
    #[arg(short, long)]
    business: String,

    /// Print the scheduler payload instead of an outline
    #[arg(long)]
    json: bool,
}

pub async fn sync(args: SyncArgs, ctx: &InventoryContext) -> Result<()> {
    if !ctx.sync_enabled() {
        println!("{}", "Scheduler sync is disabled in the configuration.".yellow());
    }

    let report = ctx.inventory_service().full_sync(&args.business).await;
    if args.json {
        print_json(&report)?;
    } else {
        print_sync(&report);
    }

    if report.is_failed() {
        anyhow::bail!("Scheduler sync failed for '{}'", args.business);
    }
    Ok(())
}

pub async fn tree(args: TreeArgs, ctx: &InventoryContext) -> Result<()> {
    let tree = ctx
        .inventory_service()
        .tree(&args.business)
        .await
        .context("Failed to load inventory tree")?;

    let Some(root) = tree else {
        println!("{}", format!("No inventory for business '{}'", args.business).yellow());
        return Ok(());
    };

    if args.json {
        return print_json(&root);
    }

    let mut out = String::new();
    render_outline(&root, 0, &mut out);
    print!("{}", out);
    Ok(())
}

fn render_outline(node: &InventoryNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        InventoryNode::Group(group) => {
            out.push_str(&format!("{}{} [{}]\n", indent, group.name, group.id));
            for child in &group.children {
                render_outline(child, depth + 1, out);
            }
        }
        InventoryNode::Host(host) => {
            out.push_str(&format!(
                "{}{} {} ({})\n",
                indent,
                host.name,
                host.ip.as_deref().unwrap_or("-"),
                host.os.as_deref().unwrap_or("unknown"),
            ));
        }
    }
}
