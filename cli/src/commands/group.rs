// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Group hierarchy commands
//!
//! Commands: create, update, params, delete, attach, detach

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use opsbook_core::application::{InventoryService, Synced};
use opsbook_core::domain::group::{Group, GroupId, GroupPatch, NewGroup, ROOT_GROUP_ID};
use opsbook_core::domain::host::{Host, HostId, Parameter};

use super::{parse_param, print_json, print_sync};
use crate::bootstrap::InventoryContext;

#[derive(Subcommand)]
pub enum GroupCommand {
    /// Create a group under a parent (default: the business root)
    Create {
        /// Group name, unique within the business
        name: String,

        /// Business unit
        #[arg(short, long)]
        business: String,

        /// Parent group id; omit to hang the group below the business root
        #[arg(short, long)]
        parent: Option<i64>,

        #[arg(long)]
        description: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rename, move or describe a group
    Update {
        id: i64,

        #[arg(long)]
        name: Option<String>,

        /// New parent group id (0 for the business root)
        #[arg(short, long)]
        parent: Option<i64>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Replace the parameters of a group
    Params {
        id: i64,

        /// Parameter as KEY=VALUE (repeatable); none clears all
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<Parameter>,

        #[arg(long)]
        json: bool,
    },

    /// Delete a leaf group
    Delete {
        id: i64,

        #[arg(long)]
        json: bool,
    },

    /// Add a host to a group
    Attach {
        group: i64,
        host: i64,

        #[arg(long)]
        json: bool,
    },

    /// Remove a host from a group
    Detach {
        group: i64,
        host: i64,

        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: GroupCommand, ctx: &InventoryContext) -> Result<()> {
    let service = ctx.inventory_service();

    match command {
        GroupCommand::Create {
            name,
            business,
            parent,
            description,
            json,
        } => {
            let pid = parent.map(GroupId).unwrap_or(ROOT_GROUP_ID);
            let mut group = NewGroup::new(pid, name, business);
            group.description = description;
            let result = service.create_group(group).await.context("Failed to create group")?;
            report_group("created", &result, json)
        }
        GroupCommand::Update {
            id,
            name,
            parent,
            description,
            json,
        } => {
            let patch = GroupPatch {
                name,
                pid: parent.map(GroupId),
                description,
            };
            if patch.is_empty() {
                anyhow::bail!("Nothing to update: pass --name, --parent or --description");
            }
            let result = service
                .update_group(GroupId(id), patch)
                .await
                .context("Failed to update group")?;
            report_group("updated", &result, json)
        }
        GroupCommand::Params { id, params, json } => {
            let result = service
                .set_group_params(GroupId(id), params)
                .await
                .context("Failed to set group parameters")?;
            report_group("updated", &result, json)
        }
        GroupCommand::Delete { id, json } => {
            let result = service.delete_group(GroupId(id)).await.context("Failed to delete group")?;
            report_group("deleted", &result, json)
        }
        GroupCommand::Attach { group, host, json } => {
            let result = service
                .attach_host(GroupId(group), HostId(host))
                .await
                .context("Failed to attach host")?;
            report_membership("attached to", group, &result, json)
        }
        GroupCommand::Detach { group, host, json } => {
            let result = service
                .detach_host(GroupId(group), HostId(host))
                .await
                .context("Failed to detach host")?;
            report_membership("detached from", group, &result, json)
        }
    }
}

fn report_group(action: &str, result: &Synced<Group>, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    let group = &result.value;
    println!(
        "{}",
        format!("✓ Group '{}' {} (id {}, parent {})", group.name, action, group.id, group.pid).green()
    );
    print_sync(&result.sync);
    Ok(())
}

fn report_membership(action: &str, group: i64, result: &Synced<Host>, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    println!(
        "{}",
        format!("✓ Host '{}' {} group {}", result.value.name, action, group).green()
    );
    print_sync(&result.sync);
    Ok(())
}
