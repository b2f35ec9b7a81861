// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Manual host commands
//!
//! Commands: create, access, delete

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;

use opsbook_core::application::{InventoryService, Synced};
use opsbook_core::domain::host::{Account, Host, HostId, HostRecord, NewHost, Parameter};

use super::{parse_account, parse_param, print_json, print_sync};
use crate::bootstrap::InventoryContext;

#[derive(Subcommand)]
pub enum HostCommand {
    /// Create a host; it joins the business catch-all group
    Create {
        name: String,

        #[arg(short, long)]
        business: String,

        /// Identity IP, unique across the inventory
        #[arg(long)]
        ip: Option<String>,

        #[arg(long)]
        os: Option<String>,

        /// Login as USER:PASSWORD (repeatable)
        #[arg(long = "account", value_name = "USER:PASSWORD", value_parser = parse_account)]
        accounts: Vec<Account>,

        /// Parameter as KEY=VALUE (repeatable)
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<Parameter>,

        #[arg(long)]
        json: bool,
    },

    /// Replace the accounts and parameters of a host
    Access {
        id: i64,

        #[arg(long = "account", value_name = "USER:PASSWORD", value_parser = parse_account)]
        accounts: Vec<Account>,

        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_param)]
        params: Vec<Parameter>,

        #[arg(long)]
        json: bool,
    },

    /// Delete a host and its memberships
    Delete {
        id: i64,

        #[arg(long)]
        json: bool,
    },
}

pub async fn handle_command(command: HostCommand, ctx: &InventoryContext) -> Result<()> {
    let service = ctx.inventory_service();

    match command {
        HostCommand::Create {
            name,
            business,
            ip,
            os,
            accounts,
            params,
            json,
        } => {
            let mut record = HostRecord::new(name, business);
            record.ip = ip;
            record.os = os;
            let result = service
                .create_host(NewHost {
                    record,
                    accounts,
                    params,
                })
                .await
                .context("Failed to create host")?;
            report_host("created", &result, json)
        }
        HostCommand::Access {
            id,
            accounts,
            params,
            json,
        } => {
            let result = service
                .update_host_access(HostId(id), accounts, params)
                .await
                .context("Failed to update host access")?;
            report_host("updated", &result, json)
        }
        HostCommand::Delete { id, json } => {
            let result = service.delete_host(HostId(id)).await.context("Failed to delete host")?;
            report_host("deleted", &result, json)
        }
    }
}

fn report_host(action: &str, result: &Synced<Host>, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    let host = &result.value;
    println!(
        "{}",
        format!(
            "✓ Host '{}' {} (id {}, ip {})",
            host.name,
            action,
            host.id,
            host.identity_ip.as_deref().unwrap_or("-")
        )
        .green()
    );
    print_sync(&result.sync);
    Ok(())
}
