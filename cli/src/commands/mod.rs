// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the opsbook CLI

pub mod config;
pub mod group;
pub mod host;
pub mod import;
pub mod migrate;
pub mod sync;

pub use self::config::ConfigCommand;
pub use self::group::GroupCommand;
pub use self::host::HostCommand;
pub use self::import::{CmdbRefreshArgs, ImportArgs};
pub use self::migrate::MigrateCommand;
pub use self::sync::{SyncArgs, TreeArgs};

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use opsbook_core::application::{SyncOutcome, SyncReport};
use opsbook_core::domain::host::{Account, Parameter};

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_sync(report: &SyncReport) {
    let mode = report.mode.as_str();
    match &report.outcome {
        SyncOutcome::Delivered { trees } => {
            println!("{}", format!("✓ Scheduler accepted {} sync ({} payload(s))", mode, trees).green())
        }
        SyncOutcome::Skipped { reason } => {
            println!("{}", format!("- Scheduler {} sync skipped: {}", mode, reason).dimmed())
        }
        SyncOutcome::Failed { error } => {
            println!("{}", format!("✗ Scheduler {} sync failed: {}", mode, error).red());
            println!("  The inventory change is committed; run `opsbook sync` to retry.");
        }
    }
}

/// `KEY=VALUE` → parameter
pub(crate) fn parse_param(s: &str) -> Result<Parameter, String> {
    match s.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => Ok(Parameter::new(name.trim(), value)),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// `USER:PASSWORD` → account
pub(crate) fn parse_account(s: &str) -> Result<Account, String> {
    match s.split_once(':') {
        Some((username, password)) if !username.is_empty() => Ok(Account {
            username: username.to_string(),
            password: password.to_string(),
        }),
        _ => Err(format!("expected USER:PASSWORD, got '{}'", s)),
    }
}
