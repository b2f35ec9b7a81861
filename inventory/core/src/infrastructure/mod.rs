// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod import_parser;
pub mod repositories;
pub mod scheduler_client;

pub use import_parser::{ImportError, ImportFormat};
pub use repositories::{InMemoryInventoryRepository, PostgresInventoryRepository};
pub use scheduler_client::HttpSchedulerClient;
