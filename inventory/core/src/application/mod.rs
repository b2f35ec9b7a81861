// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod business_locks;
pub mod import_service;
pub mod inventory_service;
pub mod sync_dispatcher;

// Re-export services for convenience
pub use business_locks::BusinessLocks;
pub use import_service::{ImportSummary, InventoryImportService};
pub use inventory_service::{InventoryError, InventoryService, StandardInventoryService, Synced};
pub use sync_dispatcher::{ChangeSet, InventoryRef, SyncDispatcher, SyncMode, SyncOutcome, SyncReport};
