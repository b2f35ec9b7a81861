// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Inventory model, key mapping, reconciliation, tree building and the
//! scheduler wire vocabulary. Nothing in here performs I/O.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure inventory rules and the contracts infrastructure implements

pub mod business;
pub mod group;
pub mod host;
pub mod inventory;
pub mod inventory_config;
pub mod reconcile;
pub mod repository;
pub mod scheduler;
pub mod tree;
