// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Inventory Repository Interface
//!
//! Persistence contract for the host/group store: hosts with their accounts,
//! parameters and memberships, and the parent-linked group hierarchy. The
//! interface lives in the domain layer and is implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregates | Implementations |
//! |-------|------------|-----------------|
//! | `InventoryRepository` | `Host`, `Group` | `InMemoryInventoryRepository`, `PostgresInventoryRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! The concrete implementation is selected at startup from `spec.database` in
//! `opsbook-config.yaml`. In-memory storage serves development and tests;
//! PostgreSQL serves production.
//!
//! ## Transactions
//!
//! `apply_reconciliation` and `create_host` are all-or-nothing: either every
//! row change of the call is visible afterwards or none is.

use async_trait::async_trait;

use crate::domain::group::{Group, GroupId, NewGroup};
use crate::domain::host::{Account, Host, HostId, HostRecord, NewHost, Parameter};
use crate::domain::reconcile::ReconciliationOutcome;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// All groups of a business, ascending by id
    async fn list_groups(&self, business: &str) -> Result<Vec<Group>, RepositoryError>;

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>, RepositoryError>;

    /// Read-only root of a business, created when absent
    async fn ensure_business_root(&self, business: &str) -> Result<GroupId, RepositoryError>;

    /// Insert a group. A duplicate name within the business is a conflict.
    async fn create_group(&self, group: NewGroup) -> Result<Group, RepositoryError>;

    /// Persist name, pid, description and parameters of an existing group
    async fn save_group(&self, group: &Group) -> Result<(), RepositoryError>;

    /// Delete a group and its memberships and parameters
    async fn delete_group(&self, id: GroupId) -> Result<(), RepositoryError>;

    /// All hosts of a business with accounts, parameters and memberships, ascending by id
    async fn list_hosts(&self, business: &str) -> Result<Vec<Host>, RepositoryError>;

    async fn find_host(&self, id: HostId) -> Result<Option<Host>, RepositoryError>;

    async fn find_host_by_name(&self, name: &str) -> Result<Option<Host>, RepositoryError>;

    /// Insert a host with its accounts and parameters, attached to the
    /// business catch-all group (created on demand)
    async fn create_host(&self, host: NewHost) -> Result<Host, RepositoryError>;

    /// Replace the accounts and parameters of a host
    async fn save_host_access(
        &self,
        id: HostId,
        accounts: &[Account],
        params: &[Parameter],
    ) -> Result<Host, RepositoryError>;

    /// Delete a host, returning the row as it was (memberships included)
    async fn delete_host(&self, id: HostId) -> Result<Host, RepositoryError>;

    /// Idempotent: attaching an existing membership is not an error
    async fn add_membership(&self, group: GroupId, host: HostId) -> Result<(), RepositoryError>;

    /// Returns false when the membership did not exist
    async fn remove_membership(&self, group: GroupId, host: HostId) -> Result<bool, RepositoryError>;

    /// Reconcile an authoritative batch for `business` in one transaction.
    ///
    /// Adds, updates and deletes hosts per `crate::domain::reconcile`, then
    /// attaches every added and updated host to the catch-all group, creating
    /// the business root and catch-all when absent.
    async fn apply_reconciliation(
        &self,
        business: &str,
        batch: Vec<HostRecord>,
    ) -> Result<ReconciliationOutcome, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
