// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inventory Application Service
//!
//! Explicit CRUD over the group hierarchy, host memberships and hosts. Every
//! mutation commits to the store under the business lock, then pushes an
//! incremental sync of exactly the touched node while still holding it.
//!
//! Rules enforced here rather than in the store:
//!
//! - read-only groups (business roots, `ALL_HOST`) reject update and delete
//! - a group's parent is a group of the same business; the sentinel `0`
//!   stands for the business root, so each business keeps a single root
//! - re-parenting may not make a group its own ancestor
//! - a group with child groups cannot be deleted
//! - catch-all membership is owned by reconciliation

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::application::business_locks::BusinessLocks;
use crate::application::sync_dispatcher::{ChangeSet, InventoryRef, SyncDispatcher, SyncReport};
use crate::domain::group::{would_create_cycle, Group, GroupId, GroupPatch, NewGroup, CATCH_ALL_GROUP_NAME};
use crate::domain::host::{Account, Host, HostId, NewHost, Parameter};
use crate::domain::inventory::InventoryNode;
use crate::domain::repository::{InventoryRepository, RepositoryError};
use crate::infrastructure::import_parser::ImportError;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("No field mapping registered for business '{0}'")]
    MappingNotFound(String),

    #[error("Record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },

    #[error("Store conflict: {0}")]
    StoreConflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Group '{0}' is read-only")]
    ReadOnlyGroup(String),

    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("Repository error: {0}")]
    Repository(String),
}

impl From<RepositoryError> for InventoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => InventoryError::NotFound(what),
            RepositoryError::Conflict(what) => InventoryError::StoreConflict(what),
            other => InventoryError::Repository(other.to_string()),
        }
    }
}

/// A committed store change together with the sync it triggered
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
    pub value: T,
    pub sync: SyncReport,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait InventoryService: Send + Sync {
    async fn create_group(&self, group: NewGroup) -> Result<Synced<Group>, InventoryError>;

    /// Rename, re-parent and/or describe a group
    async fn update_group(&self, id: GroupId, patch: GroupPatch) -> Result<Synced<Group>, InventoryError>;

    async fn set_group_params(&self, id: GroupId, params: Vec<Parameter>) -> Result<Synced<Group>, InventoryError>;

    async fn delete_group(&self, id: GroupId) -> Result<Synced<Group>, InventoryError>;

    async fn attach_host(&self, group: GroupId, host: HostId) -> Result<Synced<Host>, InventoryError>;

    async fn detach_host(&self, group: GroupId, host: HostId) -> Result<Synced<Host>, InventoryError>;

    /// Create a host outside of any import; it joins the catch-all group
    async fn create_host(&self, host: NewHost) -> Result<Synced<Host>, InventoryError>;

    /// Replace accounts and parameters of a host
    async fn update_host_access(
        &self,
        id: HostId,
        accounts: Vec<Account>,
        params: Vec<Parameter>,
    ) -> Result<Synced<Host>, InventoryError>;

    async fn delete_host(&self, id: HostId) -> Result<Synced<Host>, InventoryError>;

    /// Adapted tree of the business, `None` when it has no root yet
    async fn tree(&self, business: &str) -> Result<Option<InventoryNode>, InventoryError>;

    /// Push the whole business tree to the scheduler
    async fn full_sync(&self, business: &str) -> SyncReport;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardInventoryService {
    repository: Arc<dyn InventoryRepository>,
    dispatcher: Arc<SyncDispatcher>,
    locks: BusinessLocks,
}

impl StandardInventoryService {
    pub fn new(
        repository: Arc<dyn InventoryRepository>,
        dispatcher: Arc<SyncDispatcher>,
        locks: BusinessLocks,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            locks,
        }
    }

    async fn require_group(&self, id: GroupId) -> Result<Group, InventoryError> {
        self.repository
            .find_group(id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("group {}", id)))
    }

    async fn require_host(&self, id: HostId) -> Result<Host, InventoryError> {
        self.repository
            .find_host(id)
            .await?
            .ok_or_else(|| InventoryError::NotFound(format!("host {}", id)))
    }

    fn require_writable(group: &Group) -> Result<(), InventoryError> {
        if group.read_only {
            return Err(InventoryError::ReadOnlyGroup(group.name.clone()));
        }
        Ok(())
    }

    fn check_name(name: &str) -> Result<(), InventoryError> {
        if name.trim().is_empty() {
            return Err(InventoryError::InvalidHierarchy("group name cannot be empty".to_string()));
        }
        if name == CATCH_ALL_GROUP_NAME {
            return Err(InventoryError::InvalidHierarchy(format!(
                "'{}' is reserved for the catch-all group",
                CATCH_ALL_GROUP_NAME
            )));
        }
        Ok(())
    }

    /// Parent id to store: the sentinel resolves to the business root,
    /// anything else must be a group of the same business
    async fn resolve_parent(&self, business: &str, pid: GroupId) -> Result<GroupId, InventoryError> {
        if pid.is_root_sentinel() {
            return Ok(self.repository.ensure_business_root(business).await?);
        }
        match self.repository.find_group(pid).await? {
            Some(parent) if parent.business == business => Ok(pid),
            Some(parent) => Err(InventoryError::InvalidHierarchy(format!(
                "parent group {} belongs to business '{}'",
                pid, parent.business
            ))),
            None => Err(InventoryError::InvalidHierarchy(format!("parent group {} does not exist", pid))),
        }
    }

    /// Host view limited to one membership, so sync touches only that node
    fn membership_view(host: &Host, group: GroupId) -> Host {
        let mut view = host.clone();
        view.group_ids = vec![group];
        view
    }
}

#[async_trait]
impl InventoryService for StandardInventoryService {
    async fn create_group(&self, group: NewGroup) -> Result<Synced<Group>, InventoryError> {
        Self::check_name(&group.name)?;
        let _guard = self.locks.acquire(&group.business).await;
        let pid = self.resolve_parent(&group.business, group.pid).await?;

        let group = NewGroup {
            pid,
            read_only: false,
            ..group
        };
        let created = self.repository.create_group(group).await?;
        info!(business = %created.business, group = %created.name, id = %created.id, "Group created");

        let changes = ChangeSet::new(&created.business).with_added(InventoryRef::Group(created.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: created, sync })
    }

    async fn update_group(&self, id: GroupId, mut patch: GroupPatch) -> Result<Synced<Group>, InventoryError> {
        let current = self.require_group(id).await?;
        let _guard = self.locks.acquire(&current.business).await;
        let mut group = self.require_group(id).await?;
        Self::require_writable(&group)?;

        if let Some(name) = &patch.name {
            Self::check_name(name)?;
        }
        if let Some(requested) = patch.pid {
            let pid = self.resolve_parent(&group.business, requested).await?;
            patch.pid = Some(pid);
            let parents: HashMap<GroupId, GroupId> = self
                .repository
                .list_groups(&group.business)
                .await?
                .into_iter()
                .map(|g| (g.id, g.pid))
                .collect();
            if would_create_cycle(id, pid, |g| parents.get(&g).copied()) {
                return Err(InventoryError::InvalidHierarchy(format!(
                    "moving group {} under {} would create a cycle",
                    id, pid
                )));
            }
        }

        patch.apply(&mut group);
        self.repository.save_group(&group).await?;
        info!(business = %group.business, group = %group.name, id = %group.id, "Group updated");

        let changes = ChangeSet::new(&group.business).with_updated(InventoryRef::Group(group.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: group, sync })
    }

    async fn set_group_params(&self, id: GroupId, params: Vec<Parameter>) -> Result<Synced<Group>, InventoryError> {
        let current = self.require_group(id).await?;
        let _guard = self.locks.acquire(&current.business).await;
        let mut group = self.require_group(id).await?;
        Self::require_writable(&group)?;

        group.params = params;
        self.repository.save_group(&group).await?;
        info!(business = %group.business, group = %group.name, params = group.params.len(), "Group parameters replaced");

        let changes = ChangeSet::new(&group.business).with_updated(InventoryRef::Group(group.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: group, sync })
    }

    async fn delete_group(&self, id: GroupId) -> Result<Synced<Group>, InventoryError> {
        let current = self.require_group(id).await?;
        let _guard = self.locks.acquire(&current.business).await;
        let group = self.require_group(id).await?;
        Self::require_writable(&group)?;

        let siblings = self.repository.list_groups(&group.business).await?;
        if siblings.iter().any(|g| g.pid == id) {
            return Err(InventoryError::StoreConflict(format!(
                "group '{}' still has child groups",
                group.name
            )));
        }

        self.repository.delete_group(id).await?;
        info!(business = %group.business, group = %group.name, id = %group.id, "Group deleted");

        let changes = ChangeSet::new(&group.business).with_deleted(InventoryRef::Group(group.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: group, sync })
    }

    async fn attach_host(&self, group_id: GroupId, host_id: HostId) -> Result<Synced<Host>, InventoryError> {
        let group = self.require_group(group_id).await?;
        let _guard = self.locks.acquire(&group.business).await;
        let host = self.require_host(host_id).await?;
        if host.business != group.business {
            return Err(InventoryError::InvalidHierarchy(format!(
                "host '{}' belongs to business '{}', group '{}' to '{}'",
                host.name, host.business, group.name, group.business
            )));
        }

        self.repository.add_membership(group_id, host_id).await?;
        let host = self.require_host(host_id).await?;
        info!(business = %group.business, group = %group.name, host = %host.name, "Host attached");

        let changes = ChangeSet::new(&group.business)
            .with_added(InventoryRef::Host(Self::membership_view(&host, group_id)));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: host, sync })
    }

    async fn detach_host(&self, group_id: GroupId, host_id: HostId) -> Result<Synced<Host>, InventoryError> {
        let group = self.require_group(group_id).await?;
        if group.is_catch_all() {
            return Err(InventoryError::ReadOnlyGroup(group.name));
        }
        let _guard = self.locks.acquire(&group.business).await;
        let host = self.require_host(host_id).await?;

        if !self.repository.remove_membership(group_id, host_id).await? {
            return Err(InventoryError::NotFound(format!(
                "host {} is not a member of group {}",
                host_id, group_id
            )));
        }
        info!(business = %group.business, group = %group.name, host = %host.name, "Host detached");

        let changes = ChangeSet::new(&group.business)
            .with_deleted(InventoryRef::Host(Self::membership_view(&host, group_id)));
        let sync = self.dispatcher.incremental_sync(&changes).await;

        let host = self.require_host(host_id).await?;
        Ok(Synced { value: host, sync })
    }

    async fn create_host(&self, host: NewHost) -> Result<Synced<Host>, InventoryError> {
        if host.record.name.trim().is_empty() {
            return Err(InventoryError::InvalidRecord {
                index: 0,
                reason: "host name is missing".to_string(),
            });
        }
        let business = host.record.business.clone();
        let _guard = self.locks.acquire(&business).await;

        let created = self.repository.create_host(host).await?;
        info!(business = %business, host = %created.name, id = %created.id, "Host created");

        let changes = ChangeSet::new(&business).with_added(InventoryRef::Host(created.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: created, sync })
    }

    async fn update_host_access(
        &self,
        id: HostId,
        accounts: Vec<Account>,
        params: Vec<Parameter>,
    ) -> Result<Synced<Host>, InventoryError> {
        let current = self.require_host(id).await?;
        let _guard = self.locks.acquire(&current.business).await;

        let saved = self.repository.save_host_access(id, &accounts, &params).await?;
        info!(business = %saved.business, host = %saved.name, "Host access updated");

        let changes = ChangeSet::new(&saved.business).with_updated(InventoryRef::Host(saved.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: saved, sync })
    }

    async fn delete_host(&self, id: HostId) -> Result<Synced<Host>, InventoryError> {
        let current = self.require_host(id).await?;
        let _guard = self.locks.acquire(&current.business).await;

        let removed = self.repository.delete_host(id).await?;
        info!(business = %removed.business, host = %removed.name, "Host deleted");

        let changes = ChangeSet::new(&removed.business).with_deleted(InventoryRef::Host(removed.clone()));
        let sync = self.dispatcher.incremental_sync(&changes).await;
        Ok(Synced { value: removed, sync })
    }

    async fn tree(&self, business: &str) -> Result<Option<InventoryNode>, InventoryError> {
        Ok(self.dispatcher.business_tree(business).await?)
    }

    async fn full_sync(&self, business: &str) -> SyncReport {
        let _guard = self.locks.acquire(business).await;
        self.dispatcher.full_sync(business).await
    }
}
