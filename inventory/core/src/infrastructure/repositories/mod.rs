// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the `InventoryRepository` contract
//! defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve hosts, groups and memberships
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **PostgresInventoryRepository** - production store; every multi-row write
//!   runs in one transaction
//! - **InMemoryInventoryRepository** - development and test store; writes are
//!   staged on a copy of the state and swapped in only when every constraint
//!   holds, so a failed batch leaves nothing behind

pub mod postgres_inventory;

pub use postgres_inventory::PostgresInventoryRepository;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::group::{Group, GroupId, NewGroup, CATCH_ALL_GROUP_NAME};
use crate::domain::host::{Account, Host, HostId, HostRecord, NewHost, Parameter};
use crate::domain::reconcile::{plan_reconciliation, ReconciliationOutcome};
use crate::domain::repository::{InventoryRepository, RepositoryError};

#[derive(Debug, Clone, Default)]
struct InventoryState {
    groups: BTreeMap<GroupId, Group>,
    /// Memberships live on `Host::group_ids`
    hosts: BTreeMap<HostId, Host>,
    last_group_id: i64,
    last_host_id: i64,
}

impl InventoryState {
    fn insert_group(&mut self, group: NewGroup) -> Result<Group, RepositoryError> {
        if self
            .groups
            .values()
            .any(|g| g.business == group.business && g.name == group.name)
        {
            return Err(RepositoryError::Conflict(format!(
                "group '{}' already exists in business '{}'",
                group.name, group.business
            )));
        }
        self.last_group_id += 1;
        let group = group.into_group(GroupId(self.last_group_id));
        self.groups.insert(group.id, group.clone());
        Ok(group)
    }

    fn insert_host(&mut self, record: HostRecord) -> HostId {
        self.last_host_id += 1;
        let id = HostId(self.last_host_id);
        self.hosts.insert(id, Host::from_record(id, record));
        id
    }

    /// Read-only root named after the business, else the first one found, else a new one
    fn ensure_business_root(&mut self, business: &str) -> Result<GroupId, RepositoryError> {
        let roots: Vec<&Group> = self
            .groups
            .values()
            .filter(|g| g.business == business && g.is_business_root())
            .collect();
        if let Some(root) = roots.iter().find(|g| g.name == business).or(roots.first()) {
            return Ok(root.id);
        }
        Ok(self.insert_group(NewGroup::business_root(business))?.id)
    }

    fn ensure_catch_all(&mut self, business: &str) -> Result<GroupId, RepositoryError> {
        if let Some(group) = self
            .groups
            .values()
            .find(|g| g.business == business && g.name == CATCH_ALL_GROUP_NAME)
        {
            return Ok(group.id);
        }
        let root = self.ensure_business_root(business)?;
        Ok(self.insert_group(NewGroup::catch_all(root, business))?.id)
    }

    /// Host names and identity IPs are globally unique
    fn check_host_constraints(&self) -> Result<(), RepositoryError> {
        let mut names = HashSet::new();
        let mut ips = HashSet::new();
        for host in self.hosts.values() {
            if !names.insert(host.name.as_str()) {
                return Err(RepositoryError::Conflict(format!(
                    "host name '{}' is already taken",
                    host.name
                )));
            }
            if let Some(ip) = host.identity_ip.as_deref() {
                if !ips.insert(ip) {
                    return Err(RepositoryError::Conflict(format!(
                        "identity ip '{}' is already taken",
                        ip
                    )));
                }
            }
        }
        Ok(())
    }

    fn host(&self, id: HostId) -> Result<&Host, RepositoryError> {
        self.hosts
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("host {}", id)))
    }

    fn host_mut(&mut self, id: HostId) -> Result<&mut Host, RepositoryError> {
        self.hosts
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("host {}", id)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryInventoryRepository {
    state: Arc<RwLock<InventoryState>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn list_groups(&self, business: &str) -> Result<Vec<Group>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .groups
            .values()
            .filter(|g| g.business == business)
            .cloned()
            .collect())
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.groups.get(&id).cloned())
    }

    async fn ensure_business_root(&self, business: &str) -> Result<GroupId, RepositoryError> {
        let mut state = self.state.write().await;
        state.ensure_business_root(business)
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group, RepositoryError> {
        let mut state = self.state.write().await;
        state.insert_group(group)
    }

    async fn save_group(&self, group: &Group) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&group.id) {
            return Err(RepositoryError::NotFound(format!("group {}", group.id)));
        }
        if state
            .groups
            .values()
            .any(|g| g.id != group.id && g.business == group.business && g.name == group.name)
        {
            return Err(RepositoryError::Conflict(format!(
                "group '{}' already exists in business '{}'",
                group.name, group.business
            )));
        }
        state.groups.insert(group.id, group.clone());
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if state.groups.remove(&id).is_none() {
            return Err(RepositoryError::NotFound(format!("group {}", id)));
        }
        for host in state.hosts.values_mut() {
            host.leave(id);
        }
        Ok(())
    }

    async fn list_hosts(&self, business: &str) -> Result<Vec<Host>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .hosts
            .values()
            .filter(|h| h.business == business)
            .cloned()
            .collect())
    }

    async fn find_host(&self, id: HostId) -> Result<Option<Host>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.hosts.get(&id).cloned())
    }

    async fn find_host_by_name(&self, name: &str) -> Result<Option<Host>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.hosts.values().find(|h| h.name == name).cloned())
    }

    async fn create_host(&self, host: NewHost) -> Result<Host, RepositoryError> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();

        let business = host.record.business.clone();
        let id = staged.insert_host(host.record);
        let catch_all = staged.ensure_catch_all(&business)?;
        let created = staged.host_mut(id)?;
        created.accounts = host.accounts;
        created.params = host.params;
        created.join(catch_all);
        let created = created.clone();

        staged.check_host_constraints()?;
        *state = staged;
        Ok(created)
    }

    async fn save_host_access(
        &self,
        id: HostId,
        accounts: &[Account],
        params: &[Parameter],
    ) -> Result<Host, RepositoryError> {
        let mut state = self.state.write().await;
        let host = state.host_mut(id)?;
        host.accounts = accounts.to_vec();
        host.params = params.to_vec();
        Ok(host.clone())
    }

    async fn delete_host(&self, id: HostId) -> Result<Host, RepositoryError> {
        let mut state = self.state.write().await;
        state
            .hosts
            .remove(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("host {}", id)))
    }

    async fn add_membership(&self, group: GroupId, host: HostId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if !state.groups.contains_key(&group) {
            return Err(RepositoryError::NotFound(format!("group {}", group)));
        }
        state.host_mut(host)?.join(group);
        Ok(())
    }

    async fn remove_membership(&self, group: GroupId, host: HostId) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        let was_member = state.host(host)?.is_member_of(group);
        state.host_mut(host)?.leave(group);
        Ok(was_member)
    }

    async fn apply_reconciliation(
        &self,
        business: &str,
        batch: Vec<HostRecord>,
    ) -> Result<ReconciliationOutcome, RepositoryError> {
        let mut state = self.state.write().await;
        let mut staged = state.clone();

        let stored: Vec<Host> = staged
            .hosts
            .values()
            .filter(|h| h.business == business)
            .cloned()
            .collect();
        let plan = plan_reconciliation(business, batch, &stored);

        let mut outcome = ReconciliationOutcome::empty(business);
        for id in &plan.deleted {
            if let Some(host) = staged.hosts.remove(id) {
                outcome.deleted.push(host);
            }
        }

        let mut touched: Vec<(HostId, bool)> = Vec::with_capacity(plan.added.len() + plan.updated.len());
        for (id, record) in &plan.updated {
            staged.host_mut(*id)?.apply_record(record);
            touched.push((*id, false));
        }
        for record in plan.added {
            touched.push((staged.insert_host(record), true));
        }

        if !touched.is_empty() {
            let catch_all = staged.ensure_catch_all(business)?;
            for (id, added) in touched {
                let host = staged.host_mut(id)?;
                host.join(catch_all);
                let host = host.clone();
                if added {
                    outcome.added.push(host);
                } else {
                    outcome.updated.push(host);
                }
            }
        }

        staged.check_host_constraints()?;
        *state = staged;
        Ok(outcome)
    }
}
