// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Group aggregate
//!
//! Groups form a parent-linked hierarchy per business unit. Every chain ends
//! at a business root whose pid is [`ROOT_GROUP_ID`]. Each business owns one
//! read-only catch-all group ([`CATCH_ALL_GROUP_NAME`]) that reconciliation
//! attaches every imported host to.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Hierarchy shape and the invariants explicit CRUD must respect

use serde::{Deserialize, Serialize};

use crate::domain::host::Parameter;

/// Sentinel parent id for business roots
pub const ROOT_GROUP_ID: GroupId = GroupId(0);

/// Name of the per-business catch-all group
pub const CATCH_ALL_GROUP_NAME: &str = "ALL_HOST";

/// Store-assigned identifier for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl GroupId {
    pub fn is_root_sentinel(&self) -> bool {
        *self == ROOT_GROUP_ID
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub pid: GroupId,
    pub name: String,
    pub business: String,
    pub read_only: bool,
    pub description: Option<String>,
    pub params: Vec<Parameter>,
}

impl Group {
    /// The read-only group directly under the sentinel. A business has exactly one.
    pub fn is_business_root(&self) -> bool {
        self.read_only && self.pid.is_root_sentinel()
    }

    pub fn is_catch_all(&self) -> bool {
        self.name == CATCH_ALL_GROUP_NAME
    }
}

/// Insert request for a group. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewGroup {
    pub pid: GroupId,
    pub name: String,
    pub business: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub params: Vec<Parameter>,
}

impl NewGroup {
    pub fn new(pid: GroupId, name: impl Into<String>, business: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            business: business.into(),
            read_only: false,
            description: None,
            params: Vec::new(),
        }
    }

    /// Read-only root named after the business
    pub fn business_root(business: &str) -> Self {
        Self {
            read_only: true,
            ..Self::new(ROOT_GROUP_ID, business, business)
        }
    }

    /// Read-only catch-all under the given business root
    pub fn catch_all(root: GroupId, business: &str) -> Self {
        Self {
            read_only: true,
            ..Self::new(root, CATCH_ALL_GROUP_NAME, business)
        }
    }

    pub fn into_group(self, id: GroupId) -> Group {
        Group {
            id,
            pid: self.pid,
            name: self.name,
            business: self.business,
            read_only: self.read_only,
            description: self.description,
            params: self.params,
        }
    }
}

/// Partial update for rename / re-parent / describe. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPatch {
    pub name: Option<String>,
    pub pid: Option<GroupId>,
    pub description: Option<String>,
}

impl GroupPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.pid.is_none() && self.description.is_none()
    }

    pub fn apply(&self, group: &mut Group) {
        if let Some(name) = &self.name {
            group.name = name.clone();
        }
        if let Some(pid) = self.pid {
            group.pid = pid;
        }
        if let Some(description) = &self.description {
            group.description = Some(description.clone());
        }
    }
}

/// Returns true when moving `group` under `new_pid` would make it its own ancestor.
///
/// `parent_of` resolves a group id to its current pid within the business.
pub fn would_create_cycle<F>(group: GroupId, new_pid: GroupId, parent_of: F) -> bool
where
    F: Fn(GroupId) -> Option<GroupId>,
{
    let mut cursor = new_pid;
    let mut hops = 0usize;
    while !cursor.is_root_sentinel() {
        if cursor == group {
            return true;
        }
        match parent_of(cursor) {
            Some(next) => cursor = next,
            None => return false,
        }
        hops += 1;
        // a pre-existing loop that does not pass through `group`
        if hops > 100_000 {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_business_root_and_catch_all_are_read_only() {
        let root = NewGroup::business_root("payments").into_group(GroupId(1));
        assert!(root.read_only);
        assert!(root.is_business_root());
        assert_eq!(root.name, "payments");

        let all = NewGroup::catch_all(root.id, "payments").into_group(GroupId(2));
        assert!(all.read_only);
        assert!(all.is_catch_all());
        assert_eq!(all.pid, GroupId(1));
    }

    #[test]
    fn test_writable_top_level_group_is_not_a_business_root() {
        let group = NewGroup::new(ROOT_GROUP_ID, "web", "payments").into_group(GroupId(3));
        assert!(!group.is_business_root());
    }

    #[test]
    fn test_patch_only_touches_provided_fields() {
        let mut group = NewGroup::new(GroupId(1), "web", "payments").into_group(GroupId(5));
        let patch = GroupPatch {
            description: Some("frontends".to_string()),
            ..Default::default()
        };
        patch.apply(&mut group);
        assert_eq!(group.name, "web");
        assert_eq!(group.pid, GroupId(1));
        assert_eq!(group.description.as_deref(), Some("frontends"));
    }

    #[test]
    fn test_cycle_detection() {
        // 1 <- 2 <- 3
        let parents: HashMap<GroupId, GroupId> = [
            (GroupId(1), GroupId(0)),
            (GroupId(2), GroupId(1)),
            (GroupId(3), GroupId(2)),
        ]
        .into_iter()
        .collect();
        let lookup = |id: GroupId| parents.get(&id).copied();

        assert!(would_create_cycle(GroupId(1), GroupId(3), lookup));
        assert!(would_create_cycle(GroupId(2), GroupId(2), lookup));
        assert!(!would_create_cycle(GroupId(3), GroupId(1), lookup));
        assert!(!would_create_cycle(GroupId(2), GroupId(0), lookup));
    }
}
