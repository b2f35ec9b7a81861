// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Inventory Adapter
//!
//! Renders tree nodes built from stored groups and hosts into the scheduler's
//! inventory vocabulary: parameters flattened into a name→value map, OS reduced
//! to `"windows"` or `"linux"`, a fixed transport port, and account pairs.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption layer between the store model and the scheduler wire format

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::group::Group;
use crate::domain::host::{Account, Host, Parameter};
use crate::domain::tree::{membership_id, FlatNode, TreeNode, ROOT_ID};

/// Default SSH port advertised for every host
pub const DEFAULT_TRANSPORT_PORT: u16 = 22;

// ============================================================================
// Tree payload
// ============================================================================

/// Change-state tags attached to nodes in an incremental sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChangeState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_update: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_delete: Option<bool>,
}

impl ChangeState {
    pub fn updated() -> Self {
        Self {
            is_update: Some(true),
            is_delete: None,
        }
    }

    pub fn deleted() -> Self {
        Self {
            is_update: None,
            is_delete: Some(true),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEntry {
    Group(Group),
    Host(Host),
}

/// Payload carried by every node of an inventory tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    pub entry: InventoryEntry,
    pub change: ChangeState,
}

impl InventoryItem {
    pub fn group(group: Group) -> Self {
        Self {
            entry: InventoryEntry::Group(group),
            change: ChangeState::default(),
        }
    }

    pub fn host(host: Host) -> Self {
        Self {
            entry: InventoryEntry::Host(host),
            change: ChangeState::default(),
        }
    }
}

/// Flat node for a group, keyed by its id
pub fn group_node(group: &Group) -> FlatNode<InventoryItem> {
    FlatNode::new(group.id.to_string(), group.pid.to_string(), InventoryItem::group(group.clone()))
}

/// One flat node per (group, host) membership
pub fn host_nodes(host: &Host) -> Vec<FlatNode<InventoryItem>> {
    host.group_ids
        .iter()
        .map(|group_id| {
            FlatNode::new(
                membership_id(group_id, host.id),
                group_id.to_string(),
                InventoryItem::host(host.clone()),
            )
        })
        .collect()
}

/// Flatten stored groups and hosts into the tree builder's vocabulary
pub fn flatten_inventory(groups: &[Group], hosts: &[Host]) -> Vec<FlatNode<InventoryItem>> {
    let mut nodes: Vec<FlatNode<InventoryItem>> = groups.iter().map(group_node).collect();
    for host in hosts {
        nodes.extend(host_nodes(host));
    }
    nodes
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InventoryNode {
    Group(GroupNode),
    Host(HostNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupNode {
    pub id: String,
    pub pid: String,
    pub name: String,
    pub business: String,
    pub params: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<InventoryNode>,
    #[serde(flatten)]
    pub change: ChangeState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostNode {
    pub id: String,
    pub pid: String,
    pub name: String,
    pub business: String,
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    pub port: u16,
    pub accounts: Vec<AccountPair>,
    pub params: BTreeMap<String, String>,
    #[serde(flatten)]
    pub change: ChangeState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountPair {
    pub username: String,
    pub password: String,
}

impl From<&Account> for AccountPair {
    fn from(account: &Account) -> Self {
        Self {
            username: account.username.clone(),
            password: account.password.clone(),
        }
    }
}

/// Case-insensitive "windows" substring → `"windows"`, anything else → `"linux"`
pub fn normalize_os(os: &str) -> &'static str {
    if os.to_lowercase().contains("windows") {
        "windows"
    } else {
        "linux"
    }
}

fn params_map(params: &[Parameter]) -> BTreeMap<String, String> {
    params.iter().map(|p| (p.name.clone(), p.value.clone())).collect()
}

// ============================================================================
// Adapter
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct InventoryAdapter {
    transport_port: u16,
}

impl Default for InventoryAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSPORT_PORT)
    }
}

impl InventoryAdapter {
    pub fn new(transport_port: u16) -> Self {
        Self { transport_port }
    }

    /// Adapt a built tree, children included
    pub fn adapt_tree(&self, node: &TreeNode<InventoryItem>) -> InventoryNode {
        match &node.payload.entry {
            InventoryEntry::Group(group) => InventoryNode::Group(GroupNode {
                id: node.id.clone(),
                pid: node.pid.clone(),
                name: group.name.clone(),
                business: group.business.clone(),
                params: params_map(&group.params),
                children: node.children.iter().map(|c| self.adapt_tree(c)).collect(),
                change: node.payload.change,
            }),
            InventoryEntry::Host(host) => {
                InventoryNode::Host(self.host_node(host, node.id.clone(), node.pid.clone(), node.payload.change))
            }
        }
    }

    pub fn adapt_forest(&self, forest: &[TreeNode<InventoryItem>]) -> Vec<InventoryNode> {
        forest.iter().map(|n| self.adapt_tree(n)).collect()
    }

    /// Host node outside any tree, used by the flat sync endpoint.
    ///
    /// The id is the host id; pid is the first group the host belongs to, or
    /// the sentinel when it has none.
    pub fn adapt_flat_host(&self, host: &Host, change: ChangeState) -> HostNode {
        let pid = host
            .group_ids
            .first()
            .map(|g| g.to_string())
            .unwrap_or_else(|| ROOT_ID.to_string());
        self.host_node(host, host.id.to_string(), pid, change)
    }

    fn host_node(&self, host: &Host, id: String, pid: String, change: ChangeState) -> HostNode {
        HostNode {
            id,
            pid,
            name: host.name.clone(),
            business: host.business.clone(),
            ip: host.identity_ip.clone(),
            os: host.os.as_deref().map(|os| normalize_os(os).to_string()),
            port: self.transport_port,
            accounts: host.accounts.iter().map(AccountPair::from).collect(),
            params: params_map(&host.params),
            change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::{GroupId, NewGroup};
    use crate::domain::host::{HostId, HostRecord};
    use crate::domain::tree::build_tree;
    use serde_json::json;

    fn sample_host() -> Host {
        let mut host = Host::from_record(
            HostId(10),
            HostRecord::new("web-01", "B").with_ip("10.0.0.1").with_os("Microsoft Windows Server 2019"),
        );
        host.accounts.push(Account {
            username: "ops".to_string(),
            password: "s3cret".to_string(),
        });
        host.params.push(Parameter::new("env", "prod"));
        host.join(GroupId(2));
        host
    }

    #[test]
    fn test_os_normalization() {
        assert_eq!(normalize_os("Windows Server 2016"), "windows");
        assert_eq!(normalize_os("MICROSOFT WINDOWS 10"), "windows");
        assert_eq!(normalize_os("CentOS 7"), "linux");
        assert_eq!(normalize_os(""), "linux");
    }

    #[test]
    fn test_tree_renders_scheduler_shape() {
        let root = NewGroup::business_root("B").into_group(GroupId(1));
        let mut web = NewGroup::new(GroupId(1), "web", "B").into_group(GroupId(2));
        web.params.push(Parameter::new("tier", "frontend"));

        let nodes = flatten_inventory(&[root, web], &[sample_host()]);
        let forest = build_tree(&nodes, ROOT_ID);
        let rendered = serde_json::to_value(InventoryAdapter::default().adapt_tree(&forest[0])).unwrap();

        assert_eq!(
            rendered,
            json!({
                "id": "1",
                "pid": "0",
                "name": "B",
                "business": "B",
                "params": {},
                "children": [{
                    "id": "2",
                    "pid": "1",
                    "name": "web",
                    "business": "B",
                    "params": {"tier": "frontend"},
                    "children": [{
                        "id": "2_10",
                        "pid": "2",
                        "name": "web-01",
                        "business": "B",
                        "ip": "10.0.0.1",
                        "os": "windows",
                        "port": 22,
                        "accounts": [{"username": "ops", "password": "s3cret"}],
                        "params": {"env": "prod"}
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_absent_os_is_omitted_and_flags_pass_through() {
        let mut host = sample_host();
        host.os = None;
        let node = InventoryAdapter::new(2222).adapt_flat_host(&host, ChangeState::deleted());
        let rendered = serde_json::to_value(&node).unwrap();

        assert!(rendered.get("os").is_none());
        assert!(rendered.get("is_update").is_none());
        assert_eq!(rendered["is_delete"], json!(true));
        assert_eq!(rendered["port"], json!(2222));
        assert_eq!(rendered["id"], json!("10"));
        assert_eq!(rendered["pid"], json!("2"));
    }

    #[test]
    fn test_host_in_two_groups_yields_two_nodes() {
        let mut host = sample_host();
        host.join(GroupId(5));
        let ids: Vec<String> = host_nodes(&host).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["2_10", "5_10"]);
    }
}
