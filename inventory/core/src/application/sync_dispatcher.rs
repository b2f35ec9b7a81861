// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sync Dispatcher Application Service
//!
//! Pushes committed store state to the scheduler in one of three shapes:
//!
//! - **full**: the whole business tree to `/inventories/generate-hosts`
//! - **incremental**: one partial tree per distinct ancestor path of the
//!   changed hosts/groups to `/inventories/update-hosts`
//! - **flat**: adapted host lists to `/inventories/sync-hosts`
//!
//! Dispatch never fails the caller. Scheduler errors are logged and recorded
//! in the returned [`SyncReport`]; the store commit that triggered the sync
//! stands regardless and the next sync corrects the scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::domain::group::Group;
use crate::domain::host::Host;
use crate::domain::inventory::{
    flatten_inventory, group_node, host_nodes, ChangeState, InventoryAdapter, InventoryEntry, InventoryItem,
    InventoryNode,
};
use crate::domain::reconcile::ReconciliationOutcome;
use crate::domain::repository::{InventoryRepository, RepositoryError};
use crate::domain::scheduler::{
    GenerateHostsRequest, SchedulerGateway, SyncHostsRequest, UpdateHostsRequest,
};
use crate::domain::tree::{ancestor_path, build_tree, graft, FlatNode, TreeNode, ROOT_ID};

// ============================================================================
// Change sets and reports
// ============================================================================

/// A host or group touched by a store write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryRef {
    Host(Host),
    Group(Group),
}

/// References to push in an incremental sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub business: String,
    pub added: Vec<InventoryRef>,
    pub updated: Vec<InventoryRef>,
    pub deleted: Vec<InventoryRef>,
}

impl ChangeSet {
    pub fn new(business: impl Into<String>) -> Self {
        Self {
            business: business.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn with_added(mut self, item: InventoryRef) -> Self {
        self.added.push(item);
        self
    }

    pub fn with_updated(mut self, item: InventoryRef) -> Self {
        self.updated.push(item);
        self
    }

    pub fn with_deleted(mut self, item: InventoryRef) -> Self {
        self.deleted.push(item);
        self
    }

    /// Every reference with its change tag. Added and updated both map to `is_update`.
    fn tagged(&self) -> impl Iterator<Item = (&InventoryRef, ChangeState)> {
        self.added
            .iter()
            .chain(self.updated.iter())
            .map(|r| (r, ChangeState::updated()))
            .chain(self.deleted.iter().map(|r| (r, ChangeState::deleted())))
    }
}

impl From<&ReconciliationOutcome> for ChangeSet {
    fn from(outcome: &ReconciliationOutcome) -> Self {
        Self {
            business: outcome.business.clone(),
            added: outcome.added.iter().cloned().map(InventoryRef::Host).collect(),
            updated: outcome.updated.iter().cloned().map(InventoryRef::Host).collect(),
            deleted: outcome.deleted.iter().cloned().map(InventoryRef::Host).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Full,
    Incremental,
    Flat,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
            SyncMode::Flat => "flat",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SyncOutcome {
    /// The scheduler accepted `trees` root nodes (or host lists for flat sync)
    Delivered { trees: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl SyncOutcome {
    fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Delivered { .. } => "delivered",
            SyncOutcome::Skipped { .. } => "skipped",
            SyncOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub business: String,
    pub mode: SyncMode,
    pub outcome: SyncOutcome,
}

impl SyncReport {
    fn new(business: &str, mode: SyncMode, outcome: SyncOutcome) -> Self {
        Self {
            business: business.to_string(),
            mode,
            outcome,
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Delivered { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.outcome, SyncOutcome::Failed { .. })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

pub struct SyncDispatcher {
    repository: Arc<dyn InventoryRepository>,
    /// `None` when sync is disabled by configuration
    gateway: Option<Arc<dyn SchedulerGateway>>,
    adapter: InventoryAdapter,
}

impl SyncDispatcher {
    pub fn new(
        repository: Arc<dyn InventoryRepository>,
        gateway: Option<Arc<dyn SchedulerGateway>>,
        adapter: InventoryAdapter,
    ) -> Self {
        Self {
            repository,
            gateway,
            adapter,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.gateway.is_some()
    }

    /// Adapted tree of the business, rooted at its read-only business root.
    /// `None` when the business has no root yet.
    pub async fn business_tree(&self, business: &str) -> Result<Option<InventoryNode>, RepositoryError> {
        let groups = self.repository.list_groups(business).await?;
        let hosts = self.repository.list_hosts(business).await?;

        let nodes = flatten_inventory(&groups, &hosts);
        let forest = build_tree(&nodes, ROOT_ID);

        let is_root = |node: &&TreeNode<InventoryItem>, named: bool| {
            matches!(&node.payload.entry, InventoryEntry::Group(g) if g.is_business_root() && (!named || g.name == business))
        };
        let root = forest
            .iter()
            .find(|node| is_root(node, true))
            .or_else(|| forest.iter().find(|node| is_root(node, false)));

        Ok(root.map(|node| self.adapter.adapt_tree(node)))
    }

    /// Rebuild the whole business tree and send it to the scheduler
    pub async fn full_sync(&self, business: &str) -> SyncReport {
        let started = Instant::now();
        let Some(gateway) = self.gateway.as_ref() else {
            return self.finish(business, SyncMode::Full, skipped("scheduler sync disabled"), started);
        };

        let tree = match self.business_tree(business).await {
            Ok(Some(tree)) => tree,
            Ok(None) => {
                return self.finish(business, SyncMode::Full, skipped("business has no root group"), started);
            }
            Err(e) => {
                return self.finish(
                    business,
                    SyncMode::Full,
                    SyncOutcome::Failed {
                        error: format!("failed to load inventory: {}", e),
                    },
                    started,
                );
            }
        };

        let request = GenerateHostsRequest { tree_group: tree };
        let outcome = match gateway.generate_hosts(&request).await {
            Ok(()) => SyncOutcome::Delivered { trees: 1 },
            Err(e) => SyncOutcome::Failed { error: e.to_string() },
        };
        self.finish(business, SyncMode::Full, outcome, started)
    }

    /// Send one partial tree per distinct ancestor path of the changed references
    pub async fn incremental_sync(&self, changes: &ChangeSet) -> SyncReport {
        let started = Instant::now();
        let business = changes.business.as_str();
        let Some(gateway) = self.gateway.as_ref() else {
            return self.finish(business, SyncMode::Incremental, skipped("scheduler sync disabled"), started);
        };
        if changes.is_empty() {
            return self.finish(business, SyncMode::Incremental, skipped("no changes"), started);
        }

        let groups = match self.repository.list_groups(business).await {
            Ok(groups) => groups,
            Err(e) => {
                return self.finish(
                    business,
                    SyncMode::Incremental,
                    SyncOutcome::Failed {
                        error: format!("failed to load groups: {}", e),
                    },
                    started,
                );
            }
        };

        let forest = self.partial_trees(changes, &groups);
        if forest.is_empty() {
            return self.finish(business, SyncMode::Incremental, skipped("changes have no tree position"), started);
        }

        let request = UpdateHostsRequest {
            tree_group: self.adapter.adapt_forest(&forest),
        };
        let outcome = match gateway.update_hosts(&request).await {
            Ok(()) => SyncOutcome::Delivered { trees: forest.len() },
            Err(e) => SyncOutcome::Failed { error: e.to_string() },
        };
        self.finish(business, SyncMode::Incremental, outcome, started)
    }

    /// Send adapted host lists without any tree structure
    pub async fn flat_sync(&self, outcome: &ReconciliationOutcome) -> SyncReport {
        let started = Instant::now();
        let business = outcome.business.as_str();
        let Some(gateway) = self.gateway.as_ref() else {
            return self.finish(business, SyncMode::Flat, skipped("scheduler sync disabled"), started);
        };

        let adapt = |hosts: &[Host]| -> Vec<InventoryNode> {
            hosts
                .iter()
                .map(|h| InventoryNode::Host(self.adapter.adapt_flat_host(h, ChangeState::default())))
                .collect()
        };
        let request = SyncHostsRequest {
            added: adapt(&outcome.added),
            deleted: adapt(&outcome.deleted),
            updated: adapt(&outcome.updated),
        };
        if request.is_empty() {
            return self.finish(business, SyncMode::Flat, skipped("no changes"), started);
        }

        let result = match gateway.sync_hosts(&request).await {
            Ok(()) => SyncOutcome::Delivered { trees: 1 },
            Err(e) => SyncOutcome::Failed { error: e.to_string() },
        };
        self.finish(business, SyncMode::Flat, result, started)
    }

    /// Group tagged leaves by identical ancestor path and graft each group
    /// onto its path. Paths keep the order in which they were first seen.
    fn partial_trees(&self, changes: &ChangeSet, groups: &[Group]) -> Vec<TreeNode<InventoryItem>> {
        let known: HashMap<String, FlatNode<InventoryItem>> =
            groups.iter().map(|g| (g.id.to_string(), group_node(g))).collect();
        let lookup = |id: &str| known.get(id).cloned();

        let mut buckets: Vec<(Vec<String>, Vec<FlatNode<InventoryItem>>, Vec<TreeNode<InventoryItem>>)> = Vec::new();

        for (reference, change) in changes.tagged() {
            let leaves: Vec<FlatNode<InventoryItem>> = match reference {
                InventoryRef::Group(group) => vec![group_node(group)],
                InventoryRef::Host(host) => host_nodes(host),
            };
            if leaves.is_empty() {
                debug!(business = %changes.business, "Skipping change without group membership");
            }

            for mut leaf in leaves {
                leaf.payload.change = change;
                let path = ancestor_path(&leaf, &lookup);
                let key: Vec<String> = path.iter().map(|n| n.id.clone()).collect();

                match buckets.iter_mut().find(|(k, _, _)| *k == key) {
                    Some((_, _, bucket_leaves)) => bucket_leaves.push(TreeNode::leaf(leaf)),
                    None => buckets.push((key, path, vec![TreeNode::leaf(leaf)])),
                }
            }
        }

        buckets
            .into_iter()
            .flat_map(|(_, path, leaves)| graft(path, leaves))
            .collect()
    }

    fn finish(&self, business: &str, mode: SyncMode, outcome: SyncOutcome, started: Instant) -> SyncReport {
        match &outcome {
            SyncOutcome::Delivered { trees } => {
                info!(business = %business, mode = mode.as_str(), trees = *trees, "Inventory synced to scheduler");
            }
            SyncOutcome::Skipped { reason } => {
                warn!(business = %business, mode = mode.as_str(), reason = %reason, "Inventory sync skipped");
            }
            SyncOutcome::Failed { error } => {
                error!(business = %business, mode = mode.as_str(), error = %error, "Inventory sync failed; store state stands");
            }
        }

        metrics::counter!(
            "opsbook_inventory_sync_total",
            "mode" => mode.as_str(),
            "outcome" => outcome.label()
        )
        .increment(1);
        metrics::histogram!("opsbook_inventory_sync_duration_seconds", "mode" => mode.as_str())
            .record(started.elapsed().as_secs_f64());

        SyncReport::new(business, mode, outcome)
    }
}

fn skipped(reason: &str) -> SyncOutcome {
    SyncOutcome::Skipped {
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::{GroupId, NewGroup};
    use crate::domain::host::HostRecord;
    use crate::domain::scheduler::SchedulerError;
    use crate::infrastructure::repositories::InMemoryInventoryRepository;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every body it receives; optionally fails every call
    #[derive(Default)]
    struct RecordingGateway {
        generated: Mutex<Vec<serde_json::Value>>,
        updated: Mutex<Vec<serde_json::Value>>,
        synced: Mutex<Vec<serde_json::Value>>,
        fail: bool,
    }

    impl RecordingGateway {
        fn result(&self) -> Result<(), SchedulerError> {
            if self.fail {
                Err(SchedulerError::Unreachable {
                    endpoint: "http://scheduler.test".to_string(),
                    reason: "connection refused".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SchedulerGateway for RecordingGateway {
        async fn generate_hosts(&self, request: &GenerateHostsRequest) -> Result<(), SchedulerError> {
            self.generated.lock().unwrap().push(serde_json::to_value(request)?);
            self.result()
        }

        async fn update_hosts(&self, request: &UpdateHostsRequest) -> Result<(), SchedulerError> {
            self.updated.lock().unwrap().push(serde_json::to_value(request)?);
            self.result()
        }

        async fn sync_hosts(&self, request: &SyncHostsRequest) -> Result<(), SchedulerError> {
            self.synced.lock().unwrap().push(serde_json::to_value(request)?);
            self.result()
        }
    }

    async fn seeded() -> (Arc<InMemoryInventoryRepository>, ReconciliationOutcome) {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let outcome = repo
            .apply_reconciliation(
                "B",
                vec![
                    HostRecord::new("h1", "B").with_ip("10.0.0.1"),
                    HostRecord::new("h2", "B").with_ip("10.0.0.2"),
                ],
            )
            .await
            .unwrap();
        (repo, outcome)
    }

    fn dispatcher(repo: Arc<InMemoryInventoryRepository>, gateway: Arc<RecordingGateway>) -> SyncDispatcher {
        SyncDispatcher::new(repo, Some(gateway), InventoryAdapter::default())
    }

    #[tokio::test]
    async fn test_full_sync_sends_business_root() {
        let (repo, _) = seeded().await;
        let gateway = Arc::new(RecordingGateway::default());

        let report = dispatcher(repo, gateway.clone()).full_sync("B").await;

        assert!(report.is_delivered());
        let sent = gateway.generated.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let root = &sent[0]["tree-group"];
        assert_eq!(root["name"], "B");
        assert_eq!(root["pid"], "0");
        let all_host = &root["children"][0];
        assert_eq!(all_host["name"], "ALL_HOST");
        assert_eq!(all_host["children"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_full_sync_without_root_sends_nothing() {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let gateway = Arc::new(RecordingGateway::default());

        let report = dispatcher(repo, gateway.clone()).full_sync("empty").await;

        assert!(matches!(report.outcome, SyncOutcome::Skipped { .. }));
        assert!(gateway.generated.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_sync_is_skipped() {
        let (repo, outcome) = seeded().await;
        let dispatcher = SyncDispatcher::new(repo, None, InventoryAdapter::default());

        assert!(!dispatcher.is_enabled());
        let report = dispatcher.incremental_sync(&ChangeSet::from(&outcome)).await;
        assert_eq!(
            report.outcome,
            SyncOutcome::Skipped {
                reason: "scheduler sync disabled".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_incremental_merges_identical_paths() {
        let (repo, outcome) = seeded().await;
        let gateway = Arc::new(RecordingGateway::default());

        let report = dispatcher(repo, gateway.clone())
            .incremental_sync(&ChangeSet::from(&outcome))
            .await;

        assert_eq!(report.outcome, SyncOutcome::Delivered { trees: 1 });
        let sent = gateway.updated.lock().unwrap();
        let trees = sent[0]["tree-group"].as_array().unwrap();
        assert_eq!(trees.len(), 1);

        let all_host = &trees[0]["children"][0];
        let hosts = all_host["children"].as_array().unwrap();
        assert_eq!(hosts.len(), 2);
        assert!(hosts.iter().all(|h| h["is_update"] == true));
        assert!(trees[0].get("is_update").is_none());
    }

    #[tokio::test]
    async fn test_incremental_splits_distinct_paths_and_tags_deletes() {
        let (repo, outcome) = seeded().await;
        let all_host_id = outcome.added[0].group_ids[0];
        let web = repo
            .create_group(NewGroup::new(all_host_id, "web", "B"))
            .await
            .unwrap();
        let gone = repo.delete_host(outcome.added[1].id).await.unwrap();
        let gateway = Arc::new(RecordingGateway::default());

        let changes = ChangeSet::new("B")
            .with_added(InventoryRef::Group(web))
            .with_deleted(InventoryRef::Host(gone));
        let report = dispatcher(repo, gateway.clone()).incremental_sync(&changes).await;

        // "web" hangs below ALL_HOST, the deleted host directly below ALL_HOST:
        // both share the path root → ALL_HOST and therefore one tree
        assert_eq!(report.outcome, SyncOutcome::Delivered { trees: 1 });
        let sent = gateway.updated.lock().unwrap();
        let leaves = sent[0]["tree-group"][0]["children"][0]["children"].as_array().unwrap().clone();
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0]["name"], "web");
        assert_eq!(leaves[0]["is_update"], true);
        assert_eq!(leaves[1]["name"], "h2");
        assert_eq!(leaves[1]["is_delete"], true);
    }

    #[tokio::test]
    async fn test_incremental_distinct_paths_are_separate_trees() {
        let (repo, outcome) = seeded().await;
        let host = outcome.added[0].clone();
        let root_id = repo
            .list_groups("B")
            .await
            .unwrap()
            .into_iter()
            .find(|g| g.is_business_root())
            .unwrap()
            .id;
        let db = repo.create_group(NewGroup::new(root_id, "db", "B")).await.unwrap();
        repo.add_membership(db.id, host.id).await.unwrap();
        let host = repo.find_host(host.id).await.unwrap().unwrap();
        let gateway = Arc::new(RecordingGateway::default());

        let changes = ChangeSet::new("B").with_updated(InventoryRef::Host(host));
        let report = dispatcher(repo, gateway.clone()).incremental_sync(&changes).await;

        // root → ALL_HOST → h1 and root → db → h1
        assert_eq!(report.outcome, SyncOutcome::Delivered { trees: 2 });
        let sent = gateway.updated.lock().unwrap();
        assert_eq!(sent[0]["tree-group"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_incremental_walks_deep_ancestry() {
        let (repo, outcome) = seeded().await;
        let all_host_id = outcome.added[0].group_ids[0];
        let web = repo.create_group(NewGroup::new(all_host_id, "web", "B")).await.unwrap();
        let edge = repo.create_group(NewGroup::new(web.id, "edge", "B")).await.unwrap();
        repo.add_membership(edge.id, outcome.added[1].id).await.unwrap();
        // membership view: only the new group is touched
        let mut view = repo.find_host(outcome.added[1].id).await.unwrap().unwrap();
        view.group_ids = vec![edge.id];
        let gateway = Arc::new(RecordingGateway::default());

        let changes = ChangeSet::new("B").with_updated(InventoryRef::Host(view));
        let report = dispatcher(repo, gateway.clone()).incremental_sync(&changes).await;

        assert_eq!(report.outcome, SyncOutcome::Delivered { trees: 1 });
        let sent = gateway.updated.lock().unwrap();
        let root = &sent[0]["tree-group"][0];
        assert_eq!(root["name"], "B");
        let chain = &root["children"][0]["children"][0]["children"][0];
        assert_eq!(root["children"][0]["name"], "ALL_HOST");
        assert_eq!(root["children"][0]["children"][0]["name"], "web");
        assert_eq!(chain["name"], "edge");
        assert_eq!(chain["children"][0]["name"], "h2");
        assert_eq!(chain["children"][0]["is_update"], true);
    }

    #[tokio::test]
    async fn test_scheduler_failure_is_reported_not_raised() {
        let (repo, outcome) = seeded().await;
        let gateway = Arc::new(RecordingGateway {
            fail: true,
            ..Default::default()
        });

        let report = dispatcher(repo.clone(), gateway).flat_sync(&outcome).await;

        assert!(report.is_failed());
        assert_eq!(report.mode, SyncMode::Flat);
        assert_eq!(repo.list_hosts("B").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_flat_sync_body() {
        let (repo, outcome) = seeded().await;
        let gateway = Arc::new(RecordingGateway::default());

        dispatcher(repo, gateway.clone()).flat_sync(&outcome).await;

        let sent = gateway.synced.lock().unwrap();
        assert_eq!(sent[0]["added"].as_array().unwrap().len(), 2);
        assert_eq!(sent[0]["added"][0]["port"], 22);
        assert!(sent[0]["deleted"].as_array().unwrap().is_empty());
        assert!(sent[0]["updated"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_change_set_tags() {
        let host = Host::from_record(crate::domain::host::HostId(1), HostRecord::new("h", "B"));
        let group = NewGroup::new(GroupId(0), "g", "B").into_group(GroupId(3));
        let changes = ChangeSet::new("B")
            .with_added(InventoryRef::Host(host.clone()))
            .with_updated(InventoryRef::Group(group))
            .with_deleted(InventoryRef::Host(host));

        let tags: Vec<ChangeState> = changes.tagged().map(|(_, c)| c).collect();
        assert_eq!(
            tags,
            vec![ChangeState::updated(), ChangeState::updated(), ChangeState::deleted()]
        );
    }
}
