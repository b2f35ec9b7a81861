// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end: import → reconcile → HTTP sync against a mock scheduler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use mockito::Matcher;
use opsbook_core::application::{
    BusinessLocks, InventoryError, InventoryImportService, InventoryService, StandardInventoryService, SyncDispatcher,
};
use opsbook_core::domain::business::{BusinessProfile, BusinessProfileRegistry, CanonicalField};
use opsbook_core::domain::group::{GroupId, GroupPatch, NewGroup};
use opsbook_core::domain::inventory::InventoryAdapter;
use opsbook_core::domain::inventory_config::SyncStrategy;
use opsbook_core::domain::repository::InventoryRepository;
use opsbook_core::domain::scheduler::{GENERATE_HOSTS_PATH, SYNC_HOSTS_PATH, UPDATE_HOSTS_PATH};
use opsbook_core::infrastructure::{HttpSchedulerClient, InMemoryInventoryRepository};
use serde_json::json;

struct Harness {
    repo: Arc<InMemoryInventoryRepository>,
    imports: InventoryImportService,
    inventory: StandardInventoryService,
}

fn registry() -> BusinessProfileRegistry {
    BusinessProfileRegistry::from_profiles([BusinessProfile {
        business: "B".to_string(),
        fields: BTreeMap::from([
            ("hostname".to_string(), CanonicalField::Name),
            ("private_ip".to_string(), CanonicalField::Ip),
            ("os_name".to_string(), CanonicalField::Os),
        ]),
        labels: BTreeMap::from([("owner".to_string(), "Owner".to_string())]),
    }])
}

fn harness(scheduler_url: &str, strategy: SyncStrategy) -> Harness {
    let repo = Arc::new(InMemoryInventoryRepository::new());
    let client = HttpSchedulerClient::new(scheduler_url, Duration::from_secs(2));
    let dispatcher = Arc::new(SyncDispatcher::new(
        repo.clone(),
        Some(Arc::new(client)),
        InventoryAdapter::default(),
    ));
    let locks = BusinessLocks::new();

    Harness {
        imports: InventoryImportService::new(repo.clone(), registry(), dispatcher.clone(), locks.clone())
            .with_strategy(strategy),
        inventory: StandardInventoryService::new(repo.clone(), dispatcher, locks),
        repo,
    }
}

fn write_csv(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("hosts.csv");
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn test_csv_import_pushes_full_tree() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_HOSTS_PATH)
        .match_header("content-type", "application/json")
        .match_body(Matcher::Json(json!({
            "tree-group": {
                "id": "1", "pid": "0", "name": "B", "business": "B", "params": {},
                "children": [{
                    "id": "2", "pid": "1", "name": "ALL_HOST", "business": "B", "params": {},
                    "children": [{
                        "id": "2_1", "pid": "2", "name": "h1", "business": "B",
                        "ip": "10.0.0.1", "os": "windows", "port": 22,
                        "accounts": [], "params": {}
                    }]
                }]
            }
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Full);
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "hostname,private_ip,os_name,owner\nh1,10.0.0.1,Windows Server 2019,alice\n");

    let summary = h.imports.import_file("B", &path).await.unwrap();
    assert_eq!(summary.added, vec!["h1"]);
    assert!(summary.sync.is_delivered());

    let host = h.repo.find_host_by_name("h1").await.unwrap().unwrap();
    assert_eq!(host.others.len(), 1);
    assert_eq!(host.others[0].label, "Owner");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_rejected_sync_keeps_committed_inventory() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", GENERATE_HOSTS_PATH)
        .with_status(500)
        .with_body("scheduler down")
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Full);
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "hostname,private_ip\nh1,10.0.0.1\nh2,10.0.0.2\n");

    let summary = h.imports.import_file("B", &path).await.unwrap();
    assert!(summary.sync.is_failed());
    assert_eq!(h.repo.list_hosts("B").await.unwrap().len(), 2);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_incremental_import_sends_tagged_partial_tree() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", UPDATE_HOSTS_PATH)
        .with_status(200)
        .expect(2)
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Incremental);
    let dir = tempfile::tempdir().unwrap();

    let first = write_csv(&dir, "hostname,private_ip\nh1,10.0.0.1\nh2,10.0.0.2\n");
    h.imports.import_file("B", &first).await.unwrap();

    let second = write_csv(&dir, "hostname,private_ip\nh1,10.0.0.1\n");
    let summary = h.imports.import_file("B", &second).await.unwrap();
    assert_eq!(summary.deleted, vec!["h2"]);
    assert_eq!(summary.updated, vec!["h1"]);
    assert!(summary.sync.is_delivered());

    mock.assert_async().await;
}

#[tokio::test]
async fn test_flat_strategy_posts_host_lists() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", SYNC_HOSTS_PATH)
        .match_body(Matcher::Json(json!({
            "added": [{
                "id": "1", "pid": "2", "name": "h1", "business": "B",
                "ip": "10.0.0.1", "port": 22, "accounts": [], "params": {}
            }],
            "deleted": [],
            "updated": []
        })))
        .with_status(200)
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Flat);
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "hostname,private_ip\nh1,10.0.0.1\n");

    let summary = h.imports.import_file("B", &path).await.unwrap();
    assert!(summary.sync.is_delivered());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_group_creation_sends_tagged_group_under_root() {
    let mut server = mockito::Server::new_async().await;
    let _full = server
        .mock("POST", GENERATE_HOSTS_PATH)
        .with_status(200)
        .create_async()
        .await;
    let update = server
        .mock("POST", UPDATE_HOSTS_PATH)
        .match_body(Matcher::Json(json!({
            "tree-group": [{
                "id": "1", "pid": "0", "name": "B", "business": "B", "params": {},
                "children": [{
                    "id": "3", "pid": "1", "name": "web", "business": "B", "params": {},
                    "is_update": true
                }]
            }]
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Full);
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "hostname,private_ip\nh1,10.0.0.1\n");
    h.imports.import_file("B", &path).await.unwrap();

    let root = h
        .repo
        .list_groups("B")
        .await
        .unwrap()
        .into_iter()
        .find(|g| g.is_business_root())
        .unwrap();
    let web = h.inventory.create_group(NewGroup::new(root.id, "web", "B")).await.unwrap();
    assert!(web.sync.is_delivered());
    update.assert_async().await;

    let rejected = h
        .inventory
        .update_group(
            root.id,
            GroupPatch {
                name: Some("other".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(rejected, Err(InventoryError::ReadOnlyGroup(_))));
}

#[tokio::test]
async fn test_full_sync_includes_groups_created_at_top_level() {
    let mut server = mockito::Server::new_async().await;
    let update = server
        .mock("POST", UPDATE_HOSTS_PATH)
        .with_status(200)
        .expect_at_least(1)
        .create_async()
        .await;
    let generate = server
        .mock("POST", GENERATE_HOSTS_PATH)
        .match_body(Matcher::Json(json!({
            "tree-group": {
                "id": "1", "pid": "0", "name": "B", "business": "B", "params": {},
                "children": [
                    {
                        "id": "2", "pid": "1", "name": "ALL_HOST", "business": "B", "params": {},
                        "children": [{
                            "id": "2_1", "pid": "2", "name": "h1", "business": "B",
                            "ip": "10.0.0.1", "os": "windows", "port": 22,
                            "accounts": [], "params": {}
                        }]
                    },
                    {
                        "id": "3", "pid": "1", "name": "web", "business": "B", "params": {},
                        "children": [{
                            "id": "3_1", "pid": "3", "name": "h1", "business": "B",
                            "ip": "10.0.0.1", "os": "windows", "port": 22,
                            "accounts": [], "params": {}
                        }]
                    }
                ]
            }
        })))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Incremental);
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "hostname,private_ip,os_name\nh1,10.0.0.1,Windows Server 2019\n");
    let summary = h.imports.import_file("B", &path).await.unwrap();
    let host = h.repo.find_host_by_name("h1").await.unwrap().unwrap();
    assert_eq!(summary.added, vec!["h1"]);

    // the sentinel parent lands below the business root
    let web = h
        .inventory
        .create_group(NewGroup::new(GroupId(0), "web", "B"))
        .await
        .unwrap()
        .value;
    assert_eq!(web.pid, GroupId(1));
    h.inventory.attach_host(web.id, host.id).await.unwrap();

    let report = h.inventory.full_sync("B").await;
    assert!(report.is_delivered());
    generate.assert_async().await;
    update.assert_async().await;
}

#[tokio::test]
async fn test_unregistered_business_never_reaches_scheduler() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", Matcher::Any)
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let h = harness(&server.url(), SyncStrategy::Full);
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(&dir, "hostname,private_ip\nh1,10.0.0.1\n");

    let result = h.imports.import_file("unknown", &path).await;
    assert!(matches!(result, Err(InventoryError::MappingNotFound(_))));
    assert!(h.repo.list_groups("unknown").await.unwrap().is_empty());
    mock.assert_async().await;
}
