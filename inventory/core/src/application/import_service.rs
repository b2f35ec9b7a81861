// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Import Application Service
//!
//! Drives one authoritative host batch for a business through the pipeline:
//! key mapping, reconciliation against the store, then a scheduler sync.
//! The store commit and the sync run under the same business lock; a failed
//! sync is reported in the summary and never rolls the commit back.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::application::business_locks::BusinessLocks;
use crate::application::inventory_service::InventoryError;
use crate::application::sync_dispatcher::{ChangeSet, SyncDispatcher, SyncReport};
use crate::domain::business::{BusinessProfileRegistry, RawRecord};
use crate::domain::host::HostRecord;
use crate::domain::inventory_config::SyncStrategy;
use crate::domain::reconcile::ReconciliationOutcome;
use crate::domain::repository::InventoryRepository;
use crate::infrastructure::import_parser::{parse_cmdb_json, parse_file};

/// What one import changed and how the scheduler took it
#[derive(Debug, Clone, Serialize)]
pub struct ImportSummary {
    pub business: String,
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
    pub sync: SyncReport,
    pub imported_at: DateTime<Utc>,
}

impl ImportSummary {
    fn new(outcome: &ReconciliationOutcome, sync: SyncReport) -> Self {
        let owned = |names: Vec<&str>| names.into_iter().map(str::to_string).collect();
        Self {
            business: outcome.business.clone(),
            added: owned(outcome.added_names()),
            updated: owned(outcome.updated_names()),
            deleted: owned(outcome.deleted_names()),
            sync,
            imported_at: Utc::now(),
        }
    }

    pub fn changed(&self) -> usize {
        self.added.len() + self.updated.len() + self.deleted.len()
    }
}

pub struct InventoryImportService {
    repository: Arc<dyn InventoryRepository>,
    registry: BusinessProfileRegistry,
    dispatcher: Arc<SyncDispatcher>,
    locks: BusinessLocks,
    strategy: SyncStrategy,
    delimiter: char,
}

impl InventoryImportService {
    pub fn new(
        repository: Arc<dyn InventoryRepository>,
        registry: BusinessProfileRegistry,
        dispatcher: Arc<SyncDispatcher>,
        locks: BusinessLocks,
    ) -> Self {
        Self {
            repository,
            registry,
            dispatcher,
            locks,
            strategy: SyncStrategy::default(),
            delimiter: ',',
        }
    }

    pub fn with_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Import an already parsed batch using the configured sync strategy
    pub async fn import_records(
        &self,
        business: &str,
        records: Vec<RawRecord>,
    ) -> Result<ImportSummary, InventoryError> {
        self.run(business, records, self.strategy).await
    }

    /// Import a delimited or CMDB JSON file
    pub async fn import_file(&self, business: &str, path: &Path) -> Result<ImportSummary, InventoryError> {
        let records = parse_file(path, self.delimiter)?;
        info!(business, path = %path.display(), records = records.len(), "Parsed import file");
        self.import_records(business, records).await
    }

    /// Apply a CMDB query result; a refresh always pushes the whole tree
    pub async fn refresh_from_cmdb(&self, business: &str, body: &[u8]) -> Result<ImportSummary, InventoryError> {
        let records = parse_cmdb_json(body)?;
        info!(business, records = records.len(), "Parsed CMDB result");
        self.run(business, records, SyncStrategy::Full).await
    }

    fn map_batch(&self, business: &str, records: &[RawRecord]) -> Result<Vec<HostRecord>, InventoryError> {
        if !self.registry.contains(business) {
            return Err(InventoryError::MappingNotFound(business.to_string()));
        }
        if records.is_empty() {
            return Err(InventoryError::InvalidRecord {
                index: 0,
                reason: "batch contains no records".to_string(),
            });
        }

        let mapped = self.registry.map_batch(business, records);
        if let Some(index) = mapped.iter().position(|r| r.name.trim().is_empty()) {
            return Err(InventoryError::InvalidRecord {
                index,
                reason: "host name is missing".to_string(),
            });
        }
        Ok(mapped)
    }

    async fn run(
        &self,
        business: &str,
        records: Vec<RawRecord>,
        strategy: SyncStrategy,
    ) -> Result<ImportSummary, InventoryError> {
        let batch = self.map_batch(business, &records)?;

        let _guard = self.locks.acquire(business).await;
        let outcome = self.repository.apply_reconciliation(business, batch).await?;
        info!(
            business,
            added = outcome.added.len(),
            updated = outcome.updated.len(),
            deleted = outcome.deleted.len(),
            "Reconciliation committed"
        );

        let sync = match strategy {
            SyncStrategy::Full => self.dispatcher.full_sync(business).await,
            SyncStrategy::Incremental => self.dispatcher.incremental_sync(&ChangeSet::from(&outcome)).await,
            SyncStrategy::Flat => self.dispatcher.flat_sync(&outcome).await,
        };
        if sync.is_failed() {
            warn!(business, "Inventory committed but the scheduler did not accept it; run a full sync to retry");
        }

        Ok(ImportSummary::new(&outcome, sync))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::business::{BusinessProfile, CanonicalField};
    use crate::domain::inventory::InventoryAdapter;
    use crate::infrastructure::repositories::InMemoryInventoryRepository;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn registry() -> BusinessProfileRegistry {
        let fields = BTreeMap::from([
            ("hostname".to_string(), CanonicalField::Name),
            ("private_ip".to_string(), CanonicalField::Ip),
        ]);
        BusinessProfileRegistry::from_profiles([BusinessProfile {
            business: "B".to_string(),
            fields,
            labels: BTreeMap::new(),
        }])
    }

    fn raw(name: &str, ip: &str) -> RawRecord {
        RawRecord::from([
            ("hostname".to_string(), json!(name)),
            ("private_ip".to_string(), json!(ip)),
        ])
    }

    fn service(repo: Arc<InMemoryInventoryRepository>) -> InventoryImportService {
        let dispatcher = Arc::new(SyncDispatcher::new(repo.clone(), None, InventoryAdapter::default()));
        InventoryImportService::new(repo, registry(), dispatcher, BusinessLocks::new())
    }

    #[tokio::test]
    async fn test_import_then_reimport() {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let svc = service(repo.clone());

        let first = svc
            .import_records("B", vec![raw("h1", "10.0.0.1"), raw("h2", "10.0.0.2")])
            .await
            .unwrap();
        assert_eq!(first.added, vec!["h1", "h2"]);
        assert!(!first.sync.is_delivered());

        let second = svc
            .import_records("B", vec![raw("h1", "10.0.0.9"), raw("h3", "10.0.0.3")])
            .await
            .unwrap();
        assert_eq!(second.added, vec!["h3"]);
        assert_eq!(second.updated, vec!["h1"]);
        assert_eq!(second.deleted, vec!["h2"]);
        assert_eq!(second.changed(), 3);

        let hosts = repo.list_hosts("B").await.unwrap();
        assert_eq!(hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_unregistered_business_leaves_store_untouched() {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let svc = service(repo.clone());

        let result = svc.import_records("C", vec![raw("h1", "10.0.0.1")]).await;
        assert!(matches!(result, Err(InventoryError::MappingNotFound(b)) if b == "C"));
        assert!(repo.list_groups("C").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_without_name_is_rejected() {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let svc = service(repo.clone());

        let nameless = RawRecord::from([("private_ip".to_string(), json!("10.0.0.2"))]);
        let result = svc.import_records("B", vec![raw("h1", "10.0.0.1"), nameless]).await;
        assert!(matches!(result, Err(InventoryError::InvalidRecord { index: 1, .. })));
        assert!(repo.list_hosts("B").await.unwrap().is_empty());

        let empty = svc.import_records("B", vec![]).await;
        assert!(matches!(empty, Err(InventoryError::InvalidRecord { index: 0, .. })));
    }

    #[tokio::test]
    async fn test_duplicate_ip_is_a_store_conflict() {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let svc = service(repo.clone());

        let result = svc
            .import_records("B", vec![raw("h1", "10.0.0.1"), raw("h2", "10.0.0.1")])
            .await;
        assert!(matches!(result, Err(InventoryError::StoreConflict(_))));
        assert!(repo.list_hosts("B").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cmdb_refresh() {
        let repo = Arc::new(InMemoryInventoryRepository::new());
        let svc = service(repo);

        let body = br#"[{"hostname": "h1", "private_ip": "10.0.0.1"}]"#;
        let summary = svc.refresh_from_cmdb("B", body).await.unwrap();
        assert_eq!(summary.added, vec!["h1"]);

        assert!(matches!(
            svc.refresh_from_cmdb("B", b"not json").await,
            Err(InventoryError::Import(_))
        ));
    }
}
