// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process service wiring
//!
//! Builds the store, scheduler client, dispatcher and application services
//! from a loaded `InventoryConfigManifest`. Every CLI command runs against
//! one `InventoryContext`.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use opsbook_core::{
    application::{BusinessLocks, InventoryImportService, StandardInventoryService, SyncDispatcher},
    domain::{
        business::BusinessProfileRegistry,
        inventory::InventoryAdapter,
        inventory_config::{InventoryConfigManifest, SyncStrategy},
        repository::{InventoryRepository, StorageBackend},
        scheduler::SchedulerGateway,
    },
    infrastructure::{db::Database, HttpSchedulerClient, InMemoryInventoryRepository, PostgresInventoryRepository},
};

/// Stderr subscriber used while the configuration is loaded, before the
/// configured log format is known
pub fn bootstrap_subscriber<W>(level: &str, writer: W) -> Result<tracing::Dispatch>
where
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_target(false)
        .compact()
        .finish();
    Ok(tracing::Dispatch::new(subscriber))
}

/// Load, relax and validate the configuration used by inventory commands
pub fn load_config(config_path: Option<PathBuf>) -> Result<InventoryConfigManifest> {
    let mut config =
        InventoryConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    let scheduler = &mut config.spec.scheduler;
    if scheduler.enabled && scheduler.endpoint.as_deref().map_or(true, str::is_empty) {
        warn!("No scheduler endpoint configured; scheduler sync is disabled");
        scheduler.enabled = false;
    }

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

pub struct InventoryContext {
    config: InventoryConfigManifest,
    repository: Arc<dyn InventoryRepository>,
    dispatcher: Arc<SyncDispatcher>,
    registry: BusinessProfileRegistry,
    locks: BusinessLocks,
}

impl InventoryContext {
    pub async fn new(config: InventoryConfigManifest) -> Result<Self> {
        let repository: Arc<dyn InventoryRepository> = match config.storage_backend() {
            StorageBackend::InMemory => {
                warn!("No database configured; inventory is kept in memory for this run only");
                Arc::new(InMemoryInventoryRepository::new())
            }
            StorageBackend::PostgreSQL(pg) => {
                let db = Database::from_config(&pg).await?;
                info!("Connected to PostgreSQL inventory store");
                Arc::new(PostgresInventoryRepository::new(db.get_pool().clone()))
            }
        };
        Self::with_repository(config, repository)
    }

    /// Wire services around an existing store
    pub fn with_repository(config: InventoryConfigManifest, repository: Arc<dyn InventoryRepository>) -> Result<Self> {
        let scheduler = &config.spec.scheduler;
        let gateway: Option<Arc<dyn SchedulerGateway>> = if scheduler.enabled {
            HttpSchedulerClient::from_config(scheduler)
                .context("Failed to configure scheduler client")?
                .map(|client| {
                    info!(endpoint = client.base_url(), "Scheduler sync enabled");
                    Arc::new(client) as Arc<dyn SchedulerGateway>
                })
        } else {
            info!("Scheduler sync disabled by configuration");
            None
        };

        let dispatcher = Arc::new(SyncDispatcher::new(
            repository.clone(),
            gateway,
            InventoryAdapter::new(scheduler.transport_port),
        ));

        Ok(Self {
            registry: config.profile_registry(),
            config,
            repository,
            dispatcher,
            locks: BusinessLocks::new(),
        })
    }

    pub fn sync_enabled(&self) -> bool {
        self.dispatcher.is_enabled()
    }

    /// Import service with optional per-command overrides
    pub fn import_service(&self, strategy: Option<SyncStrategy>, delimiter: Option<char>) -> InventoryImportService {
        let import = &self.config.spec.import;
        InventoryImportService::new(
            self.repository.clone(),
            self.registry.clone(),
            self.dispatcher.clone(),
            self.locks.clone(),
        )
        .with_strategy(strategy.unwrap_or(import.sync_strategy))
        .with_delimiter(delimiter.unwrap_or(import.delimiter))
    }

    pub fn inventory_service(&self) -> StandardInventoryService {
        StandardInventoryService::new(self.repository.clone(), self.dispatcher.clone(), self.locks.clone())
    }
}
