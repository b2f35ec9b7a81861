// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Scheduler gateway contract
//!
//! The scheduler keeps its own copy of the inventory. This module fixes the
//! three request bodies it accepts and the trait the sync dispatcher talks to;
//! `crate::infrastructure::scheduler_client` provides the HTTP implementation.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::inventory::InventoryNode;

pub const GENERATE_HOSTS_PATH: &str = "/inventories/generate-hosts";
pub const UPDATE_HOSTS_PATH: &str = "/inventories/update-hosts";
pub const SYNC_HOSTS_PATH: &str = "/inventories/sync-hosts";

/// Body of a full sync: the whole business tree
#[derive(Debug, Clone, Serialize)]
pub struct GenerateHostsRequest {
    #[serde(rename = "tree-group")]
    pub tree_group: InventoryNode,
}

/// Body of an incremental sync: one partial tree per distinct ancestor path
#[derive(Debug, Clone, Serialize)]
pub struct UpdateHostsRequest {
    #[serde(rename = "tree-group")]
    pub tree_group: Vec<InventoryNode>,
}

/// Body of a flat sync
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncHostsRequest {
    pub added: Vec<InventoryNode>,
    pub deleted: Vec<InventoryNode>,
    pub updated: Vec<InventoryNode>,
}

impl SyncHostsRequest {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler unreachable at {endpoint}: {reason}")]
    Unreachable { endpoint: String, reason: String },

    #[error("Scheduler rejected request to {endpoint} with status {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

/// Outbound calls to the scheduler's inventory API
#[async_trait]
pub trait SchedulerGateway: Send + Sync {
    async fn generate_hosts(&self, request: &GenerateHostsRequest) -> Result<(), SchedulerError>;

    async fn update_hosts(&self, request: &UpdateHostsRequest) -> Result<(), SchedulerError>;

    async fn sync_hosts(&self, request: &SyncHostsRequest) -> Result<(), SchedulerError>;
}
