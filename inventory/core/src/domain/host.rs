// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Host aggregate
//!
//! A host is the unit the scheduler targets. Hosts are namespaced by business
//! unit, own their accounts and parameters exclusively, and join any number of
//! groups through the membership table.

use serde::{Deserialize, Serialize};

use crate::domain::group::GroupId;

// ============================================================================
// Value Objects
// ============================================================================

/// Store-assigned identifier for a host
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId(pub i64);

impl std::fmt::Display for HostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Login credential owned by a single host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

/// Name/value pair owned by a single host or group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Business-specific attribute that has no canonical column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherField {
    /// Human label registered for the raw key (falls back to the key)
    pub label: String,
    /// Raw field name as it appeared in the source record
    pub key: String,
    pub value: String,
}

// ============================================================================
// Canonical Record
// ============================================================================

/// Host data expressed in canonical field names, independent of import source.
///
/// Produced by the business key-mapper and consumed by reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRecord {
    pub name: String,
    pub business: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cabinet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub others: Vec<OtherField>,
}

impl HostRecord {
    pub fn new(name: impl Into<String>, business: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            business: business.into(),
            ..Default::default()
        }
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_os(mut self, os: impl Into<String>) -> Self {
        self.os = Some(os.into());
        self
    }
}

/// Request to create a host outside of a batch import
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewHost {
    pub record: HostRecord,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub params: Vec<Parameter>,
}

// ============================================================================
// Aggregate Root
// ============================================================================

/// Stored host row together with its owned children and memberships
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: HostId,
    pub name: String,
    pub business: String,
    pub identity_ip: Option<String>,
    pub os: Option<String>,
    pub site: Option<String>,
    pub cabinet: Option<String>,
    pub machine_tag: Option<String>,
    pub description: Option<String>,
    pub others: Vec<OtherField>,
    pub accounts: Vec<Account>,
    pub params: Vec<Parameter>,
    /// Groups this host belongs to, ascending by id
    pub group_ids: Vec<GroupId>,
}

impl Host {
    /// Materialise a freshly inserted row from a canonical record
    pub fn from_record(id: HostId, record: HostRecord) -> Self {
        Self {
            id,
            name: record.name,
            business: record.business,
            identity_ip: record.ip,
            os: record.os,
            site: record.site,
            cabinet: record.cabinet,
            machine_tag: record.machine_tag,
            description: record.description,
            others: record.others,
            accounts: Vec::new(),
            params: Vec::new(),
            group_ids: Vec::new(),
        }
    }

    /// Overwrite the fields an authoritative batch owns.
    ///
    /// Identity, site placement, credentials and memberships stay untouched.
    pub fn apply_record(&mut self, record: &HostRecord) {
        self.identity_ip = record.ip.clone();
        self.os = record.os.clone();
        self.business = record.business.clone();
        self.others = record.others.clone();
    }

    pub fn is_member_of(&self, group_id: GroupId) -> bool {
        self.group_ids.contains(&group_id)
    }

    /// Add a membership, keeping `group_ids` sorted and free of duplicates
    pub fn join(&mut self, group_id: GroupId) {
        if let Err(pos) = self.group_ids.binary_search(&group_id) {
            self.group_ids.insert(pos, group_id);
        }
    }

    pub fn leave(&mut self, group_id: GroupId) {
        self.group_ids.retain(|g| *g != group_id);
    }
}
