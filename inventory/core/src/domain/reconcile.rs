// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Reconciliation Engine
//!
//! Diffs an authoritative host batch against the hosts stored for one business
//! unit. Planning is pure; repositories apply the plan inside a single
//! transaction and report the touched rows as a [`ReconciliationOutcome`].
//!
//! With F the batch names and D the stored names:
//!
//! - F ∩ D → updated (mutable fields overwritten, identity and memberships kept)
//! - F \ D → added
//! - D \ F → deleted

use std::collections::HashMap;

use serde::Serialize;

use crate::domain::host::{Host, HostId, HostRecord};

/// What a batch will do to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub business: String,
    pub added: Vec<HostRecord>,
    pub updated: Vec<(HostId, HostRecord)>,
    pub deleted: Vec<HostId>,
}

/// Rows touched by an applied plan.
///
/// `deleted` carries the rows as they were before removal, memberships included,
/// so incremental sync can still locate them in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationOutcome {
    pub business: String,
    pub added: Vec<Host>,
    pub updated: Vec<Host>,
    pub deleted: Vec<Host>,
}

impl ReconciliationOutcome {
    pub fn empty(business: impl Into<String>) -> Self {
        Self {
            business: business.into(),
            ..Default::default()
        }
    }

    pub fn added_names(&self) -> Vec<&str> {
        self.added.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn updated_names(&self) -> Vec<&str> {
        self.updated.iter().map(|h| h.name.as_str()).collect()
    }

    pub fn deleted_names(&self) -> Vec<&str> {
        self.deleted.iter().map(|h| h.name.as_str()).collect()
    }
}

/// Partition `batch` against `stored` in O(|F| + |D|).
///
/// `stored` must already be filtered to `business`. Records are stamped with
/// the business before planning. When a name repeats within the batch the last
/// record wins, keeping the position of its first occurrence.
pub fn plan_reconciliation(business: &str, batch: Vec<HostRecord>, stored: &[Host]) -> ReconciliationPlan {
    let mut order: Vec<String> = Vec::with_capacity(batch.len());
    let mut incoming: HashMap<String, HostRecord> = HashMap::with_capacity(batch.len());
    for mut record in batch {
        record.business = business.to_string();
        if !incoming.contains_key(&record.name) {
            order.push(record.name.clone());
        }
        incoming.insert(record.name.clone(), record);
    }

    let existing: HashMap<&str, HostId> = stored.iter().map(|h| (h.name.as_str(), h.id)).collect();

    let mut plan = ReconciliationPlan {
        business: business.to_string(),
        ..Default::default()
    };

    for name in &order {
        let Some(record) = incoming.remove(name) else {
            continue;
        };
        match existing.get(name.as_str()) {
            Some(id) => plan.updated.push((*id, record)),
            None => plan.added.push(record),
        }
    }

    let batch_names: std::collections::HashSet<&str> = order.iter().map(String::as_str).collect();
    plan.deleted = stored
        .iter()
        .filter(|h| !batch_names.contains(h.name.as_str()))
        .map(|h| h.id)
        .collect();

    plan
}
