// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Per-business serialization
//!
//! Every store-write-then-sync sequence runs while holding the lock of its
//! business unit, so two imports for the same business cannot interleave
//! their writes and their scheduler calls. Different businesses never wait on
//! each other.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct BusinessLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl BusinessLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock of `business`
    pub async fn acquire(&self, business: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(business.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
