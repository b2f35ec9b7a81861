// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype that is handed
//! to `PostgresInventoryRepository`. Only needed when `spec.database` is set
//! in `opsbook-config.yaml`; otherwise the in-memory store is used.
//!
//! The inventory schema ships as sqlx migrations under `migrations/` and is
//! applied with [`Database::migrate`].

use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::repository::PostgresConfig;

/// SQLSTATE for a relation that does not exist
const UNDEFINED_TABLE: &str = "42P01";

/// Inventory schema migrations embedded at build time
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn with_max_connections(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self { pool })
    }

    pub async fn from_config(config: &PostgresConfig) -> Result<Self> {
        Self::with_max_connections(&config.connection_string, config.max_connections).await
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .context("Failed to run inventory migrations")?;
        tracing::info!("Inventory schema is up to date");
        Ok(())
    }

    /// Number of migrations already recorded in `_sqlx_migrations`
    pub async fn applied_migrations(&self) -> Result<usize> {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(&self.pool)
            .await;
        match rows {
            Ok(rows) => Ok(rows.len()),
            // table is missing until the first migration runs
            Err(e) if is_undefined_table(&e) => Ok(0),
            Err(e) => Err(e).context("Failed to read applied migrations"),
        }
    }
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;

    #[derive(Debug, thiserror::Error)]
    #[error("{message}")]
    struct PgFailure {
        code: &'static str,
        message: &'static str,
    }

    impl sqlx::error::DatabaseError for PgFailure {
        fn message(&self) -> &str {
            self.message
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.code))
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn db_error(code: &'static str, message: &'static str) -> sqlx::Error {
        sqlx::Error::Database(Box::new(PgFailure { code, message }))
    }

    #[test]
    fn test_only_missing_table_counts_as_unmigrated() {
        assert!(is_undefined_table(&db_error(
            "42P01",
            "relation \"_sqlx_migrations\" does not exist"
        )));
        assert!(!is_undefined_table(&db_error("42501", "permission denied for table _sqlx_migrations")));
        assert!(!is_undefined_table(&sqlx::Error::PoolTimedOut));
    }
}
