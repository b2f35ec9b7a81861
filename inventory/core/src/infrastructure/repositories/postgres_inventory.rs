// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Inventory
//!
//! PostgreSQL implementation of `InventoryRepository` over the schema in
//! `migrations/0001_inventory.sql`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Durable host/group store with transactional reconciliation

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Row};

use crate::domain::group::{Group, GroupId, NewGroup, CATCH_ALL_GROUP_NAME, ROOT_GROUP_ID};
use crate::domain::host::{Account, Host, HostId, HostRecord, NewHost, OtherField, Parameter};
use crate::domain::reconcile::{plan_reconciliation, ReconciliationOutcome};
use crate::domain::repository::{InventoryRepository, RepositoryError};

const SELECT_HOSTS: &str = "SELECT id, name, business, identity_ip, os, site, cabinet, machine_tag, description, others FROM inventory_hosts";
const SELECT_GROUPS: &str = "SELECT id, pid, name, business, read_only, description FROM inventory_groups";

pub struct PostgresInventoryRepository {
    pool: PgPool,
}

impl PostgresInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn list_groups(&self, business: &str) -> Result<Vec<Group>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!("{SELECT_GROUPS} WHERE business = $1 ORDER BY id"))
            .bind(business)
            .fetch_all(&mut *conn)
            .await?;
        hydrate_groups(&mut conn, rows).await
    }

    async fn find_group(&self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_group(&mut conn, id).await
    }

    async fn ensure_business_root(&self, business: &str) -> Result<GroupId, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let root = ensure_business_root(&mut tx, business).await?;
        tx.commit().await?;
        Ok(root)
    }

    async fn create_group(&self, group: NewGroup) -> Result<Group, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let id = insert_group(&mut tx, &group).await?;
        replace_group_params(&mut tx, id, &group.params).await?;
        tx.commit().await?;
        Ok(group.into_group(id))
    }

    async fn save_group(&self, group: &Group) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE inventory_groups
            SET name = $2, pid = $3, description = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(group.id.0)
        .bind(&group.name)
        .bind(group.pid.0)
        .bind(&group.description)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Group {} not found", group.id)));
        }

        replace_group_params(&mut tx, group.id, &group.params).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_group(&self, id: GroupId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM inventory_groups WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Group {} not found", id)));
        }
        Ok(())
    }

    async fn list_hosts(&self, business: &str) -> Result<Vec<Host>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!("{SELECT_HOSTS} WHERE business = $1 ORDER BY id"))
            .bind(business)
            .fetch_all(&mut *conn)
            .await?;
        hydrate_hosts(&mut conn, rows).await
    }

    async fn find_host(&self, id: HostId) -> Result<Option<Host>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        fetch_host(&mut conn, id).await
    }

    async fn find_host_by_name(&self, name: &str) -> Result<Option<Host>, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(&format!("{SELECT_HOSTS} WHERE name = $1"))
            .bind(name)
            .fetch_all(&mut *conn)
            .await?;
        Ok(hydrate_hosts(&mut conn, rows).await?.into_iter().next())
    }

    async fn create_host(&self, host: NewHost) -> Result<Host, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let business = host.record.business.clone();
        let id = insert_host(&mut tx, &host.record).await?;
        replace_host_access(&mut tx, id, &host.accounts, &host.params).await?;
        let catch_all = ensure_catch_all(&mut tx, &business).await?;
        attach_hosts(&mut tx, catch_all, &[id.0]).await?;
        let created = fetch_host(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::Unknown(format!("Host {} vanished after insert", id)))?;

        tx.commit().await?;
        Ok(created)
    }

    async fn save_host_access(
        &self,
        id: HostId,
        accounts: &[Account],
        params: &[Parameter],
    ) -> Result<Host, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if fetch_host(&mut tx, id).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("Host {} not found", id)));
        }

        replace_host_access(&mut tx, id, accounts, params).await?;
        let saved = fetch_host(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Host {} not found", id)))?;

        tx.commit().await?;
        Ok(saved)
    }

    async fn delete_host(&self, id: HostId) -> Result<Host, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let host = fetch_host(&mut tx, id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(format!("Host {} not found", id)))?;

        sqlx::query("DELETE FROM inventory_hosts WHERE id = $1")
            .bind(id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(host)
    }

    async fn add_membership(&self, group: GroupId, host: HostId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        if fetch_group(&mut tx, group).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("Group {} not found", group)));
        }
        if fetch_host(&mut tx, host).await?.is_none() {
            return Err(RepositoryError::NotFound(format!("Host {} not found", host)));
        }
        attach_hosts(&mut tx, group, &[host.0]).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn remove_membership(&self, group: GroupId, host: HostId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM inventory_group_hosts WHERE group_id = $1 AND host_id = $2")
            .bind(group.0)
            .bind(host.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn apply_reconciliation(
        &self,
        business: &str,
        batch: Vec<HostRecord>,
    ) -> Result<ReconciliationOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(&format!("{SELECT_HOSTS} WHERE business = $1 ORDER BY id FOR UPDATE"))
            .bind(business)
            .fetch_all(&mut *tx)
            .await?;
        let stored = hydrate_hosts(&mut tx, rows).await?;
        let plan = plan_reconciliation(business, batch, &stored);

        let mut outcome = ReconciliationOutcome::empty(business);

        if !plan.deleted.is_empty() {
            let ids: Vec<i64> = plan.deleted.iter().map(|id| id.0).collect();
            sqlx::query("DELETE FROM inventory_hosts WHERE id = ANY($1)")
                .bind(&ids[..])
                .execute(&mut *tx)
                .await?;
            outcome.deleted = stored
                .into_iter()
                .filter(|h| plan.deleted.contains(&h.id))
                .collect();
        }

        let mut updated_ids = Vec::with_capacity(plan.updated.len());
        for (id, record) in &plan.updated {
            update_host(&mut tx, *id, record).await?;
            updated_ids.push(id.0);
        }

        let mut added_ids = Vec::with_capacity(plan.added.len());
        for record in &plan.added {
            added_ids.push(insert_host(&mut tx, record).await?.0);
        }

        if !updated_ids.is_empty() || !added_ids.is_empty() {
            let catch_all = ensure_catch_all(&mut tx, business).await?;
            attach_hosts(&mut tx, catch_all, &updated_ids).await?;
            attach_hosts(&mut tx, catch_all, &added_ids).await?;
            outcome.updated = fetch_hosts_by_ids(&mut tx, &updated_ids).await?;
            outcome.added = fetch_hosts_by_ids(&mut tx, &added_ids).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            business = %business,
            added = outcome.added.len(),
            updated = outcome.updated.len(),
            deleted = outcome.deleted.len(),
            "Reconciliation committed"
        );
        Ok(outcome)
    }
}

// ============================================================================
// Writes
// ============================================================================

async fn insert_group(conn: &mut PgConnection, group: &NewGroup) -> Result<GroupId, RepositoryError> {
    let row = sqlx::query(
        r#"
        INSERT INTO inventory_groups (pid, name, business, read_only, description)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(group.pid.0)
    .bind(&group.name)
    .bind(&group.business)
    .bind(group.read_only)
    .bind(&group.description)
    .fetch_one(&mut *conn)
    .await?;
    Ok(GroupId(row.get("id")))
}

async fn replace_group_params(
    conn: &mut PgConnection,
    group: GroupId,
    params: &[Parameter],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM inventory_parameters WHERE group_id = $1")
        .bind(group.0)
        .execute(&mut *conn)
        .await?;
    for param in params {
        sqlx::query("INSERT INTO inventory_parameters (group_id, name, value) VALUES ($1, $2, $3)")
            .bind(group.0)
            .bind(&param.name)
            .bind(&param.value)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn insert_host(conn: &mut PgConnection, record: &HostRecord) -> Result<HostId, RepositoryError> {
    let others = serde_json::to_value(&record.others)?;
    let row = sqlx::query(
        r#"
        INSERT INTO inventory_hosts (
            name, business, identity_ip, os, site, cabinet, machine_tag, description, others
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(&record.name)
    .bind(&record.business)
    .bind(&record.ip)
    .bind(&record.os)
    .bind(&record.site)
    .bind(&record.cabinet)
    .bind(&record.machine_tag)
    .bind(&record.description)
    .bind(others)
    .fetch_one(&mut *conn)
    .await?;
    Ok(HostId(row.get("id")))
}

/// Overwrites only the fields an import batch owns
async fn update_host(conn: &mut PgConnection, id: HostId, record: &HostRecord) -> Result<(), RepositoryError> {
    let others = serde_json::to_value(&record.others)?;
    sqlx::query(
        r#"
        UPDATE inventory_hosts
        SET identity_ip = $2, os = $3, business = $4, others = $5, updated_at = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id.0)
    .bind(&record.ip)
    .bind(&record.os)
    .bind(&record.business)
    .bind(others)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn replace_host_access(
    conn: &mut PgConnection,
    host: HostId,
    accounts: &[Account],
    params: &[Parameter],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM inventory_host_accounts WHERE host_id = $1")
        .bind(host.0)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM inventory_parameters WHERE host_id = $1")
        .bind(host.0)
        .execute(&mut *conn)
        .await?;

    for account in accounts {
        sqlx::query("INSERT INTO inventory_host_accounts (host_id, username, password) VALUES ($1, $2, $3)")
            .bind(host.0)
            .bind(&account.username)
            .bind(&account.password)
            .execute(&mut *conn)
            .await?;
    }
    for param in params {
        sqlx::query("INSERT INTO inventory_parameters (host_id, name, value) VALUES ($1, $2, $3)")
            .bind(host.0)
            .bind(&param.name)
            .bind(&param.value)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn attach_hosts(conn: &mut PgConnection, group: GroupId, host_ids: &[i64]) -> Result<(), RepositoryError> {
    if host_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO inventory_group_hosts (group_id, host_id)
        SELECT $1, UNNEST($2::BIGINT[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(group.0)
    .bind(host_ids)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Catch-all group of a business, creating it and the business root when absent
async fn ensure_catch_all(conn: &mut PgConnection, business: &str) -> Result<GroupId, RepositoryError> {
    let existing = sqlx::query("SELECT id FROM inventory_groups WHERE business = $1 AND name = $2")
        .bind(business)
        .bind(CATCH_ALL_GROUP_NAME)
        .fetch_optional(&mut *conn)
        .await?;
    if let Some(row) = existing {
        return Ok(GroupId(row.get("id")));
    }

    let root = ensure_business_root(conn, business).await?;

    tracing::info!(business = %business, "Creating catch-all group");
    insert_group(conn, &NewGroup::catch_all(root, business)).await
}

/// Read-only root of a business, creating it when absent
async fn ensure_business_root(conn: &mut PgConnection, business: &str) -> Result<GroupId, RepositoryError> {
    let root = sqlx::query(
        r#"
        SELECT id FROM inventory_groups
        WHERE business = $1 AND pid = $2 AND read_only
        ORDER BY (name = $1) DESC, id ASC
        LIMIT 1
        FOR UPDATE
        "#,
    )
    .bind(business)
    .bind(ROOT_GROUP_ID.0)
    .fetch_optional(&mut *conn)
    .await?;

    match root {
        Some(row) => Ok(GroupId(row.get("id"))),
        None => {
            tracing::info!(business = %business, "Creating business root group");
            insert_group(conn, &NewGroup::business_root(business)).await
        }
    }
}

// ============================================================================
// Reads
// ============================================================================

async fn fetch_group(conn: &mut PgConnection, id: GroupId) -> Result<Option<Group>, RepositoryError> {
    let rows = sqlx::query(&format!("{SELECT_GROUPS} WHERE id = $1"))
        .bind(id.0)
        .fetch_all(&mut *conn)
        .await?;
    Ok(hydrate_groups(conn, rows).await?.into_iter().next())
}

async fn fetch_host(conn: &mut PgConnection, id: HostId) -> Result<Option<Host>, RepositoryError> {
    Ok(fetch_hosts_by_ids(conn, &[id.0]).await?.into_iter().next())
}

async fn fetch_hosts_by_ids(conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<Host>, RepositoryError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query(&format!("{SELECT_HOSTS} WHERE id = ANY($1) ORDER BY id"))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;
    hydrate_hosts(conn, rows).await
}

/// Attach parameters to parsed group rows
async fn hydrate_groups(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Group>, RepositoryError> {
    let mut groups: Vec<Group> = rows.into_iter().map(parse_group_row).collect();
    if groups.is_empty() {
        return Ok(groups);
    }

    let ids: Vec<i64> = groups.iter().map(|g| g.id.0).collect();
    let position: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let params = sqlx::query(
        "SELECT group_id, name, value FROM inventory_parameters WHERE group_id = ANY($1) ORDER BY id",
    )
    .bind(&ids[..])
    .fetch_all(&mut *conn)
    .await?;
    for row in params {
        let group_id: i64 = row.get("group_id");
        if let Some(&i) = position.get(&group_id) {
            groups[i].params.push(Parameter::new(
                row.get::<String, _>("name"),
                row.get::<String, _>("value"),
            ));
        }
    }

    Ok(groups)
}

/// Attach accounts, parameters and memberships to parsed host rows
async fn hydrate_hosts(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Host>, RepositoryError> {
    let mut hosts = rows
        .into_iter()
        .map(parse_host_row)
        .collect::<Result<Vec<_>, _>>()?;
    if hosts.is_empty() {
        return Ok(hosts);
    }

    let ids: Vec<i64> = hosts.iter().map(|h| h.id.0).collect();
    let position: HashMap<i64, usize> = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

    let accounts = sqlx::query(
        "SELECT host_id, username, password FROM inventory_host_accounts WHERE host_id = ANY($1) ORDER BY id",
    )
    .bind(&ids[..])
    .fetch_all(&mut *conn)
    .await?;
    for row in accounts {
        let host_id: i64 = row.get("host_id");
        if let Some(&i) = position.get(&host_id) {
            hosts[i].accounts.push(Account {
                username: row.get("username"),
                password: row.get("password"),
            });
        }
    }

    let params = sqlx::query(
        "SELECT host_id, name, value FROM inventory_parameters WHERE host_id = ANY($1) ORDER BY id",
    )
    .bind(&ids[..])
    .fetch_all(&mut *conn)
    .await?;
    for row in params {
        let host_id: i64 = row.get("host_id");
        if let Some(&i) = position.get(&host_id) {
            hosts[i].params.push(Parameter::new(
                row.get::<String, _>("name"),
                row.get::<String, _>("value"),
            ));
        }
    }

    let memberships = sqlx::query(
        "SELECT host_id, group_id FROM inventory_group_hosts WHERE host_id = ANY($1) ORDER BY group_id",
    )
    .bind(&ids[..])
    .fetch_all(&mut *conn)
    .await?;
    for row in memberships {
        let host_id: i64 = row.get("host_id");
        if let Some(&i) = position.get(&host_id) {
            hosts[i].group_ids.push(GroupId(row.get("group_id")));
        }
    }

    Ok(hosts)
}

fn parse_group_row(row: PgRow) -> Group {
    Group {
        id: GroupId(row.get("id")),
        pid: GroupId(row.get("pid")),
        name: row.get("name"),
        business: row.get("business"),
        read_only: row.get("read_only"),
        description: row.get("description"),
        params: Vec::new(),
    }
}

fn parse_host_row(row: PgRow) -> Result<Host, RepositoryError> {
    let others_val: serde_json::Value = row.get("others");
    let others: Vec<OtherField> = serde_json::from_value(others_val)
        .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize others: {}", e)))?;

    Ok(Host {
        id: HostId(row.get("id")),
        name: row.get("name"),
        business: row.get("business"),
        identity_ip: row.get("identity_ip"),
        os: row.get("os"),
        site: row.get("site"),
        cabinet: row.get("cabinet"),
        machine_tag: row.get("machine_tag"),
        description: row.get("description"),
        others,
        accounts: Vec::new(),
        params: Vec::new(),
        group_ids: Vec::new(),
    })
}
