//! The applied-state ledger: `_migrations` plus the append-only
//! `_migrations_log` audit trail.  This module owns the bootstrap and the
//! read queries; row mutations happen in the executor, atomically with the
//! schema changes they record.

use crate::engine::EngineError;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tokio_postgres::Client;

const BOOTSTRAP: &str = "\
CREATE TABLE IF NOT EXISTS _migrations (
    id VARCHAR(26) PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    checksum VARCHAR(64),
    status VARCHAR(20) DEFAULT 'applied'
);
CREATE TABLE IF NOT EXISTS _migrations_log (
    id BIGSERIAL PRIMARY KEY,
    migration_id VARCHAR(26) NOT NULL,
    name VARCHAR(255) NOT NULL,
    action VARCHAR(10) NOT NULL,
    performed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    performed_by VARCHAR(255),
    checksum VARCHAR(64)
);
ALTER TABLE _migrations ADD COLUMN IF NOT EXISTS status VARCHAR(20) DEFAULT 'applied';
";

/// A `_migrations` row as seen by rollback and verify.
#[derive(Debug, Clone)]
pub struct AppliedRow {
    pub id: String,
    pub name: String,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HeadRow {
    pub id: String,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// Create the ledger tables if needed.  Idempotent; the trailing ADD COLUMN
/// upgrades installs that predate the `status` field.
pub async fn ensure_schema(client: &Client) -> Result<(), EngineError> {
    client.batch_execute(BOOTSTRAP).await?;
    Ok(())
}

/// Ids recorded as successfully applied.
pub async fn applied_ids(client: &Client) -> Result<HashSet<String>, EngineError> {
    let rows = client
        .query("SELECT id FROM _migrations WHERE status = 'applied'", &[])
        .await?;
    Ok(rows.into_iter().map(|r| r.get(0)).collect())
}

/// `(id, name)` for rows stuck in `status='failed'`.  Any entry here makes
/// the database dirty and blocks mutating operations.
pub async fn failed(client: &Client) -> Result<Vec<(String, String)>, EngineError> {
    let rows = client
        .query("SELECT id, name FROM _migrations WHERE status = 'failed'", &[])
        .await?;
    Ok(rows.into_iter().map(|r| (r.get(0), r.get(1))).collect())
}

/// Applied rows in rollback traversal order (newest first).
pub async fn applied_details(client: &Client) -> Result<Vec<AppliedRow>, EngineError> {
    let rows = client
        .query(
            "SELECT id, name, checksum FROM _migrations \
             WHERE status = 'applied' ORDER BY applied_at DESC, id DESC",
            &[],
        )
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| AppliedRow {
            id: r.get(0),
            name: r.get(1),
            checksum: r.get(2),
        })
        .collect())
}

/// Every ledger row as `(id, name, status)`, for the status report.  Rows
/// predating the `status` column read as applied.
pub async fn all_statuses(client: &Client) -> Result<Vec<(String, String, String)>, EngineError> {
    let rows = client
        .query(
            "SELECT id, name, COALESCE(status, 'applied') FROM _migrations",
            &[],
        )
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get(0), r.get(1), r.get(2)))
        .collect())
}

/// The single newest applied migration, if any.
pub async fn head(client: &Client) -> Result<Option<HeadRow>, EngineError> {
    let rows = client
        .query(
            "SELECT id, name, applied_at FROM _migrations \
             WHERE status = 'applied' ORDER BY applied_at DESC, id DESC LIMIT 1",
            &[],
        )
        .await?;
    Ok(rows.into_iter().next().map(|r| HeadRow {
        id: r.get(0),
        name: r.get(1),
        applied_at: r.get(2),
    }))
}
