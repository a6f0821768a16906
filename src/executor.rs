//! Script execution.  One call performs the indivisible step of
//! {run SQL} + {update `_migrations`} + {append `_migrations_log`}.
//!
//! Transactional scripts get all-or-nothing semantics from a single database
//! transaction.  Non-transactional scripts (CREATE INDEX CONCURRENTLY and
//! friends) run statement by statement in autocommit; a mid-sequence failure
//! leaves the schema half-changed, so the ledger row is marked `failed` and
//! the orchestrator refuses further work until the operator repairs it.

use crate::engine::EngineError;
use crate::script::ParsedScript;
use crate::sqlsplit::split_statements;
use tokio_postgres::Client;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn action(&self) -> &'static str {
        match self {
            Direction::Up => "UP",
            Direction::Down => "DOWN",
        }
    }
}

const UPSERT_APPLIED: &str = "\
INSERT INTO _migrations (id, name, checksum, status) VALUES ($1, $2, $3, 'applied') \
ON CONFLICT (id) DO UPDATE \
SET status = 'applied', checksum = EXCLUDED.checksum, applied_at = NOW()";

const UPSERT_FAILED: &str = "\
INSERT INTO _migrations (id, name, checksum, status) VALUES ($1, $2, $3, 'failed') \
ON CONFLICT (id) DO UPDATE SET status = 'failed'";

const DELETE_ROW: &str = "DELETE FROM _migrations WHERE id = $1";

const APPEND_LOG: &str = "\
INSERT INTO _migrations_log (migration_id, name, action, performed_by, checksum) \
VALUES ($1, $2, $3, $4, $5)";

pub struct Executor<'a> {
    client: &'a mut Client,
}

impl<'a> Executor<'a> {
    pub fn new(client: &'a mut Client) -> Self {
        Executor { client }
    }

    /// Run one script in the given direction.  `checksum` is the hash of the
    /// full file content as read for this run.
    pub async fn run(
        &mut self,
        id: &str,
        name: &str,
        script: &ParsedScript,
        checksum: &str,
        direction: Direction,
        dry_run: bool,
    ) -> Result<(), EngineError> {
        let sql = match direction {
            Direction::Up => script.up.as_str(),
            Direction::Down => script.down.as_str(),
        };

        if dry_run {
            return self.dry_run(id, script, sql).await;
        }

        if script.no_transaction {
            self.run_autocommit(id, name, sql, checksum, direction).await
        } else {
            self.run_transactional(id, name, sql, checksum, direction)
                .await
        }
    }

    /// Verify-then-rollback: the SQL really executes, so errors surface, but
    /// the transaction is rolled back and nothing is recorded.
    /// Non-transactional scripts cannot be verified this way (each statement
    /// would commit), so they are only logged.
    async fn dry_run(&mut self, id: &str, script: &ParsedScript, sql: &str) -> Result<(), EngineError> {
        if script.no_transaction {
            info!(
                "[dry-run] {}: no-transaction script, skipping verification; SQL:\n{}",
                id, sql
            );
            return Ok(());
        }

        let tx = self.client.transaction().await?;
        tx.batch_execute(sql).await?;
        tx.rollback().await?;
        info!("[dry-run] {}: SQL verified and rolled back", id);
        Ok(())
    }

    async fn run_transactional(
        &mut self,
        id: &str,
        name: &str,
        sql: &str,
        checksum: &str,
        direction: Direction,
    ) -> Result<(), EngineError> {
        let performed_by = audit_user();
        let tx = self.client.transaction().await?;

        // Any failure from here drops the transaction, rolling back both the
        // schema change and the ledger writes.
        tx.batch_execute(sql).await?;

        match direction {
            Direction::Up => {
                tx.execute(
                    "INSERT INTO _migrations (id, name, checksum, status) \
                     VALUES ($1, $2, $3, 'applied')",
                    &[&id, &name, &checksum],
                )
                .await?;
            }
            Direction::Down => {
                tx.execute(DELETE_ROW, &[&id]).await?;
            }
        }
        tx.execute(
            APPEND_LOG,
            &[&id, &name, &direction.action(), &performed_by, &checksum],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn run_autocommit(
        &mut self,
        id: &str,
        name: &str,
        sql: &str,
        checksum: &str,
        direction: Direction,
    ) -> Result<(), EngineError> {
        let statements = split_statements(sql);
        let total = statements.len();

        for (i, statement) in statements.iter().enumerate() {
            debug!("{}: statement {}/{}", id, i + 1, total);
            if let Err(e) = self.client.batch_execute(statement).await {
                // The statements before this one are already committed.
                // Record the dirty state so nothing else runs until the
                // operator has repaired the database.
                error!(
                    "{}: statement {}/{} failed; marking migration as failed",
                    id,
                    i + 1,
                    total
                );
                if let Err(mark) = self
                    .client
                    .execute(UPSERT_FAILED, &[&id, &name, &checksum])
                    .await
                {
                    error!("{}: could not record failed status: {}", id, mark);
                }
                return Err(e.into());
            }
        }

        // The schema changes are committed; record them.  Both ledger writes
        // go in one transaction so the row and its audit entry agree.
        let performed_by = audit_user();
        let tx = self.client.transaction().await?;
        match direction {
            Direction::Up => {
                tx.execute(UPSERT_APPLIED, &[&id, &name, &checksum]).await?;
            }
            Direction::Down => {
                tx.execute(DELETE_ROW, &[&id]).await?;
            }
        }
        tx.execute(
            APPEND_LOG,
            &[&id, &name, &direction.action(), &performed_by, &checksum],
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Operating-system login for the audit trail, `"system"` when unavailable.
fn audit_user() -> String {
    whoami::fallible::username().unwrap_or_else(|_| "system".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_action_strings() {
        assert_eq!(Direction::Up.action(), "UP");
        assert_eq!(Direction::Down.action(), "DOWN");
    }

    #[test]
    fn audit_user_is_never_empty() {
        assert!(!audit_user().is_empty());
    }
}
