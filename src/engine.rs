//! The migration engine: public entry points composing discovery, parsing,
//! the ledger, and the executor under the cross-process advisory lock.
//!
//! Every entry point opens its own connection (via [`Engine::connect`]),
//! holds it for the whole run, and serializes mutating work through the
//! advisory lock so concurrent invocations across processes and hosts apply
//! in a total order.

use crate::config::{Config, Hooks};
use crate::corpus::{self, ScriptFile};
use crate::db::Db;
use crate::executor::{Direction, Executor};
use crate::fsio;
use crate::hooks::{self, HookPoint};
use crate::ident;
use crate::ledger::{self, HeadRow};
use crate::script;
use anyhow::Context;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no database configuration found; set MG_DATABASE_URL or create mg.yaml")]
    ConfigMissing,

    #[error("database connection failed: {0}")]
    Connect(#[source] tokio_postgres::Error),

    #[error("migration {file}: {message}")]
    Parse { file: String, message: String },

    #[error(
        "dirty database state: {}; repair the schema by hand, then delete or fix \
         the _migrations row(s) before continuing",
        format_failed(.migrations)
    )]
    DirtyState { migrations: Vec<(String, String)> },

    #[error("no script file for migration {id} in {dir}; cannot roll back")]
    MissingScriptFile { id: String, dir: String },

    #[error("migration {id} has no down section; cannot roll back")]
    MissingDown { id: String },

    #[error("sql error: {0}")]
    Sql(#[source] tokio_postgres::Error),

    #[error("{count} checksum mismatch(es) between ledger and disk")]
    ChecksumMismatch { count: usize },

    #[error("hook '{name}' failed: {detail}")]
    HookFailed { name: String, detail: String },

    #[error("database session lost while operating: {0}")]
    LockLost(#[source] tokio_postgres::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Statement failures and dropped sessions arrive as the same driver error
/// type; a closed connection means the advisory lock is gone with it.
impl From<tokio_postgres::Error> for EngineError {
    fn from(e: tokio_postgres::Error) -> Self {
        if e.is_closed() {
            EngineError::LockLost(e)
        } else {
            EngineError::Sql(e)
        }
    }
}

fn format_failed(migrations: &[(String, String)]) -> String {
    let names: Vec<String> = migrations
        .iter()
        .map(|(id, name)| format!("{} ({})", id, name))
        .collect();
    format!("migration(s) marked failed: {}", names.join(", "))
}

/// A migration processed by `apply` or `rollback`.
#[derive(Debug, Clone)]
pub struct Processed {
    pub id: String,
    pub name: String,
}

/// One row of the status report: the union of scripts on disk and rows in
/// the ledger.
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub id: String,
    pub name: String,
    /// `applied`, `failed`, or `pending`.
    pub status: String,
    pub on_disk: bool,
}

pub struct Engine {
    db: Db,
    scripts_dir: PathBuf,
    seeds_dir: PathBuf,
    lock_id: i64,
    hooks: Hooks,
}

impl Engine {
    /// Open a connection per the resolved configuration.
    pub async fn connect(config: &Config) -> Result<Engine, EngineError> {
        let spec = config.connection.as_ref().ok_or(EngineError::ConfigMissing)?;
        let db = Db::connect(spec).await?;
        Ok(Engine {
            db,
            scripts_dir: config.scripts_dir.clone(),
            seeds_dir: config.seeds_dir.clone(),
            lock_id: config.lock_id,
            hooks: config.hooks.clone(),
        })
    }

    /// Apply pending migrations in corpus order, up to `limit` if given.
    /// With `dry_run`, transactional scripts are verified then rolled back
    /// and nothing is recorded.
    pub async fn apply(
        &mut self,
        limit: Option<usize>,
        dry_run: bool,
    ) -> Result<Vec<Processed>, EngineError> {
        hooks::run(&self.hooks, HookPoint::PreApply).await?;

        self.db.lock(self.lock_id).await?;
        let result = self.apply_locked(limit, dry_run).await;
        let result = self.release_lock(result).await;

        if result.is_ok() {
            hooks::run(&self.hooks, HookPoint::PostApply).await?;
        }
        result
    }

    async fn apply_locked(
        &mut self,
        limit: Option<usize>,
        dry_run: bool,
    ) -> Result<Vec<Processed>, EngineError> {
        ledger::ensure_schema(self.db.client()).await?;
        self.refuse_if_dirty().await?;

        let applied = ledger::applied_ids(self.db.client()).await?;
        let mut pending: Vec<ScriptFile> = corpus::list_scripts(&self.scripts_dir)?
            .into_iter()
            .filter(|s| !applied.contains(&s.id))
            .collect();
        if let Some(limit) = limit {
            pending.truncate(limit);
        }

        if pending.is_empty() {
            info!("no pending migrations");
            return Ok(Vec::new());
        }

        let mut processed = Vec::new();
        for entry in &pending {
            let content = std::fs::read_to_string(&entry.path)
                .with_context(|| format!("could not read '{}'", entry.path.display()))?;
            let checksum = script::checksum(&content);
            let parsed = script::parse(&content, &file_name(entry))?;

            if dry_run {
                info!("[dry-run] verifying {} ({})", entry.id, entry.name);
            } else {
                info!("applying {} ({})", entry.id, entry.name);
            }
            Executor::new(self.db.client())
                .run(&entry.id, &entry.name, &parsed, &checksum, Direction::Up, dry_run)
                .await?;
            processed.push(Processed {
                id: entry.id.clone(),
                name: entry.name.clone(),
            });
        }

        Ok(processed)
    }

    /// Roll back the newest `steps` applied migrations by running their down
    /// sections.  The script files must still exist on disk; rollback SQL is
    /// never synthesized.
    pub async fn rollback(
        &mut self,
        steps: usize,
        dry_run: bool,
    ) -> Result<Vec<Processed>, EngineError> {
        hooks::run(&self.hooks, HookPoint::PreRollback).await?;

        self.db.lock(self.lock_id).await?;
        let result = self.rollback_locked(steps, dry_run).await;
        let result = self.release_lock(result).await;

        if result.is_ok() {
            hooks::run(&self.hooks, HookPoint::PostRollback).await?;
        }
        result
    }

    async fn rollback_locked(
        &mut self,
        steps: usize,
        dry_run: bool,
    ) -> Result<Vec<Processed>, EngineError> {
        ledger::ensure_schema(self.db.client()).await?;
        self.refuse_if_dirty().await?;

        let mut targets = ledger::applied_details(self.db.client()).await?;
        targets.truncate(steps);
        if targets.is_empty() {
            info!("no applied migrations to roll back");
            return Ok(Vec::new());
        }

        let on_disk: HashMap<String, ScriptFile> = corpus::list_scripts(&self.scripts_dir)?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let mut processed = Vec::new();
        for row in &targets {
            let entry = on_disk
                .get(&row.id)
                .ok_or_else(|| EngineError::MissingScriptFile {
                    id: row.id.clone(),
                    dir: self.scripts_dir.display().to_string(),
                })?;

            let content = std::fs::read_to_string(&entry.path)
                .with_context(|| format!("could not read '{}'", entry.path.display()))?;
            let checksum = script::checksum(&content);
            let parsed = script::parse(&content, &file_name(entry))?;
            if parsed.down.is_empty() {
                return Err(EngineError::MissingDown { id: row.id.clone() });
            }

            if dry_run {
                info!("[dry-run] verifying rollback of {} ({})", row.id, row.name);
            } else {
                info!("rolling back {} ({})", row.id, row.name);
            }
            Executor::new(self.db.client())
                .run(
                    &entry.id,
                    &entry.name,
                    &parsed,
                    &checksum,
                    Direction::Down,
                    dry_run,
                )
                .await?;
            processed.push(Processed {
                id: row.id.clone(),
                name: row.name.clone(),
            });
        }

        Ok(processed)
    }

    /// Status of every migration known from disk or ledger, sorted by id.
    pub async fn status(&mut self) -> Result<Vec<StatusRow>, EngineError> {
        ledger::ensure_schema(self.db.client()).await?;

        let mut recorded: HashMap<String, (String, String)> =
            ledger::all_statuses(self.db.client())
                .await?
                .into_iter()
                .map(|(id, name, status)| (id, (name, status)))
                .collect();

        let mut rows = Vec::new();
        for entry in corpus::list_scripts(&self.scripts_dir)? {
            let status = match recorded.remove(&entry.id) {
                Some((_, status)) => status,
                None => "pending".to_string(),
            };
            rows.push(StatusRow {
                id: entry.id,
                name: entry.name,
                status,
                on_disk: true,
            });
        }
        // Ledger rows whose files are gone from disk still show up.
        for (id, (name, status)) in recorded {
            rows.push(StatusRow {
                id,
                name,
                status,
                on_disk: false,
            });
        }

        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    /// The newest applied migration.
    pub async fn head(&mut self) -> Result<Option<HeadRow>, EngineError> {
        ledger::ensure_schema(self.db.client()).await?;
        ledger::head(self.db.client()).await
    }

    /// Compare the stored checksum of every applied migration that still has
    /// a file on disk against the file's current content.  Returns the list
    /// of problems; empty means everything matches.
    pub async fn verify(&mut self) -> Result<Vec<String>, EngineError> {
        ledger::ensure_schema(self.db.client()).await?;

        let applied: HashMap<String, Option<String>> =
            ledger::applied_details(self.db.client())
                .await?
                .into_iter()
                .map(|row| (row.id, row.checksum))
                .collect();

        let mut issues = Vec::new();
        for entry in corpus::list_scripts(&self.scripts_dir)? {
            let Some(stored) = applied.get(&entry.id) else {
                continue;
            };
            let content = match std::fs::read_to_string(&entry.path) {
                Ok(content) => content,
                Err(e) => {
                    issues.push(format!("error reading {}: {}", entry.path.display(), e));
                    continue;
                }
            };
            let current = script::checksum(&content);
            if stored.as_deref() != Some(current.as_str()) {
                issues.push(format!("checksum mismatch for {} ({})", entry.id, entry.name));
            }
        }

        for issue in &issues {
            error!("{}", issue);
        }
        if issues.is_empty() {
            info!("all applied migrations match files on disk");
        }
        Ok(issues)
    }

    /// Collapse all pending scripts into one new script: up sections in
    /// corpus order, down sections reversed.  Sources are backed up to
    /// `.squash_backup/` before anything is deleted; the new file is written
    /// with an exclusive atomic create.  Returns the new script's path, or
    /// `None` when there was nothing to squash (or on a dry run).
    pub async fn squash(
        &mut self,
        name: &str,
        dry_run: bool,
    ) -> Result<Option<PathBuf>, EngineError> {
        // Only the ledger read is serialized; the file shuffle below is a
        // developer-time operation arbitrated by the exclusive create.
        self.db.lock(self.lock_id).await?;
        let result = self.read_applied_for_squash().await;
        let applied = self.release_lock(result).await?;

        let pending: Vec<ScriptFile> = corpus::list_scripts(&self.scripts_dir)?
            .into_iter()
            .filter(|s| !applied.contains(&s.id))
            .collect();

        if pending.is_empty() {
            info!("no pending migrations to squash");
            return Ok(None);
        }
        if pending.len() < 2 {
            info!("only 1 pending migration, nothing to squash");
            return Ok(None);
        }

        info!("squashing {} migrations:", pending.len());
        for entry in &pending {
            info!("  - {}", entry.name);
        }

        let mut ups = Vec::new();
        let mut downs = Vec::new();
        for entry in &pending {
            let content = std::fs::read_to_string(&entry.path)
                .with_context(|| format!("could not read '{}'", entry.path.display()))?;
            let parsed = script::parse(&content, &file_name(entry))?;
            if parsed.no_transaction {
                warn!(
                    "{} is non-transactional; the squashed script will be \
                     transactional unless edited by hand",
                    file_name(entry)
                );
            }
            ups.push(format!("-- Source: {}\n{}", file_name(entry), parsed.up));
            // Reverse order so the combined down undoes in the right order.
            downs.insert(0, format!("-- Source: {}\n{}", file_name(entry), parsed.down));
        }

        let new_id = ident::new_id();
        let slug = ident::slugify(name);
        let filename = format!("{}_{}.sql", new_id, slug);
        let target = self.scripts_dir.join(&filename);
        let content = format!(
            "-- migration: {} (squashed)\n-- id: {}\n\n-- migrate: up\n{}\n\n-- migrate: down\n{}\n",
            name,
            new_id,
            ups.join("\n\n"),
            downs.join("\n\n"),
        );

        if dry_run {
            info!(
                "[dry-run] would squash {} scripts into {}",
                pending.len(),
                target.display()
            );
            return Ok(None);
        }

        // Back up every source before touching anything.
        let backup_dir = self.scripts_dir.join(".squash_backup");
        std::fs::create_dir_all(&backup_dir)
            .with_context(|| format!("could not create '{}'", backup_dir.display()))?;
        for entry in &pending {
            let backup = backup_dir.join(file_name(entry));
            std::fs::copy(&entry.path, &backup)
                .with_context(|| format!("could not back up '{}'", entry.path.display()))?;
        }

        fsio::atomic_write(&target, &content, true)?;

        let written = std::fs::metadata(&target)
            .with_context(|| format!("squashed script '{}' missing after write", target.display()))?;
        if written.len() == 0 {
            return Err(anyhow::anyhow!(
                "squashed script '{}' is empty; sources left in place, backups in '{}'",
                target.display(),
                backup_dir.display()
            )
            .into());
        }

        // Sources go last, so a failure up to here leaves them intact.
        for entry in &pending {
            std::fs::remove_file(&entry.path).with_context(|| {
                format!(
                    "could not delete '{}'; backups are in '{}'",
                    entry.path.display(),
                    backup_dir.display()
                )
            })?;
            info!("deleted {}", entry.path.display());
        }

        info!("created squashed migration: {}", target.display());
        Ok(Some(target))
    }

    /// Run every `seeds/*.sql` in filename order, each inside its own
    /// transaction.  Aborts on the first failure.
    pub async fn seed(&mut self) -> Result<usize, EngineError> {
        let mut files: Vec<PathBuf> = match std::fs::read_dir(&self.seeds_dir) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("sql"))
                .collect(),
            Err(_) => Vec::new(),
        };
        files.sort();

        if files.is_empty() {
            info!("no seed files found in {}", self.seeds_dir.display());
            return Ok(0);
        }

        for path in &files {
            info!("running seed: {}", path.display());
            let sql = std::fs::read_to_string(path)
                .with_context(|| format!("could not read '{}'", path.display()))?;

            let tx = self.db.client().transaction().await?;
            tx.batch_execute(&sql)
                .await
                .map_err(EngineError::from)
                .map_err(|e| {
                    error!("seed {} failed", path.display());
                    e
                })?;
            tx.commit().await?;
            info!("completed seed: {}", path.display());
        }

        Ok(files.len())
    }

    async fn read_applied_for_squash(
        &mut self,
    ) -> Result<std::collections::HashSet<String>, EngineError> {
        ledger::ensure_schema(self.db.client()).await?;
        ledger::applied_ids(self.db.client()).await
    }

    async fn refuse_if_dirty(&mut self) -> Result<(), EngineError> {
        let failed = ledger::failed(self.db.client()).await?;
        if !failed.is_empty() {
            return Err(EngineError::DirtyState { migrations: failed });
        }
        Ok(())
    }

    /// Pair the operation result with the unlock.  An unlock failure after a
    /// successful body is surfaced; after a failed body the body's error wins
    /// and the unlock failure is only logged.
    async fn release_lock<T>(
        &mut self,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let unlock = self.db.unlock(self.lock_id).await;
        match (result, unlock) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unlock_err)) => {
                warn!("could not release advisory lock: {}", unlock_err);
                Err(e)
            }
        }
    }
}

fn file_name(entry: &ScriptFile) -> String {
    entry
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.path.display().to_string())
}
