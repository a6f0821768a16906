//! Configuration loading.
//!
//! Connection settings are resolved from, in order of precedence:
//!
//! 1. `MG_DATABASE_URL` (a libpq conninfo string, wins outright)
//! 2. `mg.yaml`, with an `envs.<profile>` overlay selected by `--env`/`MG_ENV`
//! 3. discrete `MG_DB_HOST`/`MG_DB_PORT`/`MG_DB_USER`/`MG_DB_PASSWORD`/
//!    `MG_DB_NAME` overrides applied on top of the file values
//!
//! `${VAR}` and `${VAR:-default}` references inside `mg.yaml` are expanded
//! from the environment before parsing, so credentials can stay out of the
//! file.

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const CONFIG_FILENAME: &str = "mg.yaml";
pub const SCRIPTS_DIR: &str = "migrations";
pub const SEEDS_DIR: &str = "seeds";

pub const DEFAULT_LOCK_ID: i64 = 894321;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Hooks {
    #[serde(default)]
    pub pre_apply: Option<String>,
    #[serde(default)]
    pub post_apply: Option<String>,
    #[serde(default)]
    pub pre_rollback: Option<String>,
    #[serde(default)]
    pub post_rollback: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DbParams {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub dbname: Option<String>,
}

impl DbParams {
    fn is_empty(&self) -> bool {
        self.host.is_none()
            && self.port.is_none()
            && self.user.is_none()
            && self.password.is_none()
            && self.dbname.is_none()
    }
}

/// How to reach the database: either a full conninfo string/URL, or discrete
/// parameters assembled from the config file and environment.
#[derive(Debug, Clone)]
pub enum ConnectionSpec {
    Conninfo(String),
    Params(DbParams),
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Profile {
    #[serde(default)]
    database: Option<DbParams>,
    #[serde(default)]
    lock_id: Option<i64>,
    #[serde(default)]
    hooks: Option<Hooks>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    database: Option<DbParams>,
    #[serde(default)]
    lock_id: Option<i64>,
    #[serde(default)]
    hooks: Option<Hooks>,
    #[serde(default)]
    envs: HashMap<String, Profile>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved connection target, if any source provided one.
    pub connection: Option<ConnectionSpec>,
    /// Advisory lock key serializing mutating operations.
    pub lock_id: i64,
    pub hooks: Hooks,
    /// Resolved profile name; drives the production confirmation gate.
    pub environment: String,
    pub scripts_dir: PathBuf,
    pub seeds_dir: PathBuf,
}

impl Config {
    /// Load configuration from `mg.yaml` in the working directory plus the
    /// process environment.
    pub fn load(env: Option<&str>) -> Result<Config> {
        Config::load_from(Path::new(CONFIG_FILENAME), env)
    }

    pub fn load_from(path: &Path, env: Option<&str>) -> Result<Config> {
        let environment = env
            .map(str::to_string)
            .or_else(|| std::env::var("MG_ENV").ok())
            .unwrap_or_else(|| "default".to_string());

        let file = if path.exists() {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("could not read '{}'", path.display()))?;
            let expanded = interpolate_env(&raw);
            serde_yaml::from_str::<FileConfig>(&expanded)
                .with_context(|| format!("error parsing '{}'", path.display()))?
        } else {
            FileConfig::default()
        };

        let profile = file.envs.get(&environment);

        let connection = resolve_connection(&file, profile)?;
        let lock_id = resolve_lock_id(
            std::env::var("MG_LOCK_ID").ok().as_deref(),
            profile.and_then(|p| p.lock_id),
            file.lock_id,
        );
        let hooks = profile
            .and_then(|p| p.hooks.clone())
            .or_else(|| file.hooks.clone())
            .unwrap_or_default();

        Ok(Config {
            connection,
            lock_id,
            hooks,
            environment,
            scripts_dir: PathBuf::from(SCRIPTS_DIR),
            seeds_dir: PathBuf::from(SEEDS_DIR),
        })
    }
}

fn resolve_connection(
    file: &FileConfig,
    profile: Option<&Profile>,
) -> Result<Option<ConnectionSpec>> {
    if let Ok(url) = std::env::var("MG_DATABASE_URL") {
        if !url.is_empty() {
            return Ok(Some(ConnectionSpec::Conninfo(url)));
        }
    }

    let mut params = profile
        .and_then(|p| p.database.clone())
        .or_else(|| file.database.clone())
        .unwrap_or_default();

    if let Ok(host) = std::env::var("MG_DB_HOST") {
        params.host = Some(host);
    }
    if let Ok(port) = std::env::var("MG_DB_PORT") {
        let port = port
            .parse::<u16>()
            .with_context(|| format!("MG_DB_PORT '{}' is not a valid port", port))?;
        params.port = Some(port);
    }
    if let Ok(user) = std::env::var("MG_DB_USER") {
        params.user = Some(user);
    }
    if let Ok(password) = std::env::var("MG_DB_PASSWORD") {
        params.password = Some(password);
    }
    if let Ok(dbname) = std::env::var("MG_DB_NAME") {
        params.dbname = Some(dbname);
    }

    if params.is_empty() {
        return Ok(None);
    }
    Ok(Some(ConnectionSpec::Params(params)))
}

fn resolve_lock_id(env_var: Option<&str>, profile: Option<i64>, top_level: Option<i64>) -> i64 {
    if let Some(raw) = env_var {
        match raw.parse::<i64>() {
            Ok(id) => return id,
            Err(_) => warn!("ignoring MG_LOCK_ID '{}': not a 64-bit integer", raw),
        }
    }
    profile.or(top_level).unwrap_or(DEFAULT_LOCK_ID)
}

/// Expand `${VAR}` / `${VAR:-default}` from the environment.  Unset
/// variables without a default expand to the empty string with a warning.
fn interpolate_env(raw: &str) -> String {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("static pattern");
    re.replace_all(raw, |caps: &Captures| {
        match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => match caps.get(2) {
                Some(default) => default.as_str().to_string(),
                None => {
                    warn!("config references unset environment variable '{}'", &caps[1]);
                    String::new()
                }
            },
        }
    })
    .into_owned()
}
