//! Database connection handling.
//!
//! One `Db` per engine invocation.  The wrapped client executes statements in
//! autocommit unless a transaction is explicitly opened, which is exactly the
//! split the executor needs; no connection-level flag is ever toggled.

use crate::config::{ConnectionSpec, DbParams};
use crate::engine::EngineError;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error};

pub struct Db {
    client: Client,
}

impl Db {
    /// Open a connection from the resolved configuration.  The driver's
    /// connection future is moved onto a background task; if it fails after
    /// startup, subsequent statements on the client error out and are mapped
    /// to `LockLost` by callers holding the advisory lock.
    pub async fn connect(spec: &ConnectionSpec) -> Result<Db, EngineError> {
        let (client, connection) = match spec {
            ConnectionSpec::Conninfo(conninfo) => tokio_postgres::connect(conninfo, NoTls)
                .await
                .map_err(EngineError::Connect)?,
            ConnectionSpec::Params(params) => params_config(params)
                .connect(NoTls)
                .await
                .map_err(EngineError::Connect)?,
        };

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("database connection terminated: {}", e);
            }
        });

        Ok(Db { client })
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }

    /// Block until the session-level advisory lock is granted.  The call runs
    /// outside any transaction, so the lock survives until `unlock` or
    /// session end.
    pub async fn lock(&self, lock_id: i64) -> Result<(), EngineError> {
        debug!("acquiring advisory lock {}", lock_id);
        self.client
            .execute("SELECT pg_advisory_lock($1)", &[&lock_id])
            .await?;
        Ok(())
    }

    pub async fn unlock(&self, lock_id: i64) -> Result<(), EngineError> {
        debug!("releasing advisory lock {}", lock_id);
        self.client
            .execute("SELECT pg_advisory_unlock($1)", &[&lock_id])
            .await?;
        Ok(())
    }
}

fn params_config(params: &DbParams) -> tokio_postgres::Config {
    let mut config = tokio_postgres::Config::new();
    if let Some(host) = &params.host {
        config.host(host);
    }
    if let Some(port) = params.port {
        config.port(port);
    }
    if let Some(user) = &params.user {
        config.user(user);
    }
    if let Some(password) = &params.password {
        config.password(password);
    }
    if let Some(dbname) = &params.dbname {
        config.dbname(dbname);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_map_onto_driver_config() {
        let params = DbParams {
            host: Some("db.internal".to_string()),
            port: Some(5433),
            user: Some("app".to_string()),
            password: Some("secret".to_string()),
            dbname: Some("app_db".to_string()),
        };
        let config = params_config(&params);
        assert_eq!(config.get_ports(), &[5433]);
        assert_eq!(config.get_user(), Some("app"));
        assert_eq!(config.get_dbname(), Some("app_db"));
    }

    #[test]
    fn partial_params_leave_driver_defaults() {
        let params = DbParams {
            dbname: Some("app_db".to_string()),
            ..DbParams::default()
        };
        let config = params_config(&params);
        assert_eq!(config.get_user(), None);
        assert_eq!(config.get_dbname(), Some("app_db"));
    }
}
