use crate::commands::{Command, Outcome};
use crate::config::{Config, CONFIG_FILENAME};
use crate::fsio;
use anyhow::Result;
use std::path::Path;

const DEFAULT_CONFIG: &str = "\
database:
  host: localhost
  port: 5432
  user: postgres
  password: ${MG_DB_PASSWORD:-password}
  dbname: my_database

envs:
  dev:
    database:
      host: localhost
      port: 5432
      user: postgres
      password: ${MG_DB_PASSWORD:-password}
      dbname: my_app_dev
  prod:
    database:
      host: db.prod.example.com
      port: 5432
      user: dbuser
      password: ${MG_DB_PASSWORD}
      dbname: my_app_prod

# lock_id: 894321
# hooks:
#   pre_apply: \"pg_dump -s my_database > /tmp/pre_apply_schema.sql\"
";

pub struct Init;

impl Command for Init {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        fsio::atomic_write(Path::new(CONFIG_FILENAME), DEFAULT_CONFIG, true)?;
        println!("Created {}", CONFIG_FILENAME);

        if !config.scripts_dir.exists() {
            std::fs::create_dir_all(&config.scripts_dir)?;
            println!("Created {}/ directory", config.scripts_dir.display());
        } else {
            println!("{}/ directory already exists", config.scripts_dir.display());
        }

        Ok(Outcome::Success)
    }
}
