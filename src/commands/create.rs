use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::{fsio, ident};
use anyhow::{anyhow, Result};

pub struct Create {
    pub name: String,
}

impl Command for Create {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        if !config.scripts_dir.exists() {
            return Err(anyhow!(
                "'{}' directory not found; run 'mg init' first",
                config.scripts_dir.display()
            ));
        }

        let id = ident::new_id();
        let slug = ident::slugify(&self.name);
        let path = config.scripts_dir.join(format!("{}_{}.sql", id, slug));

        let template = format!(
            "-- migration: {}\n-- id: {}\n\n-- migrate: up\n\n\n-- migrate: down\n\n",
            self.name, id
        );
        fsio::atomic_write(&path, &template, true)?;

        println!("Created {}", path.display());
        Ok(Outcome::Success)
    }
}
