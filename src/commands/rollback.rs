use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;

pub struct Rollback {
    pub steps: usize,
    pub dry_run: bool,
}

impl Command for Rollback {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        let processed = engine.rollback(self.steps, self.dry_run).await?;

        for migration in &processed {
            if self.dry_run {
                println!("Verified rollback of {} ({})", migration.id, migration.name);
            } else {
                println!("Rolled back {} ({})", migration.id, migration.name);
            }
        }
        if processed.is_empty() {
            println!("No applied migrations to roll back.");
        } else if self.dry_run {
            println!("Dry run complete. No changes were made.");
        }

        Ok(Outcome::Success)
    }
}
