use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;

pub struct Apply {
    /// Cap on the number of migrations to run; `up` uses 1.
    pub limit: Option<usize>,
    pub dry_run: bool,
}

impl Command for Apply {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        let processed = engine.apply(self.limit, self.dry_run).await?;

        for migration in &processed {
            if self.dry_run {
                println!("Verified {} ({})", migration.id, migration.name);
            } else {
                println!("Applied {} ({})", migration.id, migration.name);
            }
        }
        match (processed.is_empty(), self.dry_run) {
            (true, _) => println!("No pending migrations."),
            (false, true) => println!("Dry run complete. No changes were made."),
            (false, false) => println!("All migrations applied successfully."),
        }

        Ok(Outcome::Success)
    }
}
