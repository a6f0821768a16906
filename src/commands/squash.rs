use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;

pub struct Squash {
    pub name: String,
    pub dry_run: bool,
}

impl Command for Squash {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        match engine.squash(&self.name, self.dry_run).await? {
            Some(path) => println!("Created squashed migration: {}", path.display()),
            None => {
                if self.dry_run {
                    println!("Dry run complete. No files were changed.");
                }
            }
        }
        Ok(Outcome::Success)
    }
}
