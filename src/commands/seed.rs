use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use crate::{fsio, ident};
use anyhow::Result;

pub struct Seed {
    /// `seed create <name>` makes a new seed file instead of running them.
    pub create: Option<String>,
}

impl Command for Seed {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        if let Some(name) = &self.create {
            let slug = ident::slugify(name);
            if !config.seeds_dir.exists() {
                std::fs::create_dir_all(&config.seeds_dir)?;
            }
            let path = config.seeds_dir.join(format!("{}.sql", slug));
            let template = format!("-- seed: {}\n\n", name);
            fsio::atomic_write(&path, &template, true)?;
            println!("Created {}", path.display());
            return Ok(Outcome::Success);
        }

        let mut engine = Engine::connect(config).await?;
        let count = engine.seed().await?;
        if count > 0 {
            println!("Ran {} seed file(s).", count);
        }
        Ok(Outcome::Success)
    }
}
