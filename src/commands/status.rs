use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;

pub struct Status;

impl Command for Status {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        let rows = engine.status().await?;

        let applied = rows.iter().filter(|r| r.status == "applied").count();
        let failed = rows.iter().filter(|r| r.status == "failed").count();
        let pending = rows.iter().filter(|r| r.status == "pending").count();

        println!("Total migrations: {}", rows.len());
        println!("Applied: {}", applied);
        println!("Pending: {}", pending);
        if failed > 0 {
            println!("Failed: {}", failed);
        }

        Ok(Outcome::Success)
    }
}
