use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::Engine;
use anyhow::Result;

pub struct Head;

impl Command for Head {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        match engine.head().await? {
            Some(head) => {
                println!("Current head: {}", head.id);
                println!("Name: {}", head.name);
                println!("Applied at: {}", head.applied_at);
            }
            None => println!("No migrations applied."),
        }
        Ok(Outcome::Success)
    }
}
