use crate::commands::{Command, Outcome};
use crate::config::Config;
use crate::engine::{Engine, EngineError};
use anyhow::Result;

pub struct Verify;

impl Command for Verify {
    async fn execute(&self, config: &Config) -> Result<Outcome> {
        let mut engine = Engine::connect(config).await?;
        let issues = engine.verify().await?;

        if issues.is_empty() {
            println!("Verification successful: all applied migrations match.");
            Ok(Outcome::Success)
        } else {
            // Each mismatch has already been logged with its migration id.
            Err(EngineError::ChecksumMismatch {
                count: issues.len(),
            }
            .into())
        }
    }
}
