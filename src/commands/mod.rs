use crate::config::Config;
use anyhow::Result;

pub mod apply;
pub mod create;
pub mod head;
pub mod init;
pub mod list;
pub mod prompt;
pub mod rollback;
pub mod seed;
pub mod squash;
pub mod status;
pub mod verify;

pub use apply::Apply;
pub use create::Create;
pub use head::Head;
pub use init::Init;
pub use list::List;
pub use prompt::Prompt;
pub use rollback::Rollback;
pub use seed::Seed;
pub use squash::Squash;
pub use status::Status;
pub use verify::Verify;

/// Trait for executable commands.
#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, config: &Config) -> Result<Outcome>;
}

#[derive(Debug)]
pub enum Outcome {
    Success,
    /// The operator declined the production confirmation; not an error.
    Cancelled,
}
