use crate::commands::{
    Apply, Command, Create, Head, Init, List, Outcome, Prompt, Rollback, Seed, Squash, Status,
    Verify,
};
use crate::config::Config;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mg", version, about = "PostgreSQL schema migration tool", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Environment profile to use (e.g. dev, prod)
    #[arg(global = true, long)]
    pub env: Option<String>,

    /// Output logs in JSON format
    #[arg(global = true, long)]
    pub json_log: bool,

    /// Verbose logging
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new migration project
    Init,
    /// Create a new migration script
    Create {
        /// Name of the migration
        name: String,
    },
    /// Apply all pending migrations
    Apply {
        /// Verify SQL against the database without committing
        #[arg(long)]
        dry_run: bool,
        /// Skip confirmation prompts
        #[arg(short, long)]
        yes: bool,
    },
    /// Roll back migrations
    Rollback {
        /// Number of steps to roll back
        #[arg(default_value_t = 1)]
        steps: usize,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Apply the next pending migration
    Up {
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Roll back the last applied migration
    Down {
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        yes: bool,
    },
    /// Show migration status
    Status,
    /// List all migrations
    List,
    /// Show the newest applied migration
    Head,
    /// Verify applied migration checksums against files on disk
    Verify,
    /// Squash all pending migrations into a single script
    Squash {
        /// Name of the new squashed migration
        name: String,
        /// Show the plan without touching any files
        #[arg(long)]
        dry_run: bool,
    },
    /// Run seed scripts from seeds/
    Seed {
        #[command(subcommand)]
        command: Option<SeedCommands>,
    },
    /// Print usage instructions for AI agents
    Prompt,
}

#[derive(Subcommand)]
pub enum SeedCommands {
    /// Create a new seed file
    Create {
        /// Name of the seed script
        name: String,
    },
}

pub async fn run_cli(cli: Cli) -> Result<Outcome> {
    let config = Config::load(cli.env.as_deref())?;
    run_command(cli, &config).await
}

async fn run_command(cli: Cli, config: &Config) -> Result<Outcome> {
    let Some(command) = cli.command else {
        // arg_required_else_help keeps this unreachable from the binary, but
        // the struct can be built directly.
        return Ok(Outcome::Success);
    };

    // Mutating commands against a production profile need explicit consent.
    if let Some((dry_run, yes)) = confirmation_flags(&command) {
        if !dry_run && !yes && is_production(&config.environment) && !confirm(&config.environment)? {
            return Ok(Outcome::Cancelled);
        }
    }

    match command {
        Commands::Init => Init.execute(config).await,
        Commands::Create { name } => Create { name }.execute(config).await,
        Commands::Apply { dry_run, .. } => {
            Apply {
                limit: None,
                dry_run,
            }
            .execute(config)
            .await
        }
        Commands::Rollback { steps, dry_run, .. } => {
            Rollback { steps, dry_run }.execute(config).await
        }
        Commands::Up { dry_run, .. } => {
            Apply {
                limit: Some(1),
                dry_run,
            }
            .execute(config)
            .await
        }
        Commands::Down { dry_run, .. } => Rollback { steps: 1, dry_run }.execute(config).await,
        Commands::Status => Status.execute(config).await,
        Commands::List => List.execute(config).await,
        Commands::Head => Head.execute(config).await,
        Commands::Verify => Verify.execute(config).await,
        Commands::Squash { name, dry_run } => Squash { name, dry_run }.execute(config).await,
        Commands::Seed { command } => {
            let create = match command {
                Some(SeedCommands::Create { name }) => Some(name),
                None => None,
            };
            Seed { create }.execute(config).await
        }
        Commands::Prompt => Prompt.execute(config).await,
    }
}

fn confirmation_flags(command: &Commands) -> Option<(bool, bool)> {
    match command {
        Commands::Apply { dry_run, yes }
        | Commands::Rollback { dry_run, yes, .. }
        | Commands::Up { dry_run, yes }
        | Commands::Down { dry_run, yes } => Some((*dry_run, *yes)),
        _ => None,
    }
}

fn is_production(environment: &str) -> bool {
    matches!(
        environment.to_lowercase().as_str(),
        "prod" | "production" | "live"
    )
}

fn confirm(environment: &str) -> Result<bool> {
    println!(
        "⚠  WARNING: you are about to run this operation against the '{}' environment!",
        environment
    );
    let confirmed = dialoguer::Confirm::new()
        .with_prompt("Are you sure you want to continue?")
        .default(false)
        .interact()?;
    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_names() {
        assert!(is_production("prod"));
        assert!(is_production("Production"));
        assert!(is_production("LIVE"));
        assert!(!is_production("dev"));
        assert!(!is_production("default"));
    }

    #[test]
    fn only_mutating_commands_are_gated() {
        assert!(confirmation_flags(&Commands::Status).is_none());
        assert!(confirmation_flags(&Commands::Verify).is_none());
        assert!(confirmation_flags(&Commands::Apply {
            dry_run: true,
            yes: false
        })
        .is_some());
        assert!(confirmation_flags(&Commands::Down {
            dry_run: false,
            yes: true
        })
        .is_some());
    }

    #[test]
    fn cli_parses_rollback_steps() {
        let cli = Cli::parse_from(["mg", "rollback", "3", "--dry-run"]);
        match cli.command {
            Some(Commands::Rollback {
                steps,
                dry_run,
                yes,
            }) => {
                assert_eq!(steps, 3);
                assert!(dry_run);
                assert!(!yes);
            }
            _ => panic!("expected rollback"),
        }
    }

    #[test]
    fn cli_defaults_rollback_to_one_step() {
        let cli = Cli::parse_from(["mg", "rollback"]);
        match cli.command {
            Some(Commands::Rollback { steps, .. }) => assert_eq!(steps, 1),
            _ => panic!("expected rollback"),
        }
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["mg", "apply", "--env", "prod", "--json-log"]);
        assert_eq!(cli.env.as_deref(), Some("prod"));
        assert!(cli.json_log);
    }

    #[test]
    fn cli_parses_seed_create() {
        let cli = Cli::parse_from(["mg", "seed", "create", "base_users"]);
        match cli.command {
            Some(Commands::Seed {
                command: Some(SeedCommands::Create { name }),
            }) => assert_eq!(name, "base_users"),
            _ => panic!("expected seed create"),
        }
    }
}
