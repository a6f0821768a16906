use anyhow::Result;
use clap::Parser;
use mg::cli::{run_cli, Cli};
use mg::commands::Outcome;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    mg::logging::init(cli.json_log, cli.verbose);

    match run_cli(cli).await? {
        Outcome::Success => {}
        Outcome::Cancelled => {
            println!("Operation cancelled.");
        }
    }

    Ok(())
}
