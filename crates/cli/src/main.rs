mod cli;
mod commands;
mod env;
mod logging;

use clap::Parser;
use cli::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Schedule(args) => commands::schedule::run(args).await,
        Command::Builder(args) => commands::builder::run(args).await,
        Command::Database(args) => commands::database::run(args).await,
        Command::Web(args) => commands::web::run(args).await,
        Command::AutoRepoRemove(args) => commands::auto_repo_remove::run(args).await,
    }
}
