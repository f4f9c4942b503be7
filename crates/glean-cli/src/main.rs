mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { bind, port, store_path, ephemeral } => {
            commands::serve(cli.config, bind, port, store_path, ephemeral).await
        }
        Command::CheckConfig => commands::check_config(cli.config),
    }
}
