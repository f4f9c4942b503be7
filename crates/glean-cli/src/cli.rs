use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "glean",
    about = "Surplus-to-need logistics control plane",
    version
)]
pub struct Cli {
    /// Path to a YAML settings file. Defaults apply when omitted.
    #[arg(long, env = "GLEAN_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        /// Bind address override.
        #[arg(long)]
        bind: Option<String>,

        /// Port override.
        #[arg(long)]
        port: Option<u16>,

        /// Path of the persistent store file.
        #[arg(long, env = "GLEAN_STORE_PATH")]
        store_path: Option<PathBuf>,

        /// Use the in-memory store; state dies with the process.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Load and validate the settings file, then print the effective config.
    CheckConfig,
}
