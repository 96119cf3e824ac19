use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nk_config::paths;

#[derive(Parser)]
#[command(name = "nodekeeper")]
#[command(about = "Versioned project config and local blockchain node supervisor")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Project directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// User config file (defaults to $NODEKEEPER_USER_CONFIG or the platform config dir)
    #[arg(long, global = true)]
    pub user_config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Migrate a legacy single-file config into user and project configs
    Upgrade,

    /// Run or reset a configured chain
    Chain {
        #[command(subcommand)]
        cmd: ChainCommands,
    },

    /// Inspect the merged configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ChainCommands {
    /// Start a chain, print its web3 config, and keep it up until Ctrl-C
    Run {
        name: String,

        /// Seconds to wait for DAG generation when mining
        #[arg(long)]
        dag_timeout: Option<u64>,

        /// Seconds to wait for each of IPC and RPC to come up
        #[arg(long)]
        wait_timeout: Option<u64>,
    },

    /// Wipe the chain state of a local chain
    Reset { name: String },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print a merged config value by dotted key
    Get { key: String },
}

impl Cli {
    pub fn project_dir(&self) -> Result<PathBuf> {
        match &self.project_dir {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("cannot determine CWD"),
        }
    }
}

pub fn resolve_user_config(explicit: Option<PathBuf>) -> Result<PathBuf> {
    explicit.or_else(paths::user_config_path).context(
        "cannot determine the user config location; pass --user-config or set NODEKEEPER_USER_CONFIG",
    )
}
