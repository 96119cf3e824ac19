use anyhow::Result;
use clap::Parser;

mod chain_cmd;
mod cli;
mod config_cmd;
mod upgrade_cmd;

use cli::{ChainCommands, Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let project_dir = cli.project_dir()?;

    match cli.command {
        Commands::Upgrade => {
            let user_config = cli::resolve_user_config(cli.user_config)?;
            upgrade_cmd::handle_upgrade(&project_dir, &user_config)?;
        }
        Commands::Chain { cmd } => {
            let user_config = cli::resolve_user_config(cli.user_config)?;
            match cmd {
                ChainCommands::Run {
                    name,
                    dag_timeout,
                    wait_timeout,
                } => {
                    chain_cmd::handle_chain_run(
                        project_dir,
                        user_config,
                        name,
                        dag_timeout,
                        wait_timeout,
                    )
                    .await?;
                }
                ChainCommands::Reset { name } => {
                    chain_cmd::handle_chain_reset(&project_dir, &user_config, &name)?;
                }
            }
        }
        Commands::Config { cmd } => {
            let user_config = cli::resolve_user_config(cli.user_config)?;
            match cmd {
                ConfigCommands::Get { key } => {
                    config_cmd::handle_config_get(&project_dir, &user_config, &key)?;
                }
            }
        }
    }

    Ok(())
}
