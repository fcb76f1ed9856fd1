mod cli;
mod commands;
mod reporter;

use clap::Parser;
use eyre::WrapErr;
use parcel_pkg::{ManagerConfig, PackageManager};

use crate::cli::Commands;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ManagerConfig::load(&cli.config)
        .await
        .wrap_err_with(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::debug!("Loaded {} sources", config.sources.len());

    if let Commands::Sources = cli.command {
        commands::handle_sources_command(&config);
        return Ok(());
    }

    let manager = PackageManager::from_config(&config)?;

    match cli.command {
        Commands::List {
            installed,
            upgradable,
        } => commands::handle_list_command(&manager, installed, upgradable).await,
        Commands::Install { ids, source } => {
            commands::handle_install_command(&manager, &ids, source.as_deref()).await
        }
        Commands::Uninstall { ids } => commands::handle_uninstall_command(&manager, &ids).await,
        Commands::Upgrade { ids } => commands::handle_upgrade_command(&manager, &ids).await,
        Commands::Sources => Ok(()),
    }
}
