//! stakeploy deploys the reward token and staking contracts, re-running only what changed.

mod cli;
mod scripts;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;

use cli::Cli;
use stakeploy_deploy::{
    AddressRegistry, DeployOptions, Deployer, FsAddressRegistry, FsArtifacts,
    MemoryAddressRegistry, NamedAccounts, NetworkTarget, RpcAccountResolver, RpcContractFactory,
    StakeployConfig, Tags, UnitRegistry, rpc,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let mut config = StakeployConfig::load(cli.config.as_deref())?;
    if let Some(deployments_dir) = cli.deployments_dir {
        config.deployments_dir = deployments_dir;
    }
    if let Some(artifacts_dir) = cli.artifacts_dir {
        config.artifacts_dir = artifacts_dir;
    }

    let network_name = cli
        .network
        .unwrap_or_else(|| config.default_network.clone());
    let network = config.network(&network_name)?;

    tracing::info!(
        network = %network_name,
        url = %network.url,
        chain_id = network.chain_id,
        deployments_dir = %config.deployments_dir.display(),
        artifacts_dir = %config.artifacts_dir.display(),
        "Loaded configuration"
    );

    let artifacts = Arc::new(FsArtifacts::new(&config.artifacts_dir));
    let addresses: Arc<dyn AddressRegistry> = if network.ephemeral {
        tracing::debug!(network = %network_name, "Ephemeral network, deployments are not persisted");
        Arc::new(MemoryAddressRegistry::new())
    } else {
        Arc::new(FsAddressRegistry::new(&config.deployments_dir))
    };

    let client = rpc::create_client()?;
    let factory = RpcContractFactory::new(client.clone(), network.url.clone(), artifacts.clone())
        .receipt_timeout(network.receipt_timeout());

    let mut units = UnitRegistry::new();
    scripts::register_units(&mut units, Arc::new(factory))?;

    let accounts = NamedAccounts::fetch(
        &config.named_accounts,
        &RpcAccountResolver::new(client, network.url.clone()),
    )
    .await
    .with_context(|| format!("Failed to resolve the named accounts on {network_name}"))?;

    // Stop between units on Ctrl+C.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current unit...");
            let _ = cancel_tx.send(true);
        }
    });

    let deployer = Deployer::new(units, addresses, artifacts);
    let options = DeployOptions::new(Tags::from_iter(cli.tags))
        .force(cli.redeploy)
        .reset(cli.reset)
        .cancel_on(cancel_rx);

    let report = deployer
        .deploy(
            NetworkTarget::new(network_name, network.chain_id),
            accounts,
            options,
        )
        .await?;

    tracing::info!("\n{report}");

    if !report.is_success() {
        anyhow::bail!("Deployment failed");
    }

    Ok(())
}
