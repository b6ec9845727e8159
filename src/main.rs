use alloy::{
    primitives::{
        utils::{format_ether, format_units, parse_units},
        Address, U256,
    },
    signers::local::PrivateKeySigner,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{str::FromStr, sync::Arc};
use tokio::sync::{watch, Mutex};
use tokio::time::Duration;
use tracing::{info, warn, Level};

use crate::{
    actions::{Action, DistributeAction, SnapshotAction},
    config::{load_deployed_address, IRevenueSplitter, IVaultToken, KeeperConfig},
    contracts::{FungibleToken, SplitterContract, TokenContract, VaultContract},
    eth::{EthHttpCli, Gateway},
    executor::{ActionExecutor, ExecutorConfig, SigningIdentity},
    scheduler::Scheduler,
};

mod actions;
mod config;
mod contracts;
mod eth;
mod executor;
mod fees;
mod scheduler;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(long, default_value = "keeper_config.toml")]
    config: String,
    /// Run every action once and exit instead of entering periodic mode
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .init();

    let config = KeeperConfig::load(&args.config)?;

    let private_key = std::env::var("KEEPER_PRIVATE_KEY")
        .context("KEEPER_PRIVATE_KEY environment variable not set")?;
    let signer = PrivateKeySigner::from_str(private_key.trim())
        .context("KEEPER_PRIVATE_KEY is not a valid private key")?;
    let admin = signer.address();
    info!("Keeper account: {}", admin);

    let cli = Arc::new(EthHttpCli::new(
        &config.node.rpc_url,
        config.node.chain_id,
        config.node.retry_config(),
    )?);
    info!("Connected to {}", cli.rpc());

    let vault_address = load_deployed_address(&config.contracts.vault_deployment)?;
    let token_address = Address::from_str(&config.contracts.revenue_token)
        .context("invalid revenue token address")?;
    info!(
        "Vault: {}, revenue token: {}",
        vault_address, token_address
    );

    let token: Arc<dyn FungibleToken> = Arc::new(TokenContract::new(token_address, cli.clone()));
    let token_decimals = token.decimals().await?;

    // The override is configured in decimal token units; scale it once with
    // the on-chain decimals so all comparisons stay in raw integers.
    let override_min: Option<U256> = match &config.min_distribute_override {
        Some(amount) => {
            let raw = parse_units(amount, token_decimals)
                .with_context(|| format!("invalid min_distribute_override: {}", amount))?
                .get_absolute();
            info!(
                "Overriding minimum distribution balance to {} token units ({} raw)",
                amount, raw
            );
            Some(raw)
        }
        None => None,
    };

    let mut actions: Vec<Arc<dyn Action>> = vec![Arc::new(SnapshotAction::new(
        Arc::new(VaultContract::new(vault_address, cli.clone())),
        Duration::from_secs(config.schedule.snapshot_interval_secs),
    ))];

    let mut collector_addresses = Vec::new();
    for collector in &config.contracts.collectors {
        let address = load_deployed_address(&collector.deployment)?;
        info!("Revenue collector {}: {}", collector.name, address);
        collector_addresses.push((collector.name.clone(), address));
        actions.push(Arc::new(DistributeAction::new(
            &collector.name,
            Arc::new(SplitterContract::new(address, cli.clone())),
            token.clone(),
            Duration::from_secs(config.schedule.distribute_interval_secs),
            override_min,
            token_decimals,
        )));
    }

    if let Err(e) = startup_report(
        &cli,
        admin,
        vault_address,
        token.as_ref(),
        token_decimals,
        &collector_addresses,
    )
    .await
    {
        warn!("Startup report incomplete: {}", e);
    }

    let identity = Arc::new(Mutex::new(SigningIdentity::new(signer)));
    let executor = Arc::new(ActionExecutor::new(
        cli.clone(),
        identity,
        config.fees.strategy(),
        config.node.chain_id,
        ExecutorConfig {
            confirm_timeout: Duration::from_secs(config.schedule.confirm_timeout_secs),
            receipt_poll_interval: Duration::from_secs(config.schedule.receipt_poll_secs),
            settle_delay: Duration::from_secs(config.schedule.settle_delay_secs),
            explorer_url: config.explorer_url.clone(),
        },
    ));
    let scheduler = Scheduler::new(actions, executor);

    info!("Running all actions once at startup...");
    let results = scheduler.run_all_once().await;
    for (id, outcome) in &results {
        info!("{}: {}", id, outcome.label());
    }

    if args.once {
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested, finishing in-flight work...");
            let _ = shutdown_tx.send(true);
        }
    });

    info!(
        "Entering periodic mode: snapshot every {}s, distribution every {}s",
        config.schedule.snapshot_interval_secs, config.schedule.distribute_interval_secs
    );
    scheduler.run(shutdown_rx).await;
    Ok(())
}

/// Log the on-chain state an operator wants to see before the first tick:
/// keeper gas balance, vault supply, collector balances, and each
/// collector's recipient split. Reads only; failures here never stop the
/// keeper.
async fn startup_report(
    cli: &Arc<EthHttpCli>,
    admin: Address,
    vault_address: Address,
    token: &dyn FungibleToken,
    token_decimals: u8,
    collectors: &[(String, Address)],
) -> Result<()> {
    let native = cli.native_balance(admin).await?;
    info!("Keeper native balance: {}", format_ether(native));

    let vault = IVaultToken::new(vault_address, cli.provider());
    let vault_decimals = cli
        .retry(|| async { vault.decimals().call().await })
        .await?;
    let total_supply = cli
        .retry(|| async { vault.totalSupply().call().await })
        .await?;
    info!(
        "Vault total supply: {} ({} decimals)",
        format_units(total_supply, vault_decimals)?,
        vault_decimals
    );

    for (name, address) in collectors {
        let balance = token.balance_of(*address).await?;
        info!(
            "Collector {} ({}) token balance: {}",
            name,
            address,
            format_units(balance, token_decimals)?
        );

        let splitter = IRevenueSplitter::new(*address, cli.provider());
        let bp_scale = cli
            .retry(|| async { splitter.BP_SCALE().call().await })
            .await?;
        let recipients = cli
            .retry(|| async { splitter.getRecipients().call().await })
            .await?;
        for recipient in recipients {
            let bps = cli
                .retry(|| async { splitter.getBpsForRecipient(recipient).call().await })
                .await?;
            info!(
                "  recipient {}: {} / {} bps",
                recipient, bps, bp_scale
            );
        }
    }
    Ok(())
}
