//! nftctl - command line client for an NFT drop contract
//!
//! Reads contract state, follows the Dutch auction live and submits mint,
//! stake and admin transactions through the transaction controller.
//!
//! ## Features
//!
//! - **Transaction lifecycle**: one in-flight submission, receipt polling,
//!   revert reasons and a bounded confirmation wait
//! - **Live auction view**: polled price with locally ticking countdowns
//! - **Read cache**: namespaced bindings refreshed after each confirmation
//! - **Metrics**: Prometheus text dump with `--metrics`

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(dead_code)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nft_client::cache::{Namespace, ReadBindingCache};
use nft_client::components::{
    AuctionPriceSync, AuctionSyncConfig, MetadataClient, Notification, NotificationBridge,
    NotificationLevel, SystemClock,
};
use nft_client::config::Config;
use nft_client::contract::{ContractCall, ContractReader, TransactionRequest};
use nft_client::format::{format_duration, format_ether, rarity_percentage};
use nft_client::metrics::metrics;
use nft_client::quantity::QuantityBound;
use nft_client::rpc::NodeClient;
use nft_client::tx::{
    ControllerConfig, RpcReceiptSource, RpcSigner, TransactionController, TransactionSigner,
    TransactionState,
};
use nft_client::types::{Address, TokenId, Wei};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics before exiting
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Contract statistics
    Stats,
    /// Rarity tiers with supply and probability
    Tiers,
    /// Details and metadata for one token
    Token { id: TokenId },
    /// Tokens held by an address (defaults to the configured account)
    Owned { address: Option<Address> },
    /// Whitelist standing of an address (defaults to the configured account)
    Whitelist { address: Option<Address> },
    /// Follow the Dutch auction until interrupted
    Auction,
    /// Mint a single token
    Mint {
        #[arg(long)]
        to: Option<Address>,
    },
    /// Mint several tokens in one transaction
    BatchMint {
        quantity: u32,
        #[arg(long)]
        to: Option<Address>,
    },
    /// Mint from the whitelist allotment
    WhitelistMint { quantity: u32 },
    /// Mint at the current auction price
    AuctionMint { quantity: u32 },
    /// Stake one or more tokens
    Stake {
        #[arg(required = true)]
        ids: Vec<TokenId>,
    },
    /// Unstake one or more tokens
    Unstake {
        #[arg(required = true)]
        ids: Vec<TokenId>,
    },
    /// Owner-only operations
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    Reveal,
    Withdraw,
    Pause,
    Unpause,
    ToggleStaking,
    EmergencyStop {
        #[arg(action = clap::ArgAction::Set)]
        stopped: bool,
    },
    WhitelistPhase {
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    StartAuction {
        /// Start price in wei
        start_price: Wei,
        /// End price in wei
        end_price: Wei,
        /// Auction length in seconds
        duration: u64,
        /// Seconds between price drops
        interval: u64,
    },
    EndAuction,
    OwnerMint {
        to: Address,
        tier: u32,
    },
}

/// Everything a command needs, built once from configuration
struct Session {
    config: Config,
    reader: ContractReader,
    account: Option<Address>,
    cache: ReadBindingCache,
    controller: TransactionController,
    notifications: Arc<NotificationBridge>,
}

impl Session {
    fn connect(config: Config) -> Result<Self> {
        let node = NodeClient::connect(&config.rpc.url, config.rpc_timeout())
            .context("Failed to create RPC client")?;
        let contract = config.contract_address()?;
        let account = config.wallet_account()?;

        let reader = ContractReader::new(Arc::new(node.clone()), contract)
            .with_scan_limit(config.contract.owned_token_scan_limit);
        let signer = account.map(|account| {
            Arc::new(RpcSigner::new(node.clone(), account)) as Arc<dyn TransactionSigner>
        });
        let cache = ReadBindingCache::new();
        let controller = TransactionController::new(
            contract,
            signer,
            Arc::new(RpcReceiptSource::new(node)),
            cache.clone(),
            ControllerConfig::from(&config),
        );
        let notifications = Arc::new(NotificationBridge::new(config.rpc.chain_id, 64));
        controller.add_observer(notifications.clone());

        Ok(Self {
            config,
            reader,
            account,
            cache,
            controller,
            notifications,
        })
    }

    fn account_or(&self, address: Option<Address>) -> Result<Address> {
        address
            .or(self.account)
            .context("No address given and no wallet account configured")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_logging(args.verbose, args.json_logs || config.monitoring.json_logs)?;

    info!("🚀 nftctl {}", env!("CARGO_PKG_VERSION"));
    info!("🌐 RPC: {} (chain {})", config.rpc.url, config.rpc.chain_id);
    info!("📜 Contract: {}", config.contract.address);

    let dump_metrics = args.metrics || config.monitoring.enable_metrics;
    let session = Session::connect(config)?;
    let result = run(&session, args.command).await;

    if dump_metrics {
        println!("{}", metrics().export_text()?);
    }
    result
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "nft_client=debug,nftctl=debug,info"
    } else {
        "nft_client=info,nftctl=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()?;
    }

    Ok(())
}

async fn run(session: &Session, command: Command) -> Result<()> {
    match command {
        Command::Stats => show_stats(session).await,
        Command::Tiers => show_tiers(session).await,
        Command::Token { id } => show_token(session, id).await,
        Command::Owned { address } => show_owned(session, session.account_or(address)?).await,
        Command::Whitelist { address } => {
            let address = session.account_or(address)?;
            let status = session.reader.whitelist_status(address).await?;
            info!("📋 Whitelist for {}", address);
            info!("   Whitelisted: {}", status.is_whitelisted);
            info!("   Remaining mints: {}", status.remaining_mints);
            info!("   Phase active: {}", status.phase_active);
            Ok(())
        }
        Command::Auction => follow_auction(session).await,
        Command::Mint { to } => {
            let to = session.account_or(to)?;
            submit(session, TransactionRequest::new(ContractCall::Mint { to })).await
        }
        Command::BatchMint { quantity, to } => {
            let to = session.account_or(to)?;
            let stats = session.reader.contract_stats().await?;
            let bound = QuantityBound::for_supply(stats.remaining_supply);
            let request =
                TransactionRequest::new(ContractCall::BatchMint { to, quantity }).with_bound(bound);
            submit(session, request).await
        }
        Command::WhitelistMint { quantity } => {
            let account = session.account_or(None)?;
            let status = session.reader.whitelist_status(account).await?;
            if !status.phase_active {
                bail!("Whitelist phase is not active");
            }
            let request = TransactionRequest::new(ContractCall::WhitelistMint { quantity })
                .with_bound(QuantityBound::for_whitelist(status.remaining_mints));
            submit(session, request).await
        }
        Command::AuctionMint { quantity } => {
            let status = session.reader.auction_status().await?;
            if !status.is_active {
                bail!("No auction is running");
            }
            let stats = session.reader.contract_stats().await?;
            let request = TransactionRequest::auction_mint(quantity, status.current_price)?
                .with_bound(QuantityBound::for_supply(stats.remaining_supply));
            info!(
                "💰 {} x {} = {}",
                quantity,
                format_ether(status.current_price),
                format_ether(request.attached_value())
            );
            submit(session, request).await
        }
        Command::Stake { ids } => {
            let call = match ids.as_slice() {
                [token_id] => ContractCall::Stake {
                    token_id: *token_id,
                },
                _ => ContractCall::BatchStake { token_ids: ids },
            };
            submit(session, TransactionRequest::new(call)).await
        }
        Command::Unstake { ids } => {
            let call = match ids.as_slice() {
                [token_id] => ContractCall::Unstake {
                    token_id: *token_id,
                },
                _ => ContractCall::BatchUnstake { token_ids: ids },
            };
            submit(session, TransactionRequest::new(call)).await
        }
        Command::Admin(admin) => {
            let account = session.account_or(None)?;
            if !session.reader.is_owner(account).await? {
                warn!("⚠️ {} is not the contract owner; the call will likely revert", account);
            }
            submit(session, TransactionRequest::new(admin_call(admin))).await
        }
    }
}

fn admin_call(command: AdminCommand) -> ContractCall {
    match command {
        AdminCommand::Reveal => ContractCall::Reveal,
        AdminCommand::Withdraw => ContractCall::Withdraw,
        AdminCommand::Pause => ContractCall::Pause,
        AdminCommand::Unpause => ContractCall::Unpause,
        AdminCommand::ToggleStaking => ContractCall::ToggleStaking,
        AdminCommand::EmergencyStop { stopped } => ContractCall::SetEmergencyStop { stopped },
        AdminCommand::WhitelistPhase { active } => ContractCall::SetWhitelistPhase { active },
        AdminCommand::StartAuction {
            start_price,
            end_price,
            duration,
            interval,
        } => ContractCall::StartAuction {
            start_price,
            end_price,
            duration_secs: duration,
            price_drop_interval_secs: interval,
        },
        AdminCommand::EndAuction => ContractCall::EndAuction,
        AdminCommand::OwnerMint { to, tier } => ContractCall::OwnerMint {
            to,
            tier_index: tier,
        },
    }
}

/// Submit through the controller and follow it to settlement
async fn submit(session: &Session, request: TransactionRequest) -> Result<()> {
    let operation = request.operation_kind();

    // Supply is re-read after confirmation through the cache
    let reader = session.reader.clone();
    let supply = session
        .cache
        .bind(Namespace::contract(), "totalSupply", move || {
            let reader = reader.clone();
            async move { reader.current_supply().await }
        });
    let before = session.cache.refresh(&supply).await.value;

    let mut notifications = session.notifications.subscribe();

    info!("📤 Submitting {}", operation);
    let mut handle = match session.controller.submit(request) {
        Ok(handle) => handle,
        Err(e) => {
            session.notifications.report_local(operation, &e);
            if let Ok(n) = notifications.try_recv() {
                print_notification(&n);
            }
            return Err(e.into());
        }
    };

    let outcome = loop {
        tokio::select! {
            outcome = handle.wait() => break outcome,
            Ok(n) = notifications.recv() => print_notification(&n),
        }
    };
    // observers run before the outcome is published, so the rest is queued
    while let Ok(n) = notifications.try_recv() {
        print_notification(&n);
    }

    match outcome {
        TransactionState::Confirmed { tx_hash } => {
            let refreshed = session.cache.refresh_stale().await;
            let after = session.cache.read(&supply).value;
            info!("🧾 Confirmed {} ({} bindings refreshed)", tx_hash, refreshed);
            if before != after {
                info!(
                    "📈 Supply {} -> {}",
                    before.map_or("?".to_string(), |s| s.to_string()),
                    after.map_or("?".to_string(), |s| s.to_string())
                );
            }
            Ok(())
        }
        TransactionState::Failed { kind, .. } => Err(kind.to_error().into()),
        TransactionState::StillPending { tx_hash } => {
            warn!(
                "⏰ {} not confirmed within {}s; still pending",
                tx_hash,
                session.controller.config().confirmation_timeout.as_secs()
            );
            Ok(())
        }
        other => bail!("Unexpected final state: {}", other),
    }
}

fn print_notification(n: &Notification) {
    let link = n.explorer_url.as_deref().unwrap_or("");
    match n.level {
        NotificationLevel::Loading => info!("⏳ {} {}", n.message, link),
        NotificationLevel::Success => info!("✅ {} {}", n.message, link),
        NotificationLevel::Warning => warn!("⚠️ {} {}", n.message, link),
        NotificationLevel::Error => error!("❌ {}", n.message),
    }
}

async fn show_stats(session: &Session) -> Result<()> {
    let (stats, max_supply, paused) = tokio::try_join!(
        session.reader.contract_stats(),
        session.reader.max_supply(),
        session.reader.paused(),
    )?;
    info!("📊 Contract statistics");
    info!("   Minted: {} / {}", stats.total_supply, max_supply);
    info!("   Remaining: {}", stats.remaining_supply);
    info!("   Rarity tiers: {}", stats.total_rarity_tiers);
    info!("   Revealed: {}", stats.is_revealed);
    info!("   Staking enabled: {}", stats.is_staking_enabled);
    info!("   Whitelist phase: {}", stats.is_whitelist_phase_active);
    info!("   Auction active: {}", stats.is_auction_active);
    info!("   Paused: {}", paused);
    Ok(())
}

async fn show_tiers(session: &Session) -> Result<()> {
    let tiers = session.reader.rarity_tiers().await?;
    info!("💎 {} rarity tiers", tiers.len());
    for tier in &tiers {
        info!(
            "   {:<12} {:>6.2}%  {}/{}  {}",
            tier.name,
            rarity_percentage(tier),
            tier.current_supply,
            tier.max_supply,
            tier.special_attribute
        );
    }
    Ok(())
}

async fn show_token(session: &Session, id: TokenId) -> Result<()> {
    let client = MetadataClient::from_config(&session.config)?;
    let token = client.token_details(&session.reader, id).await;
    info!("🖼️ {}", token.display_name());
    if let Some(rarity) = &token.rarity {
        info!("   Rarity: {}", rarity.name);
    }
    if token.is_staked {
        info!("   Staked for {}", format_duration(token.staking_duration));
    }
    match &token.metadata {
        Some(metadata) => {
            if let Some(image) = &metadata.image {
                info!("   Image: {}", image);
            }
            for attribute in &metadata.attributes {
                info!("   {}: {}", attribute.trait_type, attribute.value);
            }
        }
        None => warn!("   Metadata unavailable, showing placeholder"),
    }
    Ok(())
}

async fn show_owned(session: &Session, owner: Address) -> Result<()> {
    let (owned, staked) = tokio::try_join!(
        session.reader.owned_tokens(owner),
        session.reader.user_staked_tokens(owner),
    )?;
    info!("👛 {} holds {} tokens", owner, owned.len());
    for id in &owned {
        info!("   #{}", id);
    }
    info!("🔒 {} staked", staked.len());
    for id in &staked {
        info!("   #{}", id);
    }
    Ok(())
}

async fn follow_auction(session: &Session) -> Result<()> {
    let handle = AuctionPriceSync::spawn(
        Arc::new(session.reader.clone()),
        Arc::new(SystemClock),
        AuctionSyncConfig::from(&session.config),
    );
    let mut views = handle.subscribe();

    info!("🔨 Following auction (Ctrl-C to stop)");
    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                if let Some(e) = &view.last_error {
                    warn!("⚠️ {}", e);
                }
                match view.price_wei {
                    Some(price) if view.is_active => info!(
                        "💰 {} | next drop {} | ends {} | session {}",
                        format_ether(price),
                        view.next_drop.display(),
                        view.auction_end.display(),
                        view.session
                    ),
                    _ => info!("💤 No active auction"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Received shutdown signal");
                break;
            }
        }
    }

    handle.shutdown().await;
    info!("👋 Auction view closed");
    Ok(())
}
