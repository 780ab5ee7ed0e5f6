//! Multichain Arbitrage Engine
//!
//! Main entry point. Connects the configured chains, starts the
//! round-robin scheduler loop, and runs until Ctrl-C.
//!
//! Modes:
//! - default: dry run — scan and rank, never send transactions
//! - --live: execute the best opportunity through the deployed executor
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use anyhow::Result;
use clap::Parser;
use multichain_arb::chains::connect_chains;
use multichain_arb::config::load_config;
use multichain_arb::engine::ArbEngine;
use multichain_arb::state::BotState;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Multichain DEX arbitrage engine (Base, Arbitrum, Optimism)
#[derive(Parser)]
#[command(name = "multichain-arb")]
struct Args {
    /// Send real transactions instead of dry-running
    #[arg(long, env = "LIVE_MODE")]
    live: bool,

    /// Scan interval in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS")]
    interval_ms: Option<u64>,

    /// Comma-separated chain keys to scan (default: all reachable)
    #[arg(long, env = "CHAINS", value_delimiter = ',')]
    chains: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = Args::parse();

    let mut config = load_config()?;
    if args.live {
        config.live_mode = true;
    }
    if let Some(interval) = args.interval_ms {
        config.poll_interval_ms = interval;
    }
    if !args.chains.is_empty() {
        config.chains = args.chains;
    }

    info!("🤖 Multichain Arbitrage Engine starting");
    info!(
        "Thresholds: ${:.2} net / {} bps | interval {}ms | mode: {}",
        config.min_profit_usd,
        config.min_profit_bps,
        config.poll_interval_ms,
        if config.live_mode { "LIVE" } else { "DRY RUN" }
    );

    let (contexts, runtimes) = connect_chains(&config).await?;
    if contexts.is_empty() {
        anyhow::bail!("no chains reachable — check RPC endpoints");
    }
    let disconnected = runtimes.iter().filter(|r| !r.connected).count();
    if disconnected > 0 {
        warn!("{} configured chain(s) unreachable, excluded from rotation", disconnected);
    }

    let dry_run = !config.live_mode;
    let state = BotState::new();
    let engine = ArbEngine::new(config, contexts, runtimes, state);
    engine.start(dry_run)?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received — draining any in-flight execution");
    engine.stop().await;

    let status = engine.status();
    info!(
        "Final: {} scans | {} opportunities | {} trades ({} ok) | net ${:.4}",
        status.stats.scans,
        status.stats.opportunities_found,
        status.stats.trades_executed,
        status.stats.trades_successful,
        status.stats.net_profit_usd
    );

    Ok(())
}
