//! Scheduler loop
//!
//! One background task drives everything: every poll interval it scans
//! the next connected chain in round-robin order, ranks the findings,
//! and hands the best one to the execution coordinator (unless running
//! in dry-run mode). Every 30th tick it also refreshes native balances
//! and the reference price on all connected chains.
//!
//! The first tick fires immediately on start; counters and history are
//! reset on every (re)start.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::arbitrage::{ExecutionCoordinator, LiveGateway, OpportunityScanner};
use crate::chains::ChainContext;
use crate::config::BotConfig;
use crate::quotes::{LiveQuoteSource, QuoteSource};
use crate::state::BotState;
use crate::types::{
    AggregateStats, ChainRuntimeState, Opportunity, Phase, StrategyKind, TradeLogEntry,
    TradeStatus,
};
use alloy::primitives::U256;
use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Interval, MissedTickBehavior};
use tracing::{info, warn};

/// Reference price fallback until the first on-chain refresh lands.
const DEFAULT_ETH_PRICE_USD: f64 = 3500.0;

/// Balance and reference-price refresh cadence, in ticks.
const REFRESH_EVERY_TICKS: u64 = 30;

/// Uniswap fee tier used for the reference-price probe (1 WETH → USDC).
const PRICE_PROBE_FEE: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,
    #[error("no connected chains to scan")]
    NoChains,
}

/// Everything a caller needs to render the bot's current situation.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub running: bool,
    pub stats: AggregateStats,
    pub opportunities: Vec<Opportunity>,
    pub chains: Vec<ChainRuntimeState>,
    pub trade_log: Vec<TradeLogEntry>,
}

struct ChainSlot {
    ctx: ChainContext,
    quotes: LiveQuoteSource,
    gateway: LiveGateway,
}

/// Owns the scheduler task and every per-chain handle.
pub struct ArbEngine {
    state: Arc<BotState>,
    config: BotConfig,
    slots: Vec<ChainSlot>,
    scanner: OpportunityScanner,
    coordinator: ExecutionCoordinator,
    task: Mutex<Option<JoinHandle<()>>>,
    stop_notify: Notify,
}

impl ArbEngine {
    pub fn new(
        config: BotConfig,
        contexts: Vec<ChainContext>,
        initial_chains: Vec<ChainRuntimeState>,
        state: Arc<BotState>,
    ) -> Arc<Self> {
        for mut runtime in initial_chains {
            if runtime.connected {
                runtime.eth_price_usd = DEFAULT_ETH_PRICE_USD;
            }
            state.chains.insert(runtime.chain, runtime);
        }

        let slots = contexts
            .into_iter()
            .map(|ctx| ChainSlot {
                quotes: LiveQuoteSource::new(&ctx),
                gateway: LiveGateway::new(&ctx),
                ctx,
            })
            .collect();

        let scanner = OpportunityScanner::new(config.min_profit_usd, config.min_profit_bps);
        let coordinator = ExecutionCoordinator::new(
            state.executing.clone(),
            config.min_profit_usd,
            config.min_profit_bps,
        );

        Arc::new(Self {
            state,
            config,
            slots,
            scanner,
            coordinator,
            task: Mutex::new(None),
            stop_notify: Notify::new(),
        })
    }

    /// Start the scheduler loop. Counters and history reset; the first
    /// tick runs immediately.
    pub fn start(self: &Arc<Self>, dry_run: bool) -> Result<()> {
        if self
            .state
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(EngineError::AlreadyRunning.into());
        }
        if self.slots.is_empty() {
            self.state.running.store(false, Ordering::SeqCst);
            return Err(EngineError::NoChains.into());
        }

        self.state.reset();
        info!(
            "▶️  engine started | {} chain(s) | every {}ms | mode: {}",
            self.slots.len(),
            self.config.poll_interval_ms,
            if dry_run { "DRY RUN" } else { "LIVE" }
        );

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = scan_ticker(Duration::from_millis(engine.config.poll_interval_ms));
            let mut tick_no: u64 = 0;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = engine.stop_notify.notified() => {}
                }
                if !engine.state.running.load(Ordering::SeqCst) {
                    break;
                }
                engine.tick(tick_no, dry_run).await;
                tick_no += 1;
            }
        });
        *self.task.lock().unwrap() = Some(handle);
        Ok(())
    }

    /// Stop the loop and wait for the scheduler task to drain. A tick
    /// that is mid-execution finishes its whole pipeline — including
    /// any compensating withdrawal — before this returns; the task is
    /// never aborted.
    pub async fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.stop_notify.notify_one();
        let handle = self.task.lock().unwrap().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("scheduler task ended abnormally: {}", e);
            }
        }
        self.state.set_phase(Phase::Idle, None);
        let stats = self.state.stats();
        info!(
            "⏹️  engine stopped | {} scans | {} trades | net ${:.4}",
            stats.scans, stats.trades_executed, stats.net_profit_usd
        );
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            running: self.state.running.load(Ordering::SeqCst),
            stats: self.state.stats(),
            opportunities: self.state.opportunities(),
            chains: self.state.chain_states(),
            trade_log: self.state.trade_log(),
        }
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Flip one strategy's enable flag; takes effect on the next tick.
    pub fn set_strategy_enabled(&self, kind: StrategyKind, enabled: bool) {
        let mut strategies = self.state.strategies();
        match kind {
            StrategyKind::IntraVenue => strategies.intra_venue = enabled,
            StrategyKind::CrossVenue => strategies.cross_venue = enabled,
            StrategyKind::Triangular => strategies.triangular = enabled,
        }
        self.state.set_strategies(strategies);
        info!(
            "strategy {} {}",
            kind,
            if enabled { "enabled" } else { "disabled" }
        );
    }

    async fn tick(&self, tick_no: u64, dry_run: bool) {
        if tick_no % REFRESH_EVERY_TICKS == 0 {
            self.refresh_chains().await;
        }

        let slot = &self.slots[(tick_no as usize) % self.slots.len()];
        let key = slot.ctx.profile.key;
        let eth_price = self
            .state
            .chains
            .get(key)
            .map(|c| c.eth_price_usd)
            .filter(|p| *p > 0.0)
            .unwrap_or(DEFAULT_ETH_PRICE_USD);

        self.state.set_phase(Phase::Scanning, Some(key));
        self.state.record_scan();

        let mut opportunities = self
            .scanner
            .scan(slot.ctx.profile, eth_price, self.state.strategies(), &slot.quotes)
            .await;
        rank(&mut opportunities);

        if let Some(best) = opportunities.first() {
            info!(
                "💡 {}: {} opportunity(ies) | best {} net ${:.4} ({} bps)",
                key,
                opportunities.len(),
                best.label,
                best.net_profit_usd,
                best.spread_bps
            );
        }

        let best = opportunities.first().cloned();
        self.state.set_opportunities(opportunities);

        if let Some(best) = best {
            if dry_run {
                info!(
                    "📝 DRY RUN: would execute {} on {} for ${:.4}",
                    best.label, best.chain, best.net_profit_usd
                );
            } else {
                self.state.set_phase(Phase::Executing, Some(key));
                self.state.record_attempt();
                if let Some(result) = self.coordinator.execute(&best, &slot.gateway).await {
                    if let Some(counters) = result.counters {
                        self.state.set_executor_counters(counters);
                    }
                    self.state.push_trade(TradeLogEntry {
                        id: self.state.next_trade_id(),
                        timestamp: Utc::now(),
                        chain: best.chain,
                        strategy: best.route.kind(),
                        route: best.label.clone(),
                        amount_in: best.amount_in,
                        expected_net_usd: best.net_profit_usd,
                        actual_net_usd: result.actual_net_profit_usd,
                        gas_cost_usd: result.gas_cost_usd,
                        tx_hash: result.tx_hash,
                        status: if result.success {
                            TradeStatus::Success
                        } else {
                            TradeStatus::Failed
                        },
                        error: result.error,
                        recovery_error: result.recovery_error,
                        duration_ms: result.duration_ms,
                        via_executor: true,
                    });
                }
            }
        }

        self.state.set_phase(Phase::Idle, None);
    }

    /// Refresh native balances and the reference price on every
    /// connected chain. Failures keep the previous values.
    async fn refresh_chains(&self) {
        for slot in &self.slots {
            let key = slot.ctx.profile.key;

            let price = match self.probe_reference_price(slot).await {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!("{}: reference price refresh failed: {:#}", key, e);
                    None
                }
            };
            let balance = match slot.ctx.native_balance().await {
                Ok(wei) => Some(i128::try_from(wei).unwrap_or(i128::MAX) as f64 / 1e18),
                Err(e) => {
                    warn!("{}: balance refresh failed: {:#}", key, e);
                    None
                }
            };

            if let Some(mut entry) = self.state.chains.get_mut(key) {
                if let Some(p) = price {
                    entry.eth_price_usd = p;
                }
                if let Some(b) = balance {
                    entry.balance = b;
                }
                entry.balance_usd = entry.balance * entry.eth_price_usd;
                entry.last_refresh = Utc::now();
            }
        }
    }

    /// Quote 1 WETH → USDC at the probe tier; USDC has 6 decimals.
    async fn probe_reference_price(&self, slot: &ChainSlot) -> Result<f64> {
        let one_weth = U256::from(1_000_000_000_000_000_000u128);
        let out = slot
            .quotes
            .quote_exact_input_single(
                slot.ctx.profile.weth,
                slot.ctx.profile.usdc,
                PRICE_PROBE_FEE,
                one_weth,
            )
            .await?;
        Ok(u128::try_from(out).unwrap_or(u128::MAX) as f64 / 1e6)
    }
}

/// Scan ticker with a fixed wall-clock cadence: a tick that overruns
/// the period (slow RPCs, an execution settling) delays the next tick
/// instead of firing the missed ones back-to-back.
fn scan_ticker(period: Duration) -> Interval {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Rank by net profit, best first. The sort is stable, so equal-profit
/// opportunities keep their enumeration order.
fn rank(opportunities: &mut [Opportunity]) {
    opportunities.sort_by(|a, b| {
        b.net_profit_usd.partial_cmp(&a.net_profit_usd).unwrap_or(CmpOrdering::Equal)
    });
}
