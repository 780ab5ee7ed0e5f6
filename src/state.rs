//! Shared bot state
//!
//! Single source of truth the scheduler loop writes and the status
//! surface reads: aggregate stats, the latest scan's opportunities, a
//! bounded trade history, per-chain runtime state, and the two global
//! flags (running, executing).
//!
//! The trade log is a ring buffer capped at [`TRADE_LOG_CAP`]; the oldest
//! entry is evicted first.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::arbitrage::EnabledStrategies;
use crate::types::{AggregateStats, ChainRuntimeState, Opportunity, Phase, TradeLogEntry, TradeStatus};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

pub const TRADE_LOG_CAP: usize = 100;

struct Inner {
    stats: AggregateStats,
    opportunities: Vec<Opportunity>,
    trade_log: VecDeque<TradeLogEntry>,
    strategies: EnabledStrategies,
    started_at: Instant,
}

impl Inner {
    fn fresh(strategies: EnabledStrategies) -> Self {
        Self {
            stats: AggregateStats::default(),
            opportunities: Vec::new(),
            trade_log: VecDeque::with_capacity(TRADE_LOG_CAP),
            strategies,
            started_at: Instant::now(),
        }
    }
}

/// Shared state handle. Cheap to clone via `Arc`.
pub struct BotState {
    pub running: AtomicBool,
    /// Global in-flight execution slot; the coordinator owns its CAS.
    pub executing: Arc<AtomicBool>,
    next_trade_id: AtomicU64,
    inner: RwLock<Inner>,
    pub chains: DashMap<&'static str, ChainRuntimeState>,
}

impl BotState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(false),
            executing: Arc::new(AtomicBool::new(false)),
            next_trade_id: AtomicU64::new(1),
            inner: RwLock::new(Inner::fresh(EnabledStrategies::default())),
            chains: DashMap::new(),
        })
    }

    /// Wipe counters, opportunities, and trade history. Strategy toggles
    /// and chain runtime state survive a restart.
    pub fn reset(&self) {
        let mut inner = self.inner.write().unwrap();
        let strategies = inner.strategies;
        *inner = Inner::fresh(strategies);
        self.executing.store(false, Ordering::SeqCst);
        self.next_trade_id.store(1, Ordering::SeqCst);
    }

    pub fn next_trade_id(&self) -> u64 {
        self.next_trade_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn strategies(&self) -> EnabledStrategies {
        self.inner.read().unwrap().strategies
    }

    pub fn set_strategies(&self, strategies: EnabledStrategies) {
        self.inner.write().unwrap().strategies = strategies;
    }

    pub fn set_phase(&self, phase: Phase, current_chain: Option<&'static str>) {
        let mut inner = self.inner.write().unwrap();
        inner.stats.phase = phase;
        inner.stats.current_chain = current_chain;
    }

    pub fn record_scan(&self) {
        self.inner.write().unwrap().stats.scans += 1;
    }

    /// Count a hand-off to the coordinator, whether or not it accepts.
    /// Refusals (slot taken, no executor, stale thresholds) show up as
    /// attempts without a matching execution.
    pub fn record_attempt(&self) {
        self.inner.write().unwrap().stats.trades_attempted += 1;
    }

    /// Replace the opportunity list with the latest scan's results
    /// (already ranked by the caller) and bump the discovery counters.
    pub fn set_opportunities(&self, opportunities: Vec<Opportunity>) {
        let mut inner = self.inner.write().unwrap();
        inner.stats.opportunities_found += opportunities.len() as u64;
        inner.stats.profitable_opportunities +=
            opportunities.iter().filter(|o| o.net_profit_usd > 0.0).count() as u64;
        inner.opportunities = opportunities;
    }

    pub fn opportunities(&self) -> Vec<Opportunity> {
        self.inner.read().unwrap().opportunities.clone()
    }

    /// Append a trade outcome, folding it into the aggregate stats and
    /// evicting the oldest history entry beyond the cap.
    pub fn push_trade(&self, entry: TradeLogEntry) {
        let mut inner = self.inner.write().unwrap();

        inner.stats.trades_executed += 1;
        inner.stats.gas_cost_usd += entry.gas_cost_usd;
        if entry.status == TradeStatus::Success {
            inner.stats.trades_successful += 1;
            inner.stats.gross_profit_usd += entry.actual_net_usd + entry.gas_cost_usd;
            inner.stats.net_profit_usd += entry.actual_net_usd;
        } else {
            // A failed trade still burned its gas
            inner.stats.net_profit_usd -= entry.gas_cost_usd;
        }
        inner.stats.win_rate = if inner.stats.trades_executed > 0 {
            inner.stats.trades_successful as f64 / inner.stats.trades_executed as f64 * 100.0
        } else {
            0.0
        };

        if inner.trade_log.len() == TRADE_LOG_CAP {
            inner.trade_log.pop_front();
        }
        inner.trade_log.push_back(entry);
    }

    pub fn trade_log(&self) -> Vec<TradeLogEntry> {
        self.inner.read().unwrap().trade_log.iter().cloned().collect()
    }

    pub fn stats(&self) -> AggregateStats {
        let inner = self.inner.read().unwrap();
        let mut stats = inner.stats.clone();
        stats.uptime_secs = inner.started_at.elapsed().as_secs();
        stats
    }

    pub fn set_executor_counters(&self, counters: crate::types::ExecutorCounters) {
        self.inner.write().unwrap().stats.executor_counters = Some(counters);
    }

    pub fn chain_states(&self) -> Vec<ChainRuntimeState> {
        let mut states: Vec<_> = self.chains.iter().map(|e| e.value().clone()).collect();
        states.sort_by_key(|s| s.chain_id);
        states
    }
}
