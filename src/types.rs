//! Core data structures for the arbitrage engine
//!
//! Strategy routes, opportunities, trade log entries, and aggregate stats.
//! Strategy kinds are a closed enum — each variant carries only the fields
//! that strategy needs, and both the scanner and the coordinator dispatch
//! on it exhaustively.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Which strategy family an opportunity or trade belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StrategyKind {
    IntraVenue,
    CrossVenue,
    Triangular,
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrategyKind::IntraVenue => write!(f, "INTRA_VENUE"),
            StrategyKind::CrossVenue => write!(f, "CROSS_VENUE"),
            StrategyKind::Triangular => write!(f, "TRIANGULAR"),
        }
    }
}

/// Which venue is entered first on a cross-venue round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrossDirection {
    /// base→stable on Uniswap V3, stable→base on the V2 router
    UniswapFirst,
    /// base→stable on the V2 router, stable→base on Uniswap V3
    SushiFirst,
}

/// Concrete route for one strategy variant.
///
/// Fee tiers are the raw Uniswap V3 values (500 = 0.05%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Route {
    IntraVenue {
        /// Fee tier for the base→stable leg
        fee_in: u32,
        /// Fee tier for the stable→base leg
        fee_out: u32,
    },
    CrossVenue {
        direction: CrossDirection,
        /// Fee tier used on the Uniswap V3 leg
        uni_fee: u32,
    },
    Triangular {
        /// Fee tiers for base→stable, stable→stable2, stable2→base
        fees: [u32; 3],
    },
}

impl Route {
    pub fn kind(&self) -> StrategyKind {
        match self {
            Route::IntraVenue { .. } => StrategyKind::IntraVenue,
            Route::CrossVenue { .. } => StrategyKind::CrossVenue,
            Route::Triangular { .. } => StrategyKind::Triangular,
        }
    }
}

/// A detected arbitrage opportunity for one chain.
///
/// Immutable once created. The invariant `net_profit_usd ==
/// gross_profit_usd - gas_cost_usd` holds exactly by construction.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    /// Chain key (e.g. "arbitrum")
    pub chain: &'static str,
    pub route: Route,
    /// Human-readable route description, e.g. "WETH→USDC(500)→WETH(3000)"
    pub label: String,
    /// Input size in native units (display)
    pub amount_in: f64,
    /// Input size in raw wei
    pub amount_in_raw: U256,
    /// Token addresses in route order (2 for round trips, 3 for triangular)
    pub tokens: Vec<Address>,
    /// Gross profit over input, in basis points (truncating integer division)
    pub spread_bps: i64,
    pub gross_profit_usd: f64,
    pub gas_cost_usd: f64,
    pub net_profit_usd: f64,
    /// Native-asset reference price used for the USD conversions
    pub eth_price_usd: f64,
    pub created_at: DateTime<Utc>,
}

/// Cumulative counters read back from the deployed executor contract.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ExecutorCounters {
    pub total_trades: u64,
    pub successful_trades: u64,
    /// Lifetime profit in raw wei of the base asset
    pub total_profit_raw: u128,
}

/// Outcome of one on-chain execution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub tx_hash: Option<String>,
    /// Realized gas cost (receipt gas used × effective gas price), in USD
    pub gas_cost_usd: f64,
    /// Expected net profit adjusted for realized gas
    pub actual_net_profit_usd: f64,
    pub duration_ms: u64,
    pub counters: Option<ExecutorCounters>,
    pub error: Option<String>,
    /// Secondary failure from the compensating withdrawal, if it also failed.
    /// Never masks the primary error.
    pub recovery_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeStatus {
    Success,
    Failed,
}

/// One entry in the bounded trade history.
#[derive(Debug, Clone, Serialize)]
pub struct TradeLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub chain: &'static str,
    pub strategy: StrategyKind,
    pub route: String,
    pub amount_in: f64,
    pub expected_net_usd: f64,
    pub actual_net_usd: f64,
    pub gas_cost_usd: f64,
    pub tx_hash: Option<String>,
    pub status: TradeStatus,
    pub error: Option<String>,
    pub recovery_error: Option<String>,
    pub duration_ms: u64,
    /// True when the trade went through the deployed executor contract
    pub via_executor: bool,
}

/// Scheduler phase, surfaced in the status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Scanning,
    Executing,
}

/// Running statistics, reset whenever the scheduler loop is (re)started.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateStats {
    pub scans: u64,
    pub opportunities_found: u64,
    pub profitable_opportunities: u64,
    pub trades_attempted: u64,
    pub trades_executed: u64,
    pub trades_successful: u64,
    pub gross_profit_usd: f64,
    pub gas_cost_usd: f64,
    pub net_profit_usd: f64,
    pub win_rate: f64,
    pub uptime_secs: u64,
    pub current_chain: Option<&'static str>,
    pub phase: Phase,
    pub executor_counters: Option<ExecutorCounters>,
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self {
            scans: 0,
            opportunities_found: 0,
            profitable_opportunities: 0,
            trades_attempted: 0,
            trades_executed: 0,
            trades_successful: 0,
            gross_profit_usd: 0.0,
            gas_cost_usd: 0.0,
            net_profit_usd: 0.0,
            win_rate: 0.0,
            uptime_secs: 0,
            current_chain: None,
            phase: Phase::Idle,
            executor_counters: None,
        }
    }
}

/// Per-chain runtime state, refreshed periodically by the scheduler loop.
#[derive(Debug, Clone, Serialize)]
pub struct ChainRuntimeState {
    pub chain: &'static str,
    pub name: &'static str,
    pub chain_id: u64,
    /// Native balance in display units
    pub balance: f64,
    pub balance_usd: f64,
    /// Observed reference price of the native asset in the quote currency
    pub eth_price_usd: f64,
    pub connected: bool,
    pub has_executor: bool,
    pub last_refresh: DateTime<Utc>,
}

impl ChainRuntimeState {
    pub fn disconnected(chain: &'static str, name: &'static str, chain_id: u64) -> Self {
        Self {
            chain,
            name,
            chain_id,
            balance: 0.0,
            balance_usd: 0.0,
            eth_price_usd: 0.0,
            connected: false,
            has_executor: false,
            last_refresh: Utc::now(),
        }
    }
}
