//! Multichain Arbitrage Engine Library
//!
//! Opportunity detection and execution orchestration across EVM chains:
//! scans Uniswap V3 fee tiers (and a second venue where deployed) for
//! round-trip spreads on the wrapped native asset, and executes the best
//! findings atomically through a pre-deployed executor contract.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

pub mod arbitrage;
pub mod chains;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod quotes;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use arbitrage::{EnabledStrategies, ExecutionCoordinator, ExecutorGateway, OpportunityScanner};
pub use chains::{connect_chains, ChainContext, ChainProfile, CHAIN_PROFILES};
pub use config::{load_config, BotConfig};
pub use engine::{ArbEngine, EngineError, StatusSnapshot};
pub use state::BotState;
pub use types::{Opportunity, Route, StrategyKind, TradeLogEntry};
