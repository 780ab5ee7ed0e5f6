//! Arbitrage Module
//!
//! Opportunity detection and execution orchestration. `scanner` finds
//! opportunities, `coordinator` drives them through the deployed executor
//! contract behind the `gateway` trait boundary.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

pub mod coordinator;
pub mod gateway;
pub mod scanner;

pub use coordinator::ExecutionCoordinator;
pub use gateway::{ExecutorGateway, LiveGateway, TxOutcome};
pub use scanner::{EnabledStrategies, OpportunityScanner};
