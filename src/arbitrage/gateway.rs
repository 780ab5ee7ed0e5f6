//! Executor Gateway
//!
//! Small trait boundary between the execution coordinator and the chain.
//! The live implementation sends real transactions through the deployed
//! executor contract; tests swap in a scripted gateway to exercise the
//! coordinator's failure paths without a node.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::chains::ChainContext;
use crate::contracts::{IArbExecutor, IWETH};
use crate::types::{CrossDirection, ExecutorCounters, Route};
use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::DynProvider;
use alloy::rpc::types::TransactionReceipt;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;

/// Confirmed transaction facts the coordinator needs for accounting.
#[derive(Debug, Clone, Copy)]
pub struct TxOutcome {
    pub tx_hash: B256,
    pub gas_used: u64,
    pub effective_gas_price: u128,
}

impl TxOutcome {
    /// Realized gas cost in wei.
    pub fn gas_wei(&self) -> u128 {
        (self.gas_used as u128).saturating_mul(self.effective_gas_price)
    }
}

/// On-chain operations the coordinator performs, in invocation order:
/// wrap, fund, invoke, read stats, sweep.
#[async_trait]
pub trait ExecutorGateway: Send + Sync {
    /// Deployed executor contract, if configured for this chain.
    fn executor_address(&self) -> Option<Address>;

    /// Signer's wrapped-asset balance.
    async fn wrapped_balance(&self) -> Result<U256>;

    /// Deposit native → wrapped for the shortfall.
    async fn wrap_native(&self, amount: U256) -> Result<TxOutcome>;

    /// Transfer wrapped tokens to the executor contract.
    async fn fund_executor(&self, amount: U256) -> Result<TxOutcome>;

    /// Call the strategy entry point matching the route.
    async fn invoke_strategy(
        &self,
        route: Route,
        tokens: &[Address],
        amount_in: U256,
    ) -> Result<TxOutcome>;

    /// Read the executor's cumulative counters.
    async fn executor_stats(&self) -> Result<ExecutorCounters>;

    /// Pull a token balance back from the executor to the signer.
    async fn withdraw_token(&self, token: Address) -> Result<TxOutcome>;
}

/// Live gateway bound to one chain's provider, signer, and executor.
pub struct LiveGateway {
    provider: DynProvider,
    signer: Address,
    weth: Address,
    executor: Option<Address>,
}

impl LiveGateway {
    pub fn new(ctx: &ChainContext) -> Self {
        Self {
            provider: ctx.provider.clone(),
            signer: ctx.signer_address,
            weth: ctx.profile.weth,
            executor: ctx.executor,
        }
    }

    fn executor_or_bail(&self) -> Result<Address> {
        self.executor.context("no executor contract configured")
    }
}

fn outcome_from_receipt(receipt: &TransactionReceipt, what: &str) -> Result<TxOutcome> {
    if !receipt.status() {
        bail!("{} reverted: {}", what, receipt.transaction_hash);
    }
    Ok(TxOutcome {
        tx_hash: receipt.transaction_hash,
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
    })
}

#[async_trait]
impl ExecutorGateway for LiveGateway {
    fn executor_address(&self) -> Option<Address> {
        self.executor
    }

    async fn wrapped_balance(&self) -> Result<U256> {
        let weth = IWETH::new(self.weth, &self.provider);
        Ok(weth.balanceOf(self.signer).call().await?)
    }

    async fn wrap_native(&self, amount: U256) -> Result<TxOutcome> {
        let weth = IWETH::new(self.weth, &self.provider);
        let receipt = weth
            .deposit()
            .value(amount)
            .send()
            .await
            .context("sending WETH deposit")?
            .get_receipt()
            .await
            .context("awaiting WETH deposit receipt")?;
        outcome_from_receipt(&receipt, "WETH deposit")
    }

    async fn fund_executor(&self, amount: U256) -> Result<TxOutcome> {
        let executor = self.executor_or_bail()?;
        let weth = IWETH::new(self.weth, &self.provider);
        let receipt = weth
            .transfer(executor, amount)
            .send()
            .await
            .context("sending WETH transfer to executor")?
            .get_receipt()
            .await
            .context("awaiting WETH transfer receipt")?;
        outcome_from_receipt(&receipt, "WETH transfer")
    }

    async fn invoke_strategy(
        &self,
        route: Route,
        tokens: &[Address],
        amount_in: U256,
    ) -> Result<TxOutcome> {
        let executor = IArbExecutor::new(self.executor_or_bail()?, &self.provider);
        let min_profit = U256::ZERO; // profitability validated off-chain

        let pending = match route {
            Route::IntraVenue { fee_in, fee_out } => {
                let [a, b] = [tokens[0], tokens[1]];
                executor
                    .executeIntraDexArb(
                        a,
                        b,
                        U24::from(fee_in),
                        U24::from(fee_out),
                        amount_in,
                        min_profit,
                    )
                    .send()
                    .await
            }
            Route::CrossVenue { direction, uni_fee } => {
                let [a, b] = [tokens[0], tokens[1]];
                executor
                    .executeCrossDexArb(
                        a,
                        b,
                        U24::from(uni_fee),
                        direction == CrossDirection::UniswapFirst,
                        amount_in,
                        min_profit,
                    )
                    .send()
                    .await
            }
            Route::Triangular { fees } => {
                let [a, b, c] = [tokens[0], tokens[1], tokens[2]];
                executor
                    .executeTriangularArb(
                        a,
                        b,
                        c,
                        U24::from(fees[0]),
                        U24::from(fees[1]),
                        U24::from(fees[2]),
                        amount_in,
                        min_profit,
                    )
                    .send()
                    .await
            }
        };

        let receipt = pending
            .context("sending strategy invocation")?
            .get_receipt()
            .await
            .context("awaiting strategy receipt")?;
        outcome_from_receipt(&receipt, "strategy invocation")
    }

    async fn executor_stats(&self) -> Result<ExecutorCounters> {
        let executor = IArbExecutor::new(self.executor_or_bail()?, &self.provider);
        let stats = executor.getStats().call().await.context("reading executor stats")?;
        Ok(ExecutorCounters {
            total_trades: stats.totalTrades.try_into().unwrap_or(u64::MAX),
            successful_trades: stats.successfulTrades.try_into().unwrap_or(u64::MAX),
            total_profit_raw: stats.totalProfit.try_into().unwrap_or(u128::MAX),
        })
    }

    async fn withdraw_token(&self, token: Address) -> Result<TxOutcome> {
        let executor = IArbExecutor::new(self.executor_or_bail()?, &self.provider);
        let receipt = executor
            .withdrawToken(token)
            .send()
            .await
            .context("sending withdrawToken")?
            .get_receipt()
            .await
            .context("awaiting withdrawToken receipt")?;
        outcome_from_receipt(&receipt, "withdrawToken")
    }
}
