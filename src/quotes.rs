//! Quote Sources
//!
//! The `QuoteSource` trait is the scanner's only view of a chain: gas
//! price, single-hop exact-input quotes (Uniswap V3 QuoterV2), and the
//! second venue's path quote where available. The live implementation
//! wraps alloy contract bindings; tests substitute a deterministic map.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::chains::ChainContext;
use crate::contracts::{IQuoterV2, IUniswapV2Router02};
use alloy::primitives::{
    aliases::{U160, U24},
    Address, U256,
};
use alloy::providers::{DynProvider, Provider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;

/// Read-only price/gas view consumed by the opportunity scanner.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Current gas price in wei.
    async fn gas_price(&self) -> Result<u128>;

    /// Single-hop exact-input quote at one fee tier. Reverts (e.g. no
    /// liquidity at that tier) surface as errors and the caller skips
    /// the route.
    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256>;

    /// Path-based amount-out quote on the second venue. Errors when the
    /// chain has no second venue configured.
    async fn quote_path(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>>;
}

/// Live quote source backed by the chain's QuoterV2 and, where present,
/// the V2-style path router.
pub struct LiveQuoteSource {
    provider: DynProvider,
    quoter: Address,
    sushi_router: Option<Address>,
}

impl LiveQuoteSource {
    pub fn new(ctx: &ChainContext) -> Self {
        Self {
            provider: ctx.provider.clone(),
            quoter: ctx.profile.uni_v3_quoter,
            sushi_router: ctx.profile.sushi_router,
        }
    }
}

#[async_trait]
impl QuoteSource for LiveQuoteSource {
    async fn gas_price(&self) -> Result<u128> {
        self.provider.get_gas_price().await.context("gas price query failed")
    }

    async fn quote_exact_input_single(
        &self,
        token_in: Address,
        token_out: Address,
        fee: u32,
        amount_in: U256,
    ) -> Result<U256> {
        let quoter = IQuoterV2::new(self.quoter, self.provider.clone());
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::from(fee),
            sqrtPriceLimitX96: U160::ZERO,
        };
        // quoteExactInputSingle is state-mutating on paper; eth_call only.
        let quote = quoter.quoteExactInputSingle(params).call().await?;
        Ok(quote.amountOut)
    }

    async fn quote_path(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>> {
        let router_addr = self
            .sushi_router
            .ok_or_else(|| anyhow!("no second venue router on this chain"))?;
        let router = IUniswapV2Router02::new(router_addr, self.provider.clone());
        let amounts = router.getAmountsOut(amount_in, path.to_vec()).call().await?;
        Ok(amounts)
    }
}
