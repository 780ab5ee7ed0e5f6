//! Opportunity Scanner
//!
//! Pure computation over quote sources: enumerates strategy variants and
//! trade sizes for one chain, computes profit net of a conservative gas
//! baseline, and filters by the configured USD and basis-point thresholds.
//!
//! The scanner never fails — any individual route quote that reverts
//! (typically thin liquidity at that fee tier) is skipped silently and
//! not retried within the same scan.
//!
//! All token amounts stay in raw integer units until the final conversion
//! to a USD display value. Spread is a truncating integer division:
//! gross_wei * 10000 / amount_in_wei.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::chains::ChainProfile;
use crate::quotes::QuoteSource;
use crate::types::{CrossDirection, Opportunity, Route};
use alloy::primitives::{Address, U256};
use chrono::Utc;
use tracing::debug;

/// Conservative gas-unit estimate per route (single round trip).
pub const GAS_UNITS_PER_ROUTE: u128 = 500_000;

/// Triangular routes run three on-chain swaps; budget 1.5× the baseline.
pub const TRIANGULAR_GAS_UNITS: u128 = GAS_UNITS_PER_ROUTE * 3 / 2;

/// Representative Uniswap fee tier for the cross-venue V3 leg.
const CROSS_VENUE_UNI_FEE: u32 = 500;

/// Fixed three-tier path for the triangular cycle:
/// base→stable, stable→stable2, stable2→base.
const TRIANGULAR_FEES: [u32; 3] = [500, 100, 500];

/// Default probe sizes in wei (0.005, 0.01, 0.02 native units).
const DEFAULT_TRADE_SIZES: [u128; 3] =
    [5_000_000_000_000_000, 10_000_000_000_000_000, 20_000_000_000_000_000];

/// Per-strategy enable flags. Disabling a strategy suppresses scanning
/// it entirely (and therefore also execution).
#[derive(Debug, Clone, Copy)]
pub struct EnabledStrategies {
    pub intra_venue: bool,
    pub cross_venue: bool,
    pub triangular: bool,
}

impl Default for EnabledStrategies {
    fn default() -> Self {
        Self { intra_venue: true, cross_venue: true, triangular: true }
    }
}

/// Enumerates candidate routes for one chain and prices them.
pub struct OpportunityScanner {
    min_profit_usd: f64,
    min_profit_bps: i64,
    trade_sizes: Vec<U256>,
}

impl OpportunityScanner {
    pub fn new(min_profit_usd: f64, min_profit_bps: i64) -> Self {
        Self {
            min_profit_usd,
            min_profit_bps,
            trade_sizes: DEFAULT_TRADE_SIZES.iter().map(|&w| U256::from(w)).collect(),
        }
    }

    /// Override the probe sizes (tests use bespoke amounts).
    pub fn with_trade_sizes(mut self, sizes: Vec<U256>) -> Self {
        self.trade_sizes = sizes;
        self
    }

    /// Scan one chain. Returns the unranked concatenation of every
    /// emitted opportunity; ranking happens in the scheduler loop.
    pub async fn scan(
        &self,
        profile: &ChainProfile,
        eth_price_usd: f64,
        enabled: EnabledStrategies,
        source: &dyn QuoteSource,
    ) -> Vec<Opportunity> {
        let gas_price = match source.gas_price().await {
            Ok(p) => p,
            Err(e) => {
                debug!("{}: gas price unavailable, skipping scan: {}", profile.key, e);
                return Vec::new();
            }
        };

        let route_gas_usd = gas_cost_usd(gas_price, GAS_UNITS_PER_ROUTE, eth_price_usd);
        let tri_gas_usd = gas_cost_usd(gas_price, TRIANGULAR_GAS_UNITS, eth_price_usd);

        let mut opportunities = Vec::new();

        for &amount_in in &self.trade_sizes {
            if enabled.intra_venue {
                self.scan_intra_venue(
                    profile, amount_in, route_gas_usd, eth_price_usd, source, &mut opportunities,
                )
                .await;
            }
            if enabled.cross_venue && profile.sushi_router.is_some() {
                self.scan_cross_venue(
                    profile, amount_in, route_gas_usd, eth_price_usd, source, &mut opportunities,
                )
                .await;
            }
            if enabled.triangular && profile.usdc_alt.is_some() {
                self.scan_triangular(
                    profile, amount_in, tri_gas_usd, eth_price_usd, source, &mut opportunities,
                )
                .await;
            }
        }

        opportunities
    }

    /// Every ordered pair of distinct fee tiers on the primary venue:
    /// base→stable at tier i, stable→base at tier j.
    async fn scan_intra_venue(
        &self,
        profile: &ChainProfile,
        amount_in: U256,
        gas_usd: f64,
        eth_price_usd: f64,
        source: &dyn QuoteSource,
        out: &mut Vec<Opportunity>,
    ) {
        for &fee_in in profile.fee_tiers {
            for &fee_out in profile.fee_tiers {
                if fee_in == fee_out {
                    continue;
                }

                let stable_out = match source
                    .quote_exact_input_single(profile.weth, profile.usdc, fee_in, amount_in)
                    .await
                {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("{}: quote WETH→USDC({}) failed: {}", profile.key, fee_in, e);
                        continue;
                    }
                };
                let base_out = match source
                    .quote_exact_input_single(profile.usdc, profile.weth, fee_out, stable_out)
                    .await
                {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("{}: quote USDC→WETH({}) failed: {}", profile.key, fee_out, e);
                        continue;
                    }
                };

                if let Some(opp) = self.build_opportunity(
                    profile,
                    Route::IntraVenue { fee_in, fee_out },
                    format!("WETH→USDC({})→WETH({})", fee_in, fee_out),
                    vec![profile.weth, profile.usdc],
                    amount_in,
                    base_out,
                    gas_usd,
                    eth_price_usd,
                ) {
                    out.push(opp);
                }
            }
        }
    }

    /// Both directions across the two venues: Uniswap V3 at a fixed
    /// representative tier on one leg, the V2 path router on the other.
    /// The gas baseline is the same single-route estimate in both
    /// directions.
    async fn scan_cross_venue(
        &self,
        profile: &ChainProfile,
        amount_in: U256,
        gas_usd: f64,
        eth_price_usd: f64,
        source: &dyn QuoteSource,
        out: &mut Vec<Opportunity>,
    ) {
        // Direction 1: Uniswap base→stable, V2 router stable→base
        let uni_first = async {
            let stable_out = source
                .quote_exact_input_single(
                    profile.weth, profile.usdc, CROSS_VENUE_UNI_FEE, amount_in,
                )
                .await?;
            let amounts = source.quote_path(stable_out, &[profile.usdc, profile.weth]).await?;
            amounts.last().copied().ok_or_else(|| anyhow::anyhow!("empty path quote"))
        };
        match uni_first.await {
            Ok(base_out) => {
                if let Some(opp) = self.build_opportunity(
                    profile,
                    Route::CrossVenue {
                        direction: CrossDirection::UniswapFirst,
                        uni_fee: CROSS_VENUE_UNI_FEE,
                    },
                    format!("WETH→USDC(Uni {})→WETH(Sushi)", CROSS_VENUE_UNI_FEE),
                    vec![profile.weth, profile.usdc],
                    amount_in,
                    base_out,
                    gas_usd,
                    eth_price_usd,
                ) {
                    out.push(opp);
                }
            }
            Err(e) => debug!("{}: cross-venue uni-first quote failed: {}", profile.key, e),
        }

        // Direction 2: V2 router base→stable, Uniswap stable→base
        let sushi_first = async {
            let amounts = source.quote_path(amount_in, &[profile.weth, profile.usdc]).await?;
            let stable_out =
                amounts.last().copied().ok_or_else(|| anyhow::anyhow!("empty path quote"))?;
            source
                .quote_exact_input_single(
                    profile.usdc, profile.weth, CROSS_VENUE_UNI_FEE, stable_out,
                )
                .await
        };
        match sushi_first.await {
            Ok(base_out) => {
                if let Some(opp) = self.build_opportunity(
                    profile,
                    Route::CrossVenue {
                        direction: CrossDirection::SushiFirst,
                        uni_fee: CROSS_VENUE_UNI_FEE,
                    },
                    format!("WETH→USDC(Sushi)→WETH(Uni {})", CROSS_VENUE_UNI_FEE),
                    vec![profile.weth, profile.usdc],
                    amount_in,
                    base_out,
                    gas_usd,
                    eth_price_usd,
                ) {
                    out.push(opp);
                }
            }
            Err(e) => debug!("{}: cross-venue sushi-first quote failed: {}", profile.key, e),
        }
    }

    /// Fixed three-leg cycle through the secondary stable.
    async fn scan_triangular(
        &self,
        profile: &ChainProfile,
        amount_in: U256,
        gas_usd: f64,
        eth_price_usd: f64,
        source: &dyn QuoteSource,
        out: &mut Vec<Opportunity>,
    ) {
        let stable2 = match profile.usdc_alt {
            Some(addr) => addr,
            None => return,
        };
        let [fee_a, fee_b, fee_c] = TRIANGULAR_FEES;

        let cycle = async {
            let stable_out = source
                .quote_exact_input_single(profile.weth, profile.usdc, fee_a, amount_in)
                .await?;
            let stable2_out = source
                .quote_exact_input_single(profile.usdc, stable2, fee_b, stable_out)
                .await?;
            source.quote_exact_input_single(stable2, profile.weth, fee_c, stable2_out).await
        };

        match cycle.await {
            Ok(base_out) => {
                if let Some(opp) = self.build_opportunity(
                    profile,
                    Route::Triangular { fees: TRIANGULAR_FEES },
                    format!("WETH→USDC({})→USDC.e({})→WETH({})", fee_a, fee_b, fee_c),
                    vec![profile.weth, profile.usdc, stable2],
                    amount_in,
                    base_out,
                    gas_usd,
                    eth_price_usd,
                ) {
                    out.push(opp);
                }
            }
            Err(e) => debug!("{}: triangular quote failed: {}", profile.key, e),
        }
    }

    /// Price a completed round trip and apply both thresholds.
    #[allow(clippy::too_many_arguments)]
    fn build_opportunity(
        &self,
        profile: &ChainProfile,
        route: Route,
        label: String,
        tokens: Vec<Address>,
        amount_in: U256,
        amount_out: U256,
        gas_cost_usd: f64,
        eth_price_usd: f64,
    ) -> Option<Opportunity> {
        let in_wei = wei_i128(amount_in)?;
        let out_wei = wei_i128(amount_out)?;
        if in_wei == 0 {
            return None;
        }

        let gross_wei = out_wei - in_wei;
        let spread_bps = (gross_wei.saturating_mul(10_000) / in_wei) as i64;

        let gross_profit_usd = wei_to_eth(gross_wei) * eth_price_usd;
        let net_profit_usd = gross_profit_usd - gas_cost_usd;

        if net_profit_usd < self.min_profit_usd || spread_bps < self.min_profit_bps {
            return None;
        }

        Some(Opportunity {
            chain: profile.key,
            route,
            label,
            amount_in: wei_to_eth(in_wei),
            amount_in_raw: amount_in,
            tokens,
            spread_bps,
            gross_profit_usd,
            gas_cost_usd,
            net_profit_usd,
            eth_price_usd,
            created_at: Utc::now(),
        })
    }
}

/// Gas units × gas price, converted to USD at the reference price.
fn gas_cost_usd(gas_price_wei: u128, gas_units: u128, eth_price_usd: f64) -> f64 {
    let gas_wei = gas_price_wei.saturating_mul(gas_units);
    (gas_wei as f64 / 1e18) * eth_price_usd
}

/// Raw U256 amount → i128 wei; absurdly large quotes are dropped.
fn wei_i128(v: U256) -> Option<i128> {
    i128::try_from(v).ok()
}

fn wei_to_eth(wei: i128) -> f64 {
    wei as f64 / 1e18
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chains::ChainProfile;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::collections::HashMap;

    const ETH_PRICE: f64 = 3500.0;

    fn weth() -> Address {
        Address::repeat_byte(0x11)
    }
    fn usdc() -> Address {
        Address::repeat_byte(0x22)
    }
    fn usdc_alt() -> Address {
        Address::repeat_byte(0x33)
    }

    fn test_profile(fee_tiers: &'static [u32], cross: bool, triangular: bool) -> ChainProfile {
        ChainProfile {
            key: "testchain",
            name: "Testchain",
            chain_id: 1337,
            default_rpc: "http://localhost:8545",
            explorer: "https://example.org",
            weth: weth(),
            usdc: usdc(),
            usdc_alt: triangular.then(usdc_alt),
            uni_v3_quoter: Address::repeat_byte(0xaa),
            uni_v3_router: Address::repeat_byte(0xbb),
            sushi_router: cross.then(|| Address::repeat_byte(0xcc)),
            fee_tiers,
        }
    }

    /// Deterministic quote source: each configured hop multiplies the
    /// input by num/den. Unconfigured hops fail like a reverted call.
    struct MockQuotes {
        gas_price: u128,
        singles: HashMap<(Address, Address, u32), (u64, u64)>,
        paths: HashMap<Vec<Address>, (u64, u64)>,
    }

    impl MockQuotes {
        fn new(gas_price: u128) -> Self {
            Self { gas_price, singles: HashMap::new(), paths: HashMap::new() }
        }

        fn single(mut self, from: Address, to: Address, fee: u32, num: u64, den: u64) -> Self {
            self.singles.insert((from, to, fee), (num, den));
            self
        }

        fn path(mut self, path: Vec<Address>, num: u64, den: u64) -> Self {
            self.paths.insert(path, (num, den));
            self
        }
    }

    #[async_trait]
    impl QuoteSource for MockQuotes {
        async fn gas_price(&self) -> Result<u128> {
            Ok(self.gas_price)
        }

        async fn quote_exact_input_single(
            &self,
            token_in: Address,
            token_out: Address,
            fee: u32,
            amount_in: U256,
        ) -> Result<U256> {
            let (num, den) = self
                .singles
                .get(&(token_in, token_out, fee))
                .ok_or_else(|| anyhow!("execution reverted"))?;
            Ok(amount_in * U256::from(*num) / U256::from(*den))
        }

        async fn quote_path(&self, amount_in: U256, path: &[Address]) -> Result<Vec<U256>> {
            let (num, den) =
                self.paths.get(path).ok_or_else(|| anyhow!("execution reverted"))?;
            Ok(vec![amount_in, amount_in * U256::from(*num) / U256::from(*den)])
        }
    }

    /// Mock where every tier quotes WETH→USDC at 2000:1 and back with a
    /// round-trip gain of ~5% per leg combination. Gas is priced low
    /// enough that every enumerated route clears a zero threshold.
    fn profitable_intra_mock(tiers: &[u32]) -> MockQuotes {
        let mut mock = MockQuotes::new(1_000_000); // 0.001 gwei
        for &fee in tiers {
            mock = mock
                .single(weth(), usdc(), fee, 2000, 1)
                .single(usdc(), weth(), fee, 105, 100 * 2000);
        }
        mock
    }

    fn scanner() -> OpportunityScanner {
        OpportunityScanner::new(0.0, 0)
    }

    fn intra_only() -> EnabledStrategies {
        EnabledStrategies { intra_venue: true, cross_venue: false, triangular: false }
    }

    #[tokio::test]
    async fn enumerates_twelve_ordered_pairs_for_four_tiers() {
        let tiers: &[u32] = &[100, 500, 3000, 10000];
        let profile = test_profile(tiers, false, false);
        let mock = profitable_intra_mock(tiers);
        let scanner = scanner().with_trade_sizes(vec![U256::from(10_000_000_000_000_000u128)]);

        let opps = scanner.scan(&profile, ETH_PRICE, intra_only(), &mock).await;

        // 4×3 ordered pairs excluding i=j, one trade size
        assert_eq!(opps.len(), 12);
        for opp in &opps {
            match opp.route {
                Route::IntraVenue { fee_in, fee_out } => assert_ne!(fee_in, fee_out),
                _ => panic!("expected intra-venue route"),
            }
        }
    }

    #[tokio::test]
    async fn three_trade_sizes_triple_the_enumeration() {
        let tiers: &[u32] = &[100, 500, 3000, 10000];
        let profile = test_profile(tiers, false, false);
        let mock = profitable_intra_mock(tiers);

        let opps = scanner().scan(&profile, ETH_PRICE, intra_only(), &mock).await;
        assert_eq!(opps.len(), 36);
    }

    #[tokio::test]
    async fn net_profit_is_exactly_gross_minus_gas() {
        let tiers: &[u32] = &[500, 3000];
        let profile = test_profile(tiers, false, false);
        let mock = profitable_intra_mock(tiers);

        let opps = scanner().scan(&profile, ETH_PRICE, intra_only(), &mock).await;
        assert!(!opps.is_empty());
        for opp in &opps {
            assert_eq!(opp.net_profit_usd, opp.gross_profit_usd - opp.gas_cost_usd);
        }
    }

    #[tokio::test]
    async fn thresholds_filter_unprofitable_routes() {
        let tiers: &[u32] = &[500, 3000];
        let profile = test_profile(tiers, false, false);
        // Round trip loses ~1% on every combination
        let mut mock = MockQuotes::new(1_000_000_000);
        for &fee in tiers {
            mock = mock
                .single(weth(), usdc(), fee, 2000, 1)
                .single(usdc(), weth(), fee, 99, 100 * 2000);
        }

        let strict = OpportunityScanner::new(0.05, 5);
        let opps = strict.scan(&profile, ETH_PRICE, intra_only(), &mock).await;
        assert!(opps.is_empty());
    }

    #[tokio::test]
    async fn spread_threshold_applies_independently_of_usd_threshold() {
        let tiers: &[u32] = &[500, 3000];
        let profile = test_profile(tiers, false, false);
        // ~2 bps gross spread, free gas: USD profit is positive but tiny
        let mock = MockQuotes::new(0)
            .single(weth(), usdc(), 500, 2000, 1)
            .single(usdc(), weth(), 3000, 10002, 10000 * 2000);

        let scanner = OpportunityScanner::new(0.0, 5)
            .with_trade_sizes(vec![U256::from(10_000_000_000_000_000u128)]);
        let opps = scanner.scan(&profile, ETH_PRICE, intra_only(), &mock).await;
        assert!(opps.is_empty(), "2 bps spread must not clear a 5 bps floor");
    }

    /// End-to-end numeric scenario: 0.001 WETH in, 0.0011 out, gas
    /// 0.00002 WETH → gross $0.35, net $0.28, spread 1000 bps.
    #[tokio::test]
    async fn intra_venue_end_to_end_scenario() {
        let tiers: &[u32] = &[500, 3000];
        let profile = test_profile(tiers, false, false);
        // Only the (500, 3000) ordering is quotable; round trip ×1.10.
        // gas: 0.04 gwei × 500k units = 0.00002 ETH = $0.07
        let mock = MockQuotes::new(40_000_000)
            .single(weth(), usdc(), 500, 2000, 1)
            .single(usdc(), weth(), 3000, 110, 100 * 2000);

        let scanner = OpportunityScanner::new(0.05, 5)
            .with_trade_sizes(vec![U256::from(1_000_000_000_000_000u128)]); // 0.001 ETH
        let opps = scanner.scan(&profile, ETH_PRICE, intra_only(), &mock).await;

        assert_eq!(opps.len(), 1);
        let opp = &opps[0];
        assert_eq!(opp.route.kind(), crate::types::StrategyKind::IntraVenue);
        assert_eq!(opp.spread_bps, 1000);
        assert!((opp.gross_profit_usd - 0.35).abs() < 1e-9);
        assert!((opp.gas_cost_usd - 0.07).abs() < 1e-9);
        assert!((opp.net_profit_usd - 0.28).abs() < 1e-9);
    }

    #[tokio::test]
    async fn cross_venue_scans_both_directions() {
        let profile = test_profile(&[500], true, false);
        let mock = MockQuotes::new(1_000_000)
            .single(weth(), usdc(), 500, 2000, 1)
            .single(usdc(), weth(), 500, 104, 100 * 2000)
            .path(vec![usdc(), weth()], 103, 100 * 2000)
            .path(vec![weth(), usdc()], 2000, 1);

        let scanner = scanner().with_trade_sizes(vec![U256::from(10_000_000_000_000_000u128)]);
        let enabled =
            EnabledStrategies { intra_venue: false, cross_venue: true, triangular: false };
        let opps = scanner.scan(&profile, ETH_PRICE, enabled, &mock).await;

        assert_eq!(opps.len(), 2);
        let dirs: Vec<_> = opps
            .iter()
            .map(|o| match o.route {
                Route::CrossVenue { direction, .. } => direction,
                _ => panic!("expected cross-venue route"),
            })
            .collect();
        assert!(dirs.contains(&CrossDirection::UniswapFirst));
        assert!(dirs.contains(&CrossDirection::SushiFirst));
    }

    #[tokio::test]
    async fn cross_venue_skipped_without_second_router() {
        let profile = test_profile(&[500], false, false);
        let mock = MockQuotes::new(1_000_000_000);
        let enabled =
            EnabledStrategies { intra_venue: false, cross_venue: true, triangular: false };
        let opps = scanner().scan(&profile, ETH_PRICE, enabled, &mock).await;
        assert!(opps.is_empty());
    }

    #[tokio::test]
    async fn triangular_uses_one_and_a_half_gas_baseline() {
        let profile = test_profile(&[500, 3000], false, true);
        let gas_price = 2_000_000u128; // 0.002 gwei
        let mock = MockQuotes::new(gas_price)
            .single(weth(), usdc(), 500, 2000, 1)
            .single(usdc(), usdc_alt(), 100, 1, 1)
            .single(usdc_alt(), weth(), 500, 105, 100 * 2000);

        let scanner = scanner().with_trade_sizes(vec![U256::from(10_000_000_000_000_000u128)]);
        let enabled =
            EnabledStrategies { intra_venue: false, cross_venue: false, triangular: true };
        let opps = scanner.scan(&profile, ETH_PRICE, enabled, &mock).await;

        assert_eq!(opps.len(), 1);
        let expected_gas =
            (gas_price * TRIANGULAR_GAS_UNITS) as f64 / 1e18 * ETH_PRICE;
        assert!((opps[0].gas_cost_usd - expected_gas).abs() < 1e-12);
        assert_eq!(TRIANGULAR_GAS_UNITS, 750_000);
    }

    #[tokio::test]
    async fn disabled_strategies_are_not_scanned() {
        let tiers: &[u32] = &[100, 500, 3000, 10000];
        let profile = test_profile(tiers, false, false);
        let mock = profitable_intra_mock(tiers);

        let enabled =
            EnabledStrategies { intra_venue: false, cross_venue: true, triangular: true };
        let opps = scanner().scan(&profile, ETH_PRICE, enabled, &mock).await;
        assert!(opps.is_empty());
    }

    #[tokio::test]
    async fn failed_quotes_skip_the_route_only() {
        let tiers: &[u32] = &[100, 500, 3000];
        let profile = test_profile(tiers, false, false);
        // Only the 500-in legs are quotable; 100/3000 entry legs revert.
        let mock = MockQuotes::new(1_000_000)
            .single(weth(), usdc(), 500, 2000, 1)
            .single(usdc(), weth(), 100, 105, 100 * 2000)
            .single(usdc(), weth(), 3000, 105, 100 * 2000);

        let scanner = scanner().with_trade_sizes(vec![U256::from(10_000_000_000_000_000u128)]);
        let opps = scanner.scan(&profile, ETH_PRICE, intra_only(), &mock).await;

        // (500,100) and (500,3000) survive; everything else reverts away
        assert_eq!(opps.len(), 2);
    }

    #[tokio::test]
    async fn gas_price_failure_yields_empty_scan() {
        struct NoGas;
        #[async_trait]
        impl QuoteSource for NoGas {
            async fn gas_price(&self) -> Result<u128> {
                Err(anyhow!("rpc down"))
            }
            async fn quote_exact_input_single(
                &self,
                _: Address,
                _: Address,
                _: u32,
                _: U256,
            ) -> Result<U256> {
                unreachable!("no quotes without a gas baseline")
            }
            async fn quote_path(&self, _: U256, _: &[Address]) -> Result<Vec<U256>> {
                unreachable!()
            }
        }

        let profile = test_profile(&[500, 3000], false, false);
        let opps = scanner().scan(&profile, ETH_PRICE, intra_only(), &NoGas).await;
        assert!(opps.is_empty());
    }
}
