//! Chain Profiles and Connections
//!
//! Static per-chain configuration (tokens, venues, fee tiers) plus the
//! `ChainContext` value that bundles a connected provider with its profile.
//! Contexts are passed explicitly into the scanner and the coordinator so
//! each chain can be unit-tested without process-wide setup.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::config::BotConfig;
use crate::types::ChainRuntimeState;
use alloy::network::EthereumWallet;
use alloy::primitives::{address, utils::format_ether, Address};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::Lazy;
use tracing::{info, warn};

/// Static configuration for one supported chain. Immutable for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    /// Short key used in logs, env vars, and round-robin bookkeeping
    pub key: &'static str,
    pub name: &'static str,
    pub chain_id: u64,
    /// Default RPC endpoint; overridable via `RPC_<KEY>` env var
    pub default_rpc: &'static str,
    pub explorer: &'static str,
    /// Wrapped native asset (the base asset of every route)
    pub weth: Address,
    /// Primary stable asset
    pub usdc: Address,
    /// Secondary stable; enables the TRIANGULAR strategy when present
    pub usdc_alt: Option<Address>,
    pub uni_v3_quoter: Address,
    pub uni_v3_router: Address,
    /// V2-style path router; enables the CROSS_VENUE strategy when present
    pub sushi_router: Option<Address>,
    /// Fee tiers with meaningful liquidity on this chain
    pub fee_tiers: &'static [u32],
}

impl ChainProfile {
    /// RPC URL after applying the `RPC_<KEY>` env override.
    pub fn rpc_url(&self) -> String {
        let var = format!("RPC_{}", self.key.to_uppercase());
        std::env::var(&var).unwrap_or_else(|_| self.default_rpc.to_string())
    }

    /// Deployed executor address, from `EXECUTOR_<KEY>` env var if set.
    pub fn executor_address(&self) -> Option<Address> {
        let var = format!("EXECUTOR_{}", self.key.to_uppercase());
        std::env::var(&var).ok().and_then(|s| s.parse().ok())
    }
}

/// All chains the engine knows how to trade on.
pub static CHAIN_PROFILES: Lazy<Vec<ChainProfile>> = Lazy::new(|| {
    vec![
        ChainProfile {
            key: "base",
            name: "Base",
            chain_id: 8453,
            default_rpc: "https://mainnet.base.org",
            explorer: "https://basescan.org",
            weth: address!("4200000000000000000000000000000000000006"),
            usdc: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            usdc_alt: None,
            uni_v3_quoter: address!("3d4e44Eb1374240CE5F1B871ab261CD16335B76a"),
            uni_v3_router: address!("2626664c2603336E57B271c5C0b26F421741e481"),
            sushi_router: None,
            fee_tiers: &[100, 500, 3000],
        },
        ChainProfile {
            key: "arbitrum",
            name: "Arbitrum",
            chain_id: 42161,
            default_rpc: "https://arb1.arbitrum.io/rpc",
            explorer: "https://arbiscan.io",
            weth: address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1"),
            usdc: address!("af88d065e77c8cC2239327C5EDb3A432268e5831"),
            // Bridged USDC.e — second stable for the triangular cycle
            usdc_alt: Some(address!("FF970A61A04b1cA14834A43f5dE4533eBDDB5CC8")),
            uni_v3_quoter: address!("61fFE014bA17989E743c5F6cB21bF9697530B21e"),
            uni_v3_router: address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
            sushi_router: Some(address!("1b02dA8Cb0d097eB8D57A175b88c7D8b47997506")),
            fee_tiers: &[100, 500, 3000, 10000],
        },
        ChainProfile {
            key: "optimism",
            name: "Optimism",
            chain_id: 10,
            default_rpc: "https://mainnet.optimism.io",
            explorer: "https://optimistic.etherscan.io",
            weth: address!("4200000000000000000000000000000000000006"),
            usdc: address!("0b2C639c533813f4Aa9D7837CAf62653d097Ff85"),
            usdc_alt: None,
            uni_v3_quoter: address!("61fFE014bA17989E743c5F6cB21bF9697530B21e"),
            uni_v3_router: address!("68b3465833fb72A70ecDF485E0e4C7bD8665Fc45"),
            sushi_router: None,
            fee_tiers: &[100, 500, 3000],
        },
    ]
});

/// Look up a profile by key.
pub fn profile(key: &str) -> Option<&'static ChainProfile> {
    CHAIN_PROFILES.iter().find(|p| p.key == key)
}

/// A connected chain: profile + signing provider + resolved addresses.
#[derive(Clone)]
pub struct ChainContext {
    pub profile: &'static ChainProfile,
    pub provider: DynProvider,
    pub signer_address: Address,
    pub executor: Option<Address>,
}

impl ChainContext {
    pub async fn native_balance(&self) -> Result<alloy::primitives::U256> {
        self.provider
            .get_balance(self.signer_address)
            .await
            .context("balance query failed")
    }
}

/// Connect to every configured chain. Chains that are unreachable at
/// startup are excluded from the rotation for the process lifetime;
/// their runtime state still appears (disconnected) in the snapshot.
///
/// Returns the connected contexts plus the initial runtime state for
/// every configured chain, connected or not.
pub async fn connect_chains(
    config: &BotConfig,
) -> Result<(Vec<ChainContext>, Vec<ChainRuntimeState>)> {
    let signer: PrivateKeySigner = config
        .private_key
        .parse()
        .context("PRIVATE_KEY is not a valid private key")?;
    let signer_address = signer.address();
    let wallet = EthereumWallet::from(signer);

    let mut contexts = Vec::new();
    let mut runtimes = Vec::new();

    for prof in CHAIN_PROFILES.iter() {
        if !config.chains.is_empty() && !config.chains.iter().any(|c| c == prof.key) {
            continue;
        }

        let rpc_url = prof.rpc_url();
        let provider = match rpc_url.parse() {
            Ok(url) => ProviderBuilder::new().wallet(wallet.clone()).connect_http(url),
            Err(e) => {
                warn!("{}: invalid RPC URL '{}': {} — excluded", prof.name, rpc_url, e);
                runtimes.push(ChainRuntimeState::disconnected(prof.key, prof.name, prof.chain_id));
                continue;
            }
        };
        let provider = provider.erased();

        // Probe connectivity once; unreachable chains never rejoin the rotation.
        match provider.get_block_number().await {
            Ok(block) => {
                let executor = prof.executor_address();
                let balance = provider
                    .get_balance(signer_address)
                    .await
                    .map(|b| format_ether(b).parse::<f64>().unwrap_or(0.0))
                    .unwrap_or(0.0);

                info!(
                    "{}: connected at block {} | balance {:.6} | executor: {}",
                    prof.name,
                    block,
                    balance,
                    executor.map(|a| format!("{a:?}")).unwrap_or_else(|| "none".into())
                );

                runtimes.push(ChainRuntimeState {
                    chain: prof.key,
                    name: prof.name,
                    chain_id: prof.chain_id,
                    balance,
                    balance_usd: 0.0,
                    eth_price_usd: 0.0,
                    connected: true,
                    has_executor: executor.is_some(),
                    last_refresh: Utc::now(),
                });
                contexts.push(ChainContext {
                    profile: prof,
                    provider,
                    signer_address,
                    executor,
                });
            }
            Err(e) => {
                warn!("{}: unreachable at startup ({}) — excluded from rotation", prof.name, e);
                runtimes.push(ChainRuntimeState::disconnected(prof.key, prof.name, prof.chain_id));
            }
        }
    }

    Ok((contexts, runtimes))
}
