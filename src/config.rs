//! Configuration management
//! Load settings from .env file / process environment
//!
//! Missing credentials are fatal — the process refuses to start without
//! a signing key, even in dry-run mode.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use anyhow::{Context, Result};

/// Engine configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub private_key: String,

    /// Minimum net profit in USD for an opportunity to be emitted/executed
    pub min_profit_usd: f64,
    /// Minimum spread in basis points for an opportunity to be emitted
    pub min_profit_bps: i64,

    /// Scheduler tick interval
    pub poll_interval_ms: u64,
    /// When false, opportunities are detected and logged but never executed
    pub live_mode: bool,

    /// Chain keys to run on; empty = all configured chains
    pub chains: Vec<String>,
}

pub fn load_config() -> Result<BotConfig> {
    dotenv::dotenv().ok();

    let private_key = std::env::var("PRIVATE_KEY")
        .context("PRIVATE_KEY not set — refusing to start")?;

    let min_profit_usd = env_parse("MIN_PROFIT_USD", 0.50)?;
    let min_profit_bps = env_parse("MIN_PROFIT_BPS", 10)?;
    let poll_interval_ms = env_parse("POLL_INTERVAL_MS", 3000)?;
    let live_mode = env_parse("LIVE_MODE", false)?;

    let chains = std::env::var("CHAINS")
        .map(|s| {
            s.split(',')
                .map(|c| c.trim().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Ok(BotConfig {
        private_key,
        min_profit_usd,
        min_profit_bps,
        poll_interval_ms,
        live_mode,
        chains,
    })
}

/// Parse an env var with a default, failing loudly on malformed values.
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", name, raw)),
        Err(_) => Ok(default),
    }
}
