//! Execution Coordinator
//!
//! Drives a detected opportunity through the on-chain pipeline:
//!
//!   1. acquire the global in-flight slot (at most one execution at a time)
//!   2. top up the wrapped balance if the trade size exceeds it
//!   3. fund the executor contract with the trade amount
//!   4. invoke the strategy entry point matching the route
//!   5. read back the executor's cumulative counters
//!   6. sweep principal and profit back to the signer
//!
//! Any failure after the executor has been funded triggers a compensating
//! `withdrawToken` so capital is never stranded in the contract. A failed
//! recovery is recorded alongside the primary error, never in place of it.
//!
//! Author: AI-Generated
//! Created: 2026-02-12

use crate::arbitrage::gateway::ExecutorGateway;
use crate::types::{ExecutionResult, ExecutorCounters, Opportunity};
use alloy::primitives::B256;
use anyhow::Error;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Pipeline stage, used for error attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecStep {
    Wrap,
    Fund,
    Invoke,
    ReadStats,
    Sweep,
}

impl ExecStep {
    /// Once funding has landed, capital sits in the executor contract
    /// and a failure must be compensated.
    fn funds_at_risk(self) -> bool {
        matches!(self, ExecStep::Invoke | ExecStep::ReadStats | ExecStep::Sweep)
    }
}

impl fmt::Display for ExecStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ExecStep::Wrap => "wrap",
            ExecStep::Fund => "fund_executor",
            ExecStep::Invoke => "invoke_strategy",
            ExecStep::ReadStats => "read_stats",
            ExecStep::Sweep => "sweep",
        };
        f.write_str(s)
    }
}

struct StepFailure {
    step: ExecStep,
    error: Error,
}

/// What the pipeline accumulated before finishing or failing.
#[derive(Default)]
struct PipelineProgress {
    gas_wei: u128,
    invoke_hash: Option<B256>,
    counters: Option<ExecutorCounters>,
}

/// RAII handle on the global execution slot; released on drop even if
/// the pipeline errors out.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Sequences one on-chain execution end to end.
pub struct ExecutionCoordinator {
    executing: Arc<AtomicBool>,
    min_profit_usd: f64,
    min_profit_bps: i64,
}

impl ExecutionCoordinator {
    pub fn new(executing: Arc<AtomicBool>, min_profit_usd: f64, min_profit_bps: i64) -> Self {
        Self { executing, min_profit_usd, min_profit_bps }
    }

    /// Attempt to execute an opportunity. Returns `None` (without side
    /// effects) when another execution is in flight, the chain has no
    /// executor contract, or the opportunity no longer clears the
    /// thresholds. Otherwise returns the outcome, success or failure.
    pub async fn execute(
        &self,
        opp: &Opportunity,
        gateway: &dyn ExecutorGateway,
    ) -> Option<ExecutionResult> {
        if gateway.executor_address().is_none() {
            debug!("{}: no executor deployed, skipping {}", opp.chain, opp.label);
            return None;
        }
        if opp.net_profit_usd < self.min_profit_usd || opp.spread_bps < self.min_profit_bps {
            debug!(
                "{}: {} fell below thresholds (${:.4}, {} bps)",
                opp.chain, opp.label, opp.net_profit_usd, opp.spread_bps
            );
            return None;
        }
        let _guard = match InFlightGuard::acquire(&self.executing) {
            Some(g) => g,
            None => {
                debug!("{}: execution already in flight, skipping {}", opp.chain, opp.label);
                return None;
            }
        };

        info!(
            "🚀 {} executing {} | size {} ETH | expected net ${:.4}",
            opp.chain, opp.label, opp.amount_in, opp.net_profit_usd
        );
        let started = Instant::now();
        let mut progress = PipelineProgress::default();
        let outcome = self.run_pipeline(opp, gateway, &mut progress).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let gas_cost_usd = wei_usd(progress.gas_wei, opp.eth_price_usd);
        let result = match outcome {
            Ok(()) => {
                let actual_net = opp.gross_profit_usd - gas_cost_usd;
                info!(
                    "✅ {} {} confirmed in {}ms | gas ${:.4} | net ${:.4}",
                    opp.chain, opp.label, duration_ms, gas_cost_usd, actual_net
                );
                ExecutionResult {
                    success: true,
                    tx_hash: progress.invoke_hash.map(|h| format!("{h:#x}")),
                    gas_cost_usd,
                    actual_net_profit_usd: actual_net,
                    duration_ms,
                    counters: progress.counters,
                    error: None,
                    recovery_error: None,
                }
            }
            Err(failure) => {
                error!(
                    "❌ {} {} failed at {}: {:#}",
                    opp.chain, opp.label, failure.step, failure.error
                );
                let recovery_error = if failure.step.funds_at_risk() {
                    self.compensate(opp, gateway, &mut progress).await
                } else {
                    None
                };
                ExecutionResult {
                    success: false,
                    tx_hash: progress.invoke_hash.map(|h| format!("{h:#x}")),
                    gas_cost_usd: wei_usd(progress.gas_wei, opp.eth_price_usd),
                    actual_net_profit_usd: -wei_usd(progress.gas_wei, opp.eth_price_usd),
                    duration_ms: started.elapsed().as_millis() as u64,
                    counters: progress.counters,
                    error: Some(format!("{}: {:#}", failure.step, failure.error)),
                    recovery_error,
                }
            }
        };

        Some(result)
    }

    async fn run_pipeline(
        &self,
        opp: &Opportunity,
        gateway: &dyn ExecutorGateway,
        progress: &mut PipelineProgress,
    ) -> Result<(), StepFailure> {
        let fail = |step: ExecStep| move |error: Error| StepFailure { step, error };

        // Top up wrapped balance only for the shortfall
        let balance = gateway.wrapped_balance().await.map_err(fail(ExecStep::Wrap))?;
        if balance < opp.amount_in_raw {
            let shortfall = opp.amount_in_raw - balance;
            debug!("{}: wrapping {} wei of native", opp.chain, shortfall);
            let outcome = gateway.wrap_native(shortfall).await.map_err(fail(ExecStep::Wrap))?;
            progress.gas_wei += outcome.gas_wei();
        }

        let outcome = gateway
            .fund_executor(opp.amount_in_raw)
            .await
            .map_err(fail(ExecStep::Fund))?;
        progress.gas_wei += outcome.gas_wei();

        let outcome = gateway
            .invoke_strategy(opp.route, &opp.tokens, opp.amount_in_raw)
            .await
            .map_err(fail(ExecStep::Invoke))?;
        progress.gas_wei += outcome.gas_wei();
        progress.invoke_hash = Some(outcome.tx_hash);

        progress.counters =
            Some(gateway.executor_stats().await.map_err(fail(ExecStep::ReadStats))?);

        let outcome = gateway
            .withdraw_token(opp.tokens[0])
            .await
            .map_err(fail(ExecStep::Sweep))?;
        progress.gas_wei += outcome.gas_wei();

        Ok(())
    }

    /// Pull the wrapped principal back out of the executor after a
    /// mid-pipeline failure. The compensation's own error is reported
    /// separately so it never hides the primary failure.
    async fn compensate(
        &self,
        opp: &Opportunity,
        gateway: &dyn ExecutorGateway,
        progress: &mut PipelineProgress,
    ) -> Option<String> {
        warn!("{}: attempting compensating withdrawal", opp.chain);
        match gateway.withdraw_token(opp.tokens[0]).await {
            Ok(outcome) => {
                progress.gas_wei += outcome.gas_wei();
                info!("♻️  {}: capital recovered ({:#x})", opp.chain, outcome.tx_hash);
                None
            }
            Err(e) => {
                error!("🆘 {}: compensating withdrawal failed: {:#}", opp.chain, e);
                Some(format!("{e:#}"))
            }
        }
    }
}

fn wei_usd(wei: u128, eth_price_usd: f64) -> f64 {
    wei as f64 / 1e18 * eth_price_usd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arbitrage::gateway::TxOutcome;
    use crate::types::Route;
    use alloy::primitives::{Address, U256};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::time::{sleep, Duration};

    fn opportunity(net_usd: f64, bps: i64) -> Opportunity {
        Opportunity {
            chain: "testchain",
            route: Route::IntraVenue { fee_in: 500, fee_out: 3000 },
            label: "WETH→USDC(500)→WETH(3000)".into(),
            amount_in: 0.01,
            amount_in_raw: U256::from(10_000_000_000_000_000u128),
            tokens: vec![Address::repeat_byte(0x11), Address::repeat_byte(0x22)],
            spread_bps: bps,
            gross_profit_usd: net_usd + 0.07,
            gas_cost_usd: 0.07,
            net_profit_usd: net_usd,
            eth_price_usd: 3500.0,
            created_at: Utc::now(),
        }
    }

    fn tx(gas_used: u64) -> TxOutcome {
        TxOutcome {
            tx_hash: alloy::primitives::B256::repeat_byte(0xab),
            gas_used,
            effective_gas_price: 1_000_000_000,
        }
    }

    #[derive(Default)]
    struct ScriptedGateway {
        no_executor: bool,
        balance_wei: u128,
        fail_fund: bool,
        fail_invoke: bool,
        fail_stats: bool,
        fail_sweep: bool,
        fail_withdraw_recovery: bool,
        invoke_delay_ms: u64,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedGateway {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: &'static str) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ExecutorGateway for ScriptedGateway {
        fn executor_address(&self) -> Option<Address> {
            (!self.no_executor).then(|| Address::repeat_byte(0xee))
        }

        async fn wrapped_balance(&self) -> Result<U256> {
            self.record("balance");
            Ok(U256::from(self.balance_wei))
        }

        async fn wrap_native(&self, _amount: U256) -> Result<TxOutcome> {
            self.record("wrap");
            Ok(tx(50_000))
        }

        async fn fund_executor(&self, _amount: U256) -> Result<TxOutcome> {
            self.record("fund");
            if self.fail_fund {
                return Err(anyhow!("transfer reverted"));
            }
            Ok(tx(60_000))
        }

        async fn invoke_strategy(
            &self,
            _route: Route,
            _tokens: &[Address],
            _amount: U256,
        ) -> Result<TxOutcome> {
            self.record("invoke");
            if self.invoke_delay_ms > 0 {
                sleep(Duration::from_millis(self.invoke_delay_ms)).await;
            }
            if self.fail_invoke {
                return Err(anyhow!("strategy invocation reverted"));
            }
            Ok(tx(400_000))
        }

        async fn executor_stats(&self) -> Result<ExecutorCounters> {
            self.record("stats");
            if self.fail_stats {
                return Err(anyhow!("rpc timeout"));
            }
            Ok(ExecutorCounters { total_trades: 7, successful_trades: 6, total_profit_raw: 42 })
        }

        async fn withdraw_token(&self, _token: Address) -> Result<TxOutcome> {
            let recovery_call = {
                let calls = self.calls.lock().unwrap();
                calls.iter().any(|&c| c == "withdraw")
                    || self.fail_invoke
                    || self.fail_stats
            };
            self.record("withdraw");
            if recovery_call {
                if self.fail_withdraw_recovery {
                    return Err(anyhow!("withdrawToken reverted"));
                }
                return Ok(tx(30_000));
            }
            if self.fail_sweep {
                return Err(anyhow!("sweep reverted"));
            }
            Ok(tx(30_000))
        }
    }

    fn coordinator(flag: &Arc<AtomicBool>) -> ExecutionCoordinator {
        ExecutionCoordinator::new(flag.clone(), 0.10, 5)
    }

    #[tokio::test]
    async fn happy_path_runs_every_step_in_order() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway::default();
        let result = coordinator(&flag)
            .execute(&opportunity(0.28, 1000), &gateway)
            .await
            .expect("should execute");

        assert!(result.success);
        assert!(result.tx_hash.is_some());
        assert!(result.error.is_none());
        assert!(result.recovery_error.is_none());
        assert_eq!(result.counters.unwrap().total_trades, 7);
        assert_eq!(
            gateway.calls(),
            vec!["balance", "wrap", "fund", "invoke", "stats", "withdraw"]
        );
        // wrap(50k) + fund(60k) + invoke(400k) + sweep(30k) at 1 gwei
        let expected_gas = 540_000u128 as f64 * 1e9 / 1e18 * 3500.0;
        assert!((result.gas_cost_usd - expected_gas).abs() < 1e-9);
        assert!(!flag.load(Ordering::SeqCst), "slot must be released");
    }

    #[tokio::test]
    async fn wrap_is_skipped_when_balance_covers_the_trade() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway {
            balance_wei: 10_000_000_000_000_000, // exactly the trade size
            ..ScriptedGateway::default()
        };
        let result = coordinator(&flag)
            .execute(&opportunity(0.28, 1000), &gateway)
            .await
            .expect("should execute");

        assert!(result.success);
        assert_eq!(gateway.calls(), vec!["balance", "fund", "invoke", "stats", "withdraw"]);
    }

    #[tokio::test]
    async fn returns_none_without_an_executor_contract() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway { no_executor: true, ..ScriptedGateway::default() };
        let result = coordinator(&flag).execute(&opportunity(0.28, 1000), &gateway).await;

        assert!(result.is_none());
        assert!(gateway.calls().is_empty(), "no chain calls without an executor");
    }

    #[tokio::test]
    async fn returns_none_below_either_threshold() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway::default();
        let coord = coordinator(&flag);

        assert!(coord.execute(&opportunity(0.05, 1000), &gateway).await.is_none());
        assert!(coord.execute(&opportunity(0.28, 3), &gateway).await.is_none());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_attempts_execute_exactly_once() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway =
            Arc::new(ScriptedGateway { invoke_delay_ms: 50, ..ScriptedGateway::default() });
        let coord = Arc::new(coordinator(&flag));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coord = coord.clone();
            let gateway = gateway.clone();
            handles.push(tokio::spawn(async move {
                coord.execute(&opportunity(0.28, 1000), gateway.as_ref()).await
            }));
        }

        let mut executed = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                executed += 1;
            }
        }
        assert_eq!(executed, 1, "exactly one attempt may hold the slot");
        assert_eq!(gateway.calls().iter().filter(|&&c| c == "invoke").count(), 1);
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn invoke_failure_triggers_compensating_withdrawal() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway { fail_invoke: true, ..ScriptedGateway::default() };
        let result = coordinator(&flag)
            .execute(&opportunity(0.28, 1000), &gateway)
            .await
            .expect("failure still yields a result");

        assert!(!result.success);
        let error = result.error.expect("primary error recorded");
        assert!(error.contains("invoke_strategy"), "got: {error}");
        assert!(result.recovery_error.is_none(), "recovery succeeded");
        assert_eq!(
            gateway.calls(),
            vec!["balance", "wrap", "fund", "invoke", "withdraw"]
        );
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_recovery_never_masks_the_primary_error() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway {
            fail_invoke: true,
            fail_withdraw_recovery: true,
            ..ScriptedGateway::default()
        };
        let result = coordinator(&flag)
            .execute(&opportunity(0.28, 1000), &gateway)
            .await
            .expect("failure still yields a result");

        assert!(!result.success);
        assert!(result.error.unwrap().contains("invoke_strategy"));
        assert!(result.recovery_error.unwrap().contains("withdrawToken"));
    }

    #[tokio::test]
    async fn fund_failure_does_not_compensate() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway { fail_fund: true, ..ScriptedGateway::default() };
        let result = coordinator(&flag)
            .execute(&opportunity(0.28, 1000), &gateway)
            .await
            .expect("failure still yields a result");

        assert!(!result.success);
        assert!(result.error.unwrap().contains("fund_executor"));
        assert!(result.recovery_error.is_none());
        assert!(!gateway.calls().contains(&"withdraw"), "no capital at risk yet");
    }

    #[tokio::test]
    async fn stats_failure_compensates_and_keeps_invoke_hash() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = ScriptedGateway { fail_stats: true, ..ScriptedGateway::default() };
        let result = coordinator(&flag)
            .execute(&opportunity(0.28, 1000), &gateway)
            .await
            .expect("failure still yields a result");

        assert!(!result.success);
        assert!(result.tx_hash.is_some(), "invoke landed before the failure");
        assert!(result.error.unwrap().contains("read_stats"));
        assert_eq!(gateway.calls().iter().filter(|&&c| c == "withdraw").count(), 1);
    }

    #[tokio::test]
    async fn in_flight_execution_drains_with_its_compensation() {
        let flag = Arc::new(AtomicBool::new(false));
        let gateway = Arc::new(ScriptedGateway {
            fail_invoke: true,
            invoke_delay_ms: 50,
            ..ScriptedGateway::default()
        });
        let coord = Arc::new(coordinator(&flag));

        let handle = tokio::spawn({
            let coord = coord.clone();
            let gateway = gateway.clone();
            async move { coord.execute(&opportunity(0.28, 1000), gateway.as_ref()).await }
        });

        // Let the pipeline get past funding, into the slow invoke
        sleep(Duration::from_millis(10)).await;
        assert!(flag.load(Ordering::SeqCst), "pipeline is mid-flight");
        assert!(gateway.calls().contains(&"fund"), "capital has landed in the executor");

        // Waiting on the task (never aborting it) lets the pipeline
        // finish and recover the funded capital
        let result = handle.await.unwrap().expect("execution ran to completion");
        assert!(!result.success);
        assert_eq!(gateway.calls().iter().filter(|&&c| c == "withdraw").count(), 1);
        assert!(!flag.load(Ordering::SeqCst), "slot released only after the drain");
    }

    #[tokio::test]
    async fn slot_is_reusable_after_a_failure() {
        let flag = Arc::new(AtomicBool::new(false));
        let coord = coordinator(&flag);

        let failing = ScriptedGateway { fail_invoke: true, ..ScriptedGateway::default() };
        assert!(coord.execute(&opportunity(0.28, 1000), &failing).await.is_some());

        let healthy = ScriptedGateway::default();
        let second = coord.execute(&opportunity(0.28, 1000), &healthy).await;
        assert!(second.expect("slot released after failure").success);
    }
}
