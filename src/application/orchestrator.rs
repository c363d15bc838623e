//! Scenario orchestrator — drives up to five independent strategy variants
//! against the same signal feed, each with its own broker, cycle, and
//! philosophy state.
//!
//! One independent driving loop per scenario, composed the way one
//! coordinator struct holds `Arc`s to the pieces it drives rather than
//! owning their state directly.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::application::allocator::{Candidate, CycleAllocator};
use crate::application::cycle_manager::{CompletionReason, CycleManager};
use crate::application::order_manager::OrderManager;
use crate::application::philosophy_engine::PhilosophyEngine;
use crate::application::risk_manager::RiskManager;
use crate::domain::cycle::{Cycle, CyclePhase};
use crate::domain::ids::new_event_id;
use crate::domain::order::OrderSide;
use crate::domain::philosophy::{PhilosophySettings, PhilosophyState};
use crate::domain::ports::{Broker, MarketDataProvider};
use crate::domain::position::{ExitReason, Position, PositionStatus};
use crate::domain::repositories::{
    AuditRepository, CycleRepository, OrderRepository, PhilosophyStateRepository,
    PositionRepository, ScenarioRepository, SignalRepository,
};
use crate::domain::scenario::{Scenario, ScenarioType};
use crate::domain::signal::Signal;
use crate::infrastructure::observability::Metrics;

/// Everything one scenario needs to run its own allocate/mark-to-market
/// pass, independent of every other scenario's state: disjoint brokers,
/// positions, and philosophy settings per scenario.
pub struct ScenarioRuntime {
    pub scenario_id: String,
    pub scenario_type: ScenarioType,
    pub broker: Arc<dyn Broker>,
    pub market_data: Arc<dyn MarketDataProvider>,
    pub positions: Arc<dyn PositionRepository>,
    pub cycles: Arc<dyn CycleRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub philosophy_states: Arc<dyn PhilosophyStateRepository>,
    pub order_manager: Arc<OrderManager>,
    pub cycle_manager: CycleManager,
    pub philosophy: PhilosophySettings,
}

/// Outcome of one `execute_all` tick for a single scenario, returned for
/// logging/testing rather than persisted directly.
#[derive(Debug, Clone, Default)]
pub struct ScenarioTickResult {
    pub scenario_id: String,
    pub cycle_id: String,
    pub phase: Option<String>,
    pub opened_positions: usize,
    pub closed_positions: usize,
    pub portfolio_value: Decimal,
}

pub struct Orchestrator {
    scenarios: Vec<ScenarioRuntime>,
    scenario_repo: Arc<dyn ScenarioRepository>,
    signals: Arc<dyn SignalRepository>,
    audit: Arc<dyn AuditRepository>,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    pub fn new(
        scenarios: Vec<ScenarioRuntime>,
        scenario_repo: Arc<dyn ScenarioRepository>,
        signals: Arc<dyn SignalRepository>,
        audit: Arc<dyn AuditRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            scenarios,
            scenario_repo,
            signals,
            audit,
            metrics,
        }
    }

    /// Ensure every configured scenario has a persisted `Scenario` row and an
    /// ACTIVE cycle, creating both on first run.
    pub async fn ensure_initialized(&self, starting_cash: Decimal, now: DateTime<Utc>) -> anyhow::Result<()> {
        for runtime in &self.scenarios {
            if self.scenario_repo.find_by_id(&runtime.scenario_id).await?.is_none() {
                let scenario = Scenario::new(runtime.scenario_id.clone(), runtime.scenario_type, starting_cash);
                self.scenario_repo.insert(&scenario).await?;
                info!(scenario_id = %runtime.scenario_id, "initialized scenario");
            }
            runtime
                .cycle_manager
                .get_or_create_active(&runtime.scenario_id, starting_cash, 90, 1.0, now)
                .await?;
        }
        Ok(())
    }

    /// One full allocation-and-execution tick across every scenario, each
    /// run independently. Failure in one scenario is logged and does not
    /// block the others — there is no cross-scenario rollback.
    pub async fn execute_all(&self, now: DateTime<Utc>) -> Vec<ScenarioTickResult> {
        let mut results = Vec::with_capacity(self.scenarios.len());
        let active_signals = match self.signals.find_active().await {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "failed to load active signals for this tick");
                return results;
            }
        };
        for runtime in &self.scenarios {
            match self.execute_one(runtime, &active_signals, now).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    warn!(scenario_id = %runtime.scenario_id, error = %e, "scenario tick failed");
                }
            }
        }
        results
    }

    async fn execute_one(
        &self,
        runtime: &ScenarioRuntime,
        active_signals: &[Signal],
        now: DateTime<Utc>,
    ) -> anyhow::Result<ScenarioTickResult> {
        let mut cycle = runtime
            .cycles
            .find_active_for_scenario(&runtime.scenario_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("no active cycle for scenario {}", runtime.scenario_id))?;

        let phase = cycle.phase(now);
        let risk_gate = RiskManager::gate(&cycle);
        let open_positions = runtime
            .positions
            .find_by_status(&cycle.cycle_id, PositionStatus::Open)
            .await?;

        let mut opened = 0usize;
        let mut closed = 0usize;

        if risk_gate.forces_settlement() {
            let mut positions = open_positions.clone();
            let liquidation = runtime
                .order_manager
                .liquidate(&mut positions, Decimal::ONE, ExitReason::NuclearLiquidation, now)
                .await;
            for position in &positions {
                runtime.positions.update(position).await?;
            }
            closed += liquidation.closed.len();
            warn!(
                scenario_id = %runtime.scenario_id,
                cycle_id = %cycle.cycle_id,
                liquidated = liquidation.closed.len(),
                "NUCLEAR gate forced emergency liquidation"
            );
        } else if phase.allows_new_entries() {
            let candidates = self
                .build_candidates(runtime, &cycle, active_signals, &open_positions)
                .await;
            let philosophy_state = runtime
                .philosophy_states
                .find_for_date(&runtime.scenario_id, now.date_naive())
                .await?
                .unwrap_or_else(|| PhilosophyState::new(runtime.scenario_id.clone(), now.date_naive()));

            let portfolio_value = runtime.broker.get_account_value().await?;
            let invested: Decimal = open_positions
                .iter()
                .map(|p| p.shares * p.entry_price)
                .sum();

            let allocations = CycleAllocator::allocate(
                &cycle,
                phase,
                risk_gate.blocks_new_allocations(),
                open_positions.len(),
                candidates,
                portfolio_value,
                invested,
                &runtime.philosophy,
                philosophy_state.current_allocation_power,
            );

            for allocation in allocations {
                match self.open_position(runtime, &cycle, phase, &allocation, now).await {
                    Ok(true) => opened += 1,
                    Ok(false) => {}
                    Err(e) => warn!(
                        scenario_id = %runtime.scenario_id,
                        symbol = %allocation.symbol,
                        error = %e,
                        "failed to open allocated position"
                    ),
                }
            }

            runtime.philosophy_states.upsert(&philosophy_state).await?;
        }

        let portfolio_value = runtime.broker.get_account_value().await?;
        let cash = runtime.broker.get_cash_balance().await?;
        let refreshed_positions = runtime.positions.find_by_status(&cycle.cycle_id, PositionStatus::Open).await?;
        let mut unrealized = Decimal::ZERO;
        for position in &refreshed_positions {
            let quote = runtime.market_data.get_quote(&position.symbol).await?;
            unrealized += position.unrealized_pnl(quote.mid);
        }
        cycle.mark_to_market(portfolio_value);
        runtime.cycles.update(&cycle).await?;

        if let Some(mut scenario) = self.scenario_repo.find_by_id(&runtime.scenario_id).await? {
            scenario.update_current_capital(cash, unrealized);
            self.scenario_repo.update(&scenario).await?;
        }

        self.metrics.set_portfolio_value_usd(&runtime.scenario_id, portfolio_value);
        self.metrics.set_positions_count(&runtime.scenario_id, refreshed_positions.len() as u64);
        self.metrics
            .set_drawdown(&runtime.scenario_id, cycle.performance.drawdown_from_high_water_mark());

        Ok(ScenarioTickResult {
            scenario_id: runtime.scenario_id.clone(),
            cycle_id: cycle.cycle_id.clone(),
            phase: Some(format!("{:?}", phase)),
            opened_positions: opened,
            closed_positions: closed,
            portfolio_value,
        })
    }

    /// Build this scenario's candidate list: active, cycle-unbound signals
    /// clearing its min-expected-return threshold, with no existing open
    /// position on the same symbol, annotated with a live quote and the
    /// count of other concurrently-active signals on the same
    /// (symbol, direction) for the Pabrai cluster check.
    async fn build_candidates(
        &self,
        runtime: &ScenarioRuntime,
        cycle: &Cycle,
        active_signals: &[Signal],
        open_positions: &[Position],
    ) -> Vec<Candidate> {
        let held_symbols: std::collections::HashSet<&str> =
            open_positions.iter().map(|p| p.symbol.as_str()).collect();

        let mut direction_counts: HashMap<(String, &str), u32> = HashMap::new();
        for signal in active_signals {
            let key = (signal.symbol.clone(), direction_key(signal.direction));
            *direction_counts.entry(key).or_insert(0) += 1;
        }

        let threshold = runtime.scenario_type.min_expected_return_threshold();
        let mut candidates = Vec::new();
        for signal in active_signals {
            if held_symbols.contains(signal.symbol.as_str()) {
                continue;
            }
            if signal.cycle_id.as_deref().is_some_and(|c| c != cycle.cycle_id) {
                continue;
            }
            let Some(total_score) = signal.total_score else { continue };
            if total_score < threshold {
                continue;
            }
            let quote = runtime.market_data.get_quote(&signal.symbol).await.ok();
            let key = (signal.symbol.clone(), direction_key(signal.direction));
            let concurrent = direction_counts.get(&key).copied().unwrap_or(1);
            candidates.push(Candidate {
                signal: signal.clone(),
                quote,
                concurrent_same_direction: concurrent,
            });
        }
        candidates
    }

    async fn open_position(
        &self,
        runtime: &ScenarioRuntime,
        cycle: &Cycle,
        phase: CyclePhase,
        allocation: &crate::application::allocator::Allocation,
        now: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let side = match allocation.direction {
            crate::domain::signal::Direction::Long => OrderSide::Buy,
            crate::domain::signal::Direction::Short => OrderSide::Sell,
        };
        let order = runtime
            .order_manager
            .submit_entry(&cycle.cycle_id, &allocation.symbol, side, allocation.shares, now)
            .await?;
        runtime.orders.insert(&order).await?;
        let Some(fill_price) = order.fill_price else {
            return Ok(false);
        };

        let quote = runtime.market_data.get_quote(&allocation.symbol).await?;
        let atr_stop = RiskManager::compute_atr_stop(phase, allocation.direction, fill_price, quote.atr);
        let position = Position::open(
            cycle.cycle_id.clone(),
            allocation.signal_id.clone(),
            allocation.symbol.clone(),
            allocation.direction,
            order.shares,
            fill_price,
            now,
            atr_stop,
            order.commission.unwrap_or_default(),
        );
        runtime.positions.insert(&position).await?;
        self.metrics.inc_orders(&runtime.scenario_id, &side.to_string(), "FILLED");

        let previous = self.audit.find_last_for_entity(&position.position_id).await?;
        let event = crate::domain::audit::AuditEvent::append(
            new_event_id(),
            now,
            "POSITION_OPENED".to_string(),
            position.position_id.clone(),
            serde_json::to_value(&position)?,
            previous.as_ref(),
        );
        self.audit.append(&event).await?;

        info!(
            scenario_id = %runtime.scenario_id,
            symbol = %allocation.symbol,
            pabrai_applied = allocation.pabrai_applied,
            "opened new position"
        );
        Ok(true)
    }

    /// Mark-to-market only, no new entries — the 5-minute scheduler tick.
    pub async fn update_unrealized_all(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        for runtime in &self.scenarios {
            let Some(mut cycle) = runtime.cycles.find_active_for_scenario(&runtime.scenario_id).await? else {
                continue;
            };
            let portfolio_value = runtime.broker.get_account_value().await?;
            cycle.mark_to_market(portfolio_value);
            runtime.cycles.update(&cycle).await?;
            self.metrics.set_portfolio_value_usd(&runtime.scenario_id, portfolio_value);

            if let Some(mut scenario) = self.scenario_repo.find_by_id(&runtime.scenario_id).await? {
                let cash = runtime.broker.get_cash_balance().await?;
                let positions = runtime
                    .positions
                    .find_by_status(&cycle.cycle_id, PositionStatus::Open)
                    .await?;
                let mut unrealized = Decimal::ZERO;
                for position in &positions {
                    let quote = runtime.market_data.get_quote(&position.symbol).await?;
                    unrealized += position.unrealized_pnl(quote.mid);
                }
                scenario.update_current_capital(cash, unrealized);
                self.scenario_repo.update(&scenario).await?;
            }
        }
        let _ = now;
        Ok(())
    }

    /// Settlement check + run, once per scenario, driven by the scheduler's
    /// daily trigger. Returns the completion reason when a settlement
    /// happened this tick.
    pub async fn settle_due_cycles(&self, now: DateTime<Utc>) -> Vec<(String, CompletionReason)> {
        let mut settled = Vec::new();
        for runtime in &self.scenarios {
            let Ok(Some(mut cycle)) = runtime.cycles.find_active_for_scenario(&runtime.scenario_id).await else {
                continue;
            };
            let reason = match runtime.cycle_manager.check_completion(&cycle, now).await {
                Ok(Some(reason)) => reason,
                _ => continue,
            };
            let is_emergency = reason == CompletionReason::Emergency;
            if runtime
                .cycle_manager
                .validate_for_settlement(&cycle, now, is_emergency)
                .await
                .is_err()
            {
                continue;
            }

            if let Ok(mut open) = runtime
                .positions
                .find_by_status(&cycle.cycle_id, PositionStatus::Open)
                .await
            {
                if !open.is_empty() {
                    let _ = runtime
                        .order_manager
                        .liquidate(&mut open, Decimal::ONE, ExitReason::ForceClose, now)
                        .await;
                    for position in &open {
                        let _ = runtime.positions.update(position).await;
                    }
                }
            }

            if runtime.cycle_manager.mark_completed(&mut cycle).await.is_ok()
                && runtime.cycle_manager.mark_settled(&mut cycle).await.is_ok()
            {
                settled.push((runtime.scenario_id.clone(), reason));
                info!(scenario_id = %runtime.scenario_id, cycle_id = %cycle.cycle_id, ?reason, "cycle settled");

                let closed = runtime
                    .positions
                    .find_by_status(&cycle.cycle_id, PositionStatus::Closed)
                    .await
                    .unwrap_or_default();
                let summary = runtime.cycle_manager.summarize_performance(&closed);
                if let Ok(Some(mut scenario)) = self.scenario_repo.find_by_id(&runtime.scenario_id).await {
                    for position in &closed {
                        scenario.record_closed_trade(position.realized_pnl.unwrap_or_default());
                    }
                    let _ = self.scenario_repo.update(&scenario).await;
                }
                let withdrawal = runtime.cycle_manager.profit_withdrawal(summary.realized_pnl);
                let next_capital = runtime.cycle_manager.next_cycle_capital(cycle.performance.starting_cash);
                info!(scenario_id = %runtime.scenario_id, %withdrawal, %next_capital, "capital reset for next cycle");
                let _ = runtime
                    .cycle_manager
                    .get_or_create_active(&runtime.scenario_id, next_capital, 90, 1.0, now)
                    .await;
            }
        }
        settled
    }

    /// Run the philosophy engine's O'Leary/Saylor checks over every open
    /// position for every scenario, once per review cycle.
    pub async fn apply_philosophy_checks(&self, now: DateTime<Utc>) -> anyhow::Result<()> {
        for runtime in &self.scenarios {
            let Some(cycle) = runtime.cycles.find_active_for_scenario(&runtime.scenario_id).await? else {
                continue;
            };
            let mut state = runtime
                .philosophy_states
                .find_for_date(&runtime.scenario_id, now.date_naive())
                .await?
                .unwrap_or_else(|| PhilosophyState::new(runtime.scenario_id.clone(), now.date_naive()));

            let open_positions = runtime
                .positions
                .find_by_status(&cycle.cycle_id, PositionStatus::Open)
                .await?;
            for mut position in open_positions {
                let quote = runtime.market_data.get_quote(&position.symbol).await?;
                if PhilosophyEngine::check_oleary_capital_efficiency(
                    &runtime.philosophy,
                    &mut state,
                    &position,
                    quote.mid,
                    now,
                ) {
                    let _ = runtime
                        .order_manager
                        .submit_exit(&mut position, ExitReason::Expiry, now)
                        .await;
                    runtime.positions.update(&position).await?;
                }
            }
            runtime.philosophy_states.upsert(&state).await?;
        }
        Ok(())
    }

    pub fn scenario_ids(&self) -> Vec<String> {
        self.scenarios.iter().map(|r| r.scenario_id.clone()).collect()
    }

    pub fn runtime_for(&self, scenario_id: &str) -> Option<&ScenarioRuntime> {
        self.scenarios.iter().find(|r| r.scenario_id == scenario_id)
    }
}

fn direction_key(direction: crate::domain::signal::Direction) -> &'static str {
    match direction {
        crate::domain::signal::Direction::Long => "LONG",
        crate::domain::signal::Direction::Short => "SHORT",
    }
}
