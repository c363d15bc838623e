//! Thin operation layer behind the HTTP surface. Each function here is the
//! full implementation of one endpoint; there is no router wired up in this
//! crate — an API crate would call straight through to these.
//!
//! Request-shaped structs returned from plain async functions rather than
//! framework-specific handler signatures, so the same functions can be
//! called directly from tests or from a future HTTP layer alike.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::application::cycle_manager::CycleManager;
use crate::application::orchestrator::{Orchestrator, ScenarioTickResult};
use crate::domain::cycle::Cycle;
use crate::domain::philosophy::PhilosophyState;
use crate::domain::position::Position;
use crate::domain::repositories::{
    CycleRepository, PhilosophyStateRepository, PositionRepository, ScenarioRepository,
};
use crate::infrastructure::observability::{Metrics, MetricsSnapshot};

#[derive(Debug, Clone, Serialize)]
pub struct OpResponse<T> {
    pub status: &'static str,
    pub message: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

fn ok<T>(message: impl Into<String>, data: T) -> OpResponse<T> {
    OpResponse {
        status: "success",
        message: message.into(),
        data: Some(data),
    }
}

fn err<T>(message: impl Into<String>) -> OpResponse<T> {
    OpResponse {
        status: "error",
        message: message.into(),
        data: None,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub scenarios_running: usize,
}

/// `GET /health` — liveness only, no dependency check (the scheduler loop
/// itself is the liveness signal; a wedged dependency surfaces as stalled
/// scenario ticks, not a failed health check).
pub fn health(orchestrator: &Orchestrator) -> OpResponse<HealthStatus> {
    ok(
        "engine is up",
        HealthStatus {
            scenarios_running: orchestrator.scenario_ids().len(),
        },
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationTriggerResult {
    pub results: Vec<ScenarioTickResult>,
}

/// `POST /allocation/trigger` — run one scenario-allocation pass
/// immediately, out of schedule.
pub async fn trigger_allocation(orchestrator: &Orchestrator, now: DateTime<Utc>) -> OpResponse<AllocationTriggerResult> {
    let results = orchestrator.execute_all(now).await;
    ok(
        format!("executed {} scenario(s)", results.len()),
        AllocationTriggerResult { results },
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub cycle_id: String,
    pub phase: String,
    pub current_day: i64,
    pub duration_days: i64,
    pub risk_gate: String,
    pub current_value: Decimal,
    pub high_water_mark: Decimal,
    pub drawdown_pct: f64,
    pub settlement_ready: bool,
}

fn summarize_cycle(cycle: &Cycle, now: DateTime<Utc>) -> CycleSummary {
    let phase = cycle.phase(now);
    let risk_gate = cycle.check_risk_gate();
    CycleSummary {
        cycle_id: cycle.cycle_id.clone(),
        phase: format!("{:?}", phase),
        current_day: cycle.current_day(now),
        duration_days: cycle.duration_days,
        risk_gate: format!("{:?}", risk_gate),
        current_value: cycle.performance.current_value,
        high_water_mark: cycle.performance.high_water_mark,
        drawdown_pct: cycle.performance.drawdown_from_high_water_mark(),
        settlement_ready: cycle.current_day(now) >= crate::application::cycle_manager::MIN_VALIDITY_DAYS,
    }
}

/// `GET /cycle/current` — active cycle summary for one scenario.
pub async fn cycle_current(
    cycles: &dyn CycleRepository,
    scenario_id: &str,
    now: DateTime<Utc>,
) -> OpResponse<CycleSummary> {
    match cycles.find_active_for_scenario(scenario_id).await {
        Ok(Some(cycle)) => ok("active cycle found", summarize_cycle(&cycle, now)),
        Ok(None) => err(format!("no active cycle for scenario {scenario_id}")),
        Err(e) => err(format!("failed to load active cycle: {e}")),
    }
}

/// `POST /cycle/start` — create a new cycle for a scenario if none is
/// ACTIVE; a no-op success if one already exists (idempotent).
pub async fn cycle_start(
    cycle_manager: &CycleManager,
    scenario_id: &str,
    starting_cash: Decimal,
    duration_days: i64,
    allocation_power: f64,
    now: DateTime<Utc>,
) -> OpResponse<CycleSummary> {
    match cycle_manager
        .get_or_create_active(scenario_id, starting_cash, duration_days, allocation_power, now)
        .await
    {
        Ok(cycle) => ok("cycle active", summarize_cycle(&cycle, now)),
        Err(e) => err(format!("failed to start cycle: {e}")),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementResult {
    pub cycle_id: String,
    pub realized_pnl: Decimal,
    pub win_rate: f64,
    pub withdrawal: Decimal,
    pub next_cycle_capital: Decimal,
}

/// `POST /cycle/settle` — settle the ACTIVE cycle for a scenario if the
/// validity gate passes, then open the next cycle at the reset capital.
pub async fn cycle_settle(
    cycle_manager: &CycleManager,
    cycles: &dyn CycleRepository,
    positions: &dyn PositionRepository,
    scenarios: &dyn ScenarioRepository,
    scenario_id: &str,
    now: DateTime<Utc>,
) -> OpResponse<SettlementResult> {
    let mut cycle = match cycles.find_active_for_scenario(scenario_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return err(format!("no active cycle for scenario {scenario_id}")),
        Err(e) => return err(format!("failed to load active cycle: {e}")),
    };

    if let Err(e) = cycle_manager.validate_for_settlement(&cycle, now, false).await {
        return err(format!("settlement rejected: {e}"));
    }

    if cycle_manager.mark_completed(&mut cycle).await.is_err()
        || cycle_manager.mark_settled(&mut cycle).await.is_err()
    {
        return err("failed to persist cycle settlement".to_string());
    }

    let closed = positions
        .find_by_status(&cycle.cycle_id, crate::domain::position::PositionStatus::Closed)
        .await
        .unwrap_or_default();
    let summary = cycle_manager.summarize_performance(&closed);

    if let Ok(Some(mut scenario)) = scenarios.find_by_id(scenario_id).await {
        for position in &closed {
            scenario.record_closed_trade(position.realized_pnl.unwrap_or_default());
        }
        let _ = scenarios.update(&scenario).await;
    }

    let withdrawal = cycle_manager.profit_withdrawal(summary.realized_pnl);
    let next_capital = cycle_manager.next_cycle_capital(cycle.performance.starting_cash);

    ok(
        "cycle settled",
        SettlementResult {
            cycle_id: cycle.cycle_id,
            realized_pnl: summary.realized_pnl,
            win_rate: summary.win_rate,
            withdrawal,
            next_cycle_capital: next_capital,
        },
    )
}

/// `GET /cycle/history` — every past cycle for a scenario, newest first.
pub async fn cycle_history(
    cycles: &dyn CycleRepository,
    scenario_id: &str,
    now: DateTime<Utc>,
) -> OpResponse<Vec<CycleSummary>> {
    match cycles.find_history_for_scenario(scenario_id).await {
        Ok(mut history) => {
            history.sort_by(|a, b| b.start_date.cmp(&a.start_date));
            let summaries = history.iter().map(|c| summarize_cycle(c, now)).collect();
            ok(format!("{} cycle(s) found", history.len()), summaries)
        }
        Err(e) => err(format!("failed to load cycle history: {e}")),
    }
}

/// `GET /cycle/metrics/{cycle_id}` — the live gauge snapshot for one
/// scenario (the gauges are scenario-scoped, not cycle-scoped, since the
/// active cycle is what drives them; a historical cycle_id is matched
/// against the current active cycle and rejected otherwise).
pub async fn cycle_metrics(
    cycles: &dyn CycleRepository,
    metrics: &Metrics,
    scenario_id: &str,
    cycle_id: &str,
) -> OpResponse<MetricsSnapshot> {
    match cycles.find_active_for_scenario(scenario_id).await {
        Ok(Some(cycle)) if cycle.cycle_id == cycle_id => {
            ok("metrics snapshot", metrics.snapshot(scenario_id))
        }
        Ok(Some(cycle)) => err(format!(
            "cycle_id {cycle_id} is not the active cycle ({})",
            cycle.cycle_id
        )),
        Ok(None) => err(format!("no active cycle for scenario {scenario_id}")),
        Err(e) => err(format!("failed to load cycle: {e}")),
    }
}

/// `GET /scenarios/positions` — every OPEN position in a scenario's active
/// cycle.
pub async fn scenarios_positions(
    cycles: &dyn CycleRepository,
    positions: &dyn PositionRepository,
    scenario_id: &str,
) -> OpResponse<Vec<Position>> {
    let cycle = match cycles.find_active_for_scenario(scenario_id).await {
        Ok(Some(c)) => c,
        Ok(None) => return err(format!("no active cycle for scenario {scenario_id}")),
        Err(e) => return err(format!("failed to load active cycle: {e}")),
    };
    match positions
        .find_by_status(&cycle.cycle_id, crate::domain::position::PositionStatus::Open)
        .await
    {
        Ok(open) => ok(format!("{} open position(s)", open.len()), open),
        Err(e) => err(format!("failed to load positions: {e}")),
    }
}

/// `POST /scenarios/execute` — run every scenario's allocate-and-execute
/// tick immediately; identical to `trigger_allocation` but named per the
/// HTTP surface's own verb.
pub async fn scenarios_execute(orchestrator: &Orchestrator, now: DateTime<Utc>) -> OpResponse<AllocationTriggerResult> {
    trigger_allocation(orchestrator, now).await
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetResult {
    pub scenario_id: String,
    pub positions_closed: usize,
}

/// `POST /scenarios/reset` — force-close every OPEN position in a
/// scenario's active cycle at the current quote without settling the
/// cycle itself; an operator escape hatch distinct from the NUCLEAR-gate
/// liquidation path.
pub async fn scenarios_reset(orchestrator: &Orchestrator, scenario_id: &str, now: DateTime<Utc>) -> OpResponse<ResetResult> {
    let Some(runtime) = orchestrator.runtime_for(scenario_id) else {
        return err(format!("unknown scenario {scenario_id}"));
    };
    let Ok(Some(cycle)) = runtime.cycles.find_active_for_scenario(scenario_id).await else {
        return err(format!("no active cycle for scenario {scenario_id}"));
    };
    let Ok(mut open) = runtime
        .positions
        .find_by_status(&cycle.cycle_id, crate::domain::position::PositionStatus::Open)
        .await
    else {
        return err("failed to load open positions".to_string());
    };
    if open.is_empty() {
        return ok(
            "no open positions to reset",
            ResetResult {
                scenario_id: scenario_id.to_string(),
                positions_closed: 0,
            },
        );
    }
    let liquidation = runtime
        .order_manager
        .liquidate(
            &mut open,
            Decimal::ONE,
            crate::domain::position::ExitReason::ManualReview,
            now,
        )
        .await;
    for position in &open {
        let _ = runtime.positions.update(position).await;
    }
    ok(
        format!("reset {} position(s)", liquidation.closed.len()),
        ResetResult {
            scenario_id: scenario_id.to_string(),
            positions_closed: liquidation.closed.len(),
        },
    )
}

/// `POST /scenarios/update_unrealized` — refresh mark-to-market for every
/// scenario without opening new positions.
pub async fn scenarios_update_unrealized(orchestrator: &Orchestrator, now: DateTime<Utc>) -> OpResponse<()> {
    match orchestrator.update_unrealized_all(now).await {
        Ok(()) => ok("unrealized P&L refreshed", ()),
        Err(e) => err(format!("failed to refresh unrealized P&L: {e}")),
    }
}

/// `GET /philosophy/current` — today's discipline ledger for a scenario.
pub async fn philosophy_current(
    philosophy_states: &dyn PhilosophyStateRepository,
    scenario_id: &str,
    now: DateTime<Utc>,
) -> OpResponse<PhilosophyState> {
    match philosophy_states.find_for_date(scenario_id, now.date_naive()).await {
        Ok(Some(state)) => ok("philosophy state found", state),
        Ok(None) => ok(
            "no ledger yet today, returning a fresh baseline",
            PhilosophyState::new(scenario_id.to_string(), now.date_naive()),
        ),
        Err(e) => err(format!("failed to load philosophy state: {e}")),
    }
}

/// `POST /philosophy/update` — apply an operator override to today's
/// allocation power directly (settings themselves are fixed per scenario
/// at startup; only the day's ledger is writable at runtime).
pub async fn philosophy_update(
    philosophy_states: &dyn PhilosophyStateRepository,
    scenario_id: &str,
    now: DateTime<Utc>,
    new_allocation_power: f64,
) -> OpResponse<PhilosophyState> {
    let mut state = match philosophy_states.find_for_date(scenario_id, now.date_naive()).await {
        Ok(Some(state)) => state,
        Ok(None) => PhilosophyState::new(scenario_id.to_string(), now.date_naive()),
        Err(e) => return err(format!("failed to load philosophy state: {e}")),
    };
    state.current_allocation_power = new_allocation_power.clamp(
        crate::domain::philosophy::MIN_ALLOCATION_POWER,
        crate::domain::philosophy::MAX_ALLOCATION_POWER,
    );
    match philosophy_states.upsert(&state).await {
        Ok(()) => ok("allocation power updated", state),
        Err(e) => err(format!("failed to persist philosophy state: {e}")),
    }
}

/// `POST /philosophy/reset` — reset today's ledger back to baseline
/// (allocation power 1.0, counters zeroed), preserving history for prior
/// days.
pub async fn philosophy_reset(
    philosophy_states: &dyn PhilosophyStateRepository,
    scenario_id: &str,
    now: DateTime<Utc>,
) -> OpResponse<PhilosophyState> {
    let state = PhilosophyState::new(scenario_id.to_string(), now.date_naive());
    match philosophy_states.upsert(&state).await {
        Ok(()) => ok("philosophy ledger reset to baseline", state),
        Err(e) => err(format!("failed to persist philosophy state: {e}")),
    }
}

/// `GET /philosophy/state` — the last `limit` days of ledger history.
pub async fn philosophy_state(
    philosophy_states: &dyn PhilosophyStateRepository,
    scenario_id: &str,
    limit: u32,
) -> OpResponse<Vec<PhilosophyState>> {
    match philosophy_states.find_recent(scenario_id, limit).await {
        Ok(history) => ok(format!("{} day(s) of history", history.len()), history),
        Err(e) => err(format!("failed to load philosophy history: {e}")),
    }
}
