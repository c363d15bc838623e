//! Cycle manager & settlement.
//!
//! `get_active_cycle` (deactivating stale duplicates),
//! `check_cycle_completion`, `complete_cycle`, `calculate_cycle_performance`;
//! structured as a struct taking repository handles explicitly rather than
//! module-level globals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, warn};

use crate::domain::cycle::{Cycle, CyclePhase, CycleStatus, RiskGate};
use crate::domain::errors::{InvariantError, SettlementError};
use crate::domain::position::{Position, PositionStatus};
use crate::domain::repositories::{CycleRepository, PositionRepository};

pub const MIN_VALIDITY_DAYS: i64 = 30;
pub const MIN_POSITIONS_EVER: usize = 5;
pub const PROFIT_WITHDRAWAL_PCT: Decimal = dec!(0.50);
pub const CAPITAL_RESET_PCT: Decimal = dec!(0.80);
pub const DEFAULT_CYCLE_DURATION_DAYS: i64 = 90;
pub const DEFAULT_STARTING_CASH: Decimal = dec!(100000.00);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    Duration,
    Emergency,
    AllClosed,
}

pub struct CycleManager {
    cycles: Arc<dyn CycleRepository>,
    positions: Arc<dyn PositionRepository>,
}

impl CycleManager {
    pub fn new(cycles: Arc<dyn CycleRepository>, positions: Arc<dyn PositionRepository>) -> Self {
        Self { cycles, positions }
    }

    /// Get the scenario's ACTIVE cycle, or start a new one at
    /// `starting_cash`. Deactivates any duplicate ACTIVE cycles found for
    /// the scenario (invariant: at most one ACTIVE cycle per scenario).
    pub async fn get_or_create_active(
        &self,
        scenario_id: &str,
        starting_cash: Decimal,
        duration_days: i64,
        allocation_power: f64,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Cycle> {
        if let Some(cycle) = self.cycles.find_active_for_scenario(scenario_id).await? {
            return Ok(cycle);
        }
        let cycle = Cycle::new(
            scenario_id.to_string(),
            now,
            duration_days,
            starting_cash,
            allocation_power,
        )
        .map_err(|e: InvariantError| anyhow::anyhow!(e))?;
        self.cycles.insert(&cycle).await?;
        info!(cycle_id = %cycle.cycle_id, scenario_id, "opened new cycle");
        Ok(cycle)
    }

    pub fn phase(&self, cycle: &Cycle, now: DateTime<Utc>) -> CyclePhase {
        cycle.phase(now)
    }

    /// Completion predicates, checked daily: DURATION, EMERGENCY (NUCLEAR
    /// gate), ALL_CLOSED. Returns `None` if the cycle is not yet due for
    /// completion.
    pub async fn check_completion(
        &self,
        cycle: &Cycle,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Option<CompletionReason>> {
        if cycle.check_risk_gate() == RiskGate::Nuclear {
            return Ok(Some(CompletionReason::Emergency));
        }
        if cycle.current_day(now) >= cycle.duration_days {
            return Ok(Some(CompletionReason::Duration));
        }
        let positions = self.positions.find_by_cycle(&cycle.cycle_id).await?;
        if !positions.is_empty() && positions.iter().all(|p| p.status == PositionStatus::Closed) {
            return Ok(Some(CompletionReason::AllClosed));
        }
        Ok(None)
    }

    /// Validity gate: required for a settlement to count as "valid" rather
    /// than a no-op/failed attempt.
    pub async fn is_valid_for_settlement(&self, cycle: &Cycle, now: DateTime<Utc>) -> anyhow::Result<bool> {
        if cycle.status != CycleStatus::Active {
            return Ok(false);
        }
        if cycle.current_day(now) < MIN_VALIDITY_DAYS {
            return Ok(false);
        }
        let positions = self.positions.find_by_cycle(&cycle.cycle_id).await?;
        Ok(positions.len() >= MIN_POSITIONS_EVER)
    }

    /// Final performance summary used by settlement step 3.
    pub fn summarize_performance(&self, closed_positions: &[Position]) -> ClosedPerformanceSummary {
        let mut realized_pnl = Decimal::ZERO;
        let mut total_invested = Decimal::ZERO;
        let mut winners = Vec::new();
        let mut losers = Vec::new();
        for p in closed_positions {
            let pnl = p.realized_pnl.unwrap_or(Decimal::ZERO);
            realized_pnl += pnl;
            total_invested += p.shares * p.entry_price;
            if pnl > Decimal::ZERO {
                winners.push(pnl);
            } else {
                losers.push(pnl);
            }
        }
        let win_rate = if closed_positions.is_empty() {
            0.0
        } else {
            winners.len() as f64 / closed_positions.len() as f64
        };
        let avg_winner = average(&winners);
        let avg_loser = average(&losers);
        ClosedPerformanceSummary {
            total_invested,
            realized_pnl,
            win_rate,
            avg_winner,
            avg_loser,
            winning_count: winners.len(),
            losing_count: losers.len(),
        }
    }

    /// Settlement step 4: withdraw `PROFIT_WITHDRAWAL_PCT` of positive
    /// total pnl.
    pub fn profit_withdrawal(&self, total_pnl: Decimal) -> Decimal {
        if total_pnl > Decimal::ZERO {
            total_pnl * PROFIT_WITHDRAWAL_PCT
        } else {
            Decimal::ZERO
        }
    }

    /// Settlement step 5: next cycle's starting capital.
    pub fn next_cycle_capital(&self, original_capital: Decimal) -> Decimal {
        original_capital * CAPITAL_RESET_PCT
    }

    pub async fn mark_completed(&self, cycle: &mut Cycle) -> anyhow::Result<()> {
        cycle.complete();
        self.cycles.update(cycle).await?;
        Ok(())
    }

    pub async fn mark_settled(&self, cycle: &mut Cycle) -> anyhow::Result<()> {
        cycle.settle();
        self.cycles.update(cycle).await?;
        Ok(())
    }

    /// Validates the cycle and returns a settlement error variant when
    /// invalid (cycle stays ACTIVE unless EMERGENCY, which bypasses the
    /// validity gate).
    pub async fn validate_for_settlement(
        &self,
        cycle: &Cycle,
        now: DateTime<Utc>,
        is_emergency: bool,
    ) -> Result<(), SettlementError> {
        if cycle.status == CycleStatus::Settled {
            return Err(SettlementError::AlreadyCompleted {
                cycle_id: cycle.cycle_id.clone(),
            });
        }
        if is_emergency {
            return Ok(());
        }
        match self.is_valid_for_settlement(cycle, now).await {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(cycle_id = %cycle.cycle_id, "cycle fails settlement validity gate");
                Err(SettlementError::InvalidCycle {
                    cycle_id: cycle.cycle_id.clone(),
                    reason: format!(
                        "requires cycle_day >= {} and positions >= {}",
                        MIN_VALIDITY_DAYS, MIN_POSITIONS_EVER
                    ),
                })
            }
            Err(e) => Err(SettlementError::InvalidCycle {
                cycle_id: cycle.cycle_id.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClosedPerformanceSummary {
    pub total_invested: Decimal,
    pub realized_pnl: Decimal,
    pub win_rate: f64,
    pub avg_winner: Decimal,
    pub avg_loser: Decimal,
    pub winning_count: usize,
    pub losing_count: usize,
}

fn average(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let sum: Decimal = values.iter().copied().sum();
    sum / Decimal::from(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{ExitReason, Position};
    use crate::domain::signal::Direction;

    #[test]
    fn profit_withdrawal_only_on_positive_pnl() {
        let cycles: Arc<dyn CycleRepository> = Arc::new(crate::infrastructure::repositories::in_memory::InMemoryCycleRepository::default());
        let positions: Arc<dyn PositionRepository> = Arc::new(crate::infrastructure::repositories::in_memory::InMemoryPositionRepository::default());
        let manager = CycleManager::new(cycles, positions);
        assert_eq!(manager.profit_withdrawal(dec!(10000)), dec!(5000.00));
        assert_eq!(manager.profit_withdrawal(dec!(-500)), Decimal::ZERO);
    }

    #[test]
    fn next_cycle_capital_is_eighty_pct() {
        let cycles: Arc<dyn CycleRepository> = Arc::new(crate::infrastructure::repositories::in_memory::InMemoryCycleRepository::default());
        let positions: Arc<dyn PositionRepository> = Arc::new(crate::infrastructure::repositories::in_memory::InMemoryPositionRepository::default());
        let manager = CycleManager::new(cycles, positions);
        assert_eq!(manager.next_cycle_capital(dec!(100000)), dec!(80000.00));
    }

    #[test]
    fn summarize_performance_separates_winners_and_losers() {
        let cycles: Arc<dyn CycleRepository> = Arc::new(crate::infrastructure::repositories::in_memory::InMemoryCycleRepository::default());
        let positions: Arc<dyn PositionRepository> = Arc::new(crate::infrastructure::repositories::in_memory::InMemoryPositionRepository::default());
        let manager = CycleManager::new(cycles, positions);

        let mut winner = Position::open(
            "c1".to_string(),
            "s1".to_string(),
            "AAPL".to_string(),
            Direction::Long,
            dec!(10),
            dec!(100),
            Utc::now(),
            None,
            dec!(1),
        );
        winner.close(dec!(150), Utc::now(), ExitReason::ScaleOut, dec!(1));

        let mut loser = Position::open(
            "c1".to_string(),
            "s2".to_string(),
            "MSFT".to_string(),
            Direction::Long,
            dec!(10),
            dec!(100),
            Utc::now(),
            None,
            dec!(1),
        );
        loser.close(dec!(80), Utc::now(), ExitReason::StopLoss, dec!(1));

        let summary = manager.summarize_performance(&[winner, loser]);
        assert_eq!(summary.winning_count, 1);
        assert_eq!(summary.losing_count, 1);
        assert!((summary.win_rate - 0.5).abs() < 1e-9);
    }
}
