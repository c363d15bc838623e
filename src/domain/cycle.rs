//! Cycle entity and phase state machine.
//!
//! `get_cycle_phase`, `get_current_cycle_day`, `check_drawdown_gates`,
//! `calculate_cycle_performance`. Cycle duration defaults to N=90 canonical
//! days; `CycleManager::new` in the application layer asserts
//! `duration_days > 75` so the SCALE_OUT/FORCE_CLOSE boundaries below remain
//! meaningful.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::errors::InvariantError;
use crate::domain::ids::derive_cycle_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CyclePhase {
    Load,
    Active,
    ScaleOut,
    ForceClose,
}

impl CyclePhase {
    /// Per-phase sizing multiplier.
    pub fn sizing_multiplier(&self) -> Decimal {
        match self {
            CyclePhase::Load => Decimal::new(15, 1),        // 1.5
            CyclePhase::Active => Decimal::ONE,              // 1.0
            CyclePhase::ScaleOut => Decimal::new(5, 1),      // 0.5
            CyclePhase::ForceClose => Decimal::ZERO,         // 0.0
        }
    }

    /// New entries are allowed only in LOAD and ACTIVE.
    pub fn allows_new_entries(&self) -> bool {
        matches!(self, CyclePhase::Load | CyclePhase::Active)
    }

    /// Max open positions per phase.
    pub fn max_positions(&self) -> usize {
        match self {
            CyclePhase::Load => 12,
            CyclePhase::Active => 16,
            CyclePhase::ScaleOut => 8,
            CyclePhase::ForceClose => 0,
        }
    }

    /// Fraction of portfolio value allocatable per phase.
    pub fn allocation_pct(&self) -> Decimal {
        match self {
            CyclePhase::Load => Decimal::new(70, 2),
            CyclePhase::Active => Decimal::new(80, 2),
            CyclePhase::ScaleOut => Decimal::new(40, 2),
            CyclePhase::ForceClose => Decimal::ZERO,
        }
    }

    /// Cash reserve floor per phase.
    pub fn cash_reserve_floor(&self) -> Decimal {
        match self {
            CyclePhase::Load => Decimal::new(30, 2),
            CyclePhase::Active => Decimal::new(20, 2),
            CyclePhase::ScaleOut => Decimal::new(60, 2),
            CyclePhase::ForceClose => Decimal::ONE,
        }
    }

    /// ATR stop multiplier per phase.
    pub fn atr_stop_multiplier(&self) -> Decimal {
        match self {
            CyclePhase::Load => Decimal::new(20, 1),
            CyclePhase::Active => Decimal::new(15, 1),
            CyclePhase::ScaleOut => Decimal::ONE,
            CyclePhase::ForceClose => Decimal::new(5, 1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CycleStatus {
    Active,
    Completed,
    Settled,
}

/// Dual drawdown gate: status is the highest tier whose `current_dd`/
/// `max_dd` thresholds are both met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskGate {
    Green,
    Yellow,
    Red,
    Nuclear,
}

impl RiskGate {
    pub fn blocks_new_allocations(&self) -> bool {
        matches!(self, RiskGate::Red | RiskGate::Nuclear)
    }

    pub fn forces_settlement(&self) -> bool {
        matches!(self, RiskGate::Nuclear)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CyclePerformance {
    pub starting_cash: Decimal,
    pub current_value: Decimal,
    pub high_water_mark: Decimal,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: Option<f64>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
}

impl CyclePerformance {
    pub fn total_return_pct(&self) -> f64 {
        if self.starting_cash.is_zero() {
            return 0.0;
        }
        ((self.current_value - self.starting_cash) / self.starting_cash)
            .to_string()
            .parse::<f64>()
            .unwrap_or(0.0)
    }

    pub fn drawdown_from_high_water_mark(&self) -> f64 {
        if self.high_water_mark.is_zero() {
            return 0.0;
        }
        let dd = (self.high_water_mark - self.current_value) / self.high_water_mark;
        dd.to_string().parse::<f64>().unwrap_or(0.0).max(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    pub cycle_id: String,
    pub scenario_id: String,
    pub start_date: DateTime<Utc>,
    pub duration_days: i64,
    pub status: CycleStatus,
    pub performance: CyclePerformance,
    pub allocation_power: f64,
}

impl Cycle {
    pub const LOAD_PHASE_END_DAY: i64 = 7;
    pub const ACTIVE_PHASE_END_DAY: i64 = 60;
    pub const SCALE_OUT_PHASE_END_DAY: i64 = 75;

    /// Start a new cycle. Returns `InvariantError::CycleDurationTooShort` if
    /// `duration_days` is too short for the phase table to be meaningful.
    pub fn new(
        scenario_id: String,
        start_date: DateTime<Utc>,
        duration_days: i64,
        starting_cash: Decimal,
        allocation_power: f64,
    ) -> Result<Self, InvariantError> {
        if duration_days <= 75 {
            return Err(InvariantError::CycleDurationTooShort { duration_days });
        }
        Ok(Self {
            cycle_id: derive_cycle_id(start_date),
            scenario_id,
            start_date,
            duration_days,
            status: CycleStatus::Active,
            performance: CyclePerformance {
                starting_cash,
                current_value: starting_cash,
                high_water_mark: starting_cash,
                max_drawdown_pct: 0.0,
                sharpe_ratio: None,
                realized_pnl: Decimal::ZERO,
                unrealized_pnl: Decimal::ZERO,
            },
            allocation_power,
        })
    }

    /// Current day within the cycle, clamped to `[1, duration_days]`.
    pub fn current_day(&self, now: DateTime<Utc>) -> i64 {
        let elapsed = (now - self.start_date).num_days() + 1;
        elapsed.clamp(1, self.duration_days)
    }

    /// Absolute day boundaries: 1-7 LOAD, 8-60 ACTIVE, 61-75 SCALE_OUT, 76-N
    /// FORCE_CLOSE. These are fixed day numbers, not proportional to
    /// `duration_days` — the N=90 default is exactly what makes the 76-N
    /// FORCE_CLOSE window non-empty.
    pub fn phase_for_day(&self, cycle_day: i64) -> CyclePhase {
        if cycle_day <= Self::LOAD_PHASE_END_DAY {
            CyclePhase::Load
        } else if cycle_day <= Self::ACTIVE_PHASE_END_DAY {
            CyclePhase::Active
        } else if cycle_day <= Self::SCALE_OUT_PHASE_END_DAY {
            CyclePhase::ScaleOut
        } else {
            CyclePhase::ForceClose
        }
    }

    pub fn phase(&self, now: DateTime<Utc>) -> CyclePhase {
        self.phase_for_day(self.current_day(now))
    }

    /// Dual drawdown gate: `current_dd` is drawdown from the high-water
    /// mark right now; `max_dd` is the cycle's worst drawdown so far
    /// (`performance.max_drawdown_pct`). The gate is the highest tier whose
    /// thresholds on BOTH figures are met.
    pub fn check_risk_gate(&self) -> RiskGate {
        let current_dd = self.performance.drawdown_from_high_water_mark();
        let max_dd = self.performance.max_drawdown_pct;
        if current_dd >= 0.15 && max_dd >= 0.20 {
            RiskGate::Nuclear
        } else if current_dd >= 0.10 && max_dd >= 0.15 {
            RiskGate::Red
        } else if current_dd >= 0.05 && max_dd >= 0.10 {
            RiskGate::Yellow
        } else {
            RiskGate::Green
        }
    }

    /// Update `current_value`/`high_water_mark`/`max_drawdown_pct` after a
    /// mark-to-market pass; never resets `high_water_mark` downward.
    pub fn mark_to_market(&mut self, current_value: Decimal) {
        self.performance.current_value = current_value;
        if current_value > self.performance.high_water_mark {
            self.performance.high_water_mark = current_value;
        }
        let dd = self.performance.drawdown_from_high_water_mark();
        if dd > self.performance.max_drawdown_pct {
            self.performance.max_drawdown_pct = dd;
        }
    }

    pub fn complete(&mut self) {
        self.status = CycleStatus::Completed;
    }

    pub fn settle(&mut self) {
        self.status = CycleStatus::Settled;
    }

    pub fn is_due_for_completion(&self, now: DateTime<Utc>) -> bool {
        self.status == CycleStatus::Active && self.current_day(now) >= self.duration_days
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn cycle() -> Cycle {
        Cycle::new(
            "scn_default".to_string(),
            Utc::now() - Duration::days(40),
            90,
            dec!(100000),
            1.0,
        )
        .unwrap()
    }

    #[test]
    fn rejects_short_duration() {
        let err = Cycle::new("s".to_string(), Utc::now(), 30, dec!(100000), 1.0).unwrap_err();
        assert!(matches!(err, InvariantError::CycleDurationTooShort { .. }));
    }

    #[test]
    fn phase_table_matches_day_boundaries() {
        let c = cycle();
        assert_eq!(c.phase_for_day(1), CyclePhase::Load);
        assert_eq!(c.phase_for_day(7), CyclePhase::Load);
        assert_eq!(c.phase_for_day(8), CyclePhase::Active);
        assert_eq!(c.phase_for_day(60), CyclePhase::Active);
        assert_eq!(c.phase_for_day(61), CyclePhase::ScaleOut);
        assert_eq!(c.phase_for_day(75), CyclePhase::ScaleOut);
        assert_eq!(c.phase_for_day(76), CyclePhase::ForceClose);
        assert_eq!(c.phase_for_day(90), CyclePhase::ForceClose);
    }

    #[test]
    fn current_day_is_clamped() {
        let c = Cycle::new(
            "s".to_string(),
            Utc::now() - Duration::days(500),
            90,
            dec!(100000),
            1.0,
        )
        .unwrap();
        assert_eq!(c.current_day(Utc::now()), 90);
    }

    #[test]
    fn risk_gate_escalates_with_drawdown() {
        // Monotonic worsening keeps current_dd == max_dd at each step, so
        // each gate's (current_dd, max_dd) pair is exercised directly.
        let mut c = cycle();
        c.mark_to_market(dec!(98000)); // 2% dd
        assert_eq!(c.check_risk_gate(), RiskGate::Green);
        c.mark_to_market(dec!(93000)); // 7% dd: current>=5% but max<10%
        assert_eq!(c.check_risk_gate(), RiskGate::Green);
        c.mark_to_market(dec!(89000)); // 11% dd: YELLOW (max<15% keeps RED out)
        assert_eq!(c.check_risk_gate(), RiskGate::Yellow);
        c.mark_to_market(dec!(84000)); // 16% dd: RED (max<20% keeps NUCLEAR out)
        assert_eq!(c.check_risk_gate(), RiskGate::Red);
        c.mark_to_market(dec!(79000)); // 21% dd: NUCLEAR
        assert_eq!(c.check_risk_gate(), RiskGate::Nuclear);
    }

    #[test]
    fn high_water_mark_never_decreases() {
        let mut c = cycle();
        c.mark_to_market(dec!(110000));
        c.mark_to_market(dec!(105000));
        assert_eq!(c.performance.high_water_mark, dec!(110000));
    }
}
