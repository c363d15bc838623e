//! Risk manager — drawdown gates, ATR stops, cash reserve floors,
//! per-position risk review.
//!
//! A coordinator over several small stateless checks, each returning a
//! verdict rather than throwing, composed by one entry point per call site.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::warn;

use crate::domain::cycle::{Cycle, CyclePhase, RiskGate};
use crate::domain::position::Position;
use crate::domain::signal::Direction;

pub const PER_POSITION_RISK_LIMIT_PCT: Decimal = dec!(0.02);

pub struct RiskManager;

impl RiskManager {
    pub fn gate(cycle: &Cycle) -> RiskGate {
        cycle.check_risk_gate()
    }

    pub fn blocks_new_allocations(cycle: &Cycle) -> bool {
        cycle.check_risk_gate().blocks_new_allocations()
    }

    /// ATR stop price for a new position: `entry ∓ ATR·mult` (`-` for LONG,
    /// `+` for SHORT). No stop if ATR is unavailable.
    pub fn compute_atr_stop(
        phase: CyclePhase,
        direction: Direction,
        entry_price: Decimal,
        atr: Option<Decimal>,
    ) -> Option<Decimal> {
        let atr = atr?;
        let offset = atr * phase.atr_stop_multiplier();
        Some(match direction {
            Direction::Long => entry_price - offset,
            Direction::Short => entry_price + offset,
        })
    }

    /// Cash reserve floor in dollars for the current phase.
    pub fn cash_reserve_floor(phase: CyclePhase, portfolio_value: Decimal) -> Decimal {
        portfolio_value * phase.cash_reserve_floor()
    }

    /// `risk_pct = |unrealized_pnl| / position_value`; flags for review if
    /// it exceeds the 2% per-position limit.
    pub fn position_risk_pct(position_value: Decimal, unrealized_pnl: Decimal) -> Decimal {
        if position_value.is_zero() {
            return Decimal::ZERO;
        }
        (unrealized_pnl.abs() / position_value).abs()
    }

    pub fn flags_for_review(position_value: Decimal, unrealized_pnl: Decimal) -> bool {
        let risk_pct = Self::position_risk_pct(position_value, unrealized_pnl);
        let flagged = risk_pct > PER_POSITION_RISK_LIMIT_PCT;
        if flagged {
            warn!(?risk_pct, "position exceeds per-position risk limit");
        }
        flagged
    }

    /// Whether a position's stop has been triggered at the current mark.
    pub fn stop_triggered(position: &Position, current_price: Decimal) -> bool {
        position.stop_triggered(current_price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atr_stop_long_is_below_entry() {
        let stop = RiskManager::compute_atr_stop(
            CyclePhase::Active,
            Direction::Long,
            dec!(100),
            Some(dec!(2)),
        );
        assert_eq!(stop, Some(dec!(97.0))); // 100 - 2*1.5
    }

    #[test]
    fn atr_stop_short_is_above_entry() {
        let stop = RiskManager::compute_atr_stop(
            CyclePhase::Load,
            Direction::Short,
            dec!(100),
            Some(dec!(2)),
        );
        assert_eq!(stop, Some(dec!(104.0))); // 100 + 2*2.0
    }

    #[test]
    fn no_atr_means_no_stop() {
        assert_eq!(
            RiskManager::compute_atr_stop(CyclePhase::Active, Direction::Long, dec!(100), None),
            None
        );
    }

    #[test]
    fn flags_review_when_risk_exceeds_two_pct() {
        assert!(RiskManager::flags_for_review(dec!(10000), dec!(-300)));
        assert!(!RiskManager::flags_for_review(dec!(10000), dec!(-100)));
    }

    #[test]
    fn cash_reserve_floor_scales_by_phase() {
        assert_eq!(
            RiskManager::cash_reserve_floor(CyclePhase::ForceClose, dec!(100000)),
            dec!(100000)
        );
        assert_eq!(
            RiskManager::cash_reserve_floor(CyclePhase::Active, dec!(100000)),
            dec!(20000)
        );
    }
}
