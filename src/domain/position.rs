//! Position entity — an open or closed holding tied to a cycle and the
//! signal(s) that originated it.
//!
//! Pnl computed on close; weighted-average cost-basis update on adds,
//! mirroring the broker fill semantics.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::ids::new_position_id;
use crate::domain::signal::{ConvictionTier, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Pending,
    Open,
    Closed,
    ForceClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    ScaleOut,
    ForceClose,
    StopLoss,
    NuclearLiquidation,
    ManualReview,
    Reallocation,
    TierEscalation,
    Expiry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub position_id: String,
    pub cycle_id: String,
    pub source_signals: Vec<String>,
    pub symbol: String,
    pub direction: Direction,
    pub shares: Decimal,
    pub entry_price: Decimal,
    pub entry_time: DateTime<Utc>,
    pub atr_stop_price: Option<Decimal>,
    pub conviction_tier: ConvictionTier,
    pub philosophy_applied: Vec<String>,
    pub round_start: DateTime<Utc>,
    pub round_expiry: DateTime<Utc>,
    pub round_extended: bool,
    pub discipline_violations: u32,
    pub status: PositionStatus,
    pub exit_price: Option<Decimal>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub realized_pnl: Option<Decimal>,
    pub commission_paid: Decimal,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        cycle_id: String,
        signal_id: String,
        symbol: String,
        direction: Direction,
        shares: Decimal,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
        atr_stop_price: Option<Decimal>,
        commission_paid: Decimal,
    ) -> Self {
        Self {
            position_id: new_position_id(),
            cycle_id,
            source_signals: vec![signal_id],
            symbol,
            direction,
            shares,
            entry_price,
            entry_time,
            atr_stop_price,
            conviction_tier: ConvictionTier::B,
            philosophy_applied: Vec::new(),
            round_start: entry_time,
            round_expiry: entry_time + chrono::Duration::days(90),
            round_extended: false,
            discipline_violations: 0,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            realized_pnl: None,
            commission_paid,
        }
    }

    pub fn with_tier(mut self, tier: ConvictionTier) -> Self {
        self.conviction_tier = tier;
        self
    }

    /// Carry-forward constructor used by the review-cycle escalator: a
    /// tier-upgraded position keeps the OLD position's entry price and
    /// carries forward `round_start`/`round_expiry`/`cycle_id`.
    pub fn escalate_from(
        previous: &Position,
        new_signal_id: String,
        new_tier: ConvictionTier,
        new_shares: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            position_id: new_position_id(),
            cycle_id: previous.cycle_id.clone(),
            source_signals: {
                let mut signals = previous.source_signals.clone();
                signals.push(new_signal_id);
                signals
            },
            symbol: previous.symbol.clone(),
            direction: previous.direction,
            shares: new_shares,
            entry_price: previous.entry_price,
            entry_time: previous.entry_time,
            atr_stop_price: previous.atr_stop_price,
            conviction_tier: new_tier,
            philosophy_applied: previous.philosophy_applied.clone(),
            round_start: previous.round_start,
            round_expiry: previous.round_expiry,
            round_extended: previous.round_extended,
            discipline_violations: previous.discipline_violations,
            status: PositionStatus::Open,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
            realized_pnl: None,
            commission_paid: Decimal::ZERO,
        }
    }

    /// Saylor rule effect: extend `round_expiry` by `extension_days`,
    /// marking `round_extended`.
    pub fn extend_round(&mut self, extension_days: i64) {
        self.round_expiry += chrono::Duration::days(extension_days);
        self.round_extended = true;
    }

    pub fn market_value(&self, current_price: Decimal) -> Decimal {
        self.shares * current_price
    }

    pub fn unrealized_pnl(&self, current_price: Decimal) -> Decimal {
        match self.direction {
            Direction::Long => (current_price - self.entry_price) * self.shares,
            Direction::Short => (self.entry_price - current_price) * self.shares,
        }
    }

    pub fn close(
        &mut self,
        exit_price: Decimal,
        exit_time: DateTime<Utc>,
        exit_reason: ExitReason,
        commission: Decimal,
    ) {
        let pnl = match self.direction {
            Direction::Long => (exit_price - self.entry_price) * self.shares,
            Direction::Short => (self.entry_price - exit_price) * self.shares,
        } - commission;
        self.status = if exit_reason == ExitReason::ForceClose
            || exit_reason == ExitReason::NuclearLiquidation
        {
            PositionStatus::ForceClosed
        } else {
            PositionStatus::Closed
        };
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.exit_reason = Some(exit_reason);
        self.realized_pnl = Some(pnl);
        self.commission_paid += commission;
    }

    /// True once the current price crosses the ATR stop. Stops are
    /// enforced at mark-to-market, not solely at nuclear liquidation.
    pub fn stop_triggered(&self, current_price: Decimal) -> bool {
        match (self.atr_stop_price, self.direction) {
            (Some(stop), Direction::Long) => current_price <= stop,
            (Some(stop), Direction::Short) => current_price >= stop,
            (None, _) => false,
        }
    }

    pub fn holding_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entry_time).num_days()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Position {
        Position::open(
            "cycle_1".to_string(),
            "sig_1".to_string(),
            "AAPL".to_string(),
            Direction::Long,
            dec!(100),
            dec!(150),
            Utc::now(),
            Some(dec!(140)),
            dec!(1),
        )
    }

    #[test]
    fn unrealized_pnl_long() {
        let p = sample();
        assert_eq!(p.unrealized_pnl(dec!(160)), dec!(1000));
    }

    #[test]
    fn close_records_realized_pnl_net_of_commission() {
        let mut p = sample();
        p.close(dec!(160), Utc::now(), ExitReason::ScaleOut, dec!(1));
        assert_eq!(p.realized_pnl, Some(dec!(999)));
        assert_eq!(p.status, PositionStatus::Closed);
        assert_eq!(p.commission_paid, dec!(2));
    }

    #[test]
    fn force_close_reasons_set_force_closed_status() {
        let mut p = sample();
        p.close(dec!(140), Utc::now(), ExitReason::NuclearLiquidation, dec!(1));
        assert_eq!(p.status, PositionStatus::ForceClosed);
    }

    #[test]
    fn stop_trigger_long() {
        let p = sample();
        assert!(p.stop_triggered(dec!(139)));
        assert!(!p.stop_triggered(dec!(141)));
    }

    #[test]
    fn escalation_carries_old_entry_price_and_round() {
        let original = sample();
        let escalated = Position::escalate_from(
            &original,
            "sig_2".to_string(),
            ConvictionTier::S,
            dec!(200),
            Utc::now(),
        );
        assert_eq!(escalated.entry_price, original.entry_price);
        assert_ne!(escalated.position_id, original.position_id);
        assert_eq!(escalated.shares, dec!(200));
        assert_eq!(escalated.round_start, original.round_start);
        assert_eq!(escalated.source_signals.len(), 2);
    }

    #[test]
    fn extend_round_pushes_expiry_forward() {
        let mut p = sample();
        let before = p.round_expiry;
        p.extend_round(30);
        assert_eq!(p.round_expiry, before + chrono::Duration::days(30));
        assert!(p.round_extended);
    }
}
