//! Position sizer — the liquidity, ATR-risk, and bounds checks applied
//! after the allocator computes a per-slot target dollar value.
//!
//! A small config struct plus a method chain of adjustments,
//! `tracing::info!` on every sizing decision, `dec!` literals for every
//! constant.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;

pub const MIN_POSITION_VALUE: Decimal = dec!(500);
pub const MAX_POSITION_VALUE: Decimal = dec!(5000);
pub const MAX_RISK_PER_POSITION_PCT: Decimal = dec!(0.02);
pub const ATR_RISK_MULTIPLIER: Decimal = dec!(2.0);
pub const MAX_SPREAD_TO_ATR_RATIO: Decimal = dec!(0.08);
pub const MIN_DAILY_VOLUME_USD: Decimal = dec!(1_000_000);
pub const MIN_AVG_VOLUME_USD: Decimal = dec!(5_000_000);

#[derive(Debug, Clone, Copy)]
pub struct LiquiditySnapshot {
    pub daily_volume_usd: Option<Decimal>,
    pub avg_volume_usd: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub atr: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizingOutcome {
    Sized(Decimal),
    Skipped(&'static str),
}

pub struct SizingEngine;

impl SizingEngine {
    /// Liquidity gate: fails (skip) on insufficient daily/average volume or
    /// an excessive spread-to-ATR ratio.
    fn check_liquidity(snapshot: &LiquiditySnapshot) -> Option<&'static str> {
        if let Some(volume) = snapshot.daily_volume_usd {
            if volume < MIN_DAILY_VOLUME_USD {
                return Some("daily volume below floor");
            }
        }
        if let Some(avg_volume) = snapshot.avg_volume_usd {
            if avg_volume < MIN_AVG_VOLUME_USD {
                return Some("average volume below floor");
            }
        }
        if let (Some(spread), Some(atr)) = (snapshot.spread, snapshot.atr) {
            if !atr.is_zero() && spread / atr > MAX_SPREAD_TO_ATR_RATIO {
                return Some("spread/ATR ratio too high");
            }
        }
        None
    }

    /// `available_capital * MAX_RISK_PER_POSITION_PCT / (risk_per_share / price)`,
    /// i.e. the largest dollar position whose per-share ATR risk stays
    /// within the 2% portfolio risk budget.
    fn atr_risk_sized_value(
        available_capital: Decimal,
        price: Decimal,
        atr: Decimal,
    ) -> Option<Decimal> {
        let risk_per_share = atr * ATR_RISK_MULTIPLIER;
        if risk_per_share.is_zero() || price.is_zero() {
            return None;
        }
        let risk_ratio = risk_per_share / price;
        if risk_ratio.is_zero() {
            return None;
        }
        Some(available_capital * MAX_RISK_PER_POSITION_PCT / risk_ratio)
    }

    /// Apply the sizer constraints to the allocator's slot value, returning
    /// either a final clamped dollar size or the reason for a skip.
    pub fn size_position(
        slot_value: Decimal,
        available_capital: Decimal,
        price: Decimal,
        phase_multiplier: Decimal,
        snapshot: LiquiditySnapshot,
    ) -> SizingOutcome {
        if let Some(reason) = Self::check_liquidity(&snapshot) {
            return SizingOutcome::Skipped(reason);
        }

        let atr_sized = snapshot
            .atr
            .and_then(|atr| Self::atr_risk_sized_value(available_capital, price, atr))
            .unwrap_or(slot_value);

        let final_dollar = slot_value
            .min(atr_sized)
            .min(available_capital)
            * phase_multiplier;

        let clamped = final_dollar.clamp(MIN_POSITION_VALUE, MAX_POSITION_VALUE);
        info!(
            slot_value = %slot_value,
            atr_sized = %atr_sized,
            final_dollar = %final_dollar,
            clamped = %clamped,
            "sized position"
        );
        SizingOutcome::Sized(clamped)
    }

    /// `floor(slot_value / price)`, minimum 1 share.
    pub fn shares_for_value(value: Decimal, price: Decimal) -> Decimal {
        if price.is_zero() {
            return Decimal::ZERO;
        }
        (value / price).floor().max(Decimal::ONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_snapshot() -> LiquiditySnapshot {
        LiquiditySnapshot {
            daily_volume_usd: Some(dec!(10_000_000)),
            avg_volume_usd: Some(dec!(10_000_000)),
            spread: Some(dec!(0.01)),
            atr: Some(dec!(2.0)),
        }
    }

    #[test]
    fn skips_on_thin_volume() {
        let mut snapshot = clean_snapshot();
        snapshot.daily_volume_usd = Some(dec!(100_000));
        let outcome = SizingEngine::size_position(dec!(2000), dec!(50000), dec!(100), dec!(1.0), snapshot);
        assert_eq!(outcome, SizingOutcome::Skipped("daily volume below floor"));
    }

    #[test]
    fn skips_on_wide_spread() {
        let mut snapshot = clean_snapshot();
        snapshot.spread = Some(dec!(1.0)); // spread/ATR = 0.5 > 0.08
        let outcome = SizingEngine::size_position(dec!(2000), dec!(50000), dec!(100), dec!(1.0), snapshot);
        assert_eq!(outcome, SizingOutcome::Skipped("spread/ATR ratio too high"));
    }

    #[test]
    fn clamps_to_position_value_bounds() {
        let outcome = SizingEngine::size_position(dec!(200), dec!(50000), dec!(100), dec!(1.0), clean_snapshot());
        assert_eq!(outcome, SizingOutcome::Sized(MIN_POSITION_VALUE));

        let outcome = SizingEngine::size_position(dec!(50000), dec!(50000), dec!(100), dec!(1.0), clean_snapshot());
        assert_eq!(outcome, SizingOutcome::Sized(MAX_POSITION_VALUE));
    }

    #[test]
    fn shares_floor_with_minimum_one() {
        assert_eq!(SizingEngine::shares_for_value(dec!(999), dec!(100)), dec!(9));
        assert_eq!(SizingEngine::shares_for_value(dec!(50), dec!(100)), dec!(1));
    }
}
